pub mod app;
pub mod breadbox;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod identity;
pub mod jikan;
pub mod models;
pub mod nyaa;
pub mod player;
pub mod ui;

#[cfg(test)]
mod testutil;
