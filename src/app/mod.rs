//! Interactive navigation.
//!
//! Screens form a stack: entering a menu pushes it, backing out pops it, and
//! the program ends once the stack is empty or the main menu is cancelled.

mod contribute;
mod settings;
mod watch;

pub use contribute::{parse_numeric_id, Contribution, REQUIRED_AUTH_LEVEL};
pub use watch::{classify, episode_options, TitleLayout, WatchTarget};

use crate::breadbox::{BreadboxClient, Session};
use crate::config::Configuration;
use crate::credentials::CredentialStore;
use crate::error::{BreadboxError, ExitRequested, NotLoggedIn};
use crate::http::HttpClient;
use crate::identity;
use crate::jikan::{JikanClient, JIKAN_API};
use crate::models::{ArchiveKind, User};
use crate::nyaa::{NyaaClient, NYAA_ORIGIN};
use crate::ui::{MenuItem, Prompter};
use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use url::Url;

pub const TITLE: &str = "Itadakimasu";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SUMMARY: &str = "A terminal client for watching anime from a Breadbox archive.";

/// Where the third-party services live.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub jikan: String,
    pub nyaa: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            jikan: JIKAN_API.to_string(),
            nyaa: NYAA_ORIGIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    MainMenu,
    ArchiveBrowse,
    TitleBrowse(ArchiveKind),
    EpisodeBrowse { anime_id: String },
    BonusBrowse { anime_id: String, title: String, bonus: Vec<String> },
    WatchAction(WatchTarget),
    Settings,
    Contribute,
    About,
}

/// What a screen asks the navigator to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Show the same screen again.
    Stay,
    Push(Screen),
    /// Swap the current screen, so backing out skips it.
    Replace(Screen),
    Pop,
    Exit,
}

pub struct App<P> {
    prompter: P,
    config: Configuration,
    config_path: PathBuf,
    credentials: CredentialStore,
    api_key_override: Option<String>,
    breadbox_http: HttpClient,
    jikan: JikanClient,
    nyaa: NyaaClient,
    client: Option<BreadboxClient>,
    user: Option<User>,
}

/// Borrows only the client field, leaving the prompter free.
fn logged_in(client: &Option<BreadboxClient>) -> Result<&BreadboxClient> {
    client.as_ref().ok_or_else(|| NotLoggedIn.into())
}

fn is_exit(e: &anyhow::Error) -> bool {
    e.downcast_ref::<ExitRequested>().is_some()
}

impl<P: Prompter> App<P> {
    pub fn new(
        prompter: P,
        config: Configuration,
        config_path: PathBuf,
        credentials: CredentialStore,
        endpoints: Endpoints,
    ) -> Result<Self> {
        let public_http = HttpClient::new()?;
        let mut app = Self {
            prompter,
            config,
            config_path,
            credentials,
            api_key_override: None,
            breadbox_http: HttpClient::accepting_invalid_certs()?,
            jikan: JikanClient::with_base_url(public_http.clone(), &endpoints.jikan),
            nyaa: NyaaClient::with_origin(public_http, &endpoints.nyaa),
            client: None,
            user: None,
        };
        app.apply_theme();
        app.update_backtitle();
        Ok(app)
    }

    /// Key to try before the stored one. It is never written to disk.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key_override = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path)
    }

    /// Logs in and runs the menus until the user leaves.
    pub async fn run(&mut self) -> Result<()> {
        let outcome = async {
            self.login().await?;
            self.navigate(Screen::MainMenu).await
        }
        .await;

        match outcome {
            Err(e) if is_exit(&e) => {
                info!("Exit requested");
                Ok(())
            }
            other => other,
        }
    }

    pub async fn navigate(&mut self, root: Screen) -> Result<()> {
        let mut stack = vec![root];

        while let Some(screen) = stack.last().cloned() {
            debug!(depth = stack.len(), "Showing {:?}", screen);

            let transition = match self.show(&screen).await {
                Ok(transition) => transition,
                Err(e) if is_exit(&e) => return Err(e),
                Err(e) if e.downcast_ref::<NotLoggedIn>().is_some() => {
                    info!("No session for {:?}, logging in again", screen);
                    match self.login().await {
                        Ok(()) => Transition::Stay,
                        Err(e) if is_exit(&e) => return Err(e),
                        Err(e) => {
                            self.show_error(&screen, &e)?;
                            Transition::Pop
                        }
                    }
                }
                Err(e) => {
                    self.show_error(&screen, &e)?;
                    Transition::Pop
                }
            };

            match transition {
                Transition::Stay => {}
                Transition::Push(next) => stack.push(next),
                Transition::Replace(next) => {
                    stack.pop();
                    stack.push(next);
                }
                Transition::Pop => {
                    stack.pop();
                }
                Transition::Exit => break,
            }
        }

        Ok(())
    }

    fn show_error(&mut self, screen: &Screen, e: &anyhow::Error) -> Result<()> {
        error!("{:?} failed: {:#}", screen, e);
        self.prompter
            .message("Breadbox / Error", &format!("Something went wrong.\n\n{:#}", e))
    }

    async fn show(&mut self, screen: &Screen) -> Result<Transition> {
        match screen {
            Screen::MainMenu => self.main_menu(),
            Screen::ArchiveBrowse => self.archive_menu().await,
            Screen::TitleBrowse(kind) => self.title_menu(*kind).await,
            Screen::EpisodeBrowse { anime_id } => self.episode_menu(anime_id).await,
            Screen::BonusBrowse {
                anime_id,
                title,
                bonus,
            } => self.bonus_menu(anime_id, title, bonus),
            Screen::WatchAction(target) => self.watch_menu(target).await,
            Screen::Settings => self.settings_menu().await,
            Screen::Contribute => self.contribute().await,
            Screen::About => self.about(),
        }
    }

    /// Makes sure a server and a working API key are configured, asking for
    /// whichever is missing.
    pub async fn login(&mut self) -> Result<()> {
        if !self.config.has_server() {
            let server = self.ask_for_server_url()?;
            self.config.server = Some(server);
            self.save_config()?;
        }
        let server = self.config.server.clone().unwrap_or_default();

        let (client, user) = self.connect(&server).await?;
        self.client = Some(client);
        self.user = Some(user);
        self.update_backtitle();
        Ok(())
    }

    /// Opens a session on `server` without touching the current one. A key
    /// typed in along the way is stored only once the session works.
    async fn connect(&mut self, server: &str) -> Result<(BreadboxClient, User)> {
        let mut candidate = match self.api_key_override.clone() {
            Some(key) => Some(key),
            None => self.credentials.load()?,
        };
        let mut prompted = false;

        let api_key = loop {
            if let Some(key) = candidate.take() {
                self.prompter.busy("Checking API key...");
                if identity::check_key(&self.breadbox_http, server, &key).await? {
                    break key;
                }
                warn!("API key rejected by {}", server);
            }
            candidate = Some(self.ask_for_api_key()?);
            prompted = true;
        };

        let session = Session::new(server, api_key.clone())?;
        let client = BreadboxClient::new(self.breadbox_http.clone(), session);

        self.prompter.busy("Fetching user info...");
        let user = client.user_info().await?.ok_or_else(|| BreadboxError::NotFound {
            resource: format!("user {}", client.user_id()),
        })?;
        info!("Logged in to {} as {} (auth level {})", server, user.username, user.auth_level);

        if prompted {
            self.credentials.store(&api_key)?;
        }
        Ok((client, user))
    }

    /// Forgets the current session so the next `login` starts over.
    fn logout(&mut self) {
        self.client = None;
        self.user = None;
        self.api_key_override = None;
        self.update_backtitle();
    }

    fn ask_for_server_url(&mut self) -> Result<String> {
        loop {
            let Some(input) = self.prompter.input(
                "Breadbox",
                "The Breadbox server URL has not been set. Input it here and it will be saved automatically.",
                None,
                false,
            )?
            else {
                return Err(ExitRequested.into());
            };

            let input = input.trim().trim_end_matches('/').to_string();
            match Url::parse(&input) {
                Ok(_) => return Ok(input),
                Err(e) => self
                    .prompter
                    .message("Breadbox", &format!("{} is not a valid URL: {}", input, e))?,
            }
        }
    }

    fn ask_for_api_key(&mut self) -> Result<String> {
        let input = self.prompter.input(
            "Breadbox",
            "Your API key has not been set or is invalid. Input it here and it will be saved automatically.",
            None,
            true,
        )?;

        match input {
            Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(ExitRequested.into()),
        }
    }

    fn update_backtitle(&mut self) {
        let backtitle = match &self.user {
            Some(user) => format!(" {} v{} | User: {}", TITLE, VERSION, user.username),
            None => format!(" {} v{}", TITLE, VERSION),
        };
        self.prompter.set_backtitle(&backtitle);
    }

    fn apply_theme(&mut self) {
        self.prompter
            .apply_theme(self.config.enable_theme, &self.config.theme);
    }

    fn main_menu(&mut self) -> Result<Transition> {
        let items = [
            MenuItem::plain("Archive"),
            MenuItem::plain("Settings"),
            MenuItem::plain("Contribute"),
            MenuItem::plain("About"),
        ];
        let choice = self.prompter.menu("Breadbox", "Welcome to Breadbox", &items)?;

        Ok(match choice.as_deref() {
            Some("Archive") => Transition::Push(Screen::ArchiveBrowse),
            Some("Settings") => Transition::Push(Screen::Settings),
            Some("Contribute") => Transition::Push(Screen::Contribute),
            Some("About") => Transition::Push(Screen::About),
            _ => Transition::Exit,
        })
    }

    async fn archive_menu(&mut self) -> Result<Transition> {
        self.prompter.busy("Fetching archive sizes...");
        let client = logged_in(&self.client)?;

        let mut items = Vec::with_capacity(ArchiveKind::ALL.len());
        for kind in ArchiveKind::ALL {
            let label = match client.archive(kind).size().await {
                Ok(size) => format!("{} titles", size),
                Err(e) => {
                    debug!("No size for {} archive: {}", kind, e);
                    String::new()
                }
            };
            items.push(MenuItem::new(kind.label(), label));
        }

        let choice = self
            .prompter
            .menu("Breadbox / Archive", "Select an archive:", &items)?;

        Ok(match choice.as_deref().and_then(ArchiveKind::from_label) {
            Some(kind) => Transition::Push(Screen::TitleBrowse(kind)),
            None => Transition::Pop,
        })
    }

    fn about(&mut self) -> Result<Transition> {
        self.prompter.message(
            "Breadbox / About",
            &format!("{} v{}\n\n{}", TITLE, VERSION, SUMMARY),
        )?;
        Ok(Transition::Pop)
    }
}

#[cfg(test)]
mod tests;
