//! Maps API keys to Breadbox users.
//!
//! The user id is not assigned by the server: it is derived client-side from
//! the key, so it can be computed before any request is made.

use crate::error::BreadboxError;
use crate::http::{ensure_success, request_timeout, HttpClient};
use crate::models::User;
use reqwest::{Method, StatusCode};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

/// Only this many leading bytes of the key take part in the hash.
const KEY_PREFIX_LEN: usize = 8;
/// Ten hex digits of the digest, i.e. its first five bytes.
const ID_DIGEST_BYTES: usize = 5;

/// Derives the numeric user id from an API key: the SHA-256 of the key's
/// first eight bytes, truncated to ten hex digits and read as base 16.
pub fn derive_user_id(api_key: &str) -> u64 {
    let bytes = api_key.as_bytes();
    let prefix = &bytes[..bytes.len().min(KEY_PREFIX_LEN)];
    let digest = Sha256::digest(prefix);

    digest[..ID_DIGEST_BYTES]
        .iter()
        .fold(0u64, |id, byte| (id << 8) | u64::from(*byte))
}

/// Looks a user up by id. `Ok(None)` means the server answered 404; every
/// other failure is an error.
#[instrument(skip(http))]
pub async fn resolve(http: &HttpClient, base_url: &str, user_id: u64) -> Result<Option<User>, BreadboxError> {
    let url = format!("{}/user/{}", base_url.trim_end_matches('/'), user_id);
    let response = http
        .send(http.request(Method::GET, &url).timeout(request_timeout()))
        .await?;

    if response.status() == StatusCode::NOT_FOUND {
        debug!("No user with id {}", user_id);
        return Ok(None);
    }

    let user = ensure_success(response)?.json::<User>().await?;
    info!("Resolved user {} ({})", user.username, user.id);
    Ok(Some(user))
}

/// Whether the key belongs to a known user. The profile itself is discarded.
pub async fn check_key(http: &HttpClient, base_url: &str, api_key: &str) -> Result<bool, BreadboxError> {
    if api_key.is_empty() {
        return Ok(false);
    }
    Ok(resolve(http, base_url, derive_user_id(api_key)).await?.is_some())
}
