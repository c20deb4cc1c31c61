use crate::error::BreadboxError;
use crate::http::{ensure_success, request_timeout, HttpClient};
use crate::identity;
use crate::models::{
    deserialize_ids, AnimeRecord, ApiResponse, ArchiveKind, ArchiveRecord, MediaDescriptor,
    MediaId, SignedUrl, User,
};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Server address plus the key every archive call is signed with.
#[derive(Clone)]
pub struct Session {
    base_url: String,
    api_key: String,
}

impl Session {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, BreadboxError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        let api_key = api_key.into();

        if base_url.is_empty() {
            return Err(BreadboxError::Session("server address is empty".to_string()));
        }
        if api_key.is_empty() {
            return Err(BreadboxError::Session("API key is empty".to_string()));
        }
        Url::parse(&base_url)
            .map_err(|e| BreadboxError::Session(format!("invalid server address {}: {}", base_url, e)))?;

        Ok(Self { base_url, api_key })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Breadbox API client.
pub struct BreadboxClient {
    http: HttpClient,
    session: Session,
    user_id: u64,
    /// Applied to every call except media downloads.
    timeout: Duration,
}

impl BreadboxClient {
    pub fn new(http: HttpClient, session: Session) -> Self {
        let user_id = identity::derive_user_id(session.api_key());
        Self {
            http,
            session,
            user_id,
            timeout: request_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn anime(&self) -> Archive<'_, AnimeRecord> {
        Archive::new(self, ArchiveKind::Anime)
    }

    pub fn games(&self) -> Archive<'_, ArchiveRecord> {
        Archive::new(self, ArchiveKind::Games)
    }

    pub fn linux(&self) -> Archive<'_, ArchiveRecord> {
        Archive::new(self, ArchiveKind::Linux)
    }

    /// Generic view of any archive, for callers that only need titles.
    pub fn archive(&self, kind: ArchiveKind) -> Archive<'_, ArchiveRecord> {
        Archive::new(self, kind)
    }

    pub async fn user_info(&self) -> Result<Option<User>, BreadboxError> {
        identity::resolve(&self.http, self.session.base_url(), self.user_id).await
    }

    fn url(&self, relative: &str) -> String {
        format!("{}{}", self.session.base_url(), relative)
    }

    fn signed(&self, method: Method, relative: &str) -> RequestBuilder {
        self.http
            .request(method, &self.url(relative))
            .header(API_KEY_HEADER, self.session.api_key())
    }

    async fn fetch(&self, relative: &str, sign_url: bool) -> Result<Response, BreadboxError> {
        let relative = if sign_url {
            format!("{}?signUrl", relative)
        } else {
            relative.to_string()
        };
        debug!("Fetching {}", relative);
        self.http
            .send(self.signed(Method::GET, &relative).timeout(self.timeout))
            .await
    }

    /// GET with no total timeout, for bodies that take as long as they take.
    async fn fetch_stream(&self, relative: &str) -> Result<Response, BreadboxError> {
        debug!("Streaming {}", relative);
        self.http.send(self.signed(Method::GET, relative)).await
    }

    async fn fetch_json<T: DeserializeOwned>(&self, relative: &str) -> Result<T, BreadboxError> {
        let response = self
            .http
            .send(self.signed(Method::GET, relative).timeout(self.timeout))
            .await?;
        let response = ensure_success(response)?;
        Ok(response.json::<T>().await?)
    }

    /// Reads the `{details, code}` body of a write. Breadbox reports failures
    /// in the same shape, so the body wins over the status when it parses.
    async fn write_response(response: Response) -> Result<ApiResponse, BreadboxError> {
        let status = response.status();
        let url = response.url().to_string();
        let body = response.bytes().await?;

        match serde_json::from_slice::<ApiResponse>(&body) {
            Ok(parsed) => {
                if !status.is_success() {
                    warn!("Breadbox rejected write to {} ({}): {}", url, status, parsed.details);
                }
                Ok(parsed)
            }
            Err(_) if !status.is_success() => Err(BreadboxError::Status {
                status: status.as_u16(),
                url,
            }),
            Err(e) => Err(BreadboxError::Parse(format!("unexpected response from {}: {}", url, e))),
        }
    }
}

/// One archive kind on the server, typed by the record shape it serves.
pub struct Archive<'a, R> {
    client: &'a BreadboxClient,
    kind: ArchiveKind,
    prefix: String,
    _record: PhantomData<R>,
}

#[derive(Deserialize)]
struct IdList(#[serde(deserialize_with = "deserialize_ids")] Vec<String>);

impl<'a, R> Archive<'a, R>
where
    R: DeserializeOwned + Serialize,
{
    fn new(client: &'a BreadboxClient, kind: ArchiveKind) -> Self {
        Self {
            client,
            kind,
            prefix: format!("/archive/{}", kind.as_str()),
            _record: PhantomData,
        }
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    fn path(&self, relative: &str) -> String {
        format!("{}{}", self.prefix, relative)
    }

    fn item_path(&self, id: &str, rest: &str) -> String {
        self.path(&format!("/{}{}", urlencoding::encode(id), rest))
    }

    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn list_ids(&self) -> Result<Vec<String>, BreadboxError> {
        let IdList(ids) = self.client.fetch_json(&self.path("/")).await?;
        Ok(ids)
    }

    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn info(&self, id: &str) -> Result<R, BreadboxError> {
        let response = self.client.fetch(&self.item_path(id, ""), false).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(BreadboxError::NotFound {
                resource: format!("{} {}", self.kind, id),
            });
        }
        let response = ensure_success(response)?;
        Ok(response.json::<R>().await?)
    }

    /// Every record in the archive, in the order the server lists them.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn all_info(&self) -> Result<Vec<(String, R)>, BreadboxError> {
        let all: serde_json::Map<String, serde_json::Value> =
            self.client.fetch_json(&self.path("/all")).await?;

        let records = all
            .into_iter()
            .map(|(id, value)| {
                serde_json::from_value::<R>(value)
                    .map(|record| (id.clone(), record))
                    .map_err(|e| BreadboxError::Parse(format!("{} record {}: {}", self.kind, id, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Fetched {} {} records", records.len(), self.kind);
        Ok(records)
    }

    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn size(&self) -> Result<u64, BreadboxError> {
        self.client.fetch_json(&self.path("/size")).await
    }

    /// Replaces (or creates) the whole record stored under `id`.
    #[instrument(skip(self, document), fields(kind = %self.kind))]
    pub async fn patch(&self, id: &str, document: &R) -> Result<ApiResponse, BreadboxError> {
        info!("Patching {} record {}", self.kind, id);
        let request = self
            .client
            .signed(Method::PATCH, &self.item_path(id, ""))
            .timeout(self.client.timeout)
            .json(document);
        let response = self.client.http.send(request).await?;
        BreadboxClient::write_response(response).await
    }

    #[instrument(skip(self, content), fields(kind = %self.kind, bytes = content.len()))]
    pub async fn upload(
        &self,
        relative: &str,
        content: Vec<u8>,
        filename: &str,
        mimetype: &str,
    ) -> Result<ApiResponse, BreadboxError> {
        info!("Uploading {} to {}", filename, relative);
        let part = Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str(mimetype)?;
        let form = Form::new().part("file", part);

        let request = self
            .client
            .signed(Method::PUT, &self.path(relative))
            .timeout(self.client.timeout)
            .multipart(form);
        let response = self.client.http.send(request).await?;
        BreadboxClient::write_response(response).await
    }

    pub async fn upload_thumbnail(&self, id: &str, jpeg: Vec<u8>) -> Result<ApiResponse, BreadboxError> {
        let relative = format!("/{}/thumbnail", urlencoding::encode(id));
        self.upload(&relative, jpeg, "thumbnail.jpg", "image/jpeg").await
    }
}

impl Archive<'_, AnimeRecord> {
    #[instrument(skip(self))]
    pub async fn list_media(&self, id: &str) -> Result<MediaDescriptor, BreadboxError> {
        let relative = self.item_path(id, "/media");
        let response = self.client.fetch(&relative, false).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(BreadboxError::NotFound {
                resource: format!("media for anime {}", id),
            });
        }
        let response = ensure_success(response)?;
        Ok(response.json().await?)
    }

    fn media_path(&self, id: &str, media: &MediaId) -> String {
        let media = media.to_string();
        self.item_path(id, &format!("/media/{}", urlencoding::encode(&media)))
    }

    /// Absolute, time-limited URL an external player can open without the key.
    #[instrument(skip(self))]
    pub async fn media_url(&self, id: &str, media: &MediaId) -> Result<String, BreadboxError> {
        let response = self.client.fetch(&self.media_path(id, media), true).await?;
        let signed: SignedUrl = ensure_success(response)?.json().await?;
        Ok(self.client.url(&signed.url))
    }

    #[instrument(skip(self))]
    pub async fn download_media(&self, id: &str, media: &MediaId) -> Result<MediaStream, BreadboxError> {
        let response = self.client.fetch_stream(&self.media_path(id, media)).await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Media download refused with status {}", status);
            return Err(BreadboxError::Stream {
                status: status.as_u16(),
            });
        }

        Ok(MediaStream { response })
    }
}

/// Body of a media download, consumed chunk by chunk.
pub struct MediaStream {
    response: Response,
}

impl MediaStream {
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, BreadboxError> {
        Ok(self.response.chunk().await?)
    }

    /// Streams the body into `path`. A failed transfer removes the partial file.
    pub async fn save_to(mut self, path: &Path) -> Result<u64, BreadboxError> {
        let mut file = tokio::fs::File::create(path).await?;

        let result = async {
            let mut written = 0u64;
            while let Some(chunk) = self.next_chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, BreadboxError>(written)
        }
        .await;

        match result {
            Ok(written) => {
                info!("Saved {} bytes to {}", written, path.display());
                Ok(written)
            }
            Err(e) => {
                drop(file);
                if let Err(remove_error) = tokio::fs::remove_file(path).await {
                    warn!("Could not remove partial file {}: {}", path.display(), remove_error);
                }
                Err(e)
            }
        }
    }
}
