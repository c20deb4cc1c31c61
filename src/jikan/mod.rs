use crate::error::BreadboxError;
use crate::http::HttpClient;
use serde::Deserialize;
use tracing::{debug, instrument};

pub const JIKAN_API: &str = "https://api.jikan.moe/v4";

/// Client for the public Jikan (MyAnimeList) metadata API.
pub struct JikanClient {
    http: HttpClient,
    base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Episode {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct AnimeImages {
    images: ImageSet,
}

#[derive(Debug, Deserialize)]
struct ImageSet {
    jpg: ImageUrls,
}

#[derive(Debug, Deserialize)]
struct ImageUrls {
    image_url: String,
}

impl JikanClient {
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, JIKAN_API)
    }

    pub fn with_base_url(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// API URL of an anime, as stored in archive records.
    pub fn anime_url(&self, mal_id: u64) -> String {
        format!("{}/anime/{}", self.base_url, mal_id)
    }

    /// First page of episodes for the anime at `anime_url`.
    #[instrument(skip(self))]
    pub async fn episodes(&self, anime_url: &str) -> Result<Vec<Episode>, BreadboxError> {
        let url = format!("{}/episodes", anime_url.trim_end_matches('/'));
        let envelope: Envelope<Vec<Episode>> = self.http.get_json(&url).await?;
        debug!("Jikan lists {} episodes", envelope.data.len());
        Ok(envelope.data)
    }

    #[instrument(skip(self))]
    pub async fn cover_image_url(&self, mal_id: u64) -> Result<String, BreadboxError> {
        let envelope: Envelope<AnimeImages> = self.http.get_json(&self.anime_url(mal_id)).await?;
        Ok(envelope.data.images.jpg.image_url)
    }

    #[instrument(skip(self))]
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, BreadboxError> {
        self.http.get_bytes(url).await
    }
}
