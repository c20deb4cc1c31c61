use crate::error::BreadboxError;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, instrument};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Client for public services with normal certificate verification.
    pub fn new() -> Result<Self, BreadboxError> {
        Self::build(false)
    }

    /// Client for the Breadbox server, which runs on a self-signed certificate.
    /// Verification is turned off on purpose.
    pub fn accepting_invalid_certs() -> Result<Self, BreadboxError> {
        Self::build(true)
    }

    fn build(accept_invalid_certs: bool) -> Result<Self, BreadboxError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("itadakimasu/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;

        Ok(Self { client })
    }

    /// Sends a request without judging the status code.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, BreadboxError> {
        Ok(request.send().await?)
    }

    #[instrument(skip(self), fields(url = %url))]
    pub async fn get(&self, url: &str) -> Result<Response, BreadboxError> {
        debug!("Making GET request");
        let response = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        ensure_success(response)
    }

    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, BreadboxError> {
        let response = self.get(url).await?;
        let json = response.json::<T>().await?;
        Ok(json)
    }

    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_text(&self, url: &str) -> Result<String, BreadboxError> {
        let response = self.get(url).await?;
        Ok(response.text().await?)
    }

    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, BreadboxError> {
        let response = self.get(url).await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }
}

/// Turns a non-2xx response into `BreadboxError::Status`.
pub fn ensure_success(response: Response) -> Result<Response, BreadboxError> {
    let status = response.status();
    if !status.is_success() {
        error!("HTTP request failed with status: {}", status);
        return Err(BreadboxError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }

    Ok(response)
}

pub(crate) fn request_timeout() -> Duration {
    REQUEST_TIMEOUT
}
