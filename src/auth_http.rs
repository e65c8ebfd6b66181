use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Raw upstream response, before any decoding
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Performs an authenticated GET against the upstream API
#[async_trait]
pub trait AuthHttpDoer: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse, anyhow::Error>;
}

/// Bearer-token HTTP client. No retries; the timeout covers the whole request.
pub struct AuthHttpClient {
    auth_token: String,
    client: reqwest::Client,
}

impl AuthHttpClient {
    pub fn new(auth_token: impl Into<String>, timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            auth_token: auth_token.into(),
            client,
        })
    }
}

#[async_trait]
impl AuthHttpDoer for AuthHttpClient {
    async fn get(&self, url: &str) -> Result<RawResponse, anyhow::Error> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
