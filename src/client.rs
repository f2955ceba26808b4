use std::time::Duration;

use reqwest::{Proxy, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::model::ServerInfo;

// we use separate error types for construction and request

#[derive(Error, Debug)]
pub enum ConstructionError {
    #[error("ProxyError: {0} from scheme: {1}.")]
    ProxyError(reqwest::Error, String),
    #[error("BuildError: {0}.")]
    BuildError(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Failed to retrive result from web API: {0}")]
    ConnectionError(#[from] reqwest::Error),
    #[error("Failed to decode web API response: {0}")]
    DecodeError(serde_json::Error, String),
    #[error("Too Many Requests")]
    TooManyRequests,
    #[error("Other Response: {0}")]
    OtherResponse(reqwest::StatusCode),
}

#[derive(Deserialize, Debug)]
pub struct AdminResponse {
    pub result: String,
}

/// Thin wrapper over the stats API. One GET per call, no retry; the next
/// poll tick is the retry.
pub struct Client {
    client: reqwest::Client,
    endpoint: String,
    password: String,
}

impl Client {
    pub fn new(
        endpoint: &str,
        password: &str,
        timeout: Duration,
        proxy: Option<&str>,
    ) -> Result<Self, ConstructionError> {
        let builder = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout);
        let builder = match proxy {
            Some(proxy) => {
                let proxy = Proxy::all(proxy)
                    .map_err(|err| ConstructionError::ProxyError(err, proxy.to_string()))?;
                builder.proxy(proxy)
            }
            None => builder,
        };
        let client = builder.build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            password: password.to_string(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        subpath: &str,
        query: &[(&str, String)],
    ) -> Result<T, RequestError> {
        let url = format!("{}/{}", self.endpoint, subpath);
        log::debug!("querying API: {url}");
        let resp = self.client.get(&url).query(query).send().await?;
        match resp.status() {
            StatusCode::OK => {
                let content = resp.text().await?;
                serde_json::from_str(&content).map_err(|err| RequestError::DecodeError(err, content))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(RequestError::TooManyRequests),
            other => Err(RequestError::OtherResponse(other)),
        }
    }

    /// Fetch the live server list. Any failure means "no snapshot this tick".
    pub async fn live_servers(&self) -> Result<Vec<ServerInfo>, RequestError> {
        self.get("servers/live", &[]).await
    }

    /// Relay an in-game message to one player, or to everyone when
    /// `profile_id` is `None`.
    pub async fn admin_message(
        &self,
        profile_id: Option<u32>,
        message: &str,
    ) -> Result<AdminResponse, RequestError> {
        let mut query = vec![
            ("password", self.password.clone()),
            ("message", message.to_string()),
        ];
        if let Some(id) = profile_id {
            query.push(("profileid", id.to_string()));
        }
        self.get("admin/message", &query).await
    }

    /// Kick an online player from their server.
    pub async fn admin_kick(&self, profile_id: u32) -> Result<AdminResponse, RequestError> {
        let query = vec![
            ("password", self.password.clone()),
            ("profileid", profile_id.to_string()),
        ];
        self.get("admin/kick", &query).await
    }
}
