//! REST and push-stream client for the dashboard backend.

use futures_util::StreamExt;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use sattrack_core::{Alert, FleetStats, FullSnapshot, StreamEvent, TrackedObject};

use crate::error::SdkError;

pub const STREAM_PATH: &str = "/ws/stream";

#[derive(Clone)]
pub struct DashboardClient {
    base_url: String,
    client: reqwest::Client,
}

/// Open push subscription.
pub struct EventStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl DashboardClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SdkError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| SdkError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            base_url,
            client: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SdkError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SdkError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Tracked objects ordered by id.
    pub async fn fleet(&self) -> Result<Vec<TrackedObject>, SdkError> {
        self.get_json("/api/fleet").await
    }

    /// Recent alerts, newest first.
    pub async fn alerts(&self) -> Result<Vec<Alert>, SdkError> {
        self.get_json("/api/alerts").await
    }

    pub async fn stats(&self) -> Result<FleetStats, SdkError> {
        self.get_json("/api/stats").await
    }

    /// Persisted alert log, newest first.
    pub async fn alert_history(&self, limit: u32) -> Result<Vec<Alert>, SdkError> {
        self.get_json(&format!("/api/alerts/history?limit={}", limit))
            .await
    }

    /// Full state through the pull endpoint.
    pub async fn snapshot(&self) -> Result<FullSnapshot, SdkError> {
        match self.get_json::<StreamEvent>("/api/snapshot").await? {
            StreamEvent::Snapshot(snapshot) => Ok(snapshot),
            StreamEvent::FleetUpdated(_) => Err(SdkError::UnexpectedEvent("fleet_updated")),
            StreamEvent::AlertsAppended(_) => Err(SdkError::UnexpectedEvent("alerts_appended")),
        }
    }

    /// Ask the server for an immediate refresh. `Ok(false)` means one was
    /// already running.
    pub async fn request_refresh(&self) -> Result<bool, SdkError> {
        let response = self
            .client
            .post(format!("{}/api/refresh", self.base_url))
            .send()
            .await?;
        match response.status().as_u16() {
            202 => Ok(true),
            409 => Ok(false),
            status => Err(SdkError::Status {
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    pub async fn connect_stream(&self) -> Result<EventStream, SdkError> {
        let url = build_ws_url(&self.base_url, STREAM_PATH)?;
        let (socket, _) = connect_async(url.as_str()).await?;
        Ok(EventStream { socket })
    }
}

impl EventStream {
    /// Next decoded event; `None` once the server closes the stream.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, SdkError> {
        while let Some(msg) = self.socket.next().await {
            match msg? {
                Message::Text(text) => return Ok(Some(serde_json::from_str(&text)?)),
                Message::Binary(data) => return Ok(Some(serde_json::from_slice(&data)?)),
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }
}

fn build_ws_url(base: &str, path: &str) -> Result<Url, SdkError> {
    let mut url = Url::parse(base).map_err(|e| SdkError::InvalidUrl(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => other,
    }
    .to_string();

    url.set_scheme(&scheme)
        .map_err(|_| SdkError::InvalidUrl(format!("unsupported scheme {}", scheme)))?;
    url.set_path(path);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_url_follows_http_scheme() {
        let url = build_ws_url("http://localhost:8000", STREAM_PATH).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/stream");

        let url = build_ws_url("https://dash.example.com", STREAM_PATH).unwrap();
        assert_eq!(url.as_str(), "wss://dash.example.com/ws/stream");
    }

    #[test]
    fn rejects_unparseable_base_url() {
        assert!(matches!(
            DashboardClient::new("not a url"),
            Err(SdkError::InvalidUrl(_))
        ));
        let client = DashboardClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
