//! HTTP client for the remote recording API

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::session::GameSession;

/// What kind of position is being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Automatically geofenced movement trail
    Travel,
    /// Explicit user bookmark
    Bookmark,
}

/// Payload for the `record-position` endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub token: String,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub game: String,
    pub round: u32,
    pub map: String,
    pub nick: String,
    pub lat: f64,
    pub lng: f64,
    pub heading: f64,
    pub pitch: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// End-of-game summary for the `record-game` endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub token: String,
    pub game: String,
    pub map: String,
    pub map_name: String,
    pub round_count: u32,
    pub moving: bool,
    pub zooming: bool,
    pub rotating: bool,
    pub time_limit: u32,
    pub score: f64,
    pub distance: f64,
    pub time: u32,
    pub user_id: String,
    pub user_nick: String,
    pub rounds: Vec<crate::session::RoundResult>,
    pub guesses: Vec<crate::session::Guess>,
}

impl GameSummary {
    pub fn from_session(token: &str, session: &GameSession) -> Self {
        Self {
            token: token.to_string(),
            game: session.token.clone(),
            map: session.map.clone(),
            map_name: session.map_name.clone(),
            round_count: session.round_count,
            moving: !session.forbid_moving,
            zooming: !session.forbid_zooming,
            rotating: !session.forbid_rotating,
            time_limit: session.time_limit,
            score: session
                .player
                .total_score
                .as_ref()
                .map(|s| s.points())
                .unwrap_or(0.0),
            distance: session.player.total_distance_in_meters.unwrap_or(0.0),
            time: session.player.total_time.unwrap_or(0),
            user_id: session.player.id.clone(),
            user_nick: session.player.nick.clone(),
            rounds: session.rounds.clone(),
            guesses: session.player.guesses.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    success: bool,
}

/// Client for the recording server. Construction requires the user token;
/// callers without one hold no client at all, which is what makes recording
/// a no-op when the credential is absent.
#[derive(Clone)]
pub struct RecorderClient {
    client: Client,
    base_url: String,
    token: String,
}

impl RecorderClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// The opaque user credential included in every payload
    pub fn token(&self) -> &str {
        &self.token
    }

    pub async fn record_position(&self, record: &PositionRecord) -> Result<(), RecorderError> {
        self.post("record-position", record).await
    }

    pub async fn record_game(&self, summary: &GameSummary) -> Result<(), RecorderError> {
        self.post("record-game", summary).await
    }

    async fn post<T: Serialize>(&self, endpoint: &str, data: &T) -> Result<(), RecorderError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(data)
            .send()
            .await
            .map_err(RecorderError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RecorderError::Api { status: status.as_u16(), body });
        }

        let api: ApiResponse = response.json().await.map_err(RecorderError::Parse)?;
        if !api.success {
            return Err(RecorderError::Rejected);
        }

        Ok(())
    }
}

/// Recording API errors. All of these are logged and discarded by callers;
/// recording is best-effort and never retried.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("Server rejected the record")]
    Rejected,
}
