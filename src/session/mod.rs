//! Game session model and lifecycle-event deduplication
//!
//! Payload shapes mirror the game's session-management API responses
//! (camelCase JSON). Fields we do not need are simply not declared;
//! unknown fields are ignored on deserialization.

pub mod reconciler;

pub use reconciler::SessionReconciler;

use serde::{Deserialize, Serialize};

/// A full game session snapshot as returned by the session endpoint.
/// Replaced wholesale whenever a fresher payload is observed; never merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub token: String,
    #[serde(default = "default_round")]
    pub round: u32,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub map: String,
    #[serde(default)]
    pub map_name: String,
    #[serde(default)]
    pub round_count: u32,
    #[serde(default)]
    pub time_limit: u32,
    #[serde(default)]
    pub forbid_moving: bool,
    #[serde(default)]
    pub forbid_zooming: bool,
    #[serde(default)]
    pub forbid_rotating: bool,
    #[serde(default)]
    pub player: Player,
    #[serde(default)]
    pub rounds: Vec<RoundResult>,
}

fn default_round() -> u32 {
    1
}

impl GameSession {
    pub fn is_finished(&self) -> bool {
        self.state == "finished"
    }

    /// Key suppressing duplicate lifecycle emission for the same logical round
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.token, self.round)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub guesses: Vec<Guess>,
    #[serde(default)]
    pub total_score: Option<Score>,
    #[serde(default)]
    pub total_distance_in_meters: Option<f64>,
    #[serde(default)]
    pub total_time: Option<u32>,
}

/// Score amounts arrive as strings on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Score {
    #[serde(default)]
    pub amount: String,
}

impl Score {
    pub fn points(&self) -> f64 {
        self.amount.parse().unwrap_or(0.0)
    }
}

/// The true location of one round
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub pano_id: Option<String>,
    #[serde(default)]
    pub heading: f64,
    #[serde(default)]
    pub pitch: f64,
}

/// One submitted guess
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guess {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub round_score_in_points: f64,
    #[serde(default)]
    pub distance_in_meters: f64,
    #[serde(default)]
    pub time: u32,
}

/// Composite key (session token + round number) for duplicate suppression.
/// Round-start and round-end each track their own last-emitted key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn new(token: &str, round: u32) -> Self {
        Self(format!("{}-{}", token, round))
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Page paths on which gameplay happens. Leaving these drops the session.
/// Multiplayer variants are listed so navigation between modes is detected,
/// even though their signals are otherwise unsupported.
pub fn is_game_route(path: &str) -> bool {
    const GAME_PREFIXES: &[&str] = &[
        "/challenge/",
        "/results/",
        "/game/",
        "/battle-royale/",
        "/duels/",
        "/team-duels/",
        "/bullseye/",
        "/live-challenge/",
    ];
    GAME_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_combines_token_and_round() {
        assert_eq!(DedupKey::new("abc", 1), DedupKey::new("abc", 1));
        assert_ne!(DedupKey::new("abc", 1), DedupKey::new("abc", 2));
        assert_ne!(DedupKey::new("abc", 1), DedupKey::new("xyz", 1));
    }

    #[test]
    fn game_routes_are_recognized() {
        assert!(is_game_route("/game/AbCdEf123"));
        assert!(is_game_route("/challenge/xyz"));
        assert!(is_game_route("/duels/42"));
        assert!(!is_game_route("/"));
        assert!(!is_game_route("/maps/world"));
    }

    #[test]
    fn session_parses_from_wire_shape() {
        let body = serde_json::json!({
            "token": "abc123",
            "round": 2,
            "state": "started",
            "map": "59a1514f17631e74145b6f47",
            "mapName": "A Community World",
            "roundCount": 5,
            "timeLimit": 120,
            "forbidMoving": true,
            "player": {
                "id": "user-1",
                "nick": "theyak",
                "guesses": [
                    {"lat": 12.0, "lng": 34.0, "roundScoreInPoints": 4500.0,
                     "distanceInMeters": 152.0, "time": 31}
                ],
                "totalScore": {"amount": "4500"}
            },
            "rounds": [
                {"lat": 12.001, "lng": 34.002, "panoId": "cafe", "heading": 90.0, "pitch": 0.0}
            ],
            "unknownField": {"ignored": true}
        });

        let session: GameSession = serde_json::from_value(body).unwrap();
        assert_eq!(session.token, "abc123");
        assert_eq!(session.round, 2);
        assert!(!session.is_finished());
        assert_eq!(session.player.nick, "theyak");
        assert_eq!(session.player.guesses.len(), 1);
        assert_eq!(session.player.total_score.as_ref().unwrap().points(), 4500.0);
        assert_eq!(session.rounds[0].pano_id.as_deref(), Some("cafe"));
    }

    #[test]
    fn round_defaults_to_one() {
        let session: GameSession =
            serde_json::from_value(serde_json::json!({"token": "t"})).unwrap();
        assert_eq!(session.round, 1);
    }
}
