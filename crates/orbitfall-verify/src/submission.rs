//! What the client submits and what the verifier persists.

use serde::{Deserialize, Serialize};

use orbitfall_sim::world::GameStats;

/// A finished session as submitted by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveGameRequest {
    pub player_name: String,
    /// Credential for a reserved name.
    #[serde(default)]
    pub player_name_auth: Option<String>,
    pub score: u64,
    pub level: u32,
    pub token_id: u64,
    /// The control log in wire form.
    pub log: String,
    pub version: String,
    /// Extra counters the client claims. Checked when present.
    #[serde(default)]
    pub stats: Option<ClaimedStats>,
}

/// Counters a client may claim alongside its score.
///
/// Accuracy is not claimed directly; the record derives it from the
/// replayed `shots_hit / shots_fired`, and `shots_hit` is checked here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedStats {
    pub duration_ms: u64,
    pub shots_fired: u32,
    pub shots_hit: u32,
    pub asteroids_destroyed: u32,
    pub ufos_destroyed: u32,
}

impl From<&GameStats> for ClaimedStats {
    fn from(stats: &GameStats) -> Self {
        Self {
            duration_ms: stats.duration_ms,
            shots_fired: stats.shots_fired,
            shots_hit: stats.shots_hit,
            asteroids_destroyed: stats.asteroids_destroyed,
            ufos_destroyed: stats.ufos_destroyed(),
        }
    }
}

/// A verified game, ready to persist. Every number comes from the replay,
/// never from the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub token_id: u64,
    pub player_name: String,
    pub score: u64,
    pub level_reached: u32,
    pub duration_ms: u64,
    pub shots_fired: u32,
    pub large_ufos_destroyed: u32,
    pub small_ufos_destroyed: u32,
    pub asteroids_destroyed: u32,
    pub accuracy: f64,
    pub game_log: String,
    pub game_version: String,
    /// Verification time, milliseconds since the Unix epoch.
    pub time_added: u64,
    pub deleted: bool,
}
