/// Simulation server raw wire types: serde shapes for deserializing its responses.
/// These map to our clean domain types via the mapping functions in client.rs.
///
/// The server builds most payloads from loosely typed maps, so anything that
/// has been seen to arrive as a number, a string or null is kept as a raw
/// `Value` here and interpreted during mapping.
use serde::Deserialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// At-bat log  (/api/simulations/{id}/at-bats)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AtBatRecord {
    pub id: Option<u64>,
    pub simulation_id: Option<u64>,
    /// "3초" / "3말" (or "3top" / "3bottom").
    pub inning_half: Option<String>,
    #[serde(rename = "batterPNo")]
    pub batter_pno: Option<Value>,
    #[serde(rename = "pitcherPNo")]
    pub pitcher_pno: Option<Value>,
    #[serde(rename = "batting_order")]
    pub batting_order: Option<Value>,
    #[serde(rename = "batter_name")]
    pub batter_name: Option<String>,
    #[serde(rename = "batter_avg")]
    pub batter_avg: Option<f64>,
    pub result: Option<String>,
    #[serde(rename = "result_korean")]
    pub result_korean: Option<String>,
    pub rbi: Option<Value>,
    pub prev_outs: Option<Value>,
    pub new_outs: Option<Value>,
    pub prev_base1: Option<Value>,
    pub prev_base2: Option<Value>,
    pub prev_base3: Option<Value>,
    pub new_base1: Option<Value>,
    pub new_base2: Option<Value>,
    pub new_base3: Option<Value>,
    pub prev_score_home: Option<Value>,
    pub prev_score_away: Option<Value>,
    pub new_score_home: Option<Value>,
    pub new_score_away: Option<Value>,
    /// JSON string on the current server, a plain object on older ones.
    pub probabilities: Option<Value>,
}

// ---------------------------------------------------------------------------
// Game state  (/api/simulations/{id}/game-state)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GameStateEnvelope {
    /// "success" once the engine has created a state row.
    pub status: Option<String>,
    pub game_state: Option<GameStateRecord>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GameStateRecord {
    pub inning: Option<u16>,
    pub half: Option<String>,
    pub outs: Option<u8>,
    pub base1: Option<Value>,
    pub base2: Option<Value>,
    pub base3: Option<Value>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub game_status: Option<String>,
    pub winner: Option<String>,
    #[serde(rename = "nextBatterPNo")]
    pub next_batter_pno: Option<Value>,
    pub next_batter_name: Option<String>,
    pub next_batter_avg: Option<f64>,
    #[serde(rename = "currentPitcherPNo")]
    pub current_pitcher_pno: Option<Value>,
    pub current_pitcher_name: Option<String>,
    #[serde(rename = "currentPitcherERA")]
    pub current_pitcher_era: Option<f64>,
}

// ---------------------------------------------------------------------------
// Match  (/api/simulations/{id})
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRecord {
    pub id: Option<u64>,
    pub hometeam: Option<u64>,
    pub awayteam: Option<u64>,
    /// JSON-encoded object: `{"batting1": pno, ..., "batting9": pno, "pitcher": pno}`.
    pub home_lineup: Option<String>,
    pub away_lineup: Option<String>,
    pub is_finished: Option<bool>,
    /// Server local time without offset, e.g. "2025-08-30T18:30:00".
    pub show_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Directory  (/api/players, /api/teams)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    #[serde(alias = "pNo")]
    pub pno: Option<u64>,
    pub player_name: Option<String>,
    pub img_url: Option<String>,
    pub back_no: Option<u32>,
    pub position: Option<String>,
    pub hand: Option<String>,
    pub batting_stats: Option<BattingStatsRecord>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct BattingStatsRecord {
    pub avg: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TeamRecord {
    pub id: Option<u64>,
    pub id_key: Option<String>,
    pub name: Option<String>,
    pub stadium: Option<String>,
}
