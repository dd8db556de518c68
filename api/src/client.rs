use crate::wire::{
    AtBatRecord, GameStateEnvelope, GameStateRecord, PlayerRecord, SimulationRecord, TeamRecord,
};
use crate::{
    AtBatEvent, Bases, Directory, GameState, GameStateReply, GameStatus, Half, Handedness,
    Lineup, MatchId, MatchInfo, Outcome, Player, PlayerId, PlayerRef, RunnerChange, Score,
    ScoreChange, Team, Winner,
};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use log::{debug, warn};
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub type ApiResult<T> = Result<T, ApiError>;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

/// Client for the simulation server's REST endpoints.
#[derive(Debug, Clone)]
pub struct SimulationApi {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl Default for SimulationApi {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[derive(Debug)]
pub enum ApiError {
    Network(reqwest::Error, String),
    Api(reqwest::Error, String),
    Parsing(reqwest::Error, String),
    NotFound(String),
    Other(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            ApiError::Api(e, url) => write!(f, "API error for {url}: {e}"),
            ApiError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
            ApiError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ApiError::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl SimulationApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .user_agent("diamondcast/0.1 (terminal live broadcast)")
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch every at-bat recorded for the match, oldest first.
    pub async fn fetch_at_bats(&self, match_id: MatchId) -> ApiResult<Vec<AtBatEvent>> {
        let url = format!("{}/api/simulations/{match_id}/at-bats", self.base_url);
        let mut raw: Vec<AtBatRecord> = self.get(&url).await?;
        raw.sort_by_key(|r| r.id.unwrap_or(u64::MAX));
        Ok(raw
            .iter()
            .filter_map(|record| map_at_bat(match_id, record))
            .collect())
    }

    /// Fetch the aggregate game state, or `NotStarted` if the engine has not
    /// created one yet.
    pub async fn fetch_game_state(&self, match_id: MatchId) -> ApiResult<GameStateReply> {
        let url = format!("{}/api/simulations/{match_id}/game-state", self.base_url);
        let raw: GameStateEnvelope = self.get(&url).await?;
        Ok(map_game_state_reply(match_id, raw))
    }

    /// Fetch teams, lineups and the scheduled start of a match.
    pub async fn fetch_match(&self, match_id: MatchId) -> ApiResult<MatchInfo> {
        let url = format!("{}/api/simulations/{match_id}", self.base_url);
        let raw: SimulationRecord = self.get(&url).await?;
        if raw.id.is_none() && raw.hometeam.is_none() {
            return Err(ApiError::NotFound(format!("match {match_id}")));
        }
        Ok(map_simulation(match_id, raw))
    }

    /// Fetch the roster and team lookups.
    pub async fn fetch_directory(&self) -> ApiResult<Directory> {
        let players: Vec<PlayerRecord> =
            self.get(&format!("{}/api/players", self.base_url)).await?;
        let teams: Vec<TeamRecord> = self.get(&format!("{}/api/teams", self.base_url)).await?;
        debug!("directory loaded: {} players, {} teams", players.len(), teams.len());
        Ok(Directory::new(
            players.iter().filter_map(map_player).collect(),
            teams.iter().filter_map(map_team).collect(),
        ))
    }

    async fn get<T: Default + serde::de::DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url.to_owned()))?;

        match response.error_for_status() {
            Ok(res) => res
                .json::<T>()
                .await
                .map_err(|e| ApiError::Parsing(e, url.to_owned())),
            Err(e) => {
                if e.status().map(|s| s.is_client_error()).unwrap_or(false) {
                    Ok(T::default())
                } else {
                    Err(ApiError::Api(e, url.to_owned()))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Lenient scalar parsing
// ---------------------------------------------------------------------------

/// Field present but unusable.
#[derive(Debug, Clone, PartialEq)]
struct Malformed(String);

/// Accepts a number, a numeric string, an empty string or null.
fn parse_id(value: Option<&Value>) -> Result<Option<u64>, Malformed> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(id) => Ok(Some(id)),
            None => match n.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 => Ok(Some(f as u64)),
                _ => Err(Malformed(n.to_string())),
            },
        },
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| Malformed(s.clone())),
        Some(other) => Err(Malformed(other.to_string())),
    }
}

fn parse_count(value: Option<&Value>) -> Result<Option<u32>, Malformed> {
    parse_id(value).and_then(|v| match v {
        Some(n) => u32::try_from(n).map(Some).map_err(|_| Malformed(n.to_string())),
        None => Ok(None),
    })
}

/// "3초" → (3, Top), "10bottom" → (10, Bottom).
pub(crate) fn parse_inning_half(raw: &str) -> Option<(u16, Half)> {
    let raw = raw.trim();
    let digits_end = raw
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(raw.len());
    let inning = raw[..digits_end].parse::<u16>().ok().filter(|n| *n >= 1)?;
    let half = Half::parse(&raw[digits_end..])?;
    Some((inning, half))
}

fn parse_probabilities(value: Option<&Value>) -> Vec<(String, f64)> {
    let object = match value {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            match serde_json::from_str::<serde_json::Map<String, Value>>(s) {
                Ok(map) => map,
                Err(e) => {
                    warn!("unparseable probabilities: {e}");
                    return Vec::new();
                }
            }
        }
        Some(Value::Object(map)) => map.clone(),
        _ => return Vec::new(),
    };
    object
        .into_iter()
        .filter_map(|(k, v)| v.as_f64().map(|p| (k, p)))
        .collect()
}

fn parse_show_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_handedness(hand: Option<&str>, position: Option<&str>) -> Handedness {
    let bats_left = |s: &str| {
        let s = s.trim();
        s.contains("좌타") || s.eq_ignore_ascii_case("l") || s.eq_ignore_ascii_case("left")
    };
    if hand.is_some_and(bats_left) || position.is_some_and(bats_left) {
        Handedness::Left
    } else {
        Handedness::Right
    }
}

// ---------------------------------------------------------------------------
// Mapping: wire types → clean domain types
// ---------------------------------------------------------------------------

/// Map one at-bat record. Returns `None` only when the inning cannot be
/// placed at all; unusable runner or score fields just blank those parts.
fn map_at_bat(match_id: MatchId, raw: &AtBatRecord) -> Option<AtBatEvent> {
    let event_id = raw.id.unwrap_or_default();
    let Some((inning, half)) = raw.inning_half.as_deref().and_then(parse_inning_half) else {
        warn!("at-bat {event_id}: unusable inningHalf {:?}, skipped", raw.inning_half);
        return None;
    };

    let runners = map_runners(raw).map_err(|Malformed(v)| {
        warn!("at-bat {event_id}: malformed base field {v}, runners unavailable");
    });
    let score = map_score(raw).map_err(|Malformed(v)| {
        warn!("at-bat {event_id}: malformed score field {v}, score unavailable");
    });
    let rbi = parse_count(raw.rbi.as_ref()).unwrap_or_else(|Malformed(v)| {
        warn!("at-bat {event_id}: malformed rbi {v}");
        None
    });
    let outs_before = parse_count(raw.prev_outs.as_ref()).ok().flatten().unwrap_or(0);
    let outs_after = parse_count(raw.new_outs.as_ref()).ok().flatten();

    let code = raw.result.as_deref().unwrap_or_default();
    Some(AtBatEvent {
        id: event_id,
        match_id: raw.simulation_id.unwrap_or(match_id),
        inning,
        half,
        batter: parse_id(raw.batter_pno.as_ref()).ok().flatten().unwrap_or_default(),
        batter_name: raw.batter_name.clone(),
        batter_avg: raw.batter_avg,
        pitcher: parse_id(raw.pitcher_pno.as_ref()).ok().flatten(),
        batting_order: parse_count(raw.batting_order.as_ref())
            .ok()
            .flatten()
            .and_then(|n| u8::try_from(n).ok()),
        outcome: Outcome::parse(code),
        label: raw
            .result_korean
            .clone()
            .unwrap_or_else(|| code.to_string()),
        rbi: rbi.unwrap_or(0),
        outs_before: outs_before.min(2) as u8,
        outs_after: outs_after.map(|n| n.min(3) as u8),
        runners: runners.ok(),
        score: score.ok().flatten(),
        probabilities: parse_probabilities(raw.probabilities.as_ref()),
    })
}

fn map_runners(raw: &AtBatRecord) -> Result<RunnerChange, Malformed> {
    let before = Bases::new(
        parse_id(raw.prev_base1.as_ref())?,
        parse_id(raw.prev_base2.as_ref())?,
        parse_id(raw.prev_base3.as_ref())?,
    );
    let after = Bases::new(
        parse_id(raw.new_base1.as_ref())?,
        parse_id(raw.new_base2.as_ref())?,
        parse_id(raw.new_base3.as_ref())?,
    );
    Ok(RunnerChange { before, after })
}

/// `Ok(None)` when the server sent no score fields at all.
fn map_score(raw: &AtBatRecord) -> Result<Option<ScoreChange>, Malformed> {
    let fields = [
        parse_count(raw.prev_score_home.as_ref())?,
        parse_count(raw.prev_score_away.as_ref())?,
        parse_count(raw.new_score_home.as_ref())?,
        parse_count(raw.new_score_away.as_ref())?,
    ];
    match fields {
        [Some(ph), Some(pa), Some(nh), Some(na)] => Ok(Some(ScoreChange {
            before: Score { home: ph, away: pa },
            after: Score { home: nh, away: na },
        })),
        [None, None, None, None] => Ok(None),
        _ => Err(Malformed("partial score".into())),
    }
}

fn map_game_state_reply(match_id: MatchId, raw: GameStateEnvelope) -> GameStateReply {
    match (raw.status.as_deref(), raw.game_state) {
        (Some("success"), Some(state)) => GameStateReply::Snapshot(map_game_state(match_id, state)),
        _ => {
            debug!("match {match_id} not started: {:?}", raw.message);
            GameStateReply::NotStarted
        }
    }
}

fn map_game_state(match_id: MatchId, raw: GameStateRecord) -> GameState {
    let status = raw
        .game_status
        .as_deref()
        .map(GameStatus::parse)
        .unwrap_or_default();
    let base = |v: &Option<Value>| parse_id(v.as_ref()).ok().flatten();
    let player_ref = |id: &Option<Value>, name: &Option<String>, average: Option<f64>| {
        base(id).map(|id| PlayerRef {
            id,
            name: name.clone(),
            average,
        })
    };

    GameState {
        match_id,
        inning: raw.inning.unwrap_or(1).max(1),
        half: raw.half.as_deref().and_then(Half::parse).unwrap_or_default(),
        outs: raw.outs.unwrap_or(0).min(3),
        score: Score {
            home: raw.home_score.unwrap_or(0),
            away: raw.away_score.unwrap_or(0),
        },
        bases: Bases::new(base(&raw.base1), base(&raw.base2), base(&raw.base3)),
        at_bat: player_ref(&raw.next_batter_pno, &raw.next_batter_name, raw.next_batter_avg),
        pitcher: player_ref(
            &raw.current_pitcher_pno,
            &raw.current_pitcher_name,
            raw.current_pitcher_era,
        ),
        winner: match status {
            GameStatus::Finished => raw.winner.as_deref().and_then(Winner::parse),
            _ => None,
        },
        status,
    }
}

fn map_simulation(match_id: MatchId, raw: SimulationRecord) -> MatchInfo {
    MatchInfo {
        id: raw.id.unwrap_or(match_id),
        home_team: raw.hometeam.unwrap_or_default(),
        away_team: raw.awayteam.unwrap_or_default(),
        starts_at: raw.show_at.as_deref().and_then(parse_show_at),
        home_lineup: raw.home_lineup.as_deref().and_then(parse_lineup),
        away_lineup: raw.away_lineup.as_deref().and_then(parse_lineup),
        finished: raw.is_finished.unwrap_or(false),
    }
}

/// `{"batting1": 1001, ..., "batting9": 1009, "pitcher": 2001}`.
/// A lineup with any empty batting slot is rejected.
pub(crate) fn parse_lineup(raw: &str) -> Option<Lineup> {
    let map: serde_json::Map<String, Value> = match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(e) => {
            warn!("unparseable lineup: {e}");
            return None;
        }
    };
    let slot = |key: &str| -> Option<PlayerId> { parse_id(map.get(key)).ok().flatten() };

    let mut batting = [0; 9];
    for (i, entry) in batting.iter_mut().enumerate() {
        let key = format!("batting{}", i + 1);
        let Some(id) = slot(&key) else {
            warn!("lineup missing {key}");
            return None;
        };
        *entry = id;
    }
    Some(Lineup {
        pitcher: slot("pitcher"),
        batting,
    })
}

fn map_player(raw: &PlayerRecord) -> Option<Player> {
    let id = raw.pno?;
    Some(Player {
        id,
        name: raw.player_name.clone().unwrap_or_else(|| format!("#{id}")),
        position: raw.position.clone().unwrap_or_default(),
        image_url: raw.img_url.clone(),
        back_no: raw.back_no,
        bats: parse_handedness(raw.hand.as_deref(), raw.position.as_deref()),
        batting_avg: raw.batting_stats.as_ref().and_then(|s| s.avg),
    })
}

fn map_team(raw: &TeamRecord) -> Option<Team> {
    let id = raw.id?;
    Some(Team {
        id,
        key: raw.id_key.clone().unwrap_or_default(),
        name: raw.name.clone().unwrap_or_else(|| format!("Team {id}")),
        stadium: raw.stadium.clone(),
    })
}
