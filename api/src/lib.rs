pub mod client;
pub mod wire;

use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub type MatchId = u64;
pub type PlayerId = u64;
pub type TeamId = u64;

// ---------------------------------------------------------------------------
// Domain types, independent of the simulation server's wire format
// ---------------------------------------------------------------------------

/// Which team is batting. Top = visiting team, bottom = home team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Half {
    #[default]
    Top,
    Bottom,
}

impl Half {
    pub fn batting_side(self) -> Side {
        match self {
            Half::Top => Side::Away,
            Half::Bottom => Side::Home,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Half::Top => "Top",
            Half::Bottom => "Bot",
        }
    }

    /// Accepts the server's `초`/`말` suffixes as well as `top`/`bottom`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "초" | "top" | "t" => Some(Half::Top),
            "말" | "bottom" | "bot" | "b" => Some(Half::Bottom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "home" | "h" => Some(Side::Home),
            "away" | "a" | "visitor" => Some(Side::Away),
            _ => None,
        }
    }
}

/// Plate appearance result as produced by the game engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Outcome {
    Single,
    InfieldSingle,
    Double,
    Triple,
    HomeRun,
    Walk,
    HitByPitch,
    ErrorReach,
    FieldersChoice,
    Strikeout,
    FlyOut,
    LineOut,
    GroundOut,
    DoublePlay,
    SacrificeFly,
    Other(String),
}

impl Outcome {
    pub fn parse(code: &str) -> Self {
        match code.trim() {
            "single" => Outcome::Single,
            "infield_single" => Outcome::InfieldSingle,
            "double" => Outcome::Double,
            "triple" => Outcome::Triple,
            "home_run" => Outcome::HomeRun,
            "walk" => Outcome::Walk,
            "hit_by_pitch" => Outcome::HitByPitch,
            "error" | "error_reach" => Outcome::ErrorReach,
            "fielders_choice" => Outcome::FieldersChoice,
            "strikeout" => Outcome::Strikeout,
            "fly_out" => Outcome::FlyOut,
            "line_out" => Outcome::LineOut,
            "ground_out" => Outcome::GroundOut,
            "double_play" | "double_play_out" => Outcome::DoublePlay,
            "sacrifice_fly" | "sacrifice_fly_out" => Outcome::SacrificeFly,
            other => Outcome::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Outcome::Single => "single",
            Outcome::InfieldSingle => "infield_single",
            Outcome::Double => "double",
            Outcome::Triple => "triple",
            Outcome::HomeRun => "home_run",
            Outcome::Walk => "walk",
            Outcome::HitByPitch => "hit_by_pitch",
            Outcome::ErrorReach => "error",
            Outcome::FieldersChoice => "fielders_choice",
            Outcome::Strikeout => "strikeout",
            Outcome::FlyOut => "fly_out",
            Outcome::LineOut => "line_out",
            Outcome::GroundOut => "ground_out",
            Outcome::DoublePlay => "double_play",
            Outcome::SacrificeFly => "sacrifice_fly",
            Outcome::Other(code) => code.as_str(),
        }
    }

    /// Counted in the H column. Infield singles put the batter on first
    /// but are not scored as hits.
    pub fn is_hit(&self) -> bool {
        matches!(
            self,
            Outcome::Single | Outcome::Double | Outcome::Triple | Outcome::HomeRun
        )
    }

    /// Outcomes that retire the batter.
    pub fn is_out(&self) -> bool {
        matches!(
            self,
            Outcome::Strikeout
                | Outcome::FlyOut
                | Outcome::LineOut
                | Outcome::GroundOut
                | Outcome::DoublePlay
                | Outcome::SacrificeFly
        )
    }

    /// Ball on the ground with runners forced to run.
    pub fn forces_runners(&self) -> bool {
        matches!(
            self,
            Outcome::GroundOut | Outcome::DoublePlay | Outcome::FieldersChoice
        )
    }
}

/// Occupants of first, second and third base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bases(pub [Option<PlayerId>; 3]);

impl Bases {
    pub fn new(first: Option<PlayerId>, second: Option<PlayerId>, third: Option<PlayerId>) -> Self {
        Self([first, second, third])
    }

    /// `base` is 1-based; anything outside 1..=3 is empty.
    pub fn get(&self, base: u8) -> Option<PlayerId> {
        match base {
            1..=3 => self.0[usize::from(base - 1)],
            _ => None,
        }
    }

    /// 1-based base the player stands on.
    pub fn position_of(&self, player: PlayerId) -> Option<u8> {
        self.0
            .iter()
            .position(|p| *p == Some(player))
            .map(|i| i as u8 + 1)
    }

    /// (base, player) pairs, first base first.
    pub fn occupants(&self) -> impl Iterator<Item = (u8, PlayerId)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|id| (i as u8 + 1, id)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    pub fn for_side(&self, side: Side) -> u32 {
        match side {
            Side::Home => self.home,
            Side::Away => self.away,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerChange {
    pub before: Bases,
    pub after: Bases,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreChange {
    pub before: Score,
    pub after: Score,
}

impl ScoreChange {
    /// Runs added for `side`; a shrinking score is treated as zero.
    pub fn runs_for(&self, side: Side) -> u32 {
        self.after
            .for_side(side)
            .saturating_sub(self.before.for_side(side))
    }
}

/// One completed plate appearance. Immutable once produced by the engine.
///
/// `runners` and `score` are `None` when the server sent fields that could
/// not be parsed; the event still counts for the scoreboard through `rbi`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtBatEvent {
    pub id: u64,
    pub match_id: MatchId,
    pub inning: u16,
    pub half: Half,
    pub batter: PlayerId,
    pub batter_name: Option<String>,
    pub batter_avg: Option<f64>,
    pub pitcher: Option<PlayerId>,
    pub batting_order: Option<u8>,
    pub outcome: Outcome,
    pub label: String,
    pub rbi: u32,
    pub outs_before: u8,
    pub outs_after: Option<u8>,
    pub runners: Option<RunnerChange>,
    pub score: Option<ScoreChange>,
    /// Model likelihoods before the play resolved, keyed by outcome label.
    pub probabilities: Vec<(String, f64)>,
}

impl Default for Outcome {
    fn default() -> Self {
        Outcome::Other(String::new())
    }
}

impl AtBatEvent {
    pub fn batting_side(&self) -> Side {
        self.half.batting_side()
    }

    /// Runs that crossed the plate on this play. Score delta when available,
    /// RBI otherwise.
    pub fn runs(&self) -> u32 {
        match &self.score {
            Some(score) => score.runs_for(self.batting_side()),
            None => self.rbi,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GameStatus {
    #[default]
    Ready,
    Playing,
    Finished,
}

impl GameStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PLAYING" | "IN_PROGRESS" => GameStatus::Playing,
            "FINISHED" | "FINAL" => GameStatus::Finished,
            _ => GameStatus::Ready,
        }
    }

    pub fn has_started(&self) -> bool {
        matches!(self, GameStatus::Playing | GameStatus::Finished)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Home,
    Away,
    Tie,
}

impl Winner {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "HOME" => Some(Winner::Home),
            "AWAY" => Some(Winner::Away),
            "TIE" | "DRAW" => Some(Winner::Tie),
            _ => None,
        }
    }
}

/// A player the server pointed at from the game state, with the rolling
/// average it attached (AVG for batters, ERA for pitchers).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerRef {
    pub id: PlayerId,
    pub name: Option<String>,
    pub average: Option<f64>,
}

/// Server-aggregated snapshot, polled not pushed. Always authoritative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameState {
    pub match_id: MatchId,
    pub inning: u16,
    pub half: Half,
    pub outs: u8,
    pub score: Score,
    pub bases: Bases,
    pub at_bat: Option<PlayerRef>,
    pub pitcher: Option<PlayerRef>,
    pub status: GameStatus,
    /// Only set once the game is finished.
    pub winner: Option<Winner>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameStateReply {
    NotStarted,
    Snapshot(GameState),
}

/// Batting order for one team, fixed for the whole match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineup {
    pub pitcher: Option<PlayerId>,
    /// Slot 1 is index 0.
    pub batting: [PlayerId; 9],
}

impl Lineup {
    /// 1-based batting-order slot for the player.
    pub fn slot_of(&self, player: PlayerId) -> Option<u8> {
        self.batting
            .iter()
            .position(|p| *p == player)
            .map(|i| i as u8 + 1)
    }

    /// Player in a 1-based slot; slots wrap past nine.
    pub fn at(&self, slot: u8) -> PlayerId {
        let idx = usize::from(slot.max(1) - 1) % self.batting.len();
        self.batting[idx]
    }
}

/// Static information about a scheduled match.
#[derive(Debug, Clone, Default)]
pub struct MatchInfo {
    pub id: MatchId,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub starts_at: Option<DateTime<Utc>>,
    pub home_lineup: Option<Lineup>,
    pub away_lineup: Option<Lineup>,
    pub finished: bool,
}

impl MatchInfo {
    pub fn lineup(&self, side: Side) -> Option<&Lineup> {
        match side {
            Side::Home => self.home_lineup.as_ref(),
            Side::Away => self.away_lineup.as_ref(),
        }
    }

    pub fn team(&self, side: Side) -> TeamId {
        match side {
            Side::Home => self.home_team,
            Side::Away => self.away_team,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Handedness {
    Left,
    #[default]
    Right,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: String,
    pub image_url: Option<String>,
    pub back_no: Option<u32>,
    pub bats: Handedness,
    pub batting_avg: Option<f64>,
}

impl Player {
    /// Stand-in for ids the directory does not know.
    pub fn placeholder(id: PlayerId) -> Self {
        Self {
            id,
            name: format!("#{id}"),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Team {
    pub id: TeamId,
    pub key: String,
    pub name: String,
    pub stadium: Option<String>,
}

/// Read-only roster and team lookups, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    pub players: HashMap<PlayerId, Player>,
    pub teams: HashMap<TeamId, Team>,
    /// Ids already warned about. Shared between clones.
    missing: Arc<Mutex<HashSet<PlayerId>>>,
}

impl Directory {
    pub fn new(players: Vec<Player>, teams: Vec<Team>) -> Self {
        Self {
            players: players.into_iter().map(|p| (p.id, p)).collect(),
            teams: teams.into_iter().map(|t| (t.id, t)).collect(),
            missing: Arc::default(),
        }
    }

    /// Never fails: unknown ids resolve to a placeholder. The first miss for
    /// an id is a warning, repeats from later redraws are debug.
    pub fn player(&self, id: PlayerId) -> Cow<'_, Player> {
        match self.players.get(&id) {
            Some(player) => Cow::Borrowed(player),
            None => {
                if self.first_miss(id) {
                    log::warn!("unknown player id {id}, rendering placeholder");
                } else {
                    log::debug!("placeholder for player id {id}");
                }
                Cow::Owned(Player::placeholder(id))
            }
        }
    }

    fn first_miss(&self, id: PlayerId) -> bool {
        self.missing
            .lock()
            .map(|mut seen| seen.insert(id))
            .unwrap_or(true)
    }

    pub fn player_name(&self, id: PlayerId) -> String {
        self.players
            .get(&id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("#{id}"))
    }

    pub fn team_name(&self, id: TeamId) -> String {
        self.teams
            .get(&id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| format!("Team {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_parses_server_suffixes() {
        assert_eq!(Half::parse("초"), Some(Half::Top));
        assert_eq!(Half::parse("말"), Some(Half::Bottom));
        assert_eq!(Half::parse("bottom"), Some(Half::Bottom));
        assert_eq!(Half::parse("middle"), None);
        assert_eq!(Half::Top.batting_side(), Side::Away);
    }

    #[test]
    fn outcome_codes_round_trip_known_values() {
        for code in ["single", "home_run", "double_play", "sacrifice_fly", "fielders_choice"] {
            assert_eq!(Outcome::parse(code).code(), code);
        }
        assert_eq!(Outcome::parse("balk"), Outcome::Other("balk".into()));
    }

    #[test]
    fn hit_set_excludes_reaches() {
        assert!(Outcome::Triple.is_hit());
        assert!(!Outcome::Walk.is_hit());
        assert!(!Outcome::ErrorReach.is_hit());
        assert!(!Outcome::InfieldSingle.is_hit());
    }

    #[test]
    fn bases_locate_players() {
        let bases = Bases::new(Some(7), None, Some(9));
        assert_eq!(bases.position_of(9), Some(3));
        assert_eq!(bases.get(2), None);
        assert_eq!(bases.get(4), None);
        assert_eq!(bases.occupants().collect::<Vec<_>>(), vec![(1, 7), (3, 9)]);
    }

    #[test]
    fn event_runs_fall_back_to_rbi() {
        let mut event = AtBatEvent {
            half: Half::Bottom,
            rbi: 2,
            ..Default::default()
        };
        assert_eq!(event.runs(), 2);
        event.score = Some(ScoreChange {
            before: Score { home: 1, away: 0 },
            after: Score { home: 4, away: 0 },
        });
        assert_eq!(event.runs(), 3);
    }

    #[test]
    fn lineup_slots_wrap() {
        let lineup = Lineup {
            pitcher: Some(99),
            batting: [11, 12, 13, 14, 15, 16, 17, 18, 19],
        };
        assert_eq!(lineup.slot_of(19), Some(9));
        assert_eq!(lineup.at(10), 11);
        assert_eq!(lineup.slot_of(99), None);
    }

    #[test]
    fn directory_misses_become_placeholders() {
        let directory = Directory::default();
        let player = directory.player(42);
        assert_eq!(player.name, "#42");
        assert_eq!(player.bats, Handedness::Right);
    }

    #[test]
    fn repeated_misses_warn_once() {
        let directory = Directory::default();
        assert!(directory.first_miss(42));
        assert!(!directory.first_miss(42));
        assert!(directory.first_miss(43));

        directory.player(44);
        let redraw = directory.clone();
        redraw.player(44);
        assert!(!redraw.first_miss(44));
    }
}
