use crate::state::movement::{PlayMovements, classify};
use crate::state::projection::{Scoreboard, project};
use crate::state::relay::{RelayEntry, build_relay};
use crate::state::rotation::{OnDeck, upcoming_for_match};
use crate::state::sync::{MatchSync, SyncPhase};
use chrono::{DateTime, Utc};
use diamond_api::{
    AtBatEvent, Bases, Directory, GameState, GameStatus, MatchInfo, Side, Winner,
};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameResult {
    pub winner: Winner,
    pub home: u32,
    pub away: u32,
}

impl GameResult {
    pub fn headline(&self, home_team: &str, away_team: &str) -> String {
        match self.winner {
            Winner::Home => format!("{home_team} win ({}-{})", self.home, self.away),
            Winner::Away => format!("{away_team} win ({}-{})", self.away, self.home),
            Winner::Tie => format!("Tie ({}-{})", self.home, self.away),
        }
    }
}

/// Everything the screen needs for one redraw. Built fresh from the synced
/// log and state; never written back.
#[derive(Debug, Clone)]
pub struct MatchView {
    pub phase: SyncPhase,
    pub status: GameStatus,
    pub home_team: String,
    pub away_team: String,
    pub scoreboard: Scoreboard,
    pub state: Option<GameState>,
    /// Bases as the server last reported them, falling back to the last play.
    pub bases: Bases,
    pub latest: Option<AtBatEvent>,
    pub movements: Option<PlayMovements>,
    pub on_deck: Option<(Side, Vec<OnDeck>)>,
    pub relay: Vec<RelayEntry>,
    pub result: Option<GameResult>,
    /// Time left before the scheduled start while waiting.
    pub countdown: Option<Duration>,
}

impl MatchView {
    pub fn build(
        info: &MatchInfo,
        directory: &Directory,
        sync: &MatchSync,
        now: DateTime<Utc>,
    ) -> Self {
        let events = sync.events();
        let state = sync.state().cloned();
        let current_inning = state.as_ref().map(|s| s.inning).unwrap_or(1);
        let latest = events.last().cloned();

        let bases = state
            .as_ref()
            .map(|s| s.bases)
            .or_else(|| latest.as_ref().and_then(|e| e.runners.map(|r| r.after)))
            .unwrap_or_default();

        let result = state.as_ref().and_then(|s| match (s.status, s.winner) {
            (GameStatus::Finished, Some(winner)) => Some(GameResult {
                winner,
                home: s.score.home,
                away: s.score.away,
            }),
            _ => None,
        });

        let countdown = match sync.phase() {
            SyncPhase::Scheduled | SyncPhase::Waiting => info
                .starts_at
                .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO)),
            _ => None,
        };

        Self {
            phase: sync.phase(),
            status: state.as_ref().map(|s| s.status).unwrap_or_default(),
            home_team: directory.team_name(info.home_team),
            away_team: directory.team_name(info.away_team),
            scoreboard: project(events, current_inning),
            movements: latest.as_ref().and_then(|e| classify(e, directory)),
            on_deck: upcoming_for_match(info, events),
            relay: build_relay(events, directory),
            latest,
            bases,
            state,
            result,
            countdown,
        }
    }

    pub fn team(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.home_team,
            Side::Away => &self.away_team,
        }
    }

    pub fn current_inning(&self) -> u16 {
        self.state.as_ref().map(|s| s.inning).unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::movement::Movement;
    use diamond_api::{Half, Lineup, Outcome, RunnerChange, Score, ScoreChange, Team};

    fn info() -> MatchInfo {
        MatchInfo {
            id: 1,
            home_team: 10,
            away_team: 20,
            home_lineup: Some(Lineup { pitcher: None, batting: [1, 2, 3, 4, 5, 6, 7, 8, 9] }),
            away_lineup: Some(Lineup { pitcher: None, batting: [11, 12, 13, 14, 15, 16, 17, 18, 19] }),
            ..Default::default()
        }
    }

    fn directory() -> Directory {
        Directory::new(
            Vec::new(),
            vec![
                Team { id: 10, name: "Bears".into(), ..Default::default() },
                Team { id: 20, name: "Eagles".into(), ..Default::default() },
            ],
        )
    }

    #[test]
    fn view_reflects_latest_play() {
        let mut sync = MatchSync::default();
        sync.advance(SyncPhase::Live);
        sync.apply_events(vec![AtBatEvent {
            id: 1,
            inning: 1,
            half: Half::Top,
            batter: 11,
            outcome: Outcome::Single,
            runners: Some(RunnerChange {
                before: Bases::default(),
                after: Bases::new(Some(11), None, None),
            }),
            score: Some(ScoreChange::default()),
            ..Default::default()
        }]);

        let view = MatchView::build(&info(), &directory(), &sync, Utc::now());
        assert_eq!(view.scoreboard.away_hits, 1);
        assert_eq!(view.bases, Bases::new(Some(11), None, None));
        assert_eq!(
            view.movements.as_ref().unwrap().batter.movement,
            Movement::Advance { from: 0, to: 1 }
        );
        let (side, queue) = view.on_deck.as_ref().unwrap();
        assert_eq!(*side, Side::Away);
        assert_eq!(queue[0].player, 12);
        assert_eq!(view.team(Side::Home), "Bears");
        assert!(view.countdown.is_none());
    }

    #[test]
    fn finished_game_has_result_banner() {
        let mut sync = MatchSync::default();
        sync.apply_state(GameState {
            status: GameStatus::Finished,
            winner: Some(Winner::Away),
            score: Score { home: 2, away: 5 },
            inning: 9,
            ..Default::default()
        });
        let view = MatchView::build(&info(), &directory(), &sync, Utc::now());
        let result = view.result.unwrap();
        assert_eq!(result.headline("Bears", "Eagles"), "Eagles win (5-2)");
    }

    #[test]
    fn waiting_view_counts_down() {
        let mut sync = MatchSync::default();
        sync.advance(SyncPhase::Waiting);
        let now = Utc::now();
        let info = MatchInfo {
            starts_at: Some(now + chrono::Duration::seconds(90)),
            ..info()
        };
        let view = MatchView::build(&info, &directory(), &sync, now);
        assert_eq!(view.countdown, Some(Duration::from_secs(90)));
    }
}
