use diamond_api::{AtBatEvent, Half, Side};

pub const REGULATION_INNINGS: usize = 9;

/// Line score derived from the at-bat log. Rebuilt from scratch on every
/// call; nothing is carried between projections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scoreboard {
    /// Index 0 is the first inning.
    pub away_runs: Vec<u32>,
    pub home_runs: Vec<u32>,
    pub away_hits: u32,
    pub home_hits: u32,
    pub away_total: u32,
    pub home_total: u32,
}

impl Scoreboard {
    pub fn innings(&self) -> usize {
        self.away_runs.len()
    }

    pub fn runs(&self, side: Side) -> &[u32] {
        match side {
            Side::Home => &self.home_runs,
            Side::Away => &self.away_runs,
        }
    }

    /// Runs for a 1-based inning, zero outside the array.
    pub fn runs_in(&self, side: Side, inning: u16) -> u32 {
        usize::from(inning)
            .checked_sub(1)
            .and_then(|i| self.runs(side).get(i).copied())
            .unwrap_or(0)
    }

    pub fn hits(&self, side: Side) -> u32 {
        match side {
            Side::Home => self.home_hits,
            Side::Away => self.away_hits,
        }
    }

    pub fn total(&self, side: Side) -> u32 {
        match side {
            Side::Home => self.home_total,
            Side::Away => self.away_total,
        }
    }
}

/// Reduce the log into a line score. `current_inning` only widens the
/// arrays so the live extra inning shows up before anyone scores in it.
pub fn project(events: &[AtBatEvent], current_inning: u16) -> Scoreboard {
    let innings = events
        .iter()
        .map(|e| usize::from(e.inning))
        .chain(std::iter::once(usize::from(current_inning)))
        .fold(REGULATION_INNINGS, usize::max);

    let mut board = Scoreboard {
        away_runs: vec![0; innings],
        home_runs: vec![0; innings],
        ..Default::default()
    };

    for event in events {
        let Some(idx) = usize::from(event.inning).checked_sub(1) else {
            continue;
        };
        let runs = event.runs();
        let hit = u32::from(event.outcome.is_hit());
        match event.half {
            Half::Top => {
                board.away_runs[idx] += runs;
                board.away_hits += hit;
            }
            Half::Bottom => {
                board.home_runs[idx] += runs;
                board.home_hits += hit;
            }
        }
    }

    board.away_total = board.away_runs.iter().sum();
    board.home_total = board.home_runs.iter().sum();
    board
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_api::{Bases, GameState, GameStatus, Outcome, RunnerChange, Score, ScoreChange};

    fn event(inning: u16, half: Half, outcome: Outcome, before: Score, after: Score) -> AtBatEvent {
        AtBatEvent {
            inning,
            half,
            outcome,
            score: Some(ScoreChange { before, after }),
            ..Default::default()
        }
    }

    fn score(home: u32, away: u32) -> Score {
        Score { home, away }
    }

    #[test]
    fn single_with_no_runs() {
        let log = vec![AtBatEvent {
            inning: 1,
            half: Half::Top,
            batter: 1,
            outcome: Outcome::Single,
            runners: Some(RunnerChange {
                before: Bases::default(),
                after: Bases::new(Some(1), None, None),
            }),
            score: Some(ScoreChange::default()),
            ..Default::default()
        }];
        let board = project(&log, 1);
        assert_eq!(board.runs_in(Side::Away, 1), 0);
        assert_eq!(board.away_hits, 1);
        assert_eq!(board.home_hits, 0);
        assert_eq!(board.innings(), 9);
    }

    #[test]
    fn projection_is_repeatable() {
        let log = vec![
            event(1, Half::Top, Outcome::HomeRun, score(0, 0), score(0, 1)),
            event(1, Half::Bottom, Outcome::Double, score(0, 1), score(2, 1)),
        ];
        assert_eq!(project(&log, 2), project(&log, 2));
    }

    #[test]
    fn totals_match_final_score() {
        let log = vec![
            event(1, Half::Top, Outcome::HomeRun, score(0, 0), score(0, 1)),
            event(3, Half::Bottom, Outcome::Triple, score(0, 1), score(2, 1)),
            event(7, Half::Top, Outcome::SacrificeFly, score(2, 1), score(2, 2)),
            event(9, Half::Bottom, Outcome::Single, score(2, 2), score(3, 2)),
        ];
        let finished = GameState {
            inning: 9,
            half: Half::Bottom,
            score: score(3, 2),
            status: GameStatus::Finished,
            ..Default::default()
        };

        let board = project(&log, finished.inning);
        assert_eq!(board.away_runs.iter().sum::<u32>(), finished.score.away);
        assert_eq!(board.home_runs.iter().sum::<u32>(), finished.score.home);
        assert_eq!(board.home_total, finished.score.home);
        assert_eq!(board.away_total, finished.score.away);
        assert_eq!(board.runs_in(Side::Home, 3), 2);
        assert_eq!(board.away_hits, 1);
        assert_eq!(board.home_hits, 2);
    }

    #[test]
    fn infield_single_is_not_a_hit() {
        let log = vec![
            event(1, Half::Top, Outcome::InfieldSingle, score(0, 0), score(0, 0)),
            event(1, Half::Top, Outcome::Double, score(0, 0), score(0, 1)),
        ];
        let board = project(&log, 1);
        assert_eq!(board.away_hits, 1);
        assert_eq!(board.runs_in(Side::Away, 1), 1);
    }

    #[test]
    fn appended_events_never_lower_totals() {
        let short = vec![event(2, Half::Top, Outcome::Double, score(0, 0), score(0, 1))];
        let mut long = short.clone();
        long.push(event(2, Half::Bottom, Outcome::Walk, score(0, 1), score(1, 1)));
        long.push(event(3, Half::Top, Outcome::Strikeout, score(1, 1), score(1, 1)));

        let (a, b) = (project(&short, 2), project(&long, 3));
        for side in [Side::Home, Side::Away] {
            assert!(b.total(side) >= a.total(side));
            assert!(b.hits(side) >= a.hits(side));
            for (x, y) in a.runs(side).iter().zip(b.runs(side)) {
                assert!(y >= x);
            }
        }
    }

    #[test]
    fn extra_innings_grow_arrays() {
        let log = vec![event(11, Half::Bottom, Outcome::HomeRun, score(4, 4), score(5, 4))];
        let board = project(&log, 11);
        assert_eq!(board.innings(), 11);
        assert_eq!(board.runs_in(Side::Home, 11), 1);

        let live = project(&[], 10);
        assert_eq!(live.innings(), 10);
    }

    #[test]
    fn malformed_score_counts_rbi() {
        let log = vec![AtBatEvent {
            inning: 4,
            half: Half::Bottom,
            outcome: Outcome::Single,
            rbi: 2,
            score: None,
            ..Default::default()
        }];
        let board = project(&log, 4);
        assert_eq!(board.runs_in(Side::Home, 4), 2);
        assert_eq!(board.home_total, 2);
    }
}
