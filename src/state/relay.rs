use crate::state::movement::{HOME_PLATE, Movement, classify_runners};
use diamond_api::{AtBatEvent, Directory, Half, Outcome, PlayerId};
use std::collections::HashMap;

/// Bars shown under each play.
pub const PROBABILITY_BARS: usize = 6;

/// Batter's running totals up to and including a given play.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatterLine {
    pub plate_appearances: u32,
    pub hits: u32,
    pub rbi: u32,
    pub home_runs: u32,
    pub strikeouts: u32,
}

impl BatterLine {
    fn record(&mut self, event: &AtBatEvent) {
        self.plate_appearances += 1;
        self.hits += u32::from(event.outcome.is_hit());
        self.rbi += event.rbi;
        self.home_runs += u32::from(event.outcome == Outcome::HomeRun);
        self.strikeouts += u32::from(event.outcome == Outcome::Strikeout);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityBar {
    pub label: String,
    pub probability: f64,
    /// The outcome that actually happened.
    pub actual: bool,
}

/// One play-by-play card.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayEntry {
    pub event_id: u64,
    pub inning: u16,
    pub half: Half,
    /// First play of its half-inning.
    pub starts_half: bool,
    pub batter: PlayerId,
    pub batter_name: String,
    pub batting_order: Option<u8>,
    pub batter_avg: Option<f64>,
    pub result: String,
    pub line: BatterLine,
    pub runner_notes: Vec<String>,
    pub probabilities: Vec<ProbabilityBar>,
    pub runs: u32,
}

impl RelayEntry {
    pub fn is_scoring(&self) -> bool {
        self.runs > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayFilter {
    ScoringPlays,
    Inning(u16),
}

impl Default for RelayFilter {
    fn default() -> Self {
        RelayFilter::Inning(1)
    }
}

impl RelayFilter {
    pub fn matches(&self, entry: &RelayEntry) -> bool {
        match self {
            RelayFilter::ScoringPlays => entry.is_scoring(),
            RelayFilter::Inning(n) => entry.inning == *n,
        }
    }

    pub fn label(&self) -> String {
        match self {
            RelayFilter::ScoringPlays => "Scoring plays".to_string(),
            RelayFilter::Inning(n) => format!("Inning {n}"),
        }
    }
}

pub fn build_relay(events: &[AtBatEvent], directory: &Directory) -> Vec<RelayEntry> {
    let mut lines: HashMap<PlayerId, BatterLine> = HashMap::new();
    let mut previous: Option<(u16, Half)> = None;

    events
        .iter()
        .map(|event| {
            let line = lines.entry(event.batter).or_default();
            line.record(event);

            let starts_half = previous != Some((event.inning, event.half));
            previous = Some((event.inning, event.half));

            RelayEntry {
                event_id: event.id,
                inning: event.inning,
                half: event.half,
                starts_half,
                batter: event.batter,
                batter_name: event
                    .batter_name
                    .clone()
                    .unwrap_or_else(|| directory.player_name(event.batter)),
                batting_order: event.batting_order,
                batter_avg: event.batter_avg,
                result: event.label.clone(),
                line: *line,
                runner_notes: runner_notes(event, directory),
                probabilities: probability_bars(event),
                runs: event.runs(),
            }
        })
        .collect()
}

pub fn filter_relay(entries: &[RelayEntry], filter: RelayFilter) -> Vec<&RelayEntry> {
    entries.iter().filter(|e| filter.matches(e)).collect()
}

fn base_label(base: u8) -> &'static str {
    match base {
        1 => "1B",
        2 => "2B",
        3 => "3B",
        _ => "home",
    }
}

fn runner_notes(event: &AtBatEvent, directory: &Directory) -> Vec<String> {
    let Some(change) = event.runners.as_ref() else {
        return Vec::new();
    };
    classify_runners(event, change)
        .into_iter()
        .filter(|r| r.from > 0)
        .filter_map(|r| {
            let action = match r.movement {
                Movement::Advance { to, .. } if to >= HOME_PLATE => "scored".to_string(),
                Movement::Advance { to, .. } => format!("advanced to {}", base_label(to)),
                Movement::Score => "scored".to_string(),
                Movement::StationaryOut | Movement::AdvanceThenOut { .. } => "out".to_string(),
                Movement::StationarySafe | Movement::Hidden => return None,
            };
            Some(format!(
                "{} runner {}: {action}",
                base_label(r.from),
                directory.player_name(r.player)
            ))
        })
        .collect()
}

fn probability_bars(event: &AtBatEvent) -> Vec<ProbabilityBar> {
    let mut bars: Vec<ProbabilityBar> = event
        .probabilities
        .iter()
        .map(|(label, p)| ProbabilityBar {
            label: label.clone(),
            probability: *p,
            actual: *label == event.label || label == event.outcome.code(),
        })
        .collect();
    bars.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    bars.truncate(PROBABILITY_BARS);
    bars
}
