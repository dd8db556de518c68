use diamond_api::{AtBatEvent, Directory, Handedness, Outcome, PlayerId, RunnerChange};
use log::debug;

/// Base 0 is home plate on the way in; base 4 is home plate on the way out.
pub const HOME_PLATE: u8 = 4;

/// What a player visibly does on one play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    StationarySafe,
    StationaryOut,
    Advance { from: u8, to: u8 },
    AdvanceThenOut { from: u8, to: u8 },
    Score,
    Hidden,
}

impl Movement {
    pub fn is_out(self) -> bool {
        matches!(self, Movement::StationaryOut | Movement::AdvanceThenOut { .. })
    }

    /// Base the player ends the play on, if still aboard.
    pub fn resting_base(self) -> Option<u8> {
        match self {
            Movement::Advance { to, .. } if (1..HOME_PLATE).contains(&to) => Some(to),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerMovement {
    pub player: PlayerId,
    /// Base held before the play; 0 for a player who only appears afterwards.
    pub from: u8,
    pub movement: Movement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatterMovement {
    pub player: PlayerId,
    pub bats: Handedness,
    pub movement: Movement,
}

/// Every tagged player for one event. Used for animation only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayMovements {
    pub event_id: u64,
    pub batter: BatterMovement,
    /// Lead runner first.
    pub runners: Vec<RunnerMovement>,
}

/// Tag the batter and every runner on the event. `None` when the event's
/// base data could not be parsed.
pub fn classify(event: &AtBatEvent, directory: &Directory) -> Option<PlayMovements> {
    let Some(change) = event.runners.as_ref() else {
        debug!("at-bat {} has no usable base data, not animated", event.id);
        return None;
    };

    let bats = if event.batter == 0 {
        Handedness::default()
    } else {
        directory.player(event.batter).bats
    };

    Some(PlayMovements {
        event_id: event.id,
        batter: BatterMovement {
            player: event.batter,
            bats,
            movement: classify_batter(&event.outcome, event.outs_before),
        },
        runners: classify_runners(event, change),
    })
}

/// First matching rule wins.
pub fn classify_batter(outcome: &Outcome, outs_before: u8) -> Movement {
    use Outcome::*;
    match outcome {
        HomeRun => Movement::Advance { from: 0, to: HOME_PLATE },
        Single | InfieldSingle | Walk | HitByPitch | ErrorReach | FieldersChoice => {
            Movement::Advance { from: 0, to: 1 }
        }
        Double => Movement::Advance { from: 0, to: 2 },
        Triple => Movement::Advance { from: 0, to: 3 },
        o if o.is_out() && outs_before >= 2 && *o != Strikeout => {
            Movement::AdvanceThenOut { from: 0, to: 1 }
        }
        o if o.is_out() => Movement::StationaryOut,
        _ => Movement::Hidden,
    }
}

/// Runners who vanish from the bases are credited with the play's runs lead
/// runner first; anyone left over was retired.
pub fn classify_runners(event: &AtBatEvent, change: &RunnerChange) -> Vec<RunnerMovement> {
    let mut runs_left = event.runs();
    if event.outcome == Outcome::HomeRun {
        runs_left = runs_left.saturating_sub(1);
    }

    let mut before: Vec<(u8, PlayerId)> = change
        .before
        .occupants()
        .filter(|(_, id)| *id != event.batter)
        .collect();
    before.sort_by(|a, b| b.0.cmp(&a.0));

    let mut tagged = Vec::with_capacity(before.len());
    for (base, player) in before {
        let movement = match change.after.position_of(player) {
            Some(to) if to == base => Movement::StationarySafe,
            Some(to) => Movement::Advance { from: base, to },
            None if runs_left > 0 => {
                runs_left -= 1;
                Movement::Score
            }
            None => retired_runner(base, &event.outcome, event.outs_before),
        };
        tagged.push(RunnerMovement { player, from: base, movement });
    }

    // Substitutes who only show up after the play.
    for (base, player) in change.after.occupants() {
        if player != event.batter && change.before.position_of(player).is_none() {
            tagged.push(RunnerMovement {
                player,
                from: 0,
                movement: Movement::StationarySafe,
            });
            debug!("at-bat {}: runner {player} appeared on base {base}", event.id);
        }
    }

    tagged
}

fn retired_runner(base: u8, outcome: &Outcome, outs_before: u8) -> Movement {
    let forced_advance = Movement::AdvanceThenOut { from: base, to: base + 1 };
    if outs_before < 2 || outcome.forces_runners() {
        forced_advance
    } else {
        Movement::StationaryOut
    }
}
