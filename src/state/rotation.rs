use diamond_api::{AtBatEvent, Lineup, MatchInfo, PlayerId, Side};

/// How many upcoming batters the on-deck panel shows.
pub const ON_DECK_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnDeck {
    /// 1-based batting-order slot.
    pub slot: u8,
    pub player: PlayerId,
}

/// Next `count` batters after `current`, wrapping from slot 9 to slot 1.
/// An unknown (or absent) current batter starts the queue at slot 1.
pub fn upcoming(lineup: &Lineup, current: Option<PlayerId>, count: usize) -> Vec<OnDeck> {
    let first = match current.and_then(|id| lineup.slot_of(id)) {
        Some(slot) => slot % 9 + 1,
        None => 1,
    };
    (0..count)
        .map(|offset| {
            let slot = ((usize::from(first) - 1 + offset) % 9) as u8 + 1;
            OnDeck {
                slot,
                player: lineup.at(slot),
            }
        })
        .collect()
}

/// Queue for the team that batted last. Anchored on the most recent event's
/// batter; before the first pitch it is the visitors from the top of the order.
pub fn upcoming_for_match(info: &MatchInfo, events: &[AtBatEvent]) -> Option<(Side, Vec<OnDeck>)> {
    let (side, current) = match events.last() {
        Some(last) => (last.batting_side(), Some(last.batter)),
        None => (Side::Away, None),
    };
    let lineup = info.lineup(side)?;
    Some((side, upcoming(lineup, current, ON_DECK_COUNT)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_api::Half;

    fn lineup() -> Lineup {
        Lineup {
            pitcher: Some(1),
            batting: [11, 12, 13, 14, 15, 16, 17, 18, 19],
        }
    }

    fn slots(queue: &[OnDeck]) -> Vec<u8> {
        queue.iter().map(|d| d.slot).collect()
    }

    #[test]
    fn slot_nine_wraps_to_leadoff() {
        let queue = upcoming(&lineup(), Some(19), ON_DECK_COUNT);
        assert_eq!(slots(&queue), vec![1, 2, 3, 4]);
        assert_eq!(queue[0].player, 11);
    }

    #[test]
    fn queue_wraps_mid_list() {
        let queue = upcoming(&lineup(), Some(17), ON_DECK_COUNT);
        assert_eq!(slots(&queue), vec![8, 9, 1, 2]);
    }

    #[test]
    fn unknown_batter_starts_at_slot_one() {
        let queue = upcoming(&lineup(), Some(999), ON_DECK_COUNT);
        assert_eq!(slots(&queue), vec![1, 2, 3, 4]);
        assert_eq!(slots(&upcoming(&lineup(), None, 2)), vec![1, 2]);
    }

    #[test]
    fn match_queue_follows_last_batting_side() {
        let info = MatchInfo {
            home_lineup: Some(Lineup {
                pitcher: None,
                batting: [21, 22, 23, 24, 25, 26, 27, 28, 29],
            }),
            away_lineup: Some(lineup()),
            ..Default::default()
        };
        let events = vec![AtBatEvent {
            half: Half::Bottom,
            batter: 23,
            ..Default::default()
        }];
        let (side, queue) = upcoming_for_match(&info, &events).unwrap();
        assert_eq!(side, Side::Home);
        assert_eq!(queue[0].player, 24);

        let (side, queue) = upcoming_for_match(&info, &[]).unwrap();
        assert_eq!(side, Side::Away);
        assert_eq!(queue[0].player, 11);
    }
}
