use crate::app::MenuItem;
use crate::state::commentary::CommentaryMessage;
use crate::state::relay::RelayFilter;
use crate::state::sync::MatchSync;
use crate::state::view::MatchView;
use diamond_api::{Directory, MatchId, MatchInfo};

pub const MESSAGE_CAP: usize = 200;

// ---------------------------------------------------------------------------
// Commentary panel
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CommentaryState {
    pub messages: Vec<CommentaryMessage>,
    pub input: String,
    pub composing: bool,
    pub scroll_offset: u16,
    pub connected: bool,
    pub endpoint: String,
    pub muted: bool,
    pub now_playing: Option<String>,
}

impl CommentaryState {
    pub fn new(match_id: MatchId, endpoint: String, side: &str, muted: bool) -> Self {
        Self {
            messages: vec![CommentaryMessage::notice(
                match_id,
                format!("You joined the {side} side."),
            )],
            endpoint,
            muted,
            ..Default::default()
        }
    }

    pub fn push(&mut self, msg: CommentaryMessage) {
        self.messages.push(msg);
        if self.messages.len() > MESSAGE_CAP {
            let remove_count = self.messages.len() - MESSAGE_CAP;
            self.messages.drain(0..remove_count);
        }
    }

    /// Repeated identical notices collapse into one.
    pub fn push_system(&mut self, match_id: MatchId, body: impl Into<String>) {
        let body = body.into();
        if let Some(last) = self.messages.last()
            && last.author.is_none()
            && last.body == body
        {
            return;
        }
        self.push(CommentaryMessage::notice(match_id, body));
    }

    /// Trimmed input, leaving compose mode either way.
    pub fn take_input(&mut self) -> Option<String> {
        self.composing = false;
        let body = std::mem::take(&mut self.input);
        let body = body.trim();
        (!body.is_empty()).then(|| body.to_string())
    }
}

// ---------------------------------------------------------------------------
// Play-by-play panel
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RelayState {
    pub filter: RelayFilter,
    /// Jump to the live inning whenever it changes.
    pub follow: bool,
    pub scroll_offset: u16,
}

impl Default for RelayState {
    fn default() -> Self {
        Self {
            filter: RelayFilter::default(),
            follow: true,
            scroll_offset: 0,
        }
    }
}

impl RelayState {
    pub fn follow_inning(&mut self, inning: u16) {
        if self.follow && self.filter != RelayFilter::Inning(inning) {
            self.filter = RelayFilter::Inning(inning);
            self.scroll_offset = 0;
        }
    }

    pub fn previous_inning(&mut self) {
        self.follow = false;
        self.filter = match self.filter {
            RelayFilter::Inning(n) if n > 1 => RelayFilter::Inning(n - 1),
            RelayFilter::Inning(_) => RelayFilter::Inning(1),
            RelayFilter::ScoringPlays => RelayFilter::Inning(1),
        };
        self.scroll_offset = 0;
    }

    pub fn next_inning(&mut self, last: u16) {
        self.follow = false;
        self.filter = match self.filter {
            RelayFilter::Inning(n) => RelayFilter::Inning((n + 1).min(last.max(1))),
            RelayFilter::ScoringPlays => RelayFilter::Inning(last.max(1)),
        };
        self.scroll_offset = 0;
    }

    pub fn show_scoring(&mut self) {
        self.follow = false;
        self.filter = RelayFilter::ScoringPlays;
        self.scroll_offset = 0;
    }
}

// ---------------------------------------------------------------------------
// Everything the UI reads
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct AppState {
    pub active_tab: MenuItem,
    pub previous_tab: MenuItem,
    pub show_logs: bool,
    pub should_quit: bool,
    pub last_error: Option<String>,
    pub match_id: MatchId,
    pub info: Option<MatchInfo>,
    pub directory: Directory,
    pub sync: MatchSync,
    pub view: Option<MatchView>,
    pub commentary: CommentaryState,
    pub relay: RelayState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_list_is_capped() {
        let mut state = CommentaryState::new(1, "ws://x".into(), "home", false);
        for i in 0..250 {
            state.push(CommentaryMessage::notice(1, format!("n{i}")));
        }
        assert_eq!(state.messages.len(), MESSAGE_CAP);
        assert_eq!(state.messages.last().unwrap().body, "n249");
    }

    #[test]
    fn first_message_names_the_side() {
        let state = CommentaryState::new(1, "ws://x".into(), "away", true);
        assert_eq!(state.messages[0].body, "You joined the away side.");
        assert!(state.muted);
    }

    #[test]
    fn relay_follow_stops_on_manual_navigation() {
        let mut relay = RelayState::default();
        relay.follow_inning(3);
        assert_eq!(relay.filter, RelayFilter::Inning(3));
        relay.previous_inning();
        relay.follow_inning(4);
        assert_eq!(relay.filter, RelayFilter::Inning(2));
        relay.next_inning(4);
        relay.next_inning(4);
        relay.next_inning(4);
        assert_eq!(relay.filter, RelayFilter::Inning(4));
    }
}
