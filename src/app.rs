use crate::state::app_settings::AppSettings;
use crate::state::app_state::{AppState, CommentaryState};
use crate::state::audio::AudioEvent;
use crate::state::commentary::{CommentaryMessage, SendRejected};
use crate::state::relay::RelayFilter;
use crate::state::sync::SyncPhase;
use crate::state::view::MatchView;
use chrono::{DateTime, Utc};
use diamond_api::{AtBatEvent, Directory, GameState, MatchId, MatchInfo};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum MenuItem {
    #[default]
    Live,
    Relay,
    Commentary,
    Help,
}

pub struct App {
    pub settings: AppSettings,
    pub state: AppState,
}

impl App {
    pub fn new(settings: AppSettings, match_id: MatchId) -> Self {
        let endpoint = settings.commentary_url(match_id);
        let commentary = CommentaryState::new(
            match_id,
            endpoint,
            settings.affiliation.label(),
            settings.muted,
        );

        let app = Self {
            state: AppState {
                match_id,
                commentary,
                ..Default::default()
            },
            settings,
        };

        if let Some(level) = app.settings.log_level {
            log::set_max_level(level);
            tui_logger::set_default_level(level);
        }

        app
    }

    // -----------------------------------------------------------------------
    // Network and sync handlers, called from main_ui_loop
    // -----------------------------------------------------------------------

    pub fn on_match_loaded(&mut self, info: MatchInfo, directory: Directory) {
        self.state.last_error = None;
        self.state.info = Some(info);
        self.state.directory = directory;
        self.refresh_view(Utc::now());
    }

    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.state.info.as_ref().and_then(|i| i.starts_at)
    }

    pub fn on_phase_changed(&mut self, phase: SyncPhase) {
        self.state.sync.advance(phase);
        self.refresh_view(Utc::now());
    }

    pub fn on_events_updated(&mut self, events: Vec<AtBatEvent>) {
        if self.state.sync.apply_events(events) {
            self.refresh_view(Utc::now());
        }
    }

    pub fn on_state_updated(&mut self, state: GameState) {
        self.state.last_error = None;
        self.state.relay.follow_inning(state.inning);
        self.state.sync.apply_state(state);
        self.refresh_view(Utc::now());
    }

    /// Polls retry on their own; only the latest failure is shown.
    pub fn on_poll_failed(&mut self, message: String) {
        self.state.last_error = Some(message);
    }

    pub fn on_error(&mut self, message: String) {
        self.state.last_error = Some(message);
    }

    /// Rebuilt from the synced log on every change.
    pub fn refresh_view(&mut self, now: DateTime<Utc>) {
        let Some(info) = self.state.info.as_ref() else {
            return;
        };
        self.state.view = Some(MatchView::build(
            info,
            &self.state.directory,
            &self.state.sync,
            now,
        ));
    }

    /// Only the countdown moves with the clock.
    pub fn on_clock_tick(&mut self) -> bool {
        let waiting = matches!(
            self.state.sync.phase(),
            SyncPhase::Scheduled | SyncPhase::Waiting
        );
        if waiting {
            self.refresh_view(Utc::now());
        }
        waiting
    }

    // -----------------------------------------------------------------------
    // Commentary
    // -----------------------------------------------------------------------

    pub fn on_commentary_connected(&mut self) {
        self.state.commentary.connected = true;
        let endpoint = self.state.commentary.endpoint.clone();
        self.state
            .commentary
            .push_system(self.state.match_id, format!("connected to {endpoint}"));
    }

    pub fn on_commentary_disconnected(&mut self) {
        if self.state.commentary.connected {
            self.state.commentary.push_system(
                self.state.match_id,
                "commentary disconnected. Reopen the match to rejoin.",
            );
        }
        self.state.commentary.connected = false;
        self.state.commentary.now_playing = None;
    }

    pub fn on_commentary_error(&mut self, message: String) {
        self.state
            .commentary
            .push_system(self.state.match_id, format!("commentary error: {message}"));
    }

    pub fn on_commentary_message(&mut self, msg: CommentaryMessage) {
        self.state.commentary.push(msg);
    }

    pub fn on_send_rejected(&mut self, reason: SendRejected) {
        self.state
            .commentary
            .push_system(self.state.match_id, reason.to_string());
    }

    pub fn on_audio_event(&mut self, event: AudioEvent) {
        self.state.commentary.now_playing = match event {
            AudioEvent::Started(url) => Some(url),
            AudioEvent::Finished(_) | AudioEvent::Failed { .. } | AudioEvent::Stopped => None,
        };
    }

    /// Returns the new muted flag.
    pub fn toggle_mute(&mut self) -> bool {
        self.state.commentary.muted = !self.state.commentary.muted;
        if self.state.commentary.muted {
            self.state.commentary.now_playing = None;
        }
        self.state.commentary.muted
    }

    // -----------------------------------------------------------------------
    // Tab management
    // -----------------------------------------------------------------------

    pub fn update_tab(&mut self, next: MenuItem) {
        if self.state.active_tab == next {
            return;
        }
        self.state.previous_tab = self.state.active_tab;
        self.state.active_tab = next;
        if self.state.active_tab == MenuItem::Commentary {
            self.state.commentary.scroll_offset = 0;
        }
    }

    pub fn exit_help(&mut self) {
        if self.state.active_tab == MenuItem::Help {
            self.state.active_tab = self.state.previous_tab;
        }
    }

    pub fn toggle_show_logs(&mut self) {
        self.state.show_logs = !self.state.show_logs;
    }

    pub fn toggle_full_screen(&mut self) {
        self.settings.full_screen = !self.settings.full_screen;
    }

    pub fn quit(&mut self) {
        self.state.should_quit = true;
    }

    // -----------------------------------------------------------------------
    // Relay navigation
    // -----------------------------------------------------------------------

    pub fn relay_previous_inning(&mut self) {
        self.state.relay.previous_inning();
    }

    pub fn relay_next_inning(&mut self) {
        let last = self
            .state
            .view
            .as_ref()
            .map(|v| v.scoreboard.innings() as u16)
            .unwrap_or(9);
        self.state.relay.next_inning(last);
    }

    pub fn relay_show_scoring(&mut self) {
        self.state.relay.show_scoring();
    }

    pub fn relay_resume_follow(&mut self) {
        self.state.relay.follow = true;
        let inning = self
            .state
            .view
            .as_ref()
            .map(MatchView::current_inning)
            .unwrap_or(1);
        self.state.relay.filter = RelayFilter::Inning(inning);
        self.state.relay.scroll_offset = 0;
    }

    pub fn relay_scroll_down(&mut self) {
        self.state.relay.scroll_offset = self.state.relay.scroll_offset.saturating_add(1);
    }

    pub fn relay_scroll_up(&mut self) {
        self.state.relay.scroll_offset = self.state.relay.scroll_offset.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::commentary::Category;
    use diamond_api::{GameStatus, Half};

    fn app() -> App {
        let mut app = App::new(AppSettings::default(), 1);
        app.on_match_loaded(MatchInfo { id: 1, ..Default::default() }, Directory::default());
        app
    }

    #[test]
    fn shorter_logs_do_not_rewind_the_view() {
        let mut app = app();
        let log: Vec<AtBatEvent> = (1..=3)
            .map(|id| AtBatEvent { id, inning: 1, half: Half::Top, ..Default::default() })
            .collect();
        app.on_events_updated(log.clone());
        app.on_events_updated(log[..1].to_vec());
        assert_eq!(app.state.sync.events().len(), 3);
        assert_eq!(app.state.view.as_ref().unwrap().relay.len(), 3);
    }

    #[test]
    fn relay_follows_live_inning() {
        let mut app = app();
        app.on_state_updated(GameState { inning: 4, status: GameStatus::Playing, ..Default::default() });
        assert_eq!(app.state.relay.filter, RelayFilter::Inning(4));
        app.relay_show_scoring();
        app.on_state_updated(GameState { inning: 5, status: GameStatus::Playing, ..Default::default() });
        assert_eq!(app.state.relay.filter, RelayFilter::ScoringPlays);
        app.relay_resume_follow();
        assert_eq!(app.state.relay.filter, RelayFilter::Inning(5));
    }

    #[test]
    fn disconnect_is_reported_once() {
        let mut app = app();
        app.on_commentary_connected();
        app.on_commentary_disconnected();
        app.on_commentary_disconnected();
        let notices = app
            .state
            .commentary
            .messages
            .iter()
            .filter(|m| m.category == Category::Notice && m.body.contains("disconnected"))
            .count();
        assert_eq!(notices, 1);
        assert!(!app.state.commentary.connected);
    }

    #[test]
    fn mute_clears_now_playing() {
        let mut app = app();
        app.on_audio_event(AudioEvent::Started("a.mp3".into()));
        assert!(app.toggle_mute());
        assert!(app.state.commentary.now_playing.is_none());
    }
}
