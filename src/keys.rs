use crate::app::{App, MenuItem};
use crate::state::audio::AudioCommand;
use crate::state::commentary::{CommentaryHandle, SendRejected};
use crate::state::messages::NetworkRequest;
use crossterm::event::KeyCode::Char;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

pub async fn handle_key_bindings(
    key_event: KeyEvent,
    app: &Arc<Mutex<App>>,
    network_requests: &mpsc::Sender<NetworkRequest>,
    commentary: &CommentaryHandle,
    audio: &mpsc::Sender<AudioCommand>,
) {
    let mut guard = app.lock().await;

    if guard.state.commentary.composing {
        match (key_event.code, key_event.modifiers) {
            (Char('c'), KeyModifiers::CONTROL) => guard.quit(),
            (KeyCode::Esc, _) => {
                guard.state.commentary.composing = false;
                guard.state.commentary.input.clear();
            }
            (KeyCode::Enter, _) => {
                let body = guard.state.commentary.take_input().unwrap_or_default();
                if let Err(reason) = commentary.send(&body) {
                    guard.on_send_rejected(reason);
                }
            }
            (KeyCode::Backspace, _) => {
                guard.state.commentary.input.pop();
            }
            (Char(c), _) => guard.state.commentary.input.push(c),
            _ => {}
        }
        return;
    }

    match (guard.state.active_tab, key_event.code, key_event.modifiers) {
        // Quit
        (_, Char('q'), _) | (_, Char('c'), KeyModifiers::CONTROL) => guard.quit(),

        // Tab switching
        (_, Char('1'), _) => guard.update_tab(MenuItem::Live),
        (_, Char('2'), _) => guard.update_tab(MenuItem::Relay),
        (_, Char('3'), _) => guard.update_tab(MenuItem::Commentary),
        (_, Char('?'), _) => guard.update_tab(MenuItem::Help),
        (MenuItem::Help, KeyCode::Esc, _) => guard.exit_help(),

        // Play-by-play navigation
        (MenuItem::Relay, Char('h') | KeyCode::Left, _) => guard.relay_previous_inning(),
        (MenuItem::Relay, Char('l') | KeyCode::Right, _) => guard.relay_next_inning(),
        (MenuItem::Relay, Char('s'), _) => guard.relay_show_scoring(),
        (MenuItem::Relay, Char('a'), _) => guard.relay_resume_follow(),
        (MenuItem::Relay, Char('j') | KeyCode::Down, _) => guard.relay_scroll_down(),
        (MenuItem::Relay, Char('k') | KeyCode::Up, _) => guard.relay_scroll_up(),

        // Commentary
        (MenuItem::Commentary, Char('i') | KeyCode::Enter, _) => {
            if commentary.is_authenticated() {
                guard.state.commentary.composing = true;
            } else {
                guard.on_send_rejected(SendRejected::Unauthenticated);
            }
        }
        (MenuItem::Commentary, Char('j') | KeyCode::Down, _) => {
            guard.state.commentary.scroll_offset =
                guard.state.commentary.scroll_offset.saturating_sub(1);
        }
        (MenuItem::Commentary, Char('k') | KeyCode::Up, _) => {
            guard.state.commentary.scroll_offset =
                guard.state.commentary.scroll_offset.saturating_add(1);
        }

        // Global
        (_, Char('m'), _) => {
            let muted = guard.toggle_mute();
            drop(guard);
            let _ = audio.send(AudioCommand::SetMuted(muted)).await;
            return;
        }
        (_, Char('r'), _) if guard.state.info.is_none() => {
            drop(guard);
            let _ = network_requests.send(NetworkRequest::LoadMatch).await;
            return;
        }
        (_, Char('f'), _) => guard.toggle_full_screen(),
        (_, Char('"'), _) => guard.toggle_show_logs(),

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::app_settings::AppSettings;
    use crate::state::commentary::CommentaryCommand;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, KeyEventKind::Press)
    }

    struct Harness {
        app: Arc<Mutex<App>>,
        network: mpsc::Sender<NetworkRequest>,
        commentary: CommentaryHandle,
        commands: mpsc::Receiver<CommentaryCommand>,
        audio: mpsc::Sender<AudioCommand>,
        audio_rx: mpsc::Receiver<AudioCommand>,
        _network_rx: mpsc::Receiver<NetworkRequest>,
    }

    fn harness(user_id: Option<&str>) -> Harness {
        let (network, _network_rx) = mpsc::channel(4);
        let (cmd_tx, commands) = mpsc::channel(4);
        let (audio, audio_rx) = mpsc::channel(4);
        Harness {
            app: Arc::new(Mutex::new(App::new(AppSettings::default(), 1))),
            network,
            commentary: CommentaryHandle::new(user_id.map(String::from), cmd_tx),
            commands,
            audio,
            audio_rx,
            _network_rx,
        }
    }

    impl Harness {
        async fn press(&self, code: KeyCode) {
            handle_key_bindings(key(code), &self.app, &self.network, &self.commentary, &self.audio)
                .await;
        }
    }

    #[tokio::test]
    async fn composing_sends_trimmed_body() {
        let mut h = harness(Some("42"));
        h.press(Char('3')).await;
        h.press(Char('i')).await;
        for c in " go!".chars() {
            h.press(Char(c)).await;
        }
        // q is text while composing
        h.press(Char('q')).await;
        h.press(KeyCode::Enter).await;

        assert_eq!(
            h.commands.recv().await,
            Some(CommentaryCommand::Send { body: "go!q".into() })
        );
        let guard = h.app.lock().await;
        assert!(!guard.state.should_quit);
        assert!(!guard.state.commentary.composing);
    }

    #[tokio::test]
    async fn anonymous_users_cannot_compose() {
        let h = harness(None);
        h.press(Char('3')).await;
        h.press(Char('i')).await;
        let guard = h.app.lock().await;
        assert!(!guard.state.commentary.composing);
        assert_eq!(
            guard.state.commentary.messages.last().map(|m| m.body.as_str()),
            Some("log in to chat")
        );
    }

    #[tokio::test]
    async fn mute_reaches_the_audio_worker() {
        let mut h = harness(None);
        h.press(Char('m')).await;
        assert_eq!(h.audio_rx.recv().await, Some(AudioCommand::SetMuted(true)));
        h.press(Char('m')).await;
        assert_eq!(h.audio_rx.recv().await, Some(AudioCommand::SetMuted(false)));
    }

    #[tokio::test]
    async fn quit_sets_flag() {
        let h = harness(None);
        h.press(Char('q')).await;
        assert!(h.app.lock().await.state.should_quit);
    }
}
