use crate::state::network::LoadingState;
use crossterm::event::KeyEvent;
use diamond_api::{Directory, MatchInfo};

#[derive(Debug, Clone)]
pub enum NetworkRequest {
    /// Match header, lineups and the roster directory.
    LoadMatch,
}

#[derive(Debug)]
pub enum NetworkResponse {
    LoadingStateChanged { loading_state: LoadingState },
    MatchLoaded { info: MatchInfo, directory: Directory },
    Error { message: String },
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    KeyPressed(KeyEvent),
    Resize,
    AppStarted,
    /// Once a second, for the countdown.
    ClockTick,
}
