mod app;
mod components;
mod draw;
mod keys;
mod state;
mod ui;

use crate::app::App;
use crate::state::app_settings::AppSettings;
use crate::state::audio::{AudioCommand, AudioEvent, AudioWorker, TimedSink};
use crate::state::commentary::{CommentaryEvent, CommentaryHandle, CommentaryWorker};
use crate::state::messages::{NetworkRequest, NetworkResponse, UiEvent};
use crate::state::network::{LoadingState, NetworkWorker};
use crate::state::sync::{SyncEvent, SyncHandle, SyncWorker};
use crossterm::event::{self as crossterm_event, Event};
use crossterm::{cursor, execute, terminal};
use diamond_api::MatchId;
use diamond_api::client::SimulationApi;
use log::{error, info};
use std::io::Stdout;
use std::sync::Arc;
use std::{io, panic};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Duration;
use tui::{Terminal, backend::CrosstermBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli_match = match handle_cli_args() {
        CliAction::Exit => return Ok(()),
        CliAction::Run(cli_match) => cli_match,
    };

    let settings = AppSettings::load(cli_match);
    let Some(match_id) = settings.match_id else {
        eprintln!("No match selected.\n\n{}", usage_text());
        std::process::exit(2);
    };

    better_panic::install();

    let backend = CrosstermBackend::new(io::stdout());
    let terminal = Terminal::new(backend)?;

    setup_panic_hook();
    setup_terminal()?;

    tui_logger::init_logger(log::LevelFilter::Error)?;
    tui_logger::set_default_level(log::LevelFilter::Error);

    let api = SimulationApi::new(settings.api_url.clone());
    let app = Arc::new(Mutex::new(App::new(settings.clone(), match_id)));

    let (ui_event_tx, ui_event_rx) = mpsc::channel::<UiEvent>(100);
    let (network_req_tx, network_req_rx) = mpsc::channel::<NetworkRequest>(100);
    let (network_resp_tx, network_resp_rx) = mpsc::channel::<NetworkResponse>(100);
    let (sync_evt_tx, sync_evt_rx) = mpsc::channel::<SyncEvent>(100);
    let (commentary_evt_tx, commentary_evt_rx) = mpsc::channel::<CommentaryEvent>(100);
    let (audio_cmd_tx, audio_cmd_rx) = mpsc::channel::<AudioCommand>(100);
    let (audio_evt_tx, audio_evt_rx) = mpsc::channel::<AudioEvent>(100);

    // Input handler thread
    let input_handler = tokio::spawn(input_handler_task(ui_event_tx.clone()));

    // Network thread
    let network_worker = NetworkWorker::new(api.clone(), match_id, network_req_rx, network_resp_tx);
    let network_task = tokio::spawn(network_worker.run());

    // Audio thread, one cue at a time
    let audio_task = AudioWorker::new(
        TimedSink {
            cue: settings.cue_length,
        },
        settings.muted,
        audio_cmd_rx,
        audio_evt_tx,
    )
    .spawn();

    // Commentary socket for this match
    let commentary = CommentaryWorker::open(
        settings.commentary_url(match_id),
        match_id,
        settings.affiliation,
        settings.user_id.clone(),
        commentary_evt_tx,
        audio_cmd_tx.clone(),
    );

    // Clock tick thread, drives the countdown
    let clock_tx = ui_event_tx.clone();
    let clock_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            if clock_tx.send(UiEvent::ClockTick).await.is_err() {
                break;
            }
        }
    });

    // Trigger match load on startup
    let _ = ui_event_tx.send(UiEvent::AppStarted).await;

    let channels = Channels {
        ui_events: ui_event_rx,
        network_requests: network_req_tx,
        network_responses: network_resp_rx,
        sync_tx: sync_evt_tx,
        sync_events: sync_evt_rx,
        commentary_events: commentary_evt_rx,
        audio_commands: audio_cmd_tx,
        audio_events: audio_evt_rx,
    };
    main_ui_loop(terminal, app, api, commentary, channels).await;

    input_handler.abort();
    network_task.abort();
    audio_task.abort();
    clock_task.abort();

    cleanup_terminal();
    Ok(())
}

enum CliAction {
    Run(Option<MatchId>),
    Exit,
}

fn handle_cli_args() -> CliAction {
    let mut args = std::env::args().skip(1);
    let Some(arg) = args.next() else {
        return CliAction::Run(None);
    };

    match arg.as_str() {
        "-h" | "--help" => {
            println!("{}", usage_text());
            CliAction::Exit
        }
        "-V" | "--version" => {
            println!("diamondcast {}", env!("CARGO_PKG_VERSION"));
            CliAction::Exit
        }
        other => match other.parse::<MatchId>() {
            Ok(id) => CliAction::Run(Some(id)),
            Err(_) => {
                eprintln!("Unknown argument: {arg}\n\n{}", usage_text());
                std::process::exit(2);
            }
        },
    }
}

fn usage_text() -> &'static str {
    "diamondcast - live baseball simulation broadcast in the terminal

Usage:
  diamondcast <match-id>
  diamondcast --help
  diamondcast --version

Environment:
  DIAMONDCAST_API        Simulation server base URL (default http://127.0.0.1:8080)
  DIAMONDCAST_MATCH      Match id when none is given on the command line
  DIAMONDCAST_CHAT_WS    Commentary WebSocket URL (default <api host>/api/chat)
  DIAMONDCAST_TEAM       Your side, home or away (default home)
  DIAMONDCAST_USER_ID    Your user id; chat is read-only without it
  DIAMONDCAST_MUTED      Start with commentary audio muted
  DIAMONDCAST_CUE_SECS   Seconds each audio cue holds the queue (default 4)
  DIAMONDCAST_LOG        Log level for the log pane (error, warn, info, debug)"
}

struct Channels {
    ui_events: mpsc::Receiver<UiEvent>,
    network_requests: mpsc::Sender<NetworkRequest>,
    network_responses: mpsc::Receiver<NetworkResponse>,
    sync_tx: mpsc::Sender<SyncEvent>,
    sync_events: mpsc::Receiver<SyncEvent>,
    commentary_events: mpsc::Receiver<CommentaryEvent>,
    audio_commands: mpsc::Sender<AudioCommand>,
    audio_events: mpsc::Receiver<AudioEvent>,
}

async fn main_ui_loop(
    mut terminal: Terminal<CrosstermBackend<Stdout>>,
    app: Arc<Mutex<App>>,
    api: SimulationApi,
    commentary: CommentaryHandle,
    mut channels: Channels,
) {
    let mut loading = LoadingState::default();
    // Dropping the handle stops polling.
    let mut sync: Option<SyncHandle> = None;

    loop {
        let should_redraw = tokio::select! {
            Some(ui_event) = channels.ui_events.recv() => {
                handle_ui_event(ui_event, &app, &channels, &commentary).await
                    && !loading.is_loading
            }

            Some(response) = channels.network_responses.recv() => {
                let started = handle_network_response(response, &app, &mut loading).await;
                if started && sync.is_none() {
                    let (match_id, starts_at) = {
                        let guard = app.lock().await;
                        (guard.state.match_id, guard.starts_at())
                    };
                    info!("starting sync for match {match_id}");
                    sync = Some(
                        SyncWorker::new(api.clone(), match_id, starts_at, channels.sync_tx.clone())
                            .spawn(),
                    );
                }
                true
            }

            Some(sync_event) = channels.sync_events.recv() => {
                handle_sync_event(sync_event, &app).await && !loading.is_loading
            }

            Some(commentary_event) = channels.commentary_events.recv() => {
                handle_commentary_event(commentary_event, &app).await && !loading.is_loading
            }

            Some(audio_event) = channels.audio_events.recv() => {
                app.lock().await.on_audio_event(audio_event);
                !loading.is_loading
            }

            else => break,
        };

        let mut guard = app.lock().await;
        if guard.state.should_quit {
            break;
        }
        if should_redraw {
            draw::draw(&mut terminal, &mut guard, loading);
        }
    }

    drop(sync);
    commentary.shutdown(Duration::from_secs(1)).await;
}

async fn handle_ui_event(
    ui_event: UiEvent,
    app: &Arc<Mutex<App>>,
    channels: &Channels,
    commentary: &CommentaryHandle,
) -> bool {
    match ui_event {
        UiEvent::AppStarted => {
            let _ = channels.network_requests.send(NetworkRequest::LoadMatch).await;
            true
        }
        UiEvent::KeyPressed(key_event) => {
            keys::handle_key_bindings(
                key_event,
                app,
                &channels.network_requests,
                commentary,
                &channels.audio_commands,
            )
            .await;
            true
        }
        UiEvent::Resize => true,
        UiEvent::ClockTick => app.lock().await.on_clock_tick(),
    }
}

/// Returns true once the match screen can start syncing.
async fn handle_network_response(
    response: NetworkResponse,
    app: &Arc<Mutex<App>>,
    loading: &mut LoadingState,
) -> bool {
    match response {
        NetworkResponse::LoadingStateChanged { loading_state } => {
            *loading = loading_state;
            false
        }
        NetworkResponse::MatchLoaded { info, directory } => {
            app.lock().await.on_match_loaded(info, directory);
            true
        }
        NetworkResponse::Error { message } => {
            error!("Network error: {message}");
            app.lock().await.on_error(message);
            false
        }
    }
}

async fn handle_sync_event(event: SyncEvent, app: &Arc<Mutex<App>>) -> bool {
    let mut guard = app.lock().await;
    match event {
        SyncEvent::PhaseChanged(phase) => guard.on_phase_changed(phase),
        SyncEvent::EventsUpdated(events) => guard.on_events_updated(events),
        SyncEvent::StateUpdated(state) => guard.on_state_updated(state),
        SyncEvent::PollFailed(message) => guard.on_poll_failed(message),
    }
    true
}

async fn handle_commentary_event(event: CommentaryEvent, app: &Arc<Mutex<App>>) -> bool {
    let mut guard = app.lock().await;
    match event {
        CommentaryEvent::Connected => guard.on_commentary_connected(),
        CommentaryEvent::Disconnected => guard.on_commentary_disconnected(),
        CommentaryEvent::Message(msg) => guard.on_commentary_message(msg),
        CommentaryEvent::Error(message) => guard.on_commentary_error(message),
    }
    true
}

async fn input_handler_task(ui_events: mpsc::Sender<UiEvent>) {
    loop {
        let event = match tokio::task::spawn_blocking(crossterm_event::read).await {
            Ok(Ok(event)) => event,
            Ok(Err(_)) => continue,
            Err(_) => break,
        };
        let ui_event = match event {
            Event::Key(key_event) if key_event.is_press() => Some(UiEvent::KeyPressed(key_event)),
            Event::Resize(_, _) => Some(UiEvent::Resize),
            _ => None,
        };

        if let Some(ui_event) = ui_event
            && ui_events.send(ui_event).await.is_err()
        {
            break;
        }
    }
}

fn setup_terminal() -> io::Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, cursor::Hide)?;
    execute!(stdout, terminal::EnterAlternateScreen)?;
    execute!(stdout, terminal::Clear(terminal::ClearType::All))?;
    terminal::enable_raw_mode()
}

fn cleanup_terminal() {
    let mut stdout = io::stdout();
    let _ = execute!(stdout, cursor::MoveTo(0, 0));
    let _ = execute!(stdout, terminal::Clear(terminal::ClearType::All));
    let _ = execute!(stdout, terminal::LeaveAlternateScreen);
    let _ = execute!(stdout, cursor::Show);
    let _ = terminal::disable_raw_mode();
}

fn setup_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        cleanup_terminal();
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));
}
