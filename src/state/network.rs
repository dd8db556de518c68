use crate::state::messages::{NetworkRequest, NetworkResponse};
use diamond_api::MatchId;
use diamond_api::client::{ApiError, SimulationApi};
use log::{debug, error, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

const SPINNER_CHARS: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
pub const ERROR_CHAR: char = '!';

#[derive(Debug, Copy, Clone)]
pub struct LoadingState {
    pub is_loading: bool,
    pub spinner_char: char,
}

impl Default for LoadingState {
    fn default() -> Self {
        Self {
            is_loading: false,
            spinner_char: ' ',
        }
    }
}

/// One-shot loads for the match screen. Live polling belongs to the sync
/// worker, not here.
pub struct NetworkWorker {
    client: SimulationApi,
    match_id: MatchId,
    requests: mpsc::Receiver<NetworkRequest>,
    responses: mpsc::Sender<NetworkResponse>,
    is_loading: Arc<AtomicBool>,
}

impl NetworkWorker {
    pub fn new(
        client: SimulationApi,
        match_id: MatchId,
        requests: mpsc::Receiver<NetworkRequest>,
        responses: mpsc::Sender<NetworkResponse>,
    ) -> Self {
        Self {
            client,
            match_id,
            requests,
            responses,
            is_loading: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            self.start_loading_animation().await;

            let result = match request {
                NetworkRequest::LoadMatch => self.handle_load_match().await,
            };

            debug!("network request complete");
            self.stop_loading_animation(result.is_ok()).await;

            let response = result.unwrap_or_else(|err| NetworkResponse::Error {
                message: err.to_string(),
            });

            if let Err(e) = self.responses.send(response).await {
                error!("Failed to send network response: {e}");
                break;
            }
        }
    }

    async fn handle_load_match(&self) -> Result<NetworkResponse, ApiError> {
        debug!("loading match {}", self.match_id);
        let info = self.client.fetch_match(self.match_id).await?;
        // The match screen still works with placeholders if the roster is down.
        let directory = match self.client.fetch_directory().await {
            Ok(directory) => directory,
            Err(e) => {
                warn!("roster unavailable, names will be placeholders: {e}");
                Default::default()
            }
        };
        Ok(NetworkResponse::MatchLoaded { info, directory })
    }

    async fn start_loading_animation(&self) {
        self.is_loading.store(true, Ordering::Relaxed);

        let mut loading_state = LoadingState {
            is_loading: true,
            spinner_char: SPINNER_CHARS[0],
        };
        let _ = self
            .responses
            .send(NetworkResponse::LoadingStateChanged { loading_state })
            .await;

        let responses = self.responses.clone();
        let is_loading = self.is_loading.clone();

        tokio::spawn(async move {
            let mut spinner_index = 1;
            let mut interval = tokio::time::interval(Duration::from_millis(33));
            loop {
                interval.tick().await;
                if !is_loading.load(Ordering::Relaxed) {
                    break;
                }
                loading_state.spinner_char = SPINNER_CHARS[spinner_index];
                spinner_index = (spinner_index + 1) % SPINNER_CHARS.len();
                let _ = responses
                    .send(NetworkResponse::LoadingStateChanged { loading_state })
                    .await;
            }
        });
    }

    async fn stop_loading_animation(&self, is_ok: bool) {
        self.is_loading.store(false, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(15)).await;

        let spinner_char = if is_ok { ' ' } else { ERROR_CHAR };
        let _ = self
            .responses
            .send(NetworkResponse::LoadingStateChanged {
                loading_state: LoadingState {
                    is_loading: false,
                    spinner_char,
                },
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn match_loads_without_roster() {
        let mut server = mockito::Server::new_async().await;
        let _match = server
            .mock("GET", "/api/simulations/5")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 5, "hometeam": 1, "awayteam": 2, "isFinished": false}"#)
            .create_async()
            .await;
        let _players = server
            .mock("GET", "/api/players")
            .with_status(500)
            .create_async()
            .await;

        let (req_tx, req_rx) = mpsc::channel(4);
        let (resp_tx, mut resp_rx) = mpsc::channel(64);
        let worker = NetworkWorker::new(SimulationApi::new(server.url()), 5, req_rx, resp_tx);
        tokio::spawn(worker.run());
        req_tx.send(NetworkRequest::LoadMatch).await.unwrap();

        loop {
            match resp_rx.recv().await {
                Some(NetworkResponse::MatchLoaded { info, directory }) => {
                    assert_eq!(info.home_team, 1);
                    assert!(directory.players.is_empty());
                    break;
                }
                Some(NetworkResponse::LoadingStateChanged { .. }) => continue,
                other => panic!("unexpected response: {other:?}"),
            }
        }
    }
}
