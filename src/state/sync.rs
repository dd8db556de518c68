use chrono::{DateTime, Utc};
use diamond_api::client::{ApiResult, SimulationApi};
use diamond_api::{AtBatEvent, GameState, GameStateReply, GameStatus, MatchId};
use log::{debug, error, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep, sleep_until};

/// Source of the at-bat log and aggregate state.
pub trait MatchFeed: Send + Sync + 'static {
    fn at_bats(&self, match_id: MatchId)
    -> impl Future<Output = ApiResult<Vec<AtBatEvent>>> + Send;

    fn game_state(&self, match_id: MatchId)
    -> impl Future<Output = ApiResult<GameStateReply>> + Send;
}

impl MatchFeed for SimulationApi {
    fn at_bats(
        &self,
        match_id: MatchId,
    ) -> impl Future<Output = ApiResult<Vec<AtBatEvent>>> + Send {
        self.fetch_at_bats(match_id)
    }

    fn game_state(
        &self,
        match_id: MatchId,
    ) -> impl Future<Output = ApiResult<GameStateReply>> + Send {
        self.fetch_game_state(match_id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SyncTiming {
    pub poll: Duration,
    /// Time left for the last animations once the game is over.
    pub grace: Duration,
    /// How often a waiting client re-checks whether the game began early.
    pub recheck: Duration,
}

impl Default for SyncTiming {
    fn default() -> Self {
        Self {
            poll: Duration::from_secs(5),
            grace: Duration::from_secs(3),
            recheck: Duration::from_secs(3),
        }
    }
}

/// Phases only ever move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncPhase {
    #[default]
    Scheduled,
    Waiting,
    Live,
    Finished,
}

impl SyncPhase {
    pub fn label(self) -> &'static str {
        match self {
            SyncPhase::Scheduled => "SCHEDULED",
            SyncPhase::Waiting => "WAITING",
            SyncPhase::Live => "LIVE",
            SyncPhase::Finished => "FINISHED",
        }
    }
}

/// Locally held copy of the log and the last game state for one match.
#[derive(Debug, Clone, Default)]
pub struct MatchSync {
    phase: SyncPhase,
    events: Vec<AtBatEvent>,
    state: Option<GameState>,
}

impl MatchSync {
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn events(&self) -> &[AtBatEvent] {
        &self.events
    }

    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    /// Replace the log only when the fetched one is longer. Returns whether
    /// anything changed.
    pub fn apply_events(&mut self, fetched: Vec<AtBatEvent>) -> bool {
        if fetched.len() > self.events.len() {
            self.events = fetched;
            true
        } else {
            if fetched.len() < self.events.len() {
                debug!(
                    "ignoring shorter log ({} < {})",
                    fetched.len(),
                    self.events.len()
                );
            }
            false
        }
    }

    /// Last fetched wins.
    pub fn apply_state(&mut self, state: GameState) {
        self.state = Some(state);
    }

    pub fn advance(&mut self, to: SyncPhase) -> bool {
        if to > self.phase {
            self.phase = to;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone)]
pub enum SyncEvent {
    PhaseChanged(SyncPhase),
    /// Full replacement log, only sent when it grew.
    EventsUpdated(Vec<AtBatEvent>),
    StateUpdated(GameState),
    PollFailed(String),
}

/// Owns the polling lifecycle of one match view.
pub struct SyncWorker<F> {
    feed: F,
    match_id: MatchId,
    starts_at: Option<DateTime<Utc>>,
    timing: SyncTiming,
    sync: MatchSync,
    events: mpsc::Sender<SyncEvent>,
}

/// Closed receiver; the view is gone.
struct Detached;

impl<F: MatchFeed> SyncWorker<F> {
    pub fn new(
        feed: F,
        match_id: MatchId,
        starts_at: Option<DateTime<Utc>>,
        events: mpsc::Sender<SyncEvent>,
    ) -> Self {
        Self {
            feed,
            match_id,
            starts_at,
            timing: SyncTiming::default(),
            sync: MatchSync::default(),
            events,
        }
    }

    pub fn with_timing(mut self, timing: SyncTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn spawn(self) -> SyncHandle {
        SyncHandle {
            task: tokio::spawn(self.run()),
        }
    }

    pub async fn run(mut self) {
        if self.drive().await.is_err() {
            debug!("sync for match {} detached", self.match_id);
        }
    }

    async fn drive(&mut self) -> Result<(), Detached> {
        let status = self.poll_state().await?;
        match status {
            Some(GameStatus::Finished) => {
                info!("match {} already finished", self.match_id);
                self.poll_events().await?;
                return self.enter(SyncPhase::Finished).await;
            }
            Some(GameStatus::Playing) => {}
            _ => self.wait_for_start().await?,
        }

        self.enter(SyncPhase::Live).await?;
        self.poll_until_finished().await?;

        self.poll_events().await?;
        sleep(self.timing.grace).await;
        self.enter(SyncPhase::Finished).await
    }

    async fn wait_for_start(&mut self) -> Result<(), Detached> {
        self.enter(SyncPhase::Waiting).await?;

        let deadline = self.starts_at.map(|at| {
            let left = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            Instant::now() + left
        });
        let countdown = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(countdown);

        let mut recheck = interval(self.timing.recheck);
        recheck.set_missed_tick_behavior(MissedTickBehavior::Delay);
        recheck.tick().await;

        loop {
            tokio::select! {
                _ = &mut countdown => {
                    debug!("countdown for match {} expired", self.match_id);
                    return Ok(());
                }
                _ = recheck.tick() => {
                    if let Some(status) = self.poll_state().await?
                        && status.has_started()
                    {
                        debug!("match {} started before its countdown", self.match_id);
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Returns once a poll observes FINISHED. The interval is dropped with it.
    async fn poll_until_finished(&mut self) -> Result<(), Detached> {
        let mut ticker = interval(self.timing.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            debug!("poll tick for match {}", self.match_id);
            self.poll_events().await?;
            if self.poll_state().await? == Some(GameStatus::Finished) {
                return Ok(());
            }
        }
    }

    async fn poll_events(&mut self) -> Result<(), Detached> {
        match self.feed.at_bats(self.match_id).await {
            Ok(fetched) => {
                if self.sync.apply_events(fetched) {
                    self.emit(SyncEvent::EventsUpdated(self.sync.events().to_vec()))
                        .await?;
                }
                Ok(())
            }
            Err(e) => {
                warn!("at-bat poll failed: {e}");
                self.emit(SyncEvent::PollFailed(e.to_string())).await
            }
        }
    }

    /// `Ok(None)` when the server has no state yet or the request failed.
    async fn poll_state(&mut self) -> Result<Option<GameStatus>, Detached> {
        match self.feed.game_state(self.match_id).await {
            Ok(GameStateReply::Snapshot(state)) => {
                let status = state.status;
                self.sync.apply_state(state.clone());
                self.emit(SyncEvent::StateUpdated(state)).await?;
                Ok(Some(status))
            }
            Ok(GameStateReply::NotStarted) => Ok(None),
            Err(e) => {
                warn!("game-state poll failed: {e}");
                self.emit(SyncEvent::PollFailed(e.to_string())).await?;
                Ok(None)
            }
        }
    }

    async fn enter(&mut self, phase: SyncPhase) -> Result<(), Detached> {
        if self.sync.advance(phase) {
            info!("match {} → {}", self.match_id, phase.label());
            self.emit(SyncEvent::PhaseChanged(phase)).await?;
        }
        Ok(())
    }

    async fn emit(&self, event: SyncEvent) -> Result<(), Detached> {
        self.events.send(event).await.map_err(|e| {
            error!("Failed to send sync event: {e}");
            Detached
        })
    }
}

/// Aborts the sync task when dropped, so leaving a match view needs no
/// further tick to clean up.
#[derive(Debug)]
pub struct SyncHandle {
    task: JoinHandle<()>,
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_api::client::ApiError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted feed. Each state call pops the next reply; the last one
    /// repeats. Each log call returns one more event than the last.
    #[derive(Clone, Default)]
    struct FakeFeed {
        states: Arc<Mutex<Vec<Result<GameStatus, &'static str>>>>,
        log_failures: Arc<Mutex<Vec<bool>>>,
        log_calls: Arc<AtomicUsize>,
        state_calls: Arc<AtomicUsize>,
    }

    impl FakeFeed {
        fn scripted(states: Vec<Result<GameStatus, &'static str>>) -> Self {
            Self {
                states: Arc::new(Mutex::new(states)),
                ..Default::default()
            }
        }

        fn fail_logs(self, pattern: Vec<bool>) -> Self {
            *self.log_failures.lock().unwrap() = pattern;
            self
        }

        fn log_calls(&self) -> usize {
            self.log_calls.load(Ordering::SeqCst)
        }
    }

    impl MatchFeed for FakeFeed {
        fn at_bats(
            &self,
            _match_id: MatchId,
        ) -> impl Future<Output = ApiResult<Vec<AtBatEvent>>> + Send {
            let n = self.log_calls.fetch_add(1, Ordering::SeqCst);
            let mut failures = self.log_failures.lock().unwrap();
            let fail = if failures.is_empty() { false } else { failures.remove(0) };
            let reply = if fail {
                Err(ApiError::Other("connection reset".into()))
            } else {
                Ok((0..=n as u64)
                    .map(|id| AtBatEvent { id, inning: 1, ..Default::default() })
                    .collect())
            };
            std::future::ready(reply)
        }

        fn game_state(
            &self,
            match_id: MatchId,
        ) -> impl Future<Output = ApiResult<GameStateReply>> + Send {
            self.state_calls.fetch_add(1, Ordering::SeqCst);
            let mut states = self.states.lock().unwrap();
            let next = if states.len() > 1 { states.remove(0) } else { states[0] };
            let reply = match next {
                Ok(GameStatus::Ready) => Ok(GameStateReply::NotStarted),
                Ok(status) => Ok(GameStateReply::Snapshot(GameState {
                    match_id,
                    status,
                    ..Default::default()
                })),
                Err(msg) => Err(ApiError::Other(msg.into())),
            };
            std::future::ready(reply)
        }
    }

    async fn drain(rx: &mut mpsc::Receiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(event);
        }
        seen
    }

    fn phases(events: &[SyncEvent]) -> Vec<SyncPhase> {
        events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::PhaseChanged(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn shorter_logs_never_replace_longer_ones() {
        let mut sync = MatchSync::default();
        let three: Vec<AtBatEvent> = (0..3).map(|id| AtBatEvent { id, ..Default::default() }).collect();
        assert!(sync.apply_events(three.clone()));
        assert!(!sync.apply_events(three[..2].to_vec()));
        assert!(!sync.apply_events(three.clone()));
        assert_eq!(sync.events().len(), 3);
    }

    #[test]
    fn phases_only_move_forward() {
        let mut sync = MatchSync::default();
        assert!(sync.advance(SyncPhase::Live));
        assert!(!sync.advance(SyncPhase::Waiting));
        assert_eq!(sync.phase(), SyncPhase::Live);
        assert!(sync.advance(SyncPhase::Finished));
    }

    #[tokio::test(start_paused = true)]
    async fn finished_at_mount_fetches_once() {
        let feed = FakeFeed::scripted(vec![Ok(GameStatus::Finished)]);
        let (tx, mut rx) = mpsc::channel(32);
        let _handle = SyncWorker::new(feed.clone(), 1, None, tx).spawn();

        let seen = drain(&mut rx).await;
        assert_eq!(phases(&seen), vec![SyncPhase::Finished]);
        assert_eq!(feed.log_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn live_polling_stops_after_grace() {
        let feed = FakeFeed::scripted(vec![
            Ok(GameStatus::Playing),
            Ok(GameStatus::Playing),
            Ok(GameStatus::Finished),
        ]);
        let (tx, mut rx) = mpsc::channel(32);
        let started = Instant::now();
        let handle = SyncWorker::new(feed.clone(), 1, None, tx).spawn();

        let seen = drain(&mut rx).await;
        assert_eq!(phases(&seen), vec![SyncPhase::Live, SyncPhase::Finished]);
        // Ticks at 0s and 5s, then the final fetch and a 3s grace.
        assert_eq!(feed.log_calls(), 3);
        assert!(started.elapsed() >= Duration::from_secs(8));

        sleep(Duration::from_secs(60)).await;
        assert_eq!(feed.log_calls(), 3);
        assert!(handle.task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failures_are_retried_next_tick() {
        let feed = FakeFeed::scripted(vec![
            Ok(GameStatus::Playing),
            Err("503"),
            Ok(GameStatus::Playing),
            Ok(GameStatus::Finished),
        ])
        .fail_logs(vec![true, false]);
        let (tx, mut rx) = mpsc::channel(32);
        let _handle = SyncWorker::new(feed.clone(), 1, None, tx).spawn();

        let seen = drain(&mut rx).await;
        let failures = seen
            .iter()
            .filter(|e| matches!(e, SyncEvent::PollFailed(_)))
            .count();
        assert_eq!(failures, 2);
        assert_eq!(phases(&seen), vec![SyncPhase::Live, SyncPhase::Finished]);
        assert_eq!(feed.log_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_goes_live() {
        let feed = FakeFeed::scripted(vec![Ok(GameStatus::Ready)]);
        let (tx, mut rx) = mpsc::channel(32);
        let starts_at = Utc::now() + chrono::Duration::seconds(10);
        let started = Instant::now();
        let handle = SyncWorker::new(feed.clone(), 1, Some(starts_at), tx).spawn();

        assert!(matches!(rx.recv().await, Some(SyncEvent::PhaseChanged(SyncPhase::Waiting))));
        assert_eq!(feed.log_calls(), 0);
        assert!(matches!(rx.recv().await, Some(SyncEvent::PhaseChanged(SyncPhase::Live))));
        assert!(started.elapsed() >= Duration::from_secs(9));

        drop(handle);
        sleep(Duration::from_secs(1)).await;
        let calls = feed.log_calls();
        sleep(Duration::from_secs(30)).await;
        assert_eq!(feed.log_calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn early_start_is_detected_while_waiting() {
        let feed = FakeFeed::scripted(vec![
            Ok(GameStatus::Ready),
            Ok(GameStatus::Ready),
            Ok(GameStatus::Playing),
        ]);
        let (tx, mut rx) = mpsc::channel(32);
        let starts_at = Utc::now() + chrono::Duration::hours(1);
        let started = Instant::now();
        let _handle = SyncWorker::new(feed.clone(), 1, Some(starts_at), tx).spawn();

        loop {
            match rx.recv().await {
                Some(SyncEvent::PhaseChanged(SyncPhase::Live)) => break,
                Some(_) => continue,
                None => panic!("worker stopped before going live"),
            }
        }
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
