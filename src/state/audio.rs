use log::{debug, info, warn};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Something that can play one cue to completion.
pub trait AudioSink: Send + 'static {
    /// Resolves once playback of `url` has finished.
    fn play(&self, url: String) -> impl Future<Output = Result<(), String>> + Send + 'static;
}

/// Terminal stand-in for a speaker: logs the cue and holds the queue for a
/// fixed cue length.
#[derive(Debug, Clone)]
pub struct TimedSink {
    pub cue: Duration,
}

impl AudioSink for TimedSink {
    fn play(&self, url: String) -> impl Future<Output = Result<(), String>> + Send + 'static {
        let cue = self.cue;
        async move {
            info!("♪ {url}");
            tokio::time::sleep(cue).await;
            Ok(())
        }
    }
}

/// FIFO of pending cues plus the one currently playing.
#[derive(Debug, Default)]
pub struct AudioQueue {
    pending: VecDeque<String>,
    playing: Option<String>,
    muted: bool,
}

impl AudioQueue {
    pub fn new(muted: bool) -> Self {
        Self {
            muted,
            ..Default::default()
        }
    }

    /// Dropped while muted.
    pub fn enqueue(&mut self, urls: impl IntoIterator<Item = String>) {
        if self.muted {
            return;
        }
        self.pending.extend(urls);
    }

    /// Next cue to start, only if nothing is playing.
    pub fn start_next(&mut self) -> Option<String> {
        if self.muted || self.playing.is_some() {
            return None;
        }
        let next = self.pending.pop_front()?;
        self.playing = Some(next.clone());
        Some(next)
    }

    pub fn finish(&mut self) -> Option<String> {
        self.playing.take()
    }

    /// Muting halts the current cue and forgets the rest.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if muted {
            self.clear();
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.playing = None;
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.playing.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCommand {
    Enqueue(Vec<String>),
    SetMuted(bool),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    Started(String),
    Finished(String),
    Failed { url: String, reason: String },
    Stopped,
}

type Playback = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// Single player consuming the queue one cue at a time.
pub struct AudioWorker<S> {
    sink: S,
    queue: AudioQueue,
    commands: mpsc::Receiver<AudioCommand>,
    events: mpsc::Sender<AudioEvent>,
}

impl<S: AudioSink> AudioWorker<S> {
    pub fn new(
        sink: S,
        muted: bool,
        commands: mpsc::Receiver<AudioCommand>,
        events: mpsc::Sender<AudioEvent>,
    ) -> Self {
        Self {
            sink,
            queue: AudioQueue::new(muted),
            commands,
            events,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let mut playback: Option<Playback> = None;

        loop {
            if playback.is_none()
                && let Some(url) = self.queue.start_next()
            {
                playback = Some(Box::pin(self.sink.play(url.clone())));
                let _ = self.events.send(AudioEvent::Started(url)).await;
            }

            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("audio queue closed");
                        break;
                    };
                    match command {
                        AudioCommand::Enqueue(urls) => self.queue.enqueue(urls),
                        AudioCommand::SetMuted(muted) => {
                            self.queue.set_muted(muted);
                            if muted && playback.take().is_some() {
                                let _ = self.events.send(AudioEvent::Stopped).await;
                            }
                        }
                        AudioCommand::Clear => {
                            self.queue.clear();
                            if playback.take().is_some() {
                                let _ = self.events.send(AudioEvent::Stopped).await;
                            }
                        }
                    }
                }
                result = wait_for(&mut playback) => {
                    playback = None;
                    let Some(url) = self.queue.finish() else {
                        continue;
                    };
                    let event = match result {
                        Ok(()) => AudioEvent::Finished(url),
                        Err(reason) => {
                            warn!("audio cue {url} failed: {reason}");
                            AudioEvent::Failed { url, reason }
                        }
                    };
                    let _ = self.events.send(event).await;
                    if self.queue.is_empty() {
                        debug!("audio queue drained");
                    }
                }
            }
        }
    }
}

async fn wait_for(playback: &mut Option<Playback>) -> Result<(), String> {
    match playback {
        Some(cue) => cue.await,
        None => std::future::pending().await,
    }
}
