//! The two user-visible sinks: one progress bar, one error surface.
//!
//! Both forward every state change onto the client's broadcast channel; a
//! renderer only ever draws snapshots, it never owns the state.

use std::{sync::Arc, time::Duration};

use tokio::sync::{broadcast, Mutex};

use crate::PipelineEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    pub percent: u8,
    pub label: String,
    pub visible: bool,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            percent: 0,
            label: String::new(),
            visible: false,
        }
    }
}

#[derive(Default)]
struct ProgressInner {
    state: ProgressState,
    // Bumped by start/update so a pending deferred hide becomes stale.
    generation: u64,
}

#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<Mutex<ProgressInner>>,
    events: broadcast::Sender<PipelineEvent>,
    hide_delay: Duration,
}

impl ProgressReporter {
    pub(crate) fn new(events: broadcast::Sender<PipelineEvent>, hide_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProgressInner::default())),
            events,
            hide_delay,
        }
    }

    pub async fn start(&self, label: &str, percent: u8) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.state = ProgressState {
            percent: percent.min(100),
            label: label.to_string(),
            visible: true,
        };
        let _ = self.events.send(PipelineEvent::Progress(inner.state.clone()));
    }

    pub async fn update(&self, percent: u8, label: Option<&str>) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.state.percent = percent.min(100);
        if let Some(label) = label {
            inner.state.label = label.to_string();
        }
        inner.state.visible = true;
        let _ = self.events.send(PipelineEvent::Progress(inner.state.clone()));
    }

    /// Deferred so the bar does not vanish the instant a request settles; a
    /// later `start`/`update` cancels the pending hide.
    pub async fn hide(&self) {
        let generation = {
            let inner = self.inner.lock().await;
            if !inner.state.visible {
                return;
            }
            inner.generation
        };

        if self.hide_delay.is_zero() {
            self.apply_hide(generation).await;
            return;
        }

        let reporter = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(reporter.hide_delay).await;
            reporter.apply_hide(generation).await;
        });
    }

    async fn apply_hide(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation || !inner.state.visible {
            return;
        }
        inner.state.visible = false;
        let _ = self.events.send(PipelineEvent::Progress(inner.state.clone()));
    }

    pub async fn snapshot(&self) -> ProgressState {
        self.inner.lock().await.state.clone()
    }
}

#[derive(Clone)]
pub struct ErrorReporter {
    current: Arc<Mutex<Option<String>>>,
    events: broadcast::Sender<PipelineEvent>,
}

impl ErrorReporter {
    pub(crate) fn new(events: broadcast::Sender<PipelineEvent>) -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
            events,
        }
    }

    /// Replaces whatever is already showing; there is no queue.
    pub async fn show(&self, message: impl Into<String>) {
        let message = message.into();
        *self.current.lock().await = Some(message.clone());
        let _ = self.events.send(PipelineEvent::ErrorShown(message));
    }

    pub async fn hide(&self) {
        let mut current = self.current.lock().await;
        if current.take().is_some() {
            let _ = self.events.send(PipelineEvent::ErrorCleared);
        }
    }

    pub async fn current(&self) -> Option<String> {
        self.current.lock().await.clone()
    }
}
