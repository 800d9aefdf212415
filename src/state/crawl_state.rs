use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::watch;

/// Crawl-wide state of the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlState {
    /// Running, but no eligible work anywhere; workers keep pulling
    Empty,

    /// Dispatching normally
    Run,

    /// No new dispatch; treated exactly like `Pause`
    Hold,

    /// No new dispatch; reached once in-flight work has drained
    Pause,

    /// Terminal; reached once in-flight work has drained
    Finish,
}

impl CrawlState {
    /// Returns true if workers may be handed new URIs in this state
    pub fn allows_dispatch(&self) -> bool {
        matches!(self, Self::Run | Self::Empty)
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Run => 1,
            Self::Hold => 2,
            Self::Pause => 3,
            Self::Finish => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Empty,
            1 => Self::Run,
            2 => Self::Hold,
            3 => Self::Pause,
            _ => Self::Finish,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Run => "RUN",
            Self::Hold => "HOLD",
            Self::Pause => "PAUSE",
            Self::Finish => "FINISH",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The (target, last reached) state pair
///
/// The target is what was asked for; the reached state is what the
/// supervisor has actually achieved. Observers subscribe to the reached state
/// to learn when a requested transition has completed.
pub struct CrawlStateCell {
    target: AtomicU8,
    reached: watch::Sender<Option<CrawlState>>,
}

impl CrawlStateCell {
    pub fn new(initial_target: CrawlState) -> Self {
        let (reached, _) = watch::channel(None);
        Self {
            target: AtomicU8::new(initial_target.to_u8()),
            reached,
        }
    }

    pub fn target(&self) -> CrawlState {
        CrawlState::from_u8(self.target.load(Ordering::SeqCst))
    }

    /// Replaces the target only if it still equals `expected`
    pub fn replace_target(&self, expected: CrawlState, state: CrawlState) -> bool {
        self.target
            .compare_exchange(
                expected.to_u8(),
                state.to_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// The last state the supervisor reached, if any
    pub fn reached(&self) -> Option<CrawlState> {
        *self.reached.borrow()
    }

    /// Records a reached state; returns true if it differs from the previous one
    pub fn mark_reached(&self, state: CrawlState) -> bool {
        self.reached.send_if_modified(|current| {
            if *current == Some(state) {
                false
            } else {
                *current = Some(state);
                true
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CrawlState>> {
        self.reached.subscribe()
    }

    /// Waits until the supervisor reports `state` as reached
    pub async fn wait_reached(&self, state: CrawlState) {
        let mut rx = self.reached.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|reached| *reached == Some(state)).await;
    }
}
