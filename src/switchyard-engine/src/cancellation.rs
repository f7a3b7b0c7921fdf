//! Signal-driven cancellation with a bounded grace period.
//!
//! The controller owns two tokens. The cooperative token is handed to
//! filters and the command body and is cancelled by the first interrupt. The
//! timeout token fires once the grace period has elapsed after that first
//! interrupt without the run completing; the dispatcher then abandons the
//! command.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default grace period between the first interrupt and forced termination.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const RUNNING: u8 = 0;
const CANCEL_REQUESTED: u8 = 1;
const TIMEOUT_EXPIRED: u8 = 2;
const COMPLETED: u8 = 3;

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationState {
    Running,
    CancelRequested,
    TimeoutExpired,
    Completed,
}

impl CancellationState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            CANCEL_REQUESTED => Self::CancelRequested,
            TIMEOUT_EXPIRED => Self::TimeoutExpired,
            COMPLETED => Self::Completed,
            _ => Self::Running,
        }
    }
}

struct Inner {
    token: CancellationToken,
    timeout_token: CancellationToken,
    state: AtomicU8,
    grace: Duration,
}

impl Inner {
    fn request_cancel(&self) -> bool {
        if self
            .state
            .compare_exchange(RUNNING, CANCEL_REQUESTED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Cancellation already requested; ignoring");
            return false;
        }

        info!(
            grace_ms = self.grace.as_millis() as u64,
            "Cancellation requested"
        );
        self.token.cancel();
        true
    }
}

/// Cancellation state for a single dispatcher run.
///
/// Must be created inside a Tokio runtime: the grace countdown runs as a
/// task. Dropping the controller stops the countdown and releases any signal
/// subscription.
pub struct CancellationController {
    inner: Arc<Inner>,
    countdown: JoinHandle<()>,
    signals: Option<SignalSubscription>,
}

impl CancellationController {
    /// A controller with no OS signal subscription.
    pub fn new(grace: Duration) -> Self {
        let inner = Arc::new(Inner {
            token: CancellationToken::new(),
            timeout_token: CancellationToken::new(),
            state: AtomicU8::new(RUNNING),
            grace,
        });

        let countdown = {
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                inner.token.cancelled().await;
                tokio::time::sleep(inner.grace).await;
                if inner
                    .state
                    .compare_exchange(
                        CANCEL_REQUESTED,
                        TIMEOUT_EXPIRED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    warn!(
                        grace_ms = inner.grace.as_millis() as u64,
                        "Shutdown grace period elapsed; abandoning command"
                    );
                    inner.timeout_token.cancel();
                }
            })
        };

        Self {
            inner,
            countdown,
            signals: None,
        }
    }

    /// A controller that also listens for SIGINT, SIGQUIT and SIGTERM (Ctrl+C
    /// on other platforms) until it is dropped.
    pub fn install(grace: Duration) -> Self {
        let mut controller = Self::new(grace);
        controller.signals = SignalSubscription::subscribe(Arc::clone(&controller.inner));
        controller
    }

    /// Token observed by filters and the command body.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.child_token()
    }

    /// Token cancelled when the grace period expires.
    pub fn timeout_token(&self) -> CancellationToken {
        self.inner.timeout_token.clone()
    }

    /// Request cancellation. Only the first call has any effect.
    pub fn request_cancel(&self) -> bool {
        self.inner.request_cancel()
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Mark the run finished so the countdown can no longer expire.
    pub fn complete(&self) {
        for from in [RUNNING, CANCEL_REQUESTED] {
            if self
                .inner
                .state
                .compare_exchange(from, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }
        self.countdown.abort();
    }

    pub fn state(&self) -> CancellationState {
        CancellationState::from_raw(self.inner.state.load(Ordering::Acquire))
    }

    pub fn grace(&self) -> Duration {
        self.inner.grace
    }
}

impl Drop for CancellationController {
    fn drop(&mut self) {
        self.countdown.abort();
    }
}

#[cfg(unix)]
const TERMINATION_SIGNALS: [i32; 3] = [
    signal_hook::consts::SIGINT,
    signal_hook::consts::SIGQUIT,
    signal_hook::consts::SIGTERM,
];

/// True while no run holds a subscription. signal-hook keeps its process
/// handler installed after the first subscription, so while this is set the
/// handler performs the signal's default action instead.
#[cfg(unix)]
static SIGNALS_IDLE: std::sync::OnceLock<Arc<std::sync::atomic::AtomicBool>> =
    std::sync::OnceLock::new();

#[cfg(unix)]
static ACTIVE_RUNS: parking_lot::Mutex<usize> = parking_lot::const_mutex(0);

#[cfg(unix)]
fn idle_flag() -> &'static Arc<std::sync::atomic::AtomicBool> {
    SIGNALS_IDLE.get_or_init(|| {
        let idle = Arc::new(std::sync::atomic::AtomicBool::new(true));
        for signal in TERMINATION_SIGNALS {
            if let Err(e) = signal_hook::flag::register_conditional_default(signal, Arc::clone(&idle)) {
                warn!(signal, error = %e, "Failed to register default signal action");
            }
        }
        idle
    })
}

/// Whether termination signals currently get their default action.
#[cfg(all(unix, test))]
fn signals_idle() -> bool {
    SIGNALS_IDLE
        .get()
        .is_none_or(|idle| idle.load(Ordering::SeqCst))
}

/// Marks a run as holding the signals; the last one out restores the default.
#[cfg(unix)]
struct ActiveRun {
    idle: &'static std::sync::atomic::AtomicBool,
}

#[cfg(unix)]
impl ActiveRun {
    fn enter() -> Self {
        let idle: &'static std::sync::atomic::AtomicBool = idle_flag();
        let mut active = ACTIVE_RUNS.lock();
        *active += 1;
        idle.store(false, Ordering::SeqCst);
        Self { idle }
    }
}

#[cfg(unix)]
impl Drop for ActiveRun {
    fn drop(&mut self) {
        let mut active = ACTIVE_RUNS.lock();
        *active = active.saturating_sub(1);
        if *active == 0 {
            self.idle.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(unix)]
struct SignalSubscription {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
    // Dropped after the listener thread is joined.
    _active: ActiveRun,
}

#[cfg(unix)]
impl SignalSubscription {
    fn subscribe(inner: Arc<Inner>) -> Option<Self> {
        use signal_hook::iterator::Signals;

        let active = ActiveRun::enter();
        let mut signals = match Signals::new(TERMINATION_SIGNALS) {
            Ok(signals) => signals,
            Err(e) => {
                warn!(error = %e, "Failed to subscribe to termination signals");
                return None;
            }
        };
        let handle = signals.handle();

        let thread = std::thread::Builder::new()
            .name("switchyard-signals".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    debug!(signal, "Received termination signal");
                    inner.request_cancel();
                }
            });

        match thread {
            Ok(thread) => Some(Self {
                handle,
                thread: Some(thread),
                _active: active,
            }),
            Err(e) => {
                warn!(error = %e, "Failed to spawn signal listener");
                handle.close();
                None
            }
        }
    }
}

#[cfg(unix)]
impl Drop for SignalSubscription {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(not(unix))]
struct SignalSubscription {
    task: JoinHandle<()>,
}

#[cfg(not(unix))]
impl SignalSubscription {
    fn subscribe(inner: Arc<Inner>) -> Option<Self> {
        let task = tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                debug!("Received Ctrl+C");
                inner.request_cancel();
            }
        });
        Some(Self { task })
    }
}

#[cfg(not(unix))]
impl Drop for SignalSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
