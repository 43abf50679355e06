//! Cooperative cancellation for blocking remote calls.
//!
//! Every [`Backend`](crate::backend::Backend) method receives a [`CancelToken`].
//! A token fires when [`CancelToken::cancel`] is called or when its deadline
//! passes. A fired token turns the call into [`Error::Cancelled`]; the call is
//! never retried.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// How often a waiting call re-checks its token.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

/// Shared cancellation signal.
///
/// Clones share the same signal, so one clone can be handed to a signal
/// handler while another travels with the operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// A token that only fires when cancelled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also fires once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Instant::now().checked_add(timeout),
            }),
        }
    }

    /// Fire the token.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
            || self
                .inner
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// `Err(Error::Cancelled)` once the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Hand a finished call's result to the waiting caller.
///
/// Returns false when the caller already gave up. A successful result lost
/// that way may have changed the remote, so it is logged as a warning.
fn deliver<T>(tx: &Sender<Result<T>>, label: &str, result: Result<T>) -> bool {
    let succeeded = result.is_ok();
    match tx.send(result) {
        Ok(()) => true,
        Err(_) => {
            if succeeded {
                log::warn!("{label} completed after it was cancelled; its result was discarded");
            }
            false
        }
    }
}

/// Run a blocking call on a worker thread and stop waiting for it as soon as
/// `cancel` fires.
///
/// The worker is detached when the call is abandoned; its result is dropped.
/// Callers should also bound the call itself by [`CancelToken::remaining`]
/// so an abandoned worker does not outlive the deadline.
pub fn run_cancellable<T, F>(cancel: &CancelToken, label: &str, call: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    cancel.check()?;

    let (tx, rx) = mpsc::channel();
    let worker_label = label.to_string();
    thread::Builder::new()
        .name("scribae-remote".to_string())
        .spawn(move || {
            deliver(&tx, &worker_label, call());
        })
        .map_err(|e| Error::Other(format!("failed to spawn request thread: {e}")))?;

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(result) => return result,
            Err(RecvTimeoutError::Timeout) => {
                if cancel.is_cancelled() {
                    log::debug!("Abandoning in-flight {label}: cancelled");
                    return Err(Error::Cancelled);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::Other(
                    "request thread exited without a result".to_string(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
        assert!(token.remaining().is_none());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_deadline_fires() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());
        assert_eq!(token.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_run_cancellable_returns_result() {
        let token = CancelToken::new();
        let value = run_cancellable(&token, "answer", || Ok(42)).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_run_cancellable_passes_errors_through() {
        let token = CancelToken::new();
        let err = run_cancellable::<(), _>(&token, "boom", || Err(Error::Remote("boom".into())))
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_run_cancellable_refuses_fired_token() {
        let token = CancelToken::new();
        token.cancel();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let err = run_cancellable(&token, "flag", move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .unwrap_err();
        assert!(err.is_cancelled());
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_deliver_reports_abandoned_caller() {
        let (tx, rx) = mpsc::channel();
        assert!(deliver(&tx, "createProvider", Ok(1)));
        assert_eq!(rx.recv().unwrap().unwrap(), 1);

        drop(rx);
        assert!(!deliver(&tx, "createProvider", Ok(2)));
        assert!(!deliver::<i32>(&tx, "createProvider", Err(Error::Cancelled)));
    }

    #[test]
    fn test_run_cancellable_abandons_slow_call() {
        let token = CancelToken::with_timeout(Duration::from_millis(100));
        let started = Instant::now();
        let err = run_cancellable(&token, "sleep", || {
            thread::sleep(Duration::from_secs(5));
            Ok(())
        })
        .unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
