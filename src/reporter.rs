use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Failure;
use crate::lock::SyncCell;

/// Destination for test failures.
pub trait Reporter: Send + Sync {
    fn report(&self, failure: Failure);
}

/// Fails the test right away by panicking with the failure text.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanicReporter;

impl Reporter for PanicReporter {
    fn report(&self, failure: Failure) {
        panic!("{failure}");
    }
}

///
/// Collects failures so a test can keep running and see all of them at once.
///
/// A log that still holds failures when dropped panics with them, unless the thread is
/// already panicking or [FailureLog::finish] has been called.
///
/// ```rust,ignore
/// let log = FailureLog::new();
/// let bird = BirdMock::with_config(MockConfig::new("bird").reporter(log.reporter()));
/// verify(|| bird.fly()).was_called(once());
/// verify(|| bird.chirp()).was_called(once());
/// assert_eq!(2, log.failures().len());
/// ```
///
#[derive(Clone, Default)]
pub struct FailureLog {
    inner: Arc<LogInner>,
}

#[derive(Default)]
struct LogInner {
    failures: SyncCell<Vec<Failure>>,
    finished: AtomicBool,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reporter appending to this log.
    pub fn reporter(&self) -> Arc<dyn Reporter> {
        Arc::new(self.clone())
    }

    /// Failures reported so far.
    pub fn failures(&self) -> Vec<Failure> {
        self.inner.failures.snapshot()
    }

    /// Take all failures out of the log.
    pub fn drain(&self) -> Vec<Failure> {
        self.inner.failures.take()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.failures.locked(|failures| failures.is_empty())
    }

    /// Panic with every collected failure, if there are any.
    pub fn finish(self) {
        self.inner.finished.store(true, Ordering::SeqCst);
        let failures = self.drain();
        if !failures.is_empty() {
            panic!("{}", Summary(&failures));
        }
    }
}

impl Reporter for FailureLog {
    fn report(&self, failure: Failure) {
        tracing::debug!(%failure, "failure logged");
        self.inner.failures.locked(|failures| failures.push(failure));
    }
}

impl Drop for LogInner {
    fn drop(&mut self) {
        if std::thread::panicking() || self.finished.load(Ordering::SeqCst) {
            return;
        }

        let failures = self.failures.take();
        if !failures.is_empty() {
            panic!("{}", Summary(&failures));
        }
    }
}

struct Summary<'a>(&'a [Failure]);

impl<'a> std::fmt::Display for Summary<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut message = String::new();
        for (index, failure) in self.0.iter().enumerate() {
            if index > 0 {
                message.push_str("\n\n");
            }
            write!(message, "{failure}")?;
        }
        match self.0.len() {
            1 => write!(f, "{message}"),
            n => write!(f, "{n} test failures:\n\n{message}"),
        }
    }
}
