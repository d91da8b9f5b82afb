use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;

use crate::matcher::ArgumentMatcher;

/// Process-wide record counter, so invocations on different mocks have a total order.
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// An immutable record of one call made against a mock.
///
/// Cloning is cheap; clones share the same record.
#[derive(Clone)]
pub struct Invocation {
    inner: Arc<InvocationInner>,
}

struct InvocationInner {
    selector_name: &'static str,
    arguments: Vec<ArgumentMatcher>,
    timestamp: Instant,
    sequence: OnceCell<u64>,
}

impl Invocation {
    pub fn new(selector_name: &'static str, arguments: Vec<ArgumentMatcher>) -> Self {
        Self {
            inner: Arc::new(InvocationInner {
                selector_name,
                arguments,
                timestamp: Instant::now(),
                sequence: OnceCell::new(),
            }),
        }
    }

    /// The method identifier, used as the bucket key in the contexts.
    pub fn selector_name(&self) -> &'static str {
        self.inner.selector_name
    }

    pub fn arguments(&self) -> &[ArgumentMatcher] {
        &self.inner.arguments
    }

    pub fn timestamp(&self) -> Instant {
        self.inner.timestamp
    }

    ///
    /// Position in the global record order, or `None` for an invocation that was never recorded
    /// (a stubbing or verification template).
    ///
    /// The number is taken when a mocking context appends the invocation to its history, so it
    /// agrees with the order of every per-selector history.
    ///
    pub fn sequence(&self) -> Option<u64> {
        self.inner.sequence.get().copied()
    }

    /// Stamp the next record position. Re-stamping keeps the first number.
    pub(crate) fn stamp(&self) -> u64 {
        *self
            .inner
            .sequence
            .get_or_init(|| NEXT_SEQUENCE.fetch_add(1, Ordering::SeqCst))
    }

    /// The concrete value passed at `index`, if it was a value of type `T`.
    ///
    /// Returns `None` for wildcard arguments and for type mismatches.
    pub fn argument<T: 'static>(&self, index: usize) -> Option<&T> {
        self.inner.arguments.get(index)?.base_as::<T>()
    }
}

impl PartialEq for Invocation {
    fn eq(&self, other: &Self) -> bool {
        self.arguments().len() == other.arguments().len()
            && self
                .arguments()
                .iter()
                .zip(other.arguments())
                .all(|(lhs, rhs)| lhs == rhs)
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.selector_name())?;
        for (index, argument) in self.arguments().iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{argument}")?;
        }
        write!(f, ")")
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.sequence() {
            Some(sequence) => write!(f, "{self} #{sequence}"),
            None => write!(f, "{self}"),
        }
    }
}
