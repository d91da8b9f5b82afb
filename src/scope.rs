//!
//! Thread-confined side channel between `given`/`verify` and the mock being called.
//!
//! A scope installs a frame in a thread-local slot, evaluates the user's call-expression and then
//! takes the frame back out. When a mock is called while a capture frame is installed, the mock
//! stores its invocation in the frame and unwinds out of the call-expression instead of running a
//! stub, so no return value ever has to be produced. The slot is restored to its previous content
//! when the scope ends, whether the expression returned, exited or panicked.
//!
//! Scopes on different threads never see each other's frames.
//!
//! Leaving by unwinding has two consequences for callers. With `panic = "abort"` the first
//! capture aborts the process. Any `std::sync::Mutex` guard alive in the call-expression when the
//! mock is called is dropped during unwinding and poisons its mutex.
//!

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use crate::async_group::AsyncGroup;
use crate::invocation::Invocation;
use crate::mock::Mock;
use crate::ordered::OrderedGroup;

thread_local! {
    static CURRENT_SCOPE: RefCell<Option<Frame>> = const { RefCell::new(None) };
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ScopeKind {
    Given,
    Verify,
}

impl ScopeKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Given => "given",
            Self::Verify => "verify",
        }
    }
}

/// The mock and invocation a call-expression resolved to.
pub(crate) struct Captured {
    pub mock: Mock,
    pub invocation: Invocation,
}

/// A block that collects verifications instead of checking them right away.
#[derive(Clone)]
pub(crate) enum Deferral {
    Async(AsyncGroup),
    Ordered(OrderedGroup),
}

enum Frame {
    Capture {
        kind: ScopeKind,
        captured: Option<Captured>,
    },
    Deferred(Deferral),
}

/// Unwind payload used to leave a call-expression once its invocation is captured.
struct ScopeExit;

/// Restores the previous frame when dropped.
pub(crate) struct ScopeGuard {
    previous: Option<Option<Frame>>,
}

impl ScopeGuard {
    fn install(frame: Frame) -> Self {
        let previous = CURRENT_SCOPE.with(|slot| slot.borrow_mut().replace(frame));
        Self {
            previous: Some(previous),
        }
    }

    /// Restore the previous frame and hand back the one this guard installed.
    fn finish(mut self) -> Option<Frame> {
        self.restore()
    }

    fn restore(&mut self) -> Option<Frame> {
        let previous = self.previous.take()?;
        CURRENT_SCOPE.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), previous))
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Evaluate `expr` with a capture frame installed, returning the first mock call it made.
///
/// Panics raised by `expr` itself are propagated unchanged.
pub(crate) fn evaluate<R>(kind: ScopeKind, expr: impl FnOnce() -> R) -> Option<Captured> {
    let guard = ScopeGuard::install(Frame::Capture {
        kind,
        captured: None,
    });
    let result = panic::catch_unwind(AssertUnwindSafe(expr));
    let frame = guard.finish();

    if let Err(payload) = result {
        if !payload.is::<ScopeExit>() {
            panic::resume_unwind(payload);
        }
    }

    match frame {
        Some(Frame::Capture { captured, .. }) => captured,
        _ => None,
    }
}

/// Offer `invocation` to the scope active on this thread.
///
/// Returns the kind of scope that took it, in which case the caller must leave through [exit].
pub(crate) fn capture(mock: &Mock, invocation: &Invocation) -> Option<ScopeKind> {
    CURRENT_SCOPE.with(|slot| match &mut *slot.borrow_mut() {
        Some(Frame::Capture {
            kind,
            captured: captured @ None,
        }) => {
            *captured = Some(Captured {
                mock: mock.clone(),
                invocation: invocation.clone(),
            });
            Some(*kind)
        }
        _ => None,
    })
}

/// Leave the call-expression of the current scope. Requires `panic = "unwind"`.
pub(crate) fn exit() -> ! {
    panic::resume_unwind(Box::new(ScopeExit))
}

/// The deferring block active on this thread, if any.
pub(crate) fn current_deferral() -> Option<Deferral> {
    CURRENT_SCOPE.with(|slot| match &*slot.borrow() {
        Some(Frame::Deferred(deferral)) => Some(deferral.clone()),
        _ => None,
    })
}

/// Make `deferral` the target of `verify` calls on this thread until the guard drops.
pub(crate) fn enter_deferral(deferral: Deferral) -> ScopeGuard {
    ScopeGuard::install(Frame::Deferred(deferral))
}
