use tracing::debug;

use crate::call_matcher::{never, CallMatcher};
use crate::error::{Failure, SourceLocation, TestFailure};
use crate::invocation::Invocation;
use crate::mock::Mock;
use crate::scope::{self, Captured, Deferral, ScopeKind};

/// What a single `verify(..).was_called(..)` expects.
#[derive(Clone)]
pub struct Expectation {
    call_matcher: CallMatcher,
    location: SourceLocation,
    deferral: Option<Deferral>,
}

impl Expectation {
    pub fn call_matcher(&self) -> &CallMatcher {
        &self.call_matcher
    }

    /// Where the `verify` call was written.
    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// Whether the expectation was collected by an async or ordered block.
    pub fn is_deferred(&self) -> bool {
        self.deferral.is_some()
    }
}

impl std::fmt::Debug for Expectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expectation")
            .field("location", &self.location)
            .field("deferred", &self.is_deferred())
            .finish_non_exhaustive()
    }
}

/// An expectation waiting to be resolved by the block that collected it.
#[derive(Clone)]
pub(crate) struct PendingExpectation {
    pub mock: Mock,
    pub invocation: Invocation,
    pub expectation: Expectation,
}

///
/// Handle returned by [verify], naming the invocation whose count is checked.
///
/// Dropping it without calling one of its methods checks nothing.
///
#[must_use = "call `was_called` or `was_never_called` to check the invocation count"]
pub struct Verification {
    mock: Mock,
    invocation: Invocation,
    location: SourceLocation,
    deferral: Option<Deferral>,
}

///
/// Start verifying the mock call made inside `expr`.
///
/// The closure is evaluated in a verification scope: the first mock method it calls is not
/// executed, only described. Arguments may be concrete values or matchers:
///
/// ```rust,ignore
/// verify(|| bird.eat(any())).was_called(at_least(2));
/// verify(|| bird.fly()).was_never_called();
/// ```
///
/// Failures are attributed to the line of the `verify` call.
///
/// The closure is left by unwinding once the mock call is captured, so this needs
/// `panic = "unwind"`. A `std::sync::Mutex` guard held across the mock call inside the closure
/// gets poisoned on the way out.
///
#[track_caller]
pub fn verify<R>(expr: impl FnOnce() -> R) -> Verification {
    let location = SourceLocation::caller();
    let deferral = scope::current_deferral();

    match scope::evaluate(ScopeKind::Verify, expr) {
        Some(Captured { mock, invocation }) => Verification {
            mock,
            invocation,
            location,
            deferral,
        },
        None => panic!(
            "{}",
            Failure::new(
                TestFailure::NoInvocationInScope {
                    scope: ScopeKind::Verify.name()
                },
                location
            )
        ),
    }
}

impl Verification {
    /// Check that the invocation's count satisfies `call_matcher`.
    ///
    /// Accepts any [CallMatcher] or a plain count, which means `exactly(count)`.
    pub fn was_called(self, call_matcher: impl Into<CallMatcher>) {
        let expectation = Expectation {
            call_matcher: call_matcher.into(),
            location: self.location,
            deferral: self.deferral,
        };
        expect(PendingExpectation {
            mock: self.mock,
            invocation: self.invocation,
            expectation,
        });
    }

    /// Same as `was_called(never())`.
    pub fn was_never_called(self) {
        self.was_called(never());
    }

    /// The invocation this handle verifies.
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }
}

fn expect(pending: PendingExpectation) {
    match pending.expectation.deferral.clone() {
        Some(Deferral::Async(group)) => group.add(pending),
        Some(Deferral::Ordered(group)) => group.add(pending),
        None => check_now(pending),
    }
}

fn check_now(pending: PendingExpectation) {
    let PendingExpectation {
        mock,
        invocation,
        expectation,
    } = pending;

    let all_invocations = mock.mocking_context().invocations(invocation.selector_name());
    let count = matching_count(&all_invocations, &invocation);

    if expectation.call_matcher.matches(count) {
        debug!(mock = mock.name(), %invocation, count, "verification passed");
        return;
    }

    debug!(mock = mock.name(), %invocation, count, "verification failed");
    let matcher_description = expectation.call_matcher.describe(&invocation, count);
    mock.reporter().report(Failure::new(
        TestFailure::IncorrectInvocationCount {
            invocation,
            count,
            matcher_description,
            all_invocations,
        },
        expectation.location,
    ));
}

/// How many of `history` equal `template`.
pub(crate) fn matching_count(history: &[Invocation], template: &Invocation) -> usize {
    history
        .iter()
        .filter(|recorded| template == *recorded)
        .count()
}
