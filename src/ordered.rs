use std::sync::Arc;

use tracing::debug;

use crate::error::{Failure, SourceLocation, TestFailure};
use crate::invocation::Invocation;
use crate::lock::SyncCell;
use crate::mock::Mock;
use crate::scope::{self, Deferral};
use crate::verification::PendingExpectation;

/// Extra constraints for [in_order].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OrderedVerificationOptions {
    /// Fail if the involved mocks recorded anything before the first verified invocation.
    pub no_invocations_before: bool,
    /// Fail if the involved mocks recorded anything after the last verified invocation.
    pub no_invocations_after: bool,
    /// Fail if the involved mocks recorded anything between the verified invocations.
    pub only_consecutive_invocations: bool,
}

impl OrderedVerificationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_invocations_before(mut self) -> Self {
        self.no_invocations_before = true;
        self
    }

    pub fn no_invocations_after(mut self) -> Self {
        self.no_invocations_after = true;
        self
    }

    pub fn only_consecutive_invocations(mut self) -> Self {
        self.only_consecutive_invocations = true;
        self
    }
}

/// Verifications collected by an [in_order] block.
#[derive(Clone, Default)]
pub(crate) struct OrderedGroup {
    pending: Arc<SyncCell<Vec<PendingExpectation>>>,
}

impl OrderedGroup {
    pub fn add(&self, pending: PendingExpectation) {
        self.pending.locked(|entries| entries.push(pending));
    }
}

///
/// Verify that the calls checked inside `block` happened in the order they are written.
///
/// Each verification counts the matching calls recorded between the previous and the next
/// verified call. The block passes when some choice of those boundaries satisfies every count
/// at once; otherwise a single failure lists all expectations and the recorded calls.
/// Invocations are ordered across all mocks.
///
/// ```rust,ignore
/// in_order(OrderedVerificationOptions::new().no_invocations_after(), || {
///     verify(|| bird.can_fly()).was_called(once());
///     verify(|| bird.fly()).was_called(twice());
/// });
/// ```
///
/// Inside an `eventually` block the check is deferred like any other verification and is
/// fulfilled once the recorded calls satisfy it.
///
#[track_caller]
pub fn in_order(options: OrderedVerificationOptions, block: impl FnOnce()) {
    let location = SourceLocation::caller();
    let enclosing = scope::current_deferral();
    let group = OrderedGroup::default();
    {
        let _guard = scope::enter_deferral(Deferral::Ordered(group.clone()));
        block();
    }
    let expectations = group.pending.take();
    if expectations.is_empty() {
        return;
    }

    let check = OrderedCheck {
        expectations,
        options,
        location,
    };
    match enclosing {
        Some(Deferral::Async(group)) => group.add_ordered(check),
        _ => check.report(),
    }
}

/// The expectations of one [in_order] block, checkable at any time.
#[derive(Clone)]
pub(crate) struct OrderedCheck {
    expectations: Vec<PendingExpectation>,
    options: OrderedVerificationOptions,
    location: SourceLocation,
}

type Recorded = (u64, Invocation);

struct Step<'a> {
    pending: &'a PendingExpectation,
    /// Recorded calls matching the verified invocation, in record order.
    matching: Vec<Recorded>,
}

impl OrderedCheck {
    /// The mock whose reporter receives this block's failures.
    pub fn reporting_mock(&self) -> &Mock {
        &self.expectations[0].mock
    }

    /// Every distinct mock a verification in the block refers to.
    pub fn mocks(&self) -> Vec<Mock> {
        let mut mocks: Vec<Mock> = vec![];
        for pending in &self.expectations {
            if !mocks.iter().any(|mock| mock.ptr_eq(&pending.mock)) {
                mocks.push(pending.mock.clone());
            }
        }
        mocks
    }

    fn report(&self) {
        let reporter = self.reporting_mock().reporter();
        for failure in self.evaluate() {
            reporter.report(failure);
        }
    }

    /// Check the block against what is recorded now. Empty when it holds.
    pub fn evaluate(&self) -> Vec<Failure> {
        let steps: Vec<Step> = self
            .expectations
            .iter()
            .map(|pending| Step {
                pending,
                matching: pending
                    .mock
                    .mocking_context()
                    .invocations(pending.invocation.selector_name())
                    .into_iter()
                    .filter(|recorded| pending.invocation == *recorded)
                    .filter_map(|recorded| Some((recorded.sequence()?, recorded)))
                    .collect(),
            })
            .collect();

        let mocks = self.mocks();
        let Some(solution) = solve(&steps, None) else {
            debug!(location = %self.location, "ordered verification unsatisfiable");
            return vec![self.failure(TestFailure::UnsatisfiableExpectations {
                expectations: self
                    .expectations
                    .iter()
                    .zip(&steps)
                    .map(|(pending, step)| {
                        let count = step.matching.len();
                        (
                            pending.invocation.clone(),
                            pending.expectation.call_matcher().describe(&pending.invocation, count),
                        )
                    })
                    .collect(),
                all_invocations: recorded_where(&mocks, |_| true),
            })];
        };

        let mut counted: Vec<&Recorded> = solution.iter().flatten().collect();
        counted.sort_by_key(|(sequence, _)| *sequence);
        let (Some((first, first_call)), Some((last, last_call))) = (counted.first(), counted.last())
        else {
            return vec![];
        };

        let mut failures = vec![];
        if self.options.no_invocations_before {
            let unexpected = recorded_where(&mocks, |sequence| sequence < *first);
            failures.extend(self.unexpected(first_call, unexpected, true));
        }
        if self.options.only_consecutive_invocations {
            failures.extend(self.gaps(&mocks, &counted));
        }
        if self.options.no_invocations_after {
            let unexpected = recorded_where(&mocks, |sequence| sequence > *last);
            failures.extend(self.unexpected(last_call, unexpected, false));
        }
        failures
    }

    /// Uncounted calls between counted ones, reported before the counted call they precede.
    fn gaps(&self, mocks: &[Mock], counted: &[&Recorded]) -> Vec<Failure> {
        let mut failures = vec![];
        for pair in counted.windows(2) {
            let ((from, _), (to, base)) = (pair[0], pair[1]);
            let unexpected = recorded_where(mocks, |sequence| *from < sequence && sequence < *to);
            failures.extend(self.unexpected(base, unexpected, true));
        }
        failures
    }

    fn unexpected(
        &self,
        base: &Invocation,
        unexpected: Vec<Invocation>,
        prior_to_base: bool,
    ) -> Option<Failure> {
        if unexpected.is_empty() {
            return None;
        }
        Some(self.failure(TestFailure::UnexpectedInvocations {
            base: base.clone(),
            unexpected,
            prior_to_base,
        }))
    }

    fn failure(&self, failure: TestFailure) -> Failure {
        Failure::new(failure, self.location)
    }
}

///
/// Find the calls each step counts, given that the previous step's last counted call is
/// `cursor`.
///
/// A step may stop after any number of its matching calls. Whatever it stops at becomes the
/// cursor of the next step, and the step then counts every matching call up to the first call
/// counted by a later step. The first choice under which all steps hold wins.
///
fn solve(steps: &[Step], cursor: Option<u64>) -> Option<Vec<Vec<Recorded>>> {
    let Some((step, rest)) = steps.split_first() else {
        return Some(vec![]);
    };
    let call_matcher = step.pending.expectation.call_matcher();
    let candidates: Vec<&Recorded> = step
        .matching
        .iter()
        .filter(|(sequence, _)| cursor.map_or(true, |cursor| *sequence > cursor))
        .collect();

    if rest.is_empty() {
        return call_matcher
            .matches(candidates.len())
            .then(|| vec![candidates.into_iter().cloned().collect()]);
    }

    for taken in 0..=candidates.len() {
        if !call_matcher.matches(taken) {
            continue;
        }
        let next_cursor = candidates[..taken]
            .last()
            .map(|(sequence, _)| *sequence)
            .or(cursor);
        let Some(mut solution) = solve(rest, next_cursor) else {
            continue;
        };

        let bound = solution.iter().flatten().map(|(sequence, _)| *sequence).min();
        let counted: Vec<Recorded> = candidates
            .iter()
            .filter(|(sequence, _)| bound.map_or(true, |bound| *sequence < bound))
            .map(|recorded| (*recorded).clone())
            .collect();
        if !call_matcher.matches(counted.len()) {
            continue;
        }
        solution.insert(0, counted);
        return Some(solution);
    }
    None
}

fn recorded_where(mocks: &[Mock], predicate: impl Fn(u64) -> bool) -> Vec<Invocation> {
    let mut invocations: Vec<Invocation> = mocks
        .iter()
        .flat_map(|mock| mock.mocking_context().all_invocations())
        .filter(|invocation| invocation.sequence().map_or(false, &predicate))
        .collect();
    invocations.sort_by_key(Invocation::sequence);
    invocations
}
