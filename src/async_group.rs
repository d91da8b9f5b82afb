use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::{Failure, TestFailure};
use crate::lock::SyncCell;
use crate::mock::Mock;
use crate::mocking_context::{InvocationObserver, ObserverId};
use crate::ordered::OrderedCheck;
use crate::scope::{self, Deferral};
use crate::verification::{matching_count, PendingExpectation};

/// Verifications collected by one deferred block.
#[derive(Clone)]
pub(crate) struct AsyncGroup {
    inner: Arc<GroupInner>,
}

struct GroupInner {
    description: String,
    pending: SyncCell<Vec<Deferred>>,
}

enum Deferred {
    Single(PendingExpectation),
    /// An `in_order` block nested in the group.
    Ordered(OrderedCheck),
}

impl AsyncGroup {
    fn new(description: String) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                description,
                pending: SyncCell::new(vec![]),
            }),
        }
    }

    pub fn add(&self, pending: PendingExpectation) {
        debug!(
            group = %self.inner.description,
            invocation = %pending.invocation,
            "deferred verification"
        );
        self.inner
            .pending
            .locked(|entries| entries.push(Deferred::Single(pending)));
    }

    pub fn add_ordered(&self, check: OrderedCheck) {
        debug!(group = %self.inner.description, "deferred ordered verification");
        self.inner
            .pending
            .locked(|entries| entries.push(Deferred::Ordered(check)));
    }

    /// Turn the collected verifications into observers and hand out the completion handle.
    fn close(self) -> CompletionHandle {
        let pending = self.inner.pending.take();
        let description = self.inner.description.clone();
        let completion = Arc::new(Completion::new(pending.len()));

        // The completion must exist before any observer is added, replay may fulfill it.
        let entries = pending
            .into_iter()
            .enumerate()
            .map(|(index, deferred)| match deferred {
                Deferred::Single(pending) => Entry::observe(index, pending, &completion),
                Deferred::Ordered(check) => Entry::observe_ordered(index, check, &completion),
            })
            .collect();

        let handle = CompletionHandle {
            description,
            completion,
            entries,
            settled: AtomicBool::new(false),
        };
        debug!(
            group = %handle.description,
            required = handle.required_count(),
            fulfilled = handle.fulfilled_count(),
            "closed async verification group"
        );
        handle
    }
}

/// Builder returned by [begin_async_verification].
#[must_use = "run a block of verifications with `run`"]
pub struct AsyncVerification {
    description: String,
}

///
/// Open an async verification group.
///
/// Every `verify(..).was_called(..)` made inside the block passed to [AsyncVerification::run]
/// is deferred instead of checked: it becomes satisfied as soon as the mock has recorded enough
/// matching invocations, possibly later and on another thread.
///
pub fn begin_async_verification(description: impl Into<String>) -> AsyncVerification {
    AsyncVerification {
        description: description.into(),
    }
}

impl AsyncVerification {
    pub fn run(self, block: impl FnOnce()) -> CompletionHandle {
        debug!(group = %self.description, "opened async verification group");
        let group = AsyncGroup::new(self.description);
        {
            let _guard = scope::enter_deferral(Deferral::Async(group.clone()));
            block();
        }
        group.close()
    }
}

///
/// Shorthand for `begin_async_verification(description).run(block)`.
///
/// ```rust,ignore
/// let handle = eventually("bird takes off", || {
///     verify(|| bird.fly()).was_called(once());
/// });
/// std::thread::spawn(move || bird_clone.fly());
/// handle.wait_and_report(Duration::from_secs(1));
/// ```
///
pub fn eventually(description: impl Into<String>, block: impl FnOnce()) -> CompletionHandle {
    begin_async_verification(description).run(block)
}

struct Completion {
    state: Mutex<CompletionState>,
    condvar: Condvar,
    required: usize,
}

struct CompletionState {
    fulfilled: Vec<bool>,
    count: usize,
    wakers: Vec<Waker>,
}

impl Completion {
    fn new(required: usize) -> Self {
        Self {
            state: Mutex::new(CompletionState {
                fulfilled: vec![false; required],
                count: 0,
                wakers: vec![],
            }),
            condvar: Condvar::new(),
            required,
        }
    }

    /// Mark entry `index` as fulfilled. Repeated calls for the same entry count once.
    fn fulfill(&self, index: usize) {
        let wakers = {
            let mut state = self.state.lock();
            if state.fulfilled[index] {
                return;
            }
            state.fulfilled[index] = true;
            state.count += 1;
            if state.count < self.required {
                return;
            }
            std::mem::take(&mut state.wakers)
        };

        self.condvar.notify_all();
        for waker in wakers {
            waker.wake();
        }
    }

    fn count(&self) -> usize {
        self.state.lock().count
    }

    fn is_fulfilled(&self, index: usize) -> bool {
        self.state.lock().fulfilled[index]
    }
}

enum Entry {
    Single {
        pending: PendingExpectation,
        observer: ObserverId,
    },
    /// Watches every selector of every mock the ordered block involves.
    Ordered {
        check: OrderedCheck,
        mocks: Vec<Mock>,
        observer: ObserverId,
    },
}

impl Entry {
    fn observe(index: usize, pending: PendingExpectation, completion: &Arc<Completion>) -> Self {
        let template = pending.invocation.clone();
        let call_matcher = pending.expectation.call_matcher().clone();
        let selector = template.selector_name();

        let observer = InvocationObserver::new({
            let completion = completion.clone();
            let template = template.clone();
            let call_matcher = call_matcher.clone();
            move |_, history| {
                if call_matcher.matches(matching_count(history, &template)) {
                    debug!(invocation = %template, "async expectation fulfilled");
                    completion.fulfill(index);
                    true
                } else {
                    false
                }
            }
        });
        let id = observer.id();

        let context = pending.mock.mocking_context();
        if context.add_observer(selector, observer) {
            // Counts like `never()` or `at_most(n)` can hold before anything is recorded.
            let count = matching_count(&context.invocations(selector), &template);
            if call_matcher.matches(count) {
                context.remove_observer(selector, id);
                completion.fulfill(index);
            }
        }

        Self::Single {
            pending,
            observer: id,
        }
    }

    fn observe_ordered(index: usize, check: OrderedCheck, completion: &Arc<Completion>) -> Self {
        let observer = InvocationObserver::new({
            let completion = completion.clone();
            let check = check.clone();
            move |_, _| {
                if completion.is_fulfilled(index) {
                    return true;
                }
                if !check.evaluate().is_empty() {
                    return false;
                }
                debug!("async ordered expectation fulfilled");
                completion.fulfill(index);
                true
            }
        });
        let id = observer.id();

        let mocks = check.mocks();
        for mock in &mocks {
            mock.mocking_context().add_observer_for_all(observer.clone());
        }
        // Checked after registering, so no invocation falls between the check and the observers.
        let satisfied = check.evaluate().is_empty();
        let entry = Self::Ordered {
            check,
            mocks,
            observer: id,
        };
        if satisfied {
            entry.detach();
            completion.fulfill(index);
        }
        entry
    }

    fn detach(&self) {
        match self {
            Self::Single { pending, observer } => pending
                .mock
                .mocking_context()
                .remove_observer(pending.invocation.selector_name(), *observer),
            Self::Ordered {
                mocks, observer, ..
            } => {
                for mock in mocks {
                    mock.mocking_context().remove_observer_for_all(*observer);
                }
            }
        }
    }

    fn reporting_mock(&self) -> &Mock {
        match self {
            Self::Single { pending, .. } => &pending.mock,
            Self::Ordered { check, .. } => check.reporting_mock(),
        }
    }

    fn unsatisfied(&self, description: &str) -> Vec<Failure> {
        let pending = match self {
            Self::Single { pending, .. } => pending,
            Self::Ordered { check, .. } => return check.evaluate(),
        };
        let PendingExpectation {
            mock,
            invocation,
            expectation,
        } = pending;
        let history = mock.mocking_context().invocations(invocation.selector_name());
        let count = matching_count(&history, invocation);

        vec![Failure::new(
            TestFailure::UnsatisfiedAsyncExpectation {
                description: Some(description.to_string()),
                invocation: invocation.clone(),
                matcher_description: expectation.call_matcher().describe(invocation, count),
                count,
            },
            expectation.location(),
        )]
    }
}

///
/// Completion signal of an async verification group.
///
/// The group is fulfilled once every deferred verification has seen a satisfying count.
/// Wait for it with [CompletionHandle::wait], or `.await` it.
///
/// Dropping a handle that was neither fulfilled nor waited for reports every unfulfilled
/// verification through its mock's reporter.
///
pub struct CompletionHandle {
    description: String,
    completion: Arc<Completion>,
    entries: Vec<Entry>,
    settled: AtomicBool,
}

impl CompletionHandle {
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_fulfilled(&self) -> bool {
        self.fulfilled_count() >= self.required_count()
    }

    pub fn fulfilled_count(&self) -> usize {
        self.completion.count()
    }

    /// Number of deferred verifications in the group, counting a nested `in_order` block as one.
    pub fn required_count(&self) -> usize {
        self.completion.required
    }

    /// Block the current thread until the group is fulfilled or `timeout` elapses.
    ///
    /// On timeout, returns one failure per verification that is still unfulfilled.
    pub fn wait(&self, timeout: Duration) -> Result<(), Vec<Failure>> {
        {
            let mut state = self.completion.state.lock();
            let required = self.completion.required;
            let _ = self.completion.condvar.wait_while_for(
                &mut state,
                |state| state.count < required,
                timeout,
            );
        }
        self.settle()
    }

    /// Like [CompletionHandle::wait], reporting failures through each mock's reporter.
    pub fn wait_and_report(&self, timeout: Duration) {
        if self.wait(timeout).is_err() {
            self.report_unfulfilled();
        }
    }

    /// Wait asynchronously, for at most `timeout`.
    #[cfg(feature = "tokio")]
    pub async fn wait_async(mut self, timeout: Duration) -> Result<(), Vec<Failure>> {
        let _ = tokio_1::time::timeout(timeout, &mut self).await;
        self.settle()
    }

    /// Failures for every verification that is not fulfilled yet.
    pub fn unfulfilled(&self) -> Vec<Failure> {
        self.unfulfilled_entries()
            .into_iter()
            .flat_map(|entry| entry.unsatisfied(&self.description))
            .collect()
    }

    fn settle(&self) -> Result<(), Vec<Failure>> {
        self.settled.store(true, Ordering::SeqCst);
        if self.is_fulfilled() {
            Ok(())
        } else {
            Err(self.unfulfilled())
        }
    }

    fn report_unfulfilled(&self) {
        for entry in self.unfulfilled_entries() {
            for failure in entry.unsatisfied(&self.description) {
                entry.reporting_mock().reporter().report(failure);
            }
        }
    }

    fn unfulfilled_entries(&self) -> Vec<&Entry> {
        let fulfilled = self.completion.state.lock().fulfilled.clone();
        self.entries
            .iter()
            .zip(fulfilled)
            .filter(|(_, fulfilled)| !fulfilled)
            .map(|(entry, _)| entry)
            .collect()
    }
}

impl Future for CompletionHandle {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self.completion.state.lock();
        if state.count >= self.completion.required {
            drop(state);
            self.settled.store(true, Ordering::SeqCst);
            return Poll::Ready(());
        }
        if !state.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        for entry in &self.entries {
            entry.detach();
        }

        if self.settled.load(Ordering::SeqCst) || std::thread::panicking() {
            return;
        }

        if !self.is_fulfilled() {
            debug!(group = %self.description, "dropped unfulfilled async verification group");
            self.report_unfulfilled();
        }
    }
}

impl std::fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("description", &self.description)
            .field("required", &self.required_count())
            .field("fulfilled", &self.fulfilled_count())
            .finish()
    }
}
