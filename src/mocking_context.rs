use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::invocation::Invocation;
use crate::lock::SyncCell;

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(0);

/// Identity token of an [InvocationObserver].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ObserverId(u64);

type Handler = Arc<dyn Fn(&Invocation, &[Invocation]) -> bool + Send + Sync>;

///
/// Callback notified about invocations recorded for one selector.
///
/// The handler receives the new invocation together with the selector's history up to and
/// including it, and returns `true` when it has consumed the invocation. Consumed observers are
/// removed, so every observer fires at most once.
///
/// The handler runs on whichever thread records the invocation.
///
#[derive(Clone)]
pub struct InvocationObserver {
    id: ObserverId,
    handler: Handler,
}

impl InvocationObserver {
    pub fn new(handler: impl Fn(&Invocation, &[Invocation]) -> bool + Send + Sync + 'static) -> Self {
        Self {
            id: ObserverId(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed)),
            handler: Arc::new(handler),
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    fn handle(&self, invocation: &Invocation, history: &[Invocation]) -> bool {
        (self.handler)(invocation, history)
    }
}

/// Per-mock ledger of recorded invocations and the observers waiting for them.
#[derive(Default)]
pub struct MockingContext {
    invocations: SyncCell<HashMap<&'static str, Vec<Invocation>>>,
    observers: SyncCell<Observers>,
    /// Held while invocations are stamped and delivered, keeping delivery in record order.
    delivery: SyncCell<()>,
}

#[derive(Default)]
struct Observers {
    by_selector: HashMap<&'static str, Vec<InvocationObserver>>,
    any_selector: Vec<InvocationObserver>,
}

impl Observers {
    fn waiting_on(&self, selector: &str) -> Vec<InvocationObserver> {
        self.by_selector
            .get(selector)
            .into_iter()
            .flatten()
            .chain(&self.any_selector)
            .cloned()
            .collect()
    }

    fn retain(&mut self, keep: impl Fn(&InvocationObserver) -> bool) {
        for bucket in self.by_selector.values_mut() {
            bucket.retain(&keep);
        }
        self.any_selector.retain(&keep);
    }
}

impl MockingContext {
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Append `invocation` to its selector's history, then notify the observers of that selector
    /// and those watching every selector.
    ///
    /// The invocation gets its [sequence](Invocation::sequence) number here, while no other
    /// record on this context can interleave.
    ///
    pub fn record(&self, invocation: Invocation) {
        let selector = invocation.selector_name();

        self.delivery.locked(|_| {
            let sequence = invocation.stamp();
            let observers = self
                .observers
                .locked(|observers| observers.waiting_on(selector));

            let history = self.invocations.locked(|invocations| {
                let bucket = invocations.entry(selector).or_default();
                bucket.push(invocation.clone());
                (!observers.is_empty()).then(|| bucket.clone())
            });
            trace!(%invocation, sequence, "recorded invocation");

            let Some(history) = history else {
                return;
            };

            let consumed: Vec<ObserverId> = observers
                .iter()
                .filter(|observer| observer.handle(&invocation, &history))
                .map(InvocationObserver::id)
                .collect();
            trace!(
                %invocation,
                notified = observers.len(),
                consumed = consumed.len(),
                "delivered invocation"
            );

            if !consumed.is_empty() {
                self.observers
                    .locked(|observers| observers.retain(|observer| !consumed.contains(&observer.id)));
            }
        });
    }

    /// The invocations recorded for `selector`, in call order.
    pub fn invocations(&self, selector: &str) -> Vec<Invocation> {
        self.invocations
            .locked(|invocations| invocations.get(selector).cloned().unwrap_or_default())
    }

    /// Every recorded invocation across all selectors, in call order.
    pub fn all_invocations(&self) -> Vec<Invocation> {
        let mut all: Vec<Invocation> = self
            .invocations
            .locked(|invocations| invocations.values().flatten().cloned().collect());
        all.sort_by_key(Invocation::sequence);
        all
    }

    /// Forget all recorded invocations. Observers stay registered.
    pub fn clear_invocations(&self) {
        self.invocations.locked(|invocations| invocations.clear());
    }

    ///
    /// Register `observer` for `selector`.
    ///
    /// The already recorded history is replayed first, so an observer whose condition is already
    /// met is consumed right away and never registered. Returns whether the observer is still
    /// waiting afterwards. Adding an observer that is already registered is a no-op.
    ///
    pub fn add_observer(&self, selector: &'static str, observer: InvocationObserver) -> bool {
        self.delivery.locked(|_| {
            let already_registered = self.observers.locked(|observers| {
                observers
                    .by_selector
                    .get(selector)
                    .map(|bucket| bucket.iter().any(|other| other.id == observer.id))
                    .unwrap_or(false)
            });
            if already_registered {
                return true;
            }

            let history = self.invocations(selector);
            for index in 0..history.len() {
                if observer.handle(&history[index], &history[..=index]) {
                    trace!(selector, "observer consumed a replayed invocation");
                    return false;
                }
            }

            self.observers.locked(|observers| {
                observers.by_selector.entry(selector).or_default().push(observer);
            });
            true
        })
    }

    ///
    /// Register `observer` for invocations of any selector.
    ///
    /// Nothing is replayed; the handler first runs for the next recorded invocation. It receives
    /// the history of that invocation's selector.
    ///
    pub fn add_observer_for_all(&self, observer: InvocationObserver) {
        self.delivery.locked(|_| {
            self.observers.locked(|observers| {
                if !observers.any_selector.iter().any(|other| other.id == observer.id) {
                    observers.any_selector.push(observer);
                }
            });
        });
    }

    pub fn remove_observer(&self, selector: &'static str, id: ObserverId) {
        self.observers.locked(|observers| {
            if let Some(bucket) = observers.by_selector.get_mut(selector) {
                bucket.retain(|observer| observer.id != id);
            }
        });
    }

    pub fn remove_observer_for_all(&self, id: ObserverId) {
        self.observers
            .locked(|observers| observers.any_selector.retain(|observer| observer.id != id));
    }

    /// Number of observers that `selector`'s next invocation would notify.
    pub fn observer_count(&self, selector: &str) -> usize {
        self.observers
            .locked(|observers| observers.waiting_on(selector).len())
    }
}
