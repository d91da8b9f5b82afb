use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::invocation::Invocation;
use crate::lock::SyncCell;

/// Type-erased stub body.
///
/// Returns `None` when the body has nothing left to give (an exhausted finite sequence),
/// in which case resolution continues with the next older stub.
pub type Implementation = Arc<dyn Fn(&Invocation) -> Option<Box<dyn Any>> + Send + Sync>;

#[derive(Clone)]
struct Stub {
    template: Invocation,
    implementation: Implementation,
}

/// Per-mock table of stubs, resolved with last-registered-wins precedence.
#[derive(Default)]
pub struct StubbingContext {
    stubs: SyncCell<HashMap<&'static str, Vec<Stub>>>,
}

impl StubbingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `implementation` for invocations equal to `template`.
    pub fn stub(&self, template: Invocation, implementation: Implementation) {
        self.stubs.locked(|stubs| {
            stubs
                .entry(template.selector_name())
                .or_default()
                .push(Stub {
                    template,
                    implementation,
                });
        });
    }

    ///
    /// Run the most recently registered stub whose template equals `invocation`.
    ///
    /// The table lock is released before any stub body runs, so bodies may call back into the
    /// mock.
    ///
    pub fn resolve(&self, invocation: &Invocation) -> Option<Box<dyn Any>> {
        let candidates = self.stubs.locked(|stubs| {
            stubs
                .get(invocation.selector_name())
                .cloned()
                .unwrap_or_default()
        });

        candidates
            .iter()
            .rev()
            .filter(|stub| &stub.template == invocation)
            .find_map(|stub| {
                trace!(%invocation, template = %stub.template, "stub matched");
                (stub.implementation)(invocation)
            })
    }

    pub fn clear_stubs(&self) {
        self.stubs.locked(|stubs| stubs.clear());
    }

    /// Selectors with at least one stub, sorted.
    pub fn stubbed_selectors(&self) -> Vec<&'static str> {
        let mut selectors: Vec<&'static str> = self.stubs.locked(|stubs| {
            stubs
                .iter()
                .filter(|(_, bucket)| !bucket.is_empty())
                .map(|(selector, _)| *selector)
                .collect()
        });
        selectors.sort_unstable();
        selectors
    }
}
