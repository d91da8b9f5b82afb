use std::sync::Arc;

use crate::lock::SyncCell;
use crate::matcher::{Arg, ArgumentMatcher};

///
/// Records the arguments a verification was compared against.
///
/// ```rust,ignore
/// let names = ArgumentCaptor::new();
/// verify(|| bird.set_name(names.matcher())).was_called(twice());
/// assert_eq!(Some("Ryan".to_string()), names.value());
/// ```
///
/// The captor matches every value of type `T`. Each recorded invocation the verification looks
/// at is captured, in call order.
///
#[derive(Clone)]
pub struct ArgumentCaptor<T> {
    values: Arc<SyncCell<Vec<T>>>,
}

impl<T: Clone + Send + Sync + 'static> ArgumentCaptor<T> {
    pub fn new() -> Self {
        Self {
            values: Arc::new(SyncCell::new(vec![])),
        }
    }

    /// A wildcard argument that captures what it is compared against.
    pub fn matcher(&self) -> Arg<T> {
        let values = self.values.clone();
        Arg::matcher(ArgumentMatcher::predicate::<T>("captor()", move |value| {
            values.locked(|values| values.push(value.clone()));
            true
        }))
    }

    pub fn all_values(&self) -> Vec<T> {
        self.values.snapshot()
    }

    /// The most recently captured value.
    pub fn value(&self) -> Option<T> {
        self.values.locked(|values| values.last().cloned())
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ArgumentCaptor<T> {
    fn default() -> Self {
        Self::new()
    }
}
