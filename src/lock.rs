//! The one lock type behind every shared ledger in the crate.
//!
//! Access only goes through a closure, so no guard can outlive a call into the contexts. A
//! `parking_lot` mutex backs it by default; the `spin-lock` feature swaps in `spin` for targets
//! without OS threads.

#[cfg(not(feature = "spin-lock"))]
type Raw<T> = ::parking_lot::Mutex<T>;

#[cfg(feature = "spin-lock")]
type Raw<T> = ::spin::Mutex<T>;

pub(crate) struct SyncCell<T> {
    raw: Raw<T>,
}

impl<T> SyncCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            raw: Raw::new(value),
        }
    }

    /// Run `func` with exclusive access. Neither backend poisons, so a panic inside `func`
    /// leaves the value usable for the next caller.
    pub fn locked<U>(&self, func: impl FnOnce(&mut T) -> U) -> U {
        func(&mut self.raw.lock())
    }

    /// Move the value out, leaving its default behind.
    pub fn take(&self) -> T
    where
        T: Default,
    {
        self.locked(std::mem::take)
    }

    pub fn snapshot(&self) -> T
    where
        T: Clone,
    {
        self.locked(|value| value.clone())
    }
}

impl<T: Default> Default for SyncCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
