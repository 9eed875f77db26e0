//! Resources whose release is postponed until the request is finished.
//!
//! The registry owns every entry. Releasing is dropping, so each entry is
//! released exactly once: either by [`DeferredReleases::release_all`] at
//! teardown (or when the registry is dropped), or by handing it back to the
//! caller through [`DeferredReleases::cancel`].

use std::any::Any;
use std::fmt;

/// Ticket returned by [`DeferredReleases::defer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredHandle(usize);

#[derive(Default)]
pub struct DeferredReleases {
    slots: Vec<Option<Box<dyn Any + Send>>>,
}

impl DeferredReleases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `value` until teardown.
    pub fn defer<T: Any + Send>(&mut self, value: T) -> DeferredHandle {
        self.slots.push(Some(Box::new(value)));
        DeferredHandle(self.slots.len() - 1)
    }

    /// Remove an entry before teardown and give it back to the caller, who
    /// becomes responsible for it. Returns `None` if the handle was already
    /// cancelled or released.
    pub fn cancel(&mut self, handle: DeferredHandle) -> Option<Box<dyn Any + Send>> {
        self.slots.get_mut(handle.0).and_then(Option::take)
    }

    /// Like [`cancel`](Self::cancel) but downcasts to the original type.
    ///
    /// If the type does not match, the entry stays registered.
    pub fn cancel_as<T: Any + Send>(&mut self, handle: DeferredHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.0)?;
        if !slot.as_ref().is_some_and(|b| b.is::<T>()) {
            return None;
        }
        slot.take()
            .and_then(|b| b.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// Number of entries still waiting to be released.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Release every pending entry. Returns how many were released.
    ///
    /// Slots are emptied but kept, so a handle issued before the release
    /// never names an entry deferred after it.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for slot in &mut self.slots {
            if slot.take().is_some() {
                released += 1;
            }
        }
        released
    }
}

impl fmt::Debug for DeferredReleases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredReleases")
            .field("pending", &self.pending())
            .finish()
    }
}
