//! Reference counting with a last-release hook.
//!
//! Counts here are logical pins, separate from `Arc` strong counts: an object
//! may stay allocated (held by a cache or an unscoped handle) while its pin
//! count is zero. The zero transition is what callers observe, through the
//! callback registered with [`ReferenceProxy::register_on_no_ref_cb`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use tracing::error;

use crate::error::{CatalogError, Result};
use crate::resources::Id;

/// Invoked once each time the pin count transitions to zero.
pub type OnNoRefCallback = Box<dyn Fn() + Send + Sync>;

/// Atomic pin counter plus the zero-reference callback.
#[derive(Default)]
pub struct ReferenceProxy {
    refs: AtomicUsize,
    on_no_ref: OnceLock<OnNoRefCallback>,
}

impl ReferenceProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    /// Increment the pin count, returning the new count.
    pub fn add_ref(&self) -> usize {
        self.refs.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the pin count, returning the new count.
    ///
    /// Returns `None` without touching the count when it is already zero.
    /// The callback runs synchronously on the 1 -> 0 transition.
    pub fn release(&self) -> Option<usize> {
        let prev = self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()?;
        if prev == 1 {
            if let Some(cb) = self.on_no_ref.get() {
                cb();
            }
        }
        Some(prev - 1)
    }

    /// Install the zero-reference callback. Only the first registration wins.
    pub fn register_on_no_ref_cb<F>(&self, cb: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_no_ref.set(Box::new(cb)).is_ok()
    }

    pub fn has_on_no_ref_cb(&self) -> bool {
        self.on_no_ref.get().is_some()
    }
}

impl std::fmt::Debug for ReferenceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceProxy")
            .field("refs", &self.ref_count())
            .field("on_no_ref", &self.has_on_no_ref_cb())
            .finish()
    }
}

/// Anything carrying a [`ReferenceProxy`].
pub trait RefCounted: Send + Sync {
    fn proxy(&self) -> &ReferenceProxy;

    /// Type name used in diagnostics.
    fn ref_name(&self) -> &'static str;

    fn ref_id(&self) -> Id;

    fn ref_count(&self) -> usize {
        self.proxy().ref_count()
    }

    fn add_ref(&self) -> usize {
        self.proxy().add_ref()
    }

    /// Release one pin, reporting misuse instead of panicking.
    fn try_unref(&self) -> Result<usize> {
        self.proxy()
            .release()
            .ok_or_else(|| CatalogError::ReferenceMisuse {
                name: self.ref_name(),
                id: self.ref_id(),
            })
    }

    /// Release one pin.
    ///
    /// # Panics
    ///
    /// Panics when the count is already zero: a pin/release mismatch means the
    /// lifetime bookkeeping is corrupt.
    fn unref(&self) -> usize {
        match self.try_unref() {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "Reference count underflow");
                panic!("{e}");
            }
        }
    }
}
