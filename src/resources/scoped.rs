//! RAII pin on a reference-counted object.

use std::fmt;
use std::sync::Arc;

use super::proxy::RefCounted;

/// Checked-out reference to a [`RefCounted`] object.
///
/// A scoped handle takes one pin on construction and on every clone, and
/// releases one on drop. An unscoped handle only keeps the allocation alive;
/// it is for callers that manage pins themselves. The empty handle owns
/// nothing and stands for "not found".
pub struct ScopedResource<T: RefCounted> {
    res: Option<Arc<T>>,
    scoped: bool,
}

impl<T: RefCounted> ScopedResource<T> {
    pub fn new(res: Arc<T>, scoped: bool) -> Self {
        if scoped {
            res.add_ref();
        }
        Self {
            res: Some(res),
            scoped,
        }
    }

    pub fn scoped(res: Arc<T>) -> Self {
        Self::new(res, true)
    }

    pub fn unscoped(res: Arc<T>) -> Self {
        Self::new(res, false)
    }

    pub fn empty() -> Self {
        Self {
            res: None,
            scoped: false,
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.res.as_deref()
    }

    pub fn arc(&self) -> Option<&Arc<T>> {
        self.res.as_ref()
    }

    pub fn is_some(&self) -> bool {
        self.res.is_some()
    }

    pub fn is_none(&self) -> bool {
        self.res.is_none()
    }

    pub fn is_scoped(&self) -> bool {
        self.scoped
    }

    /// Same underlying object, by identity.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.res, &other.res) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: RefCounted> Clone for ScopedResource<T> {
    fn clone(&self) -> Self {
        match &self.res {
            Some(res) => Self::new(Arc::clone(res), self.scoped),
            None => Self::empty(),
        }
    }
}

impl<T: RefCounted> Default for ScopedResource<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: RefCounted> Drop for ScopedResource<T> {
    fn drop(&mut self) {
        if self.scoped {
            if let Some(res) = self.res.take() {
                res.unref();
            }
        }
    }
}

impl<T: RefCounted> fmt::Debug for ScopedResource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.res {
            Some(res) => f
                .debug_struct("ScopedResource")
                .field("name", &res.ref_name())
                .field("id", &res.ref_id())
                .field("refs", &res.ref_count())
                .field("scoped", &self.scoped)
                .finish(),
            None => f.write_str("ScopedResource(empty)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Id, ReferenceProxy};

    struct Tracked {
        id: Id,
        proxy: ReferenceProxy,
    }

    impl RefCounted for Tracked {
        fn proxy(&self) -> &ReferenceProxy {
            &self.proxy
        }

        fn ref_name(&self) -> &'static str {
            "Tracked"
        }

        fn ref_id(&self) -> Id {
            self.id
        }
    }

    fn tracked(id: Id) -> Arc<Tracked> {
        Arc::new(Tracked {
            id,
            proxy: ReferenceProxy::new(),
        })
    }

    #[test]
    fn test_scoped_handle_pins_for_its_lifetime() {
        let p = tracked(1);
        {
            let handle = ScopedResource::scoped(Arc::clone(&p));
            assert_eq!(p.ref_count(), 1);
            assert_eq!(handle.get().map(|r| r.ref_id()), Some(1));
        }
        assert_eq!(p.ref_count(), 0);
    }

    #[test]
    fn test_clone_takes_its_own_pin() {
        let p = tracked(2);
        let a = ScopedResource::scoped(Arc::clone(&p));
        let b = a.clone();
        assert_eq!(p.ref_count(), 2);
        assert!(a.ptr_eq(&b));
        drop(a);
        assert_eq!(p.ref_count(), 1);
        drop(b);
        assert_eq!(p.ref_count(), 0);
    }

    #[test]
    fn test_unscoped_handle_does_not_pin() {
        let p = tracked(3);
        let handle = ScopedResource::unscoped(Arc::clone(&p));
        let copy = handle.clone();
        assert_eq!(p.ref_count(), 0);
        assert!(!copy.is_scoped());
        drop(handle);
        drop(copy);
        assert_eq!(p.ref_count(), 0);
    }

    #[test]
    fn test_empty_handle() {
        let handle: ScopedResource<Tracked> = ScopedResource::default();
        assert!(handle.is_none());
        assert!(handle.get().is_none());
        assert!(handle.ptr_eq(&ScopedResource::empty()));
        let copy = handle.clone();
        assert!(copy.is_none());
    }
}
