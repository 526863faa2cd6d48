//! Ownership Scopes
//!
//! An owner collects the computations created while it is the current scope,
//! so a region that rebuilds its content can dispose what the previous build
//! left behind. Owners nest: an owner created inside another scope is owned
//! by that scope and is disposed with it.
//!
//! Nothing is owned outside of a scope. A computation created by a plain
//! `Computation::new` lives until it is disposed by hand.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::Mutex;

use super::computation::Computation;

thread_local! {
    static OWNER_STACK: RefCell<Vec<Owner>> = const { RefCell::new(Vec::new()) };
}

/// A disposal scope for computations.
#[derive(Clone, Default)]
pub struct Owner {
    inner: Arc<Mutex<Owned>>,
}

#[derive(Default)]
struct Owned {
    computations: Vec<Computation>,
    owners: Vec<Owner>,
}

impl Owner {
    /// Create an owner. Inside another owner's scope, the new owner is
    /// disposed along with that scope.
    pub fn new() -> Self {
        let owner = Self::default();
        if let Some(parent) = Self::current() {
            parent.inner.lock().owners.push(owner.clone());
        }
        owner
    }

    /// Run `f` with this owner as the current scope.
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        OWNER_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        let _scope = OwnerScope;
        f()
    }

    /// Dispose everything owned so far, including nested owners. The owner
    /// stays usable and starts out empty.
    pub fn dispose(&self) {
        let owned = std::mem::take(&mut *self.inner.lock());
        if !owned.computations.is_empty() {
            tracing::trace!(computations = owned.computations.len(), "disposing owned computations");
        }
        for computation in owned.computations {
            computation.dispose();
        }
        for owner in owned.owners {
            owner.dispose();
        }
    }

    /// Number of computations owned directly.
    pub fn len(&self) -> usize {
        self.inner.lock().computations.len()
    }

    /// Check if nothing is owned directly.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn current() -> Option<Owner> {
        OWNER_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Hand `computation` to the current owner, if there is one.
    pub(crate) fn adopt(computation: &Computation) {
        if let Some(owner) = Self::current() {
            owner.inner.lock().computations.push(computation.clone());
        }
    }
}

impl std::fmt::Debug for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Owner").field("computations", &self.len()).finish()
    }
}

/// Pops the owner stack when dropped.
struct OwnerScope;

impl Drop for OwnerScope {
    fn drop(&mut self) {
        OWNER_STACK.with(|stack| stack.borrow_mut().pop());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Cell;

    #[test]
    fn computations_outside_a_scope_are_not_owned() {
        let owner = Owner::new();
        let _free = Computation::new(|| {});
        assert!(owner.is_empty());
    }

    #[test]
    fn dispose_stops_owned_computations() {
        let cell = Cell::new(0);
        let owner = Owner::new();

        let c = cell.clone();
        let computation = owner.with(|| {
            Computation::new(move || {
                c.get();
            })
        });
        assert_eq!(owner.len(), 1);
        assert_eq!(cell.subscriber_count(), 1);

        owner.dispose();
        assert!(computation.is_disposed());
        assert_eq!(cell.subscriber_count(), 0);
        assert!(owner.is_empty());
    }

    #[test]
    fn nested_owner_is_disposed_with_its_parent() {
        let outer = Owner::new();
        let inner = outer.with(Owner::new);

        let computation = inner.with(|| Computation::new(|| {}));
        outer.dispose();

        assert!(computation.is_disposed());
    }
}
