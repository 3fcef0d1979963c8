//! One lazily-built resource per calling thread.
//!
//! Some resources, SQLite connections in particular, must not be shared
//! between threads. [`PerThreadResource`] builds one instance per thread on
//! first use and hands the same instance back on every later call from that
//! thread.
//!
//! Threads do not deregister themselves. Each call to [`PerThreadResource::get`]
//! sweeps the registry for threads that have exited and drops their
//! resources, running the optional destructor first. The sweep costs
//! O(registered threads) per call.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};

use crate::Error;

thread_local! {
    /// Dropped with the thread's locals; a dead `Weak` means the thread exited.
    static LIVENESS: Arc<()> = Arc::new(());
}

fn liveness_token() -> Weak<()> {
    LIVENESS.with(Arc::downgrade)
}

/// Shared handle onto one thread's resource.
pub type Handle<T> = Arc<Mutex<T>>;

type Factory<T> = Box<dyn Fn() -> Result<T, Error> + Send + Sync>;
type Destructor<T> = Box<dyn Fn(&mut T) + Send + Sync>;

struct Slot<T> {
    alive: Weak<()>,
    resource: Handle<T>,
}

/// Registry of per-thread resources built by a factory.
pub struct PerThreadResource<T> {
    factory: Factory<T>,
    destructor: RwLock<Option<Destructor<T>>>,
    slots: Mutex<HashMap<ThreadId, Slot<T>>>,
}

impl<T: Send + 'static> PerThreadResource<T> {
    /// Create a registry whose resources are built by `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<T, Error> + Send + Sync + 'static,
    {
        Self { factory: Box::new(factory), destructor: RwLock::new(None), slots: Mutex::new(HashMap::new()) }
    }

    /// Install a callback run on a resource when its thread is reclaimed.
    ///
    /// Replaces any previously installed destructor.
    pub fn set_destructor<D>(&self, destructor: D)
    where
        D: Fn(&mut T) + Send + Sync + 'static,
    {
        *self.destructor.write() = Some(Box::new(destructor));
    }

    /// Resource for the calling thread, built on first use.
    ///
    /// Factory errors propagate and leave nothing registered for the thread.
    pub fn get(&self) -> Result<Handle<T>, Error> {
        let id = thread::current().id();

        let existing = self.slots.lock().get(&id).map(|slot| Arc::clone(&slot.resource));
        let handle = match existing {
            Some(handle) => handle,
            None => {
                // The factory may do I/O; keep the registry unlocked meanwhile.
                let resource = (self.factory)()?;
                let handle = Arc::new(Mutex::new(resource));
                self.slots
                    .lock()
                    .insert(id, Slot { alive: liveness_token(), resource: Arc::clone(&handle) });
                tracing::debug!(thread = ?id, "built per-thread resource");
                handle
            }
        };

        self.reclaim_dead();
        Ok(handle)
    }

    /// Drop the calling thread's resource, running the destructor on it.
    ///
    /// Returns `false` if the thread had no resource. A later [`get`](Self::get)
    /// on the same thread builds a fresh one.
    pub fn release(&self) -> bool {
        let id = thread::current().id();
        let removed = self.slots.lock().remove(&id);
        match removed {
            Some(slot) => {
                self.destroy(slot.resource);
                true
            }
            None => false,
        }
    }

    /// Handles onto every resource currently registered.
    pub fn active_objects(&self) -> Vec<Handle<T>> {
        self.slots.lock().values().map(|slot| Arc::clone(&slot.resource)).collect()
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    fn reclaim_dead(&self) {
        let dead: Vec<(ThreadId, Slot<T>)> = {
            let mut slots = self.slots.lock();
            let ids: Vec<ThreadId> = slots
                .iter()
                .filter(|(_, slot)| slot.alive.strong_count() == 0)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| slots.remove(&id).map(|slot| (id, slot)))
                .collect()
        };

        for (id, slot) in dead {
            tracing::debug!(thread = ?id, "reclaiming resource of exited thread");
            self.destroy(slot.resource);
        }
    }

    fn destroy(&self, resource: Handle<T>) {
        if let Some(destructor) = self.destructor.read().as_ref() {
            destructor(&mut resource.lock());
        }
    }
}

impl<T> fmt::Debug for PerThreadResource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerThreadResource")
            .field("threads", &self.slots.lock().len())
            .finish_non_exhaustive()
    }
}
