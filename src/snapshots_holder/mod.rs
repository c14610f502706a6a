//! Per-collection version window.
//!
//! A [`SnapshotsHolder`] keeps the newest `num_versions` snapshots of one
//! collection. Admission builds the snapshot outside the window lock; the
//! window itself is only locked for map updates and handle checkout.
//! Versions pushed out of the window go to a reclamation worker, which drops
//! the window's pin off the hot path. A snapshot's entity pins are released
//! when its last pin goes, whether that is the worker's or a reader's.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{CatalogError, Result};
use crate::holders::Holders;
use crate::resources::{Id, Ids, RefCounted, ScopedResource};
use crate::snapshot::{ScopedSnapshot, Snapshot};

#[derive(Default)]
struct Window {
    min_id: Id,
    max_id: Id,
    active: BTreeMap<Id, Arc<Snapshot>>,
}

/// Bounded window of live snapshot versions for one collection.
pub struct SnapshotsHolder {
    collection_id: Id,
    holders: Arc<Holders>,
    num_versions: usize,
    window: Mutex<Window>,
    done: AtomicBool,
    retired: mpsc::UnboundedSender<Arc<Snapshot>>,
    shutdown: watch::Sender<bool>,
    released: Arc<AtomicUsize>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SnapshotsHolder {
    /// Create an empty window and spawn its reclamation worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(collection_id: Id, holders: Arc<Holders>, num_versions: usize) -> Self {
        let (retired, retired_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let released = Arc::new(AtomicUsize::new(0));
        let worker = spawn_reclaimer(
            collection_id,
            retired_rx,
            shutdown_rx,
            Arc::clone(&released),
        );

        Self {
            collection_id,
            holders,
            num_versions: num_versions.max(1),
            window: Mutex::new(Window::default()),
            done: AtomicBool::new(false),
            retired,
            shutdown,
            released,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn collection_id(&self) -> Id {
        self.collection_id
    }

    pub fn num_versions(&self) -> usize {
        self.num_versions
    }

    /// Admit commit `id` as the newest version.
    ///
    /// Commits must arrive in non-decreasing id order. On any error the
    /// window is left as it was and nothing stays pinned.
    pub async fn add(&self, id: Id) -> Result<()> {
        self.check_admission(&self.lock_window(), id)?;

        let snapshot = Arc::new(Snapshot::build(&self.holders, id).await?);
        let weak = Arc::downgrade(&snapshot);
        snapshot.proxy().register_on_no_ref_cb(move || {
            if let Some(snapshot) = weak.upgrade() {
                snapshot.unref_all();
            }
        });
        // Window membership pin
        snapshot.add_ref();

        let evicted = {
            let mut window = self.lock_window();
            match self.check_admission(&window, id) {
                Ok(()) if window.active.contains_key(&id) => {
                    Err(CatalogError::DuplicateCommit { id })
                }
                Ok(()) => {
                    window.active.insert(id, Arc::clone(&snapshot));
                    window.max_id = id;
                    let evicted = if window.active.len() > self.num_versions {
                        window.active.pop_first().map(|(_, ss)| ss)
                    } else {
                        None
                    };
                    window.min_id = window.active.keys().next().copied().unwrap_or(id);
                    Ok(evicted)
                }
                Err(e) => Err(e),
            }
        };

        match evicted {
            Ok(evicted) => {
                debug!(
                    collection_id = self.collection_id,
                    commit_id = id,
                    evicted = evicted.as_ref().map(|ss| ss.id()),
                    "Admitted snapshot"
                );
                if let Some(old) = evicted {
                    self.retire(old);
                }
                Ok(())
            }
            Err(e) => {
                warn!(collection_id = self.collection_id, commit_id = id, error = %e, "Rejected snapshot");
                snapshot.unref();
                Err(e)
            }
        }
    }

    /// Check out version `id`; `0` means the newest.
    ///
    /// Returns an empty handle when the version is not in the window.
    pub fn get_snapshot(&self, id: Id, scoped: bool) -> ScopedSnapshot {
        let window = self.lock_window();
        if window.active.is_empty() {
            return ScopedResource::empty();
        }
        let id = if id == 0 { window.max_id } else { id };
        if id < window.min_id || id > window.max_id {
            return ScopedResource::empty();
        }
        match window.active.get(&id) {
            Some(snapshot) => ScopedResource::new(Arc::clone(snapshot), scoped),
            None => ScopedResource::empty(),
        }
    }

    /// Reject further admissions and stop the reclamation worker once it has
    /// drained what is already queued. Windowed versions stay pinned.
    pub fn notify_done(&self) {
        {
            let _window = self.lock_window();
            self.done.store(true, Ordering::Release);
        }
        let _ = self.shutdown.send(true);
    }

    /// Retire every windowed version to the worker, then shut it down.
    pub fn close(&self) {
        let retiring = {
            let mut window = self.lock_window();
            self.done.store(true, Ordering::Release);
            std::mem::take(&mut window.active)
        };
        let count = retiring.len();
        for snapshot in retiring.into_values() {
            self.retire(snapshot);
        }
        let _ = self.shutdown.send(true);
        info!(
            collection_id = self.collection_id,
            retired = count,
            "Closed snapshots holder"
        );
    }

    /// [`close`](Self::close), then wait for the worker to finish draining.
    pub async fn shutdown(&self) {
        self.close();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(collection_id = self.collection_id, error = %e, "Snapshot reclaimer failed");
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn max_id(&self) -> Id {
        self.lock_window().max_id
    }

    pub fn min_id(&self) -> Id {
        self.lock_window().min_id
    }

    /// Commit ids currently in the window, ascending.
    pub fn ids(&self) -> Ids {
        self.lock_window().active.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock_window().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots whose window pin the worker has dropped.
    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::Acquire)
    }

    fn lock_window(&self) -> MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_admission(&self, window: &Window, id: Id) -> Result<()> {
        if self.is_done() {
            return Err(CatalogError::ShutdownRejected {
                collection_id: self.collection_id,
            });
        }
        if !window.active.is_empty() && id < window.max_id {
            return Err(CatalogError::OutOfOrderCommit {
                id,
                max_id: window.max_id,
            });
        }
        Ok(())
    }

    /// Hand a version that left the window to the worker. If the worker is
    /// gone, release it here so no pin is leaked.
    fn retire(&self, snapshot: Arc<Snapshot>) {
        if let Err(mpsc::error::SendError(snapshot)) = self.retired.send(snapshot) {
            debug!(
                collection_id = self.collection_id,
                commit_id = snapshot.id(),
                "Reclaimer stopped, releasing inline"
            );
            release(&snapshot, &self.released);
        }
    }
}

impl Drop for SnapshotsHolder {
    fn drop(&mut self) {
        if !self.lock_window().active.is_empty() {
            self.close();
        }
    }
}

impl std::fmt::Debug for SnapshotsHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let window = self.lock_window();
        f.debug_struct("SnapshotsHolder")
            .field("collection_id", &self.collection_id)
            .field("min_id", &window.min_id)
            .field("max_id", &window.max_id)
            .field("versions", &window.active.len())
            .field("done", &self.is_done())
            .finish()
    }
}

fn release(snapshot: &Snapshot, released: &AtomicUsize) {
    let remaining = snapshot.unref();
    released.fetch_add(1, Ordering::AcqRel);
    debug!(
        commit_id = snapshot.id(),
        remaining, "Released retired snapshot"
    );
}

/// Spawn the worker that drops the window pin of retired snapshots.
///
/// Runs until shutdown is signalled or the holder goes away, then drains
/// everything still queued before exiting.
fn spawn_reclaimer(
    collection_id: Id,
    mut retired: mpsc::UnboundedReceiver<Arc<Snapshot>>,
    mut shutdown: watch::Receiver<bool>,
    released: Arc<AtomicUsize>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(collection_id, "Snapshot reclaimer started");

        loop {
            tokio::select! {
                next = retired.recv() => match next {
                    Some(snapshot) => release(&snapshot, &released),
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        retired.close();
        while let Ok(snapshot) = retired.try_recv() {
            release(&snapshot, &released);
        }
        debug!(
            collection_id,
            released = released.load(Ordering::Acquire),
            "Snapshot reclaimer stopped"
        );
    })
}
