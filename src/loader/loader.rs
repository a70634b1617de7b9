//! PermissionLoader - the only writer of the permission store
//!
//! Responsibilities:
//! - Coalesce concurrent `load()` calls into one fetch
//! - Issue a generation per fetch and drop results from superseded loads
//! - Move the store through `Loading → Ready | Failed`
//!
//! There is no automatic retry. A failed load is retried by calling `load()`
//! again (next boundary mount, explicit user action, ...).

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use crate::core::{ActorContext, LoadError};
use crate::permissions::{Generation, PermissionStore};

use super::fetcher::PermissionFetcher;

/// What happened to the result of a load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The result was applied to the store
    Applied,
    /// A newer load (or a reset) overtook this one; the result was discarded
    Superseded,
}

type SharedLoad = Shared<BoxFuture<'static, Result<LoadOutcome, LoadError>>>;

struct InFlight {
    generation: Generation,
    future: SharedLoad,
    waiters: Arc<AtomicUsize>,
}

/// One caller's handle on an in-flight load
struct Attached {
    generation: Generation,
    future: SharedLoad,
    _waiter: Waiter,
}

/// Counts a caller as waiting on a load until dropped
struct Waiter(Arc<AtomicUsize>);

impl Waiter {
    fn join(waiters: &Arc<AtomicUsize>) -> Self {
        waiters.fetch_add(1, Ordering::SeqCst);
        Waiter(waiters.clone())
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Populates a `PermissionStore` from a `PermissionFetcher`
///
/// One loader per session/actor context.
pub struct PermissionLoader {
    store: Arc<PermissionStore>,
    fetcher: Arc<dyn PermissionFetcher>,
    actor: RwLock<ActorContext>,
    in_flight: Mutex<Option<InFlight>>,
    fetches: AtomicU64,
}

impl PermissionLoader {
    /// Create a loader writing to `store`
    ///
    /// Binds the store to the actor's role, dropping any grants it held.
    pub fn new(
        store: Arc<PermissionStore>,
        fetcher: Arc<dyn PermissionFetcher>,
        actor: ActorContext,
    ) -> Self {
        store.reset_for(actor.role.clone());
        Self {
            store,
            fetcher,
            actor: RwLock::new(actor),
            in_flight: Mutex::new(None),
            fetches: AtomicU64::new(0),
        }
    }

    /// Load permissions, joining an in-flight load if there is one
    ///
    /// If the store is already `Ready` or `Failed` this fetches again.
    pub async fn load(&self) -> Result<LoadOutcome, LoadError> {
        let attached = self.join_or_start(false);
        attached.future.await
    }

    /// Start a new load even if one is in flight
    ///
    /// The in-flight load becomes stale; its callers get `Superseded`.
    pub async fn reload(&self) -> Result<LoadOutcome, LoadError> {
        let attached = self.join_or_start(true);
        attached.future.await
    }

    /// `load()` bounded by `limit`
    ///
    /// A timeout is reported to this caller as `LoadError::Network`. The
    /// load itself keeps running for anyone else attached to it; only when
    /// the timed-out caller was the last one waiting is the store moved to
    /// `Failed` (so a late response is dropped).
    pub async fn load_within(&self, limit: Duration) -> Result<LoadOutcome, LoadError> {
        let Attached {
            generation,
            future,
            _waiter: waiter,
        } = self.join_or_start(false);

        match tokio::time::timeout(limit, future).await {
            Ok(result) => result,
            Err(_) => {
                drop(waiter);
                let err = LoadError::network(format!(
                    "permission fetch timed out after {}ms",
                    limit.as_millis()
                ));
                self.abandon(generation, &err);
                Err(err)
            }
        }
    }

    /// Replace the actor and reload from scratch
    ///
    /// Grants of the previous actor are dropped before the new actor becomes
    /// visible; any load still running for them is discarded when it
    /// arrives.
    pub async fn switch_actor(&self, actor: ActorContext) -> Result<LoadOutcome, LoadError> {
        tracing::info!(
            "Switching actor to {} ({})",
            actor.actor_id,
            actor.role
        );
        let attached = {
            let mut in_flight = self.lock_in_flight();
            self.store.reset_for(actor.role.clone());
            *self.actor.write().unwrap_or_else(PoisonError::into_inner) = actor;
            self.start(&mut in_flight)
        };
        attached.future.await
    }

    /// Current actor
    pub fn actor(&self) -> ActorContext {
        self.actor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The store this loader writes to
    pub fn store(&self) -> &Arc<PermissionStore> {
        &self.store
    }

    /// Number of fetches issued so far
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn join_or_start(&self, force: bool) -> Attached {
        let mut in_flight = self.lock_in_flight();

        if !force {
            if let Some(current) = in_flight.as_ref() {
                if self.is_running(current.generation) {
                    tracing::debug!(
                        "Joining in-flight permission load (generation {})",
                        current.generation
                    );
                    return Attached {
                        generation: current.generation,
                        future: current.future.clone(),
                        _waiter: Waiter::join(&current.waiters),
                    };
                }
            }
        }

        self.start(&mut in_flight)
    }

    /// Issue a new generation and start fetching for the current actor.
    /// Callers hold the `in_flight` lock.
    fn start(&self, in_flight: &mut Option<InFlight>) -> Attached {
        let generation = self.store.mark_loading();
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let future = run_load(
            self.store.clone(),
            self.fetcher.clone(),
            self.actor(),
            generation,
        )
        .boxed()
        .shared();

        let waiters = Arc::new(AtomicUsize::new(0));
        let waiter = Waiter::join(&waiters);
        *in_flight = Some(InFlight {
            generation,
            future: future.clone(),
            waiters,
        });
        Attached {
            generation,
            future,
            _waiter: waiter,
        }
    }

    /// A caller gave up on `generation`. Fail the load only if nobody else
    /// is still waiting for it.
    fn abandon(&self, generation: Generation, err: &LoadError) {
        let mut in_flight = self.lock_in_flight();
        let Some(current) = in_flight.as_ref() else {
            return;
        };
        if current.generation != generation {
            return;
        }

        let waiting = current.waiters.load(Ordering::SeqCst);
        if waiting > 0 {
            tracing::debug!(
                "Caller timed out on generation {}; {} caller(s) still waiting",
                generation,
                waiting
            );
            return;
        }

        if self.store.fail(generation, err.to_string()) {
            tracing::warn!("Permission load abandoned (generation {}): {}", generation, err);
            *in_flight = None;
        }
    }

    fn is_running(&self, generation: Generation) -> bool {
        let snapshot = self.store.snapshot();
        snapshot.generation() == generation && snapshot.lifecycle().is_loading()
    }
}

async fn run_load(
    store: Arc<PermissionStore>,
    fetcher: Arc<dyn PermissionFetcher>,
    actor: ActorContext,
    generation: Generation,
) -> Result<LoadOutcome, LoadError> {
    tracing::info!(
        "Fetching permissions for {} ({}), generation {}",
        actor.actor_id,
        actor.role,
        generation
    );

    match fetcher.fetch(&actor).await {
        Ok(permissions) => {
            if store.commit(generation, permissions) {
                Ok(LoadOutcome::Applied)
            } else {
                tracing::warn!(
                    "Discarding permissions from superseded load (generation {})",
                    generation
                );
                Ok(LoadOutcome::Superseded)
            }
        }
        Err(err) => {
            if store.fail(generation, err.to_string()) {
                tracing::warn!("Permission load failed ({}): {}", err.kind(), err);
                Err(err)
            } else {
                tracing::warn!(
                    "Ignoring failure from superseded load (generation {}): {}",
                    generation,
                    err
                );
                Ok(LoadOutcome::Superseded)
            }
        }
    }
}

impl std::fmt::Debug for PermissionLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionLoader")
            .field("actor", &self.actor())
            .field("store", &self.store)
            .field("fetches", &self.fetch_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LifecycleState;
    use crate::loader::fetcher_fn;
    use crate::permissions::{decide, Action, DenyReason, ModuleGrant, PermissionSet, PermissionView, Role};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::oneshot;

    type Response = Result<PermissionSet, LoadError>;

    /// Fetcher whose responses are released by the test, one per call
    struct GatedFetcher {
        gates: Mutex<VecDeque<oneshot::Receiver<Response>>>,
        calls: AtomicUsize,
    }

    impl GatedFetcher {
        fn new(count: usize) -> (Arc<Self>, Vec<oneshot::Sender<Response>>) {
            let mut senders = Vec::new();
            let mut gates = VecDeque::new();
            for _ in 0..count {
                let (tx, rx) = oneshot::channel();
                senders.push(tx);
                gates.push_back(rx);
            }
            let fetcher = Arc::new(Self {
                gates: Mutex::new(gates),
                calls: AtomicUsize::new(0),
            });
            (fetcher, senders)
        }

        fn with_responses(responses: Vec<Response>) -> Arc<Self> {
            let (fetcher, senders) = Self::new(responses.len());
            for (tx, response) in senders.into_iter().zip(responses) {
                let _ = tx.send(response);
            }
            fetcher
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl PermissionFetcher for GatedFetcher {
        async fn fetch(&self, _actor: &ActorContext) -> Result<PermissionSet, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gates.lock().unwrap().pop_front();
            match gate {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(LoadError::network("gate dropped"))),
                None => Err(LoadError::network("no response queued")),
            }
        }
    }

    fn bookings(read: bool, write: bool) -> PermissionSet {
        PermissionSet::new().with_module(
            "bookings",
            ModuleGrant::new().with("read", read).with("write", write),
        )
    }

    fn loader_with(fetcher: Arc<dyn PermissionFetcher>) -> PermissionLoader {
        PermissionLoader::new(
            Arc::new(PermissionStore::new()),
            fetcher,
            ActorContext::new("admin-1", Role::Admin),
        )
    }

    #[tokio::test]
    async fn test_load_applies_permissions() {
        let fetcher = GatedFetcher::with_responses(vec![Ok(bookings(true, false))]);
        let loader = loader_with(fetcher.clone());

        assert_eq!(loader.load().await, Ok(LoadOutcome::Applied));
        assert_eq!(loader.store().state(), LifecycleState::Ready);
        assert!(loader.store().grant("bookings", &Action::Read));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_loads_coalesce() {
        let (fetcher, mut senders) = GatedFetcher::new(1);
        let loader = loader_with(fetcher.clone());
        let tx = senders.remove(0);

        let (a, b, c, _) = tokio::join!(loader.load(), loader.load(), loader.load(), async {
            tokio::task::yield_now().await;
            let _ = tx.send(Ok(bookings(true, true)));
        });

        assert_eq!(a, Ok(LoadOutcome::Applied));
        assert_eq!(b, Ok(LoadOutcome::Applied));
        assert_eq!(c, Ok(LoadOutcome::Applied));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(loader.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_load_when_ready_refetches() {
        let fetcher = GatedFetcher::with_responses(vec![
            Ok(bookings(true, true)),
            Ok(PermissionSet::new()),
        ]);
        let loader = loader_with(fetcher.clone());

        loader.load().await.unwrap();
        loader.load().await.unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert!(!loader.store().grant("bookings", &Action::Read));
    }

    #[tokio::test]
    async fn test_later_load_wins_when_it_arrives_first() {
        let (fetcher, mut senders) = GatedFetcher::new(2);
        let loader = loader_with(fetcher.clone());
        let second_tx = senders.pop().unwrap();
        let first_tx = senders.pop().unwrap();

        let mut first = Box::pin(loader.load());
        assert!(futures::poll!(&mut first).is_pending());
        let mut second = Box::pin(loader.reload());
        assert!(futures::poll!(&mut second).is_pending());
        assert_eq!(fetcher.calls(), 2);

        second_tx.send(Ok(bookings(true, false))).unwrap();
        assert_eq!(second.await, Ok(LoadOutcome::Applied));

        first_tx.send(Ok(bookings(true, true))).unwrap();
        assert_eq!(first.await, Ok(LoadOutcome::Superseded));

        assert!(loader.store().grant("bookings", &Action::Read));
        assert!(!loader.store().grant("bookings", &Action::Write));
    }

    #[tokio::test]
    async fn test_later_load_wins_when_it_arrives_last() {
        let (fetcher, mut senders) = GatedFetcher::new(2);
        let loader = loader_with(fetcher.clone());
        let second_tx = senders.pop().unwrap();
        let first_tx = senders.pop().unwrap();

        let mut first = Box::pin(loader.load());
        assert!(futures::poll!(&mut first).is_pending());
        let mut second = Box::pin(loader.reload());
        assert!(futures::poll!(&mut second).is_pending());

        first_tx.send(Ok(bookings(true, true))).unwrap();
        assert_eq!(first.await, Ok(LoadOutcome::Superseded));
        assert!(loader.store().state().is_loading());

        second_tx.send(Ok(bookings(false, false))).unwrap();
        assert_eq!(second.await, Ok(LoadOutcome::Applied));

        assert_eq!(loader.store().state(), LifecycleState::Ready);
        assert!(!loader.store().grant("bookings", &Action::Read));
    }

    #[tokio::test]
    async fn test_superseded_failure_does_not_fail_store() {
        let (fetcher, mut senders) = GatedFetcher::new(2);
        let loader = loader_with(fetcher.clone());
        let second_tx = senders.pop().unwrap();
        let first_tx = senders.pop().unwrap();

        let mut first = Box::pin(loader.load());
        assert!(futures::poll!(&mut first).is_pending());
        let mut second = Box::pin(loader.reload());
        assert!(futures::poll!(&mut second).is_pending());

        first_tx.send(Err(LoadError::network("reset by peer"))).unwrap();
        assert_eq!(first.await, Ok(LoadOutcome::Superseded));
        assert!(loader.store().state().is_loading());

        second_tx.send(Ok(bookings(true, false))).unwrap();
        assert_eq!(second.await, Ok(LoadOutcome::Applied));
    }

    #[tokio::test]
    async fn test_failed_load_then_retry() {
        let fetcher = GatedFetcher::with_responses(vec![
            Err(LoadError::network("connection refused")),
            Ok(bookings(true, false)),
        ]);
        let loader = loader_with(fetcher.clone());
        let role = Role::Admin;

        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, LoadError::Network(_)));
        assert!(matches!(loader.store().state(), LifecycleState::Failed { .. }));
        assert_eq!(
            decide(&role, loader.store().as_ref(), "bookings", &Action::Read).reason,
            Some(DenyReason::NotReady)
        );

        assert_eq!(loader.load().await, Ok(LoadOutcome::Applied));
        assert_eq!(loader.store().state(), LifecycleState::Ready);
        assert!(decide(&role, loader.store().as_ref(), "bookings", &Action::Read).allow);
        assert_eq!(
            decide(&role, loader.store().as_ref(), "bookings", &Action::Write).reason,
            Some(DenyReason::Forbidden)
        );
    }

    #[tokio::test]
    async fn test_load_within_times_out() {
        let (fetcher, _senders) = GatedFetcher::new(1);
        let loader = loader_with(fetcher);

        let err = loader
            .load_within(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Network(_)));
        assert!(matches!(loader.store().state(), LifecycleState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_timeout_leaves_joined_load_running() {
        let (fetcher, mut senders) = GatedFetcher::new(1);
        let loader = loader_with(fetcher.clone());
        let tx = senders.remove(0);

        let mut patient = Box::pin(loader.load());
        assert!(futures::poll!(&mut patient).is_pending());

        let err = loader
            .load_within(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Network(_)));
        assert!(loader.store().state().is_loading());

        tx.send(Ok(bookings(true, false))).unwrap();
        assert_eq!(patient.await, Ok(LoadOutcome::Applied));
        assert_eq!(loader.store().state(), LifecycleState::Ready);
        assert!(loader.store().grant("bookings", &Action::Read));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(loader.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_switch_actor_reloads_for_new_role() {
        let fetcher = fetcher_fn(|actor: ActorContext| async move {
            let can_write = actor.role == Role::Manager;
            Ok(bookings(true, can_write))
        });
        let loader = loader_with(Arc::new(fetcher));

        loader.load().await.unwrap();
        assert!(!loader.store().grant("bookings", &Action::Write));

        let outcome = loader
            .switch_actor(ActorContext::new("mgr-1", Role::Manager))
            .await;
        assert_eq!(outcome, Ok(LoadOutcome::Applied));
        assert_eq!(loader.actor().role, Role::Manager);
        assert!(loader.store().grant("bookings", &Action::Write));
    }

    #[tokio::test]
    async fn test_switch_actor_hides_previous_grants() {
        let (fetcher, mut senders) = GatedFetcher::new(2);
        let loader = Arc::new(PermissionLoader::new(
            Arc::new(PermissionStore::new()),
            fetcher,
            ActorContext::new("mgr-1", Role::Manager),
        ));
        let viewer_tx = senders.pop().unwrap();
        let manager_tx = senders.pop().unwrap();

        manager_tx.send(Ok(bookings(true, true))).unwrap();
        loader.load().await.unwrap();
        assert_eq!(loader.store().snapshot().role(), Some(&Role::Manager));

        let mut switching = Box::pin(loader.switch_actor(ActorContext::new("v-1", Role::Viewer)));
        assert!(futures::poll!(&mut switching).is_pending());

        // New actor is visible, the manager's grants are not.
        assert_eq!(loader.actor().role, Role::Viewer);
        let snapshot = loader.store().snapshot();
        assert_eq!(snapshot.role(), Some(&Role::Viewer));
        assert!(!decide(&Role::Viewer, snapshot.as_ref(), "bookings", &Action::Write).allow);

        viewer_tx.send(Ok(bookings(true, false))).unwrap();
        assert_eq!(switching.await, Ok(LoadOutcome::Applied));
        assert!(!decide(&Role::Viewer, loader.store().as_ref(), "bookings", &Action::Write).allow);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_switch_actor_keeps_role_and_grants_together() {
        let fetcher = fetcher_fn(|actor: ActorContext| async move {
            Ok(bookings(true, actor.role == Role::Manager))
        });
        let loader = Arc::new(PermissionLoader::new(
            Arc::new(PermissionStore::new()),
            Arc::new(fetcher),
            ActorContext::new("mgr-0", Role::Manager),
        ));
        let stop = Arc::new(AtomicBool::new(false));

        let reader = {
            let store = loader.store().clone();
            let stop = stop.clone();
            tokio::task::spawn_blocking(move || {
                let mut mismatched = 0usize;
                while !stop.load(Ordering::SeqCst) {
                    let snapshot = store.snapshot();
                    let role = snapshot.role().cloned().unwrap_or(Role::Viewer);
                    let write = decide(&role, snapshot.as_ref(), "bookings", &Action::Write).allow;
                    if write && role != Role::Manager {
                        mismatched += 1;
                    }
                    if snapshot.lifecycle().is_ready() && write != (role == Role::Manager) {
                        mismatched += 1;
                    }
                }
                mismatched
            })
        };

        for i in 0..2_000 {
            let role = if i % 2 == 0 { Role::Viewer } else { Role::Manager };
            let outcome = loader
                .switch_actor(ActorContext::new(format!("actor-{}", i), role.clone()))
                .await;
            assert_eq!(outcome, Ok(LoadOutcome::Applied));
            assert_eq!(loader.store().snapshot().role(), Some(&role));
        }
        stop.store(true, Ordering::SeqCst);

        assert_eq!(reader.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reset_during_load_discards_result() {
        let (fetcher, mut senders) = GatedFetcher::new(1);
        let loader = loader_with(fetcher);
        let tx = senders.remove(0);

        let mut pending = Box::pin(loader.load());
        assert!(futures::poll!(&mut pending).is_pending());

        loader.store().reset();
        tx.send(Ok(bookings(true, true))).unwrap();

        assert_eq!(pending.await, Ok(LoadOutcome::Superseded));
        assert_eq!(loader.store().state(), LifecycleState::Uninitialized);
    }
}
