use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio_util::sync::CancellationToken;

use crate::app::{LensError, Result};

use super::{lock, RequestScope};

type FlightOutput<V> = std::result::Result<V, Arc<LensError>>;
type SharedFlight<V> = Shared<BoxFuture<'static, FlightOutput<V>>>;

/// Who is waiting on a flight. The flight is abandoned once every waiter
/// was scoped and has cancelled; an unscoped waiter pins it.
#[derive(Default)]
struct Waiters {
    scoped: usize,
    pinned: bool,
}

struct FlightControl {
    token: CancellationToken,
    waiters: Mutex<Waiters>,
}

impl FlightControl {
    fn join(&self, scope: &RequestScope) {
        let mut waiters = lock(&self.waiters);
        if scope.token().is_some() {
            waiters.scoped += 1;
        } else {
            waiters.pinned = true;
        }
    }

    fn leave_cancelled(&self) {
        let mut waiters = lock(&self.waiters);
        waiters.scoped = waiters.scoped.saturating_sub(1);
        if waiters.scoped == 0 && !waiters.pinned {
            tracing::debug!("Every waiter cancelled, abandoning request");
            self.token.cancel();
        }
    }
}

struct Flight<V> {
    id: u64,
    shared: SharedFlight<V>,
    control: Arc<FlightControl>,
}

struct Registry<K, V> {
    next_id: u64,
    flights: HashMap<K, Flight<V>>,
}

/// At most one outstanding operation per key.
///
/// The first caller for a key starts the operation as a spawned task; later
/// callers for the same key join it and receive a clone of its result. The
/// task runs to completion even if every caller goes away, unless all of its
/// callers were scoped and cancelled, or [`cancel_all`](Self::cancel_all)
/// was called. The task sees its own cancellation through the
/// [`RequestScope`] it is handed and must not write once that is cancelled.
pub struct SingleFlight<K, V> {
    registry: Arc<Mutex<Registry<K, V>>>,
}

impl<K, V> Clone for SingleFlight<K, V> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                flights: HashMap::new(),
            })),
        }
    }
}

struct FlightEntry<K: Eq + Hash, V> {
    registry: Arc<Mutex<Registry<K, V>>>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, V> Drop for FlightEntry<K, V> {
    fn drop(&mut self) {
        let mut registry = lock(&self.registry);
        // A reset may have replaced the entry with a newer flight
        if registry.flights.get(&self.key).is_some_and(|f| f.id == self.id) {
            registry.flights.remove(&self.key);
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the task built by `start` under `key`, or join the flight already
    /// running under it. When joining, `start` is never called.
    ///
    /// `scope` only governs this caller's wait. The flight is registered
    /// (and started) before this returns, not on first poll of the returned
    /// future.
    pub fn run<S, F>(&self, key: K, scope: &RequestScope, start: S) -> impl Future<Output = Result<V>>
    where
        S: FnOnce(RequestScope) -> F,
        F: Future<Output = Result<V>> + Send + 'static,
    {
        let (shared, control) = self.join_or_start(key, scope, start);
        let scope = scope.clone();
        async move {
            let result = match scope.token() {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            control.leave_cancelled();
                            return Err(LensError::Cancelled);
                        }
                        result = shared => result,
                    }
                }
                None => shared.await,
            };
            result.map_err(LensError::Joined)
        }
    }

    fn join_or_start<S, F>(
        &self,
        key: K,
        scope: &RequestScope,
        start: S,
    ) -> (SharedFlight<V>, Arc<FlightControl>)
    where
        S: FnOnce(RequestScope) -> F,
        F: Future<Output = Result<V>> + Send + 'static,
    {
        let mut registry = lock(&self.registry);
        if let Some(existing) = registry.flights.get(&key) {
            tracing::debug!("Joining in-flight request");
            existing.control.join(scope);
            return (existing.shared.clone(), existing.control.clone());
        }

        let control = Arc::new(FlightControl {
            token: CancellationToken::new(),
            waiters: Mutex::new(Waiters::default()),
        });
        control.join(scope);

        let id = registry.next_id;
        registry.next_id += 1;

        // The registry lock is held until the entry is inserted, so the task
        // cannot remove it first.
        let entry = FlightEntry {
            registry: self.registry.clone(),
            key: key.clone(),
            id,
        };
        let task = start(RequestScope::new(control.token.clone()));
        let handle = tokio::spawn(async move {
            let _entry = entry;
            task.await
        });

        let shared = async move {
            match handle.await {
                Ok(result) => result.map_err(Arc::new),
                Err(e) => Err(Arc::new(LensError::Other(format!(
                    "Request task failed: {}",
                    e
                )))),
            }
        }
        .boxed()
        .shared();

        registry.flights.insert(
            key,
            Flight {
                id,
                shared: shared.clone(),
                control: control.clone(),
            },
        );
        (shared, control)
    }

    /// Cancel every outstanding flight and forget them. New requests start
    /// fresh flights.
    pub fn cancel_all(&self) {
        let mut registry = lock(&self.registry);
        for flight in registry.flights.values() {
            flight.control.token.cancel();
        }
        registry.flights.clear();
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        lock(&self.registry).flights.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.registry).flights.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    fn unscoped() -> RequestScope {
        RequestScope::unscoped()
    }

    /// Waits for `rx`, then reports whether the flight was cancelled.
    async fn wait_and_report(flight: RequestScope, rx: oneshot::Receiver<()>) -> Result<bool> {
        let _ = rx.await;
        Ok(flight.is_cancelled())
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_task() {
        let flights: SingleFlight<&str, String> = SingleFlight::new();
        let started = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel::<()>();

        let first = {
            let started = started.clone();
            flights.run("42:3", &unscoped(), move |_| async move {
                started.fetch_add(1, Ordering::SeqCst);
                let _ = rx.await;
                Ok("rewritten".to_string())
            })
        };
        let second = {
            let started = started.clone();
            flights.run("42:3", &unscoped(), move |_| async move {
                started.fetch_add(1, Ordering::SeqCst);
                Ok("never used".to_string())
            })
        };

        assert!(flights.is_in_flight(&"42:3"));
        let release = async {
            tokio::task::yield_now().await;
            let _ = tx.send(());
        };
        let (a, b, _) = tokio::join!(first, second, release);

        assert_eq!(a.unwrap(), "rewritten");
        assert_eq!(b.unwrap(), "rewritten");
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_entry_cleared_after_completion() {
        let flights: SingleFlight<u32, u32> = SingleFlight::new();
        assert_eq!(flights.run(1, &unscoped(), |_| async { Ok(10) }).await.unwrap(), 10);
        assert!(!flights.is_in_flight(&1));

        // A new flight starts once the previous one finished
        assert_eq!(flights.run(1, &unscoped(), |_| async { Ok(11) }).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_errors_are_shared_and_cleared() {
        let flights: SingleFlight<u32, u32> = SingleFlight::new();
        let err = flights
            .run(1, &unscoped(), |_| async {
                Err(LensError::ServiceUnavailable("down".into()))
            })
            .await
            .unwrap_err();

        assert!(err.is_network_failure());
        assert!(!flights.is_in_flight(&1));
    }

    #[tokio::test]
    async fn test_task_finishes_when_caller_drops() {
        let flights: SingleFlight<u32, u32> = SingleFlight::new();
        let done = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel::<()>();

        let caller = {
            let done = done.clone();
            flights.run(7, &unscoped(), move |_| async move {
                let _ = rx.await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
        };
        // Poll the caller once, then abandon it
        tokio::select! {
            biased;
            _ = caller => panic!("flight should still be waiting"),
            _ = tokio::task::yield_now() => {}
        }
        assert!(flights.is_in_flight(&7));

        let _ = tx.send(());
        for _ in 0..100 {
            if !flights.is_in_flight(&7) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(!flights.is_in_flight(&7));
    }

    #[tokio::test]
    async fn test_different_keys_run_independently() {
        let flights: SingleFlight<u32, u32> = SingleFlight::new();
        let (a, b) = tokio::join!(
            flights.run(2, &unscoped(), |_| async { Ok(2) }),
            flights.run(4, &unscoped(), |_| async { Ok(4) })
        );
        assert_eq!(a.unwrap(), 2);
        assert_eq!(b.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_sole_scoped_caller_cancels_flight() {
        let flights: SingleFlight<u32, bool> = SingleFlight::new();
        let token = CancellationToken::new();
        let (tx, rx) = oneshot::channel::<()>();
        let (seen_tx, seen_rx) = oneshot::channel::<bool>();

        let caller = flights.run(1, &RequestScope::new(token.clone()), move |flight| async move {
            let cancelled = wait_and_report(flight, rx).await?;
            let _ = seen_tx.send(cancelled);
            Ok(cancelled)
        });

        token.cancel();
        assert!(caller.await.unwrap_err().is_cancelled());
        let _ = tx.send(());
        assert!(seen_rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_unscoped_joiner_pins_flight() {
        let flights: SingleFlight<u32, bool> = SingleFlight::new();
        let token = CancellationToken::new();
        let (tx, rx) = oneshot::channel::<()>();

        let scoped = flights.run(1, &RequestScope::new(token.clone()), move |flight| {
            wait_and_report(flight, rx)
        });
        let unscoped_joiner = flights.run(1, &unscoped(), |_| async { Ok(true) });

        token.cancel();
        assert!(scoped.await.unwrap_err().is_cancelled());
        let _ = tx.send(());

        // The flight ran on and was never told to stop
        assert!(!unscoped_joiner.await.unwrap());
    }

    #[tokio::test]
    async fn test_scoped_joiner_keeps_flight_alive() {
        let flights: SingleFlight<u32, bool> = SingleFlight::new();
        let first = CancellationToken::new();
        let second = CancellationToken::new();
        let (tx, rx) = oneshot::channel::<()>();

        let starter = flights.run(1, &RequestScope::new(first.clone()), move |flight| {
            wait_and_report(flight, rx)
        });
        let joiner = flights.run(1, &RequestScope::new(second), |_| async { Ok(true) });

        first.cancel();
        assert!(starter.await.unwrap_err().is_cancelled());
        let _ = tx.send(());
        assert!(!joiner.await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_all_stops_flights_and_frees_keys() {
        let flights: SingleFlight<u32, bool> = SingleFlight::new();
        let (tx, rx) = oneshot::channel::<()>();

        let stale = flights.run(1, &unscoped(), move |flight| wait_and_report(flight, rx));
        flights.cancel_all();
        assert!(!flights.is_in_flight(&1));

        // A fresh flight under the same key is not joined to the stale one
        let (fresh_tx, fresh_rx) = oneshot::channel::<()>();
        let fresh = flights.run(1, &unscoped(), move |flight| wait_and_report(flight, fresh_rx));
        let _ = tx.send(());
        assert!(stale.await.unwrap());
        assert!(flights.is_in_flight(&1));

        let _ = fresh_tx.send(());
        assert!(!fresh.await.unwrap());
        assert!(!flights.is_in_flight(&1));
    }
}
