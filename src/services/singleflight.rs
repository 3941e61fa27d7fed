use dashmap::{mapref::entry::Entry, DashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Outcome of an in-flight computation, cloneable so every waiter can
/// receive the same result
#[derive(Debug, Clone, thiserror::Error)]
pub enum FlightError {
    #[error("{0}")]
    Failed(String),

    #[error("computation task dropped before settling")]
    Abandoned,
}

/// Per-user single-flight map
///
/// At most one computation runs per user id at a time; callers that arrive
/// while one is in flight await its outcome instead of starting another.
/// The map is sharded (dashmap), so flights for different users never
/// contend on a shared lock.
///
/// Process-local only: two server processes can still race for the same
/// user, which is accepted since both results are valid for the
/// fingerprint they were computed against.
pub struct InFlightMap<T> {
    flights: Arc<DashMap<Uuid, watch::Receiver<Option<Result<T, FlightError>>>>>,
}

impl<T> Default for InFlightMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InFlightMap<T> {
    pub fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
        }
    }

    /// Number of computations currently in flight
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

impl<T> InFlightMap<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Joins the in-flight computation for `user_id`, or leads a new one
    ///
    /// The leader's `work` future runs in a spawned task: if the caller
    /// that started it is dropped (e.g. an abandoned HTTP request), the
    /// computation still settles and its side effects still land. Every
    /// caller that joined receives the same outcome.
    pub async fn run<F>(&self, user_id: Uuid, work: F) -> Result<T, FlightError>
    where
        F: Future<Output = Result<T, FlightError>> + Send + 'static,
    {
        let mut rx = match self.flights.entry(user_id) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(rx.clone());

                let flights = Arc::clone(&self.flights);
                tokio::spawn(async move {
                    let outcome = work.await;
                    // Remove before settling: a caller arriving after this
                    // point must start from the (now updated) store, not
                    // from a finished flight.
                    flights.remove(&user_id);
                    let _ = tx.send(Some(outcome));
                });

                rx
            }
        };

        let settled = rx
            .wait_for(|outcome| outcome.is_some())
            .await
            .map_err(|_| FlightError::Abandoned)?;

        settled.as_ref().cloned().unwrap_or(Err(FlightError::Abandoned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_test::assert_ok;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_runs_execute_once() {
        let map = Arc::new(InFlightMap::<String>::new());
        let executions = Arc::new(AtomicUsize::new(0));
        let user_id = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let map = Arc::clone(&map);
            let executions = Arc::clone(&executions);
            handles.push(tokio::spawn(async move {
                map.run(user_id, async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok("done".to_string())
                })
                .await
            }));
        }

        for handle in handles {
            let outcome = handle.await.unwrap();
            assert_eq!(outcome.unwrap(), "done");
        }

        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert!(map.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_distinct_users_run_independently() {
        let map = Arc::new(InFlightMap::<u32>::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for value in [1u32, 2u32] {
            let map = Arc::clone(&map);
            let executions = Arc::clone(&executions);
            handles.push(tokio::spawn(async move {
                map.run(Uuid::new_v4(), async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(value)
                })
                .await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(assert_ok!(handle.await.unwrap()));
        }
        results.sort_unstable();

        assert_eq!(results, vec![1, 2]);
        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_shared_and_entry_cleared() {
        let map = Arc::new(InFlightMap::<String>::new());
        let executions = Arc::new(AtomicUsize::new(0));
        let user_id = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let map = Arc::clone(&map);
            let executions = Arc::clone(&executions);
            handles.push(tokio::spawn(async move {
                map.run(user_id, async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Err(FlightError::Failed("engine down".to_string()))
                })
                .await
            }));
        }

        for handle in handles {
            let outcome = handle.await.unwrap();
            assert!(matches!(outcome, Err(FlightError::Failed(_))));
        }

        assert_eq!(executions.load(Ordering::SeqCst), 1);

        // The failed flight is gone; the next run starts fresh.
        let executions_clone = Arc::clone(&executions);
        let outcome = map
            .run(user_id, async move {
                executions_clone.fetch_add(1, Ordering::SeqCst);
                Ok("recovered".to_string())
            })
            .await;

        assert_eq!(outcome.unwrap(), "recovered");
        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_flight_survives_abandoned_caller() {
        let map = Arc::new(InFlightMap::<()>::new());
        let completed = Arc::new(AtomicUsize::new(0));
        let user_id = Uuid::new_v4();

        let caller = {
            let map = Arc::clone(&map);
            let completed = Arc::clone(&completed);
            tokio::spawn(async move {
                let _ = map
                    .run(user_id, async move {
                        tokio::time::sleep(Duration::from_millis(60)).await;
                        completed.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await;
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        caller.abort();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert!(map.is_empty());
    }
}
