use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::task::JoinSet;

use crate::client::BoxError;

/// A single-value handoff from a wave-1 task to the derived computations that
/// run after the join barrier. Stays `None` when the producing task failed.
pub struct Slot<T>(Arc<Mutex<Option<T>>>);

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }

    pub fn fill(&self, value: T) {
        *self.0.lock().expect("Slot lock poisoned") = Some(value);
    }

    pub fn take(&self) -> Option<T> {
        self.0.lock().expect("Slot lock poisoned").take()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one joined wave.
#[derive(Debug, Default, Clone, Copy)]
pub struct Joined {
    pub ok: usize,
    pub failed: usize,
}

impl Joined {
    /// Fold another wave's counts in, for requests that join more than once.
    pub fn merge(&mut self, other: Joined) {
        self.ok += other.ok;
        self.failed += other.failed;
    }
}

/// One fan-out wave for a single request: every spawned task runs
/// concurrently under a deadline, and `join_all` observes every completion.
/// A failing task is logged and counted, never aborts its siblings, and
/// leaves its metrics absent from the shared sink.
pub struct TaskSet {
    endpoint: &'static str,
    timeout: Duration,
    tasks: JoinSet<(&'static str, Result<(), BoxError>)>,
}

impl TaskSet {
    pub fn new(endpoint: &'static str, timeout: Duration) -> Self {
        Self {
            endpoint,
            timeout,
            tasks: JoinSet::new(),
        }
    }

    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    pub fn spawn<F>(&mut self, label: &'static str, fut: F)
    where
        F: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let timeout = self.timeout;
        self.tasks.spawn(async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => (label, result),
                Err(_) => (label, Err(format!("timed out after {timeout:?}").into())),
            }
        });
    }

    pub async fn join_all(mut self) -> Joined {
        let mut joined = Joined::default();

        while let Some(outcome) = self.tasks.join_next().await {
            match outcome {
                Ok((label, Ok(()))) => {
                    debug!("{}: query {} finished", self.endpoint, label);
                    joined.ok += 1;
                }
                Ok((label, Err(err))) => {
                    warn!("{}: query {} failed: {}", self.endpoint, label, err);
                    joined.failed += 1;
                }
                Err(err) => {
                    warn!("{}: query task panicked: {}", self.endpoint, err);
                    joined.failed += 1;
                }
            }
        }

        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{Kind, Sink};
    use std::collections::HashMap;

    #[tokio::test]
    async fn failing_task_does_not_abort_siblings() {
        let sink = Arc::new(Sink::new(HashMap::new()));
        sink.declare("test_a", "a", Kind::Gauge, &[]);
        sink.declare("test_b", "b", Kind::Gauge, &[]);

        let mut tasks = TaskSet::new("test", Duration::from_secs(5));
        {
            let sink = sink.clone();
            tasks.spawn("a", async move {
                sink.set("test_a", &[], 1.0);
                Ok(())
            });
        }
        tasks.spawn("broken", async move { Err("upstream unreachable".into()) });
        {
            let sink = sink.clone();
            tasks.spawn("b", async move {
                sink.set("test_b", &[], 2.0);
                Ok(())
            });
        }

        let joined = tasks.join_all().await;
        assert_eq!(joined.ok, 2);
        assert_eq!(joined.failed, 1);

        let body = sink.render();
        assert!(body.contains("test_a 1"));
        assert!(body.contains("test_b 2"));
    }

    #[tokio::test]
    async fn every_outcome_is_observed() {
        let mut tasks = TaskSet::new("test", Duration::from_secs(5));
        for _ in 0..7 {
            tasks.spawn("ok", async { Ok(()) });
        }
        for _ in 0..3 {
            tasks.spawn("bad", async { Err("nope".into()) });
        }

        let joined = tasks.join_all().await;
        assert_eq!(joined.ok + joined.failed, 10);
        assert_eq!(joined.failed, 3);
    }

    #[tokio::test]
    async fn slow_task_is_reported_as_failed() {
        let mut tasks = TaskSet::new("test", Duration::from_millis(20));
        tasks.spawn("slow", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        });

        let joined = tasks.join_all().await;
        assert_eq!(joined.failed, 1);
    }

    #[tokio::test]
    async fn panicking_task_is_counted_not_propagated() {
        let mut tasks = TaskSet::new("test", Duration::from_secs(5));
        tasks.spawn("boom", async { panic!("task bug") });
        tasks.spawn("fine", async { Ok(()) });

        let joined = tasks.join_all().await;
        assert_eq!(joined.ok, 1);
        assert_eq!(joined.failed, 1);
    }

    #[tokio::test]
    async fn merged_waves_account_for_every_task() {
        let mut first = TaskSet::new("test", Duration::from_secs(5));
        first.spawn("ok", async { Ok(()) });
        first.spawn("bad", async { Err("nope".into()) });
        let mut joined = first.join_all().await;

        let mut second = TaskSet::new("test", Duration::from_secs(5));
        second.spawn("ok", async { Ok(()) });
        joined.merge(second.join_all().await);

        assert_eq!(joined.ok, 2);
        assert_eq!(joined.failed, 1);
    }

    #[tokio::test]
    async fn slot_carries_wave_one_result_over_the_barrier() {
        let slot: Slot<Vec<u32>> = Slot::new();

        let mut wave1 = TaskSet::new("test", Duration::from_secs(5));
        {
            let slot = slot.clone();
            wave1.spawn("list", async move {
                slot.fill(vec![3, 1, 2]);
                Ok(())
            });
        }
        wave1.join_all().await;

        assert_eq!(slot.take(), Some(vec![3, 1, 2]));
        assert_eq!(slot.take(), None);
    }
}
