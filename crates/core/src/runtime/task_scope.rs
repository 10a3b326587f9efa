use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Tracks spawned tasks so their owner can wait for all of them.
///
/// Tasks are detached tokio tasks: dropping the scope or the waiter never
/// aborts them.
#[derive(Debug, Default)]
pub struct TaskScope {
    active: AtomicUsize,
    idle: Notify,
}

impl TaskScope {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Spawns `task` on the current tokio runtime and tracks it.
    pub fn spawn<F>(self: &Arc<Self>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(self));
        tokio::spawn(async move {
            let _guard = guard;
            task.await;
        });
    }

    /// Number of tracked tasks still running.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Waits until no tracked task is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the counter when a task ends, including by panic.
struct ActiveGuard(Arc<TaskScope>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.0.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_empty() {
        let scope = TaskScope::new();
        scope.wait_idle().await;
        assert_eq!(scope.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_idle_waits_for_nested_spawns() {
        let scope = TaskScope::new();
        let done = Arc::new(AtomicUsize::new(0));

        let inner_scope = Arc::clone(&scope);
        let inner_done = Arc::clone(&done);
        scope.spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let nested_done = Arc::clone(&inner_done);
            inner_scope.spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                nested_done.fetch_add(1, Ordering::SeqCst);
            });
            inner_done.fetch_add(1, Ordering::SeqCst);
        });

        scope.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_task_is_released() {
        let scope = TaskScope::new();
        scope.spawn(async { panic!("handler bug") });
        scope.wait_idle().await;
        assert_eq!(scope.active(), 0);
    }
}
