use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;

/// Cooperative cancellation flag.
///
/// Clones share the flag. A child token is cancelled when it or any of its
/// ancestors is cancelled; cancelling a child leaves the parent running.
#[derive(Clone, Debug)]
pub struct CancelToken {
    flag: Arc<watch::Sender<bool>>,
    parent: Option<Box<CancelToken>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
            parent: None,
        }
    }

    /// Creates a token that is also cancelled when `self` is.
    pub fn child(&self) -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow() || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    /// Resolves once the token or one of its ancestors is cancelled.
    pub fn cancelled(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut rx = self.flag.subscribe();
            match &self.parent {
                None => {
                    let _ = rx.wait_for(|cancelled| *cancelled).await;
                }
                Some(parent) => {
                    tokio::select! {
                        _ = rx.wait_for(|cancelled| *cancelled) => {}
                        _ = parent.cancelled() => {}
                    }
                }
            }
        })
    }

    /// Sleeps for `delay` unless cancelled first.
    ///
    /// Returns `true` when the full delay elapsed.
    pub async fn sleep(&self, delay: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.cancelled() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_is_shared_by_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
        clone.cancelled().await;
    }

    #[tokio::test]
    async fn test_child_follows_parent_but_not_the_reverse() {
        let parent = CancelToken::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other_child = parent.child();
        let waiter = tokio::spawn({
            let other_child = other_child.clone();
            async move { other_child.cancelled().await }
        });
        parent.cancel();
        waiter.await.unwrap();
        assert!(other_child.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_is_interrupted_by_cancel() {
        let token = CancelToken::new();
        assert!(token.sleep(Duration::from_secs(5)).await);

        let sleeper = tokio::spawn({
            let token = token.clone();
            async move { token.sleep(Duration::from_secs(3600)).await }
        });
        tokio::task::yield_now().await;
        token.cancel();
        assert!(!sleeper.await.unwrap());

        assert!(!token.sleep(Duration::from_secs(1)).await);
    }
}
