use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::app::{LensError, Result};

/// Lifetime of the view that asked for a transform.
///
/// Unscoped requests are never cancelled: a response that arrives after the
/// reader moved on is still written to the cache. A scoped request is tied
/// to a [`CancellationToken`]; cancelling it aborts the wait, and the cache
/// write too once no other caller still waits on the same request.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    token: Option<CancellationToken>,
}

impl RequestScope {
    pub fn unscoped() -> Self {
        Self::default()
    }

    pub fn new(token: CancellationToken) -> Self {
        Self { token: Some(token) }
    }

    pub(crate) fn token(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Await `fut` unless the scope is cancelled first.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match &self.token {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(LensError::Cancelled),
                    result = fut => result,
                }
            }
            None => fut.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unscoped_runs_to_completion() {
        let scope = RequestScope::unscoped();
        assert!(!scope.is_cancelled());
        assert_eq!(tokio_test::block_on(scope.guard(async { Ok(5) })).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_cancelled_scope_short_circuits() {
        let token = CancellationToken::new();
        let scope = RequestScope::new(token.clone());
        token.cancel();

        let result: Result<u8> = scope.guard(futures::future::pending()).await;
        assert!(matches!(result, Err(LensError::Cancelled)));
        assert!(scope.is_cancelled());
    }
}
