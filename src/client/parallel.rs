use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::app::{LensError, Result};
use crate::client::SharedService;
use crate::domain::SearchResponse;

pub const DEFAULT_WORKERS: usize = 4;

/// Runs one search per query concurrently, bounded by a worker semaphore.
pub struct ParallelSearcher {
    service: SharedService,
    semaphore: Arc<Semaphore>,
    k: usize,
}

impl ParallelSearcher {
    pub fn new(service: SharedService, k: usize) -> Self {
        Self::with_workers(service, k, DEFAULT_WORKERS)
    }

    pub fn with_workers(
        service: SharedService,
        k: usize,
        workers: usize,
    ) -> Self {
        Self {
            service,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            k,
        }
    }

    /// Results come back in the order of `queries`.
    pub async fn search_all(&self, queries: Vec<String>) -> Vec<(String, Result<SearchResponse>)> {
        let mut handles = Vec::with_capacity(queries.len());

        for query in queries {
            let service = self.service.clone();
            let semaphore = self.semaphore.clone();
            let k = self.k;
            let task_query = query.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(LensError::Other("Search pool closed".into())),
                };
                service.search(&task_query, k).await
            });

            handles.push((query, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (query, handle) in handles {
            match handle.await {
                Ok(result) => results.push((query, result)),
                Err(e) => {
                    tracing::error!("Search task join error: {}", e);
                    results.push((query, Err(LensError::Other(e.to_string()))));
                }
            }
        }

        results
    }
}
