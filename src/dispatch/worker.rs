use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

use crate::provider::{Provider, ProviderError};

/// Failures of a single worker call
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("worker {0} is busy")]
    Busy(usize),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// A single-call-at-a-time slot wrapping a provider credential.
///
/// The busy flag is the only mutable state and sits behind the worker's own
/// lock, so claiming one worker never contends with another.
pub struct Worker {
    id: usize,
    credential: String,
    busy: Mutex<bool>,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("credential", &"<redacted>")
            .field("busy", &self.is_busy())
            .finish()
    }
}

impl Worker {
    pub fn new(id: usize, credential: impl Into<String>) -> Self {
        Self {
            id,
            credential: credential.into(),
            busy: Mutex::new(false),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_busy(&self) -> bool {
        *self.busy.lock()
    }

    /// Mark the worker busy if it is free
    fn try_claim(self: &Arc<Self>) -> Option<WorkerLease> {
        let mut busy = self.busy.lock();
        if *busy {
            return None;
        }
        *busy = true;
        trace!(worker_id = self.id, "worker claimed");
        Some(WorkerLease {
            worker: Arc::clone(self),
        })
    }

    /// Perform exactly one provider call on this worker.
    ///
    /// Fails with [`WorkerError::Busy`] if a call is already in flight. The
    /// busy flag is cleared on every exit path, including provider errors and
    /// the returned future being dropped.
    pub async fn compile(
        self: &Arc<Self>,
        provider: &dyn Provider,
        text: &str,
    ) -> Result<String, WorkerError> {
        let lease = self.try_claim().ok_or(WorkerError::Busy(self.id))?;
        lease.compile(provider, text).await
    }
}

/// Exclusive claim on a [`Worker`]. Dropping the lease frees the worker.
#[derive(Debug)]
pub struct WorkerLease {
    worker: Arc<Worker>,
}

impl WorkerLease {
    pub fn worker_id(&self) -> usize {
        self.worker.id
    }

    /// Run one provider call, releasing the worker when it finishes
    pub async fn compile(self, provider: &dyn Provider, text: &str) -> Result<String, WorkerError> {
        let answer = provider.prompt(&self.worker.credential, text).await?;
        Ok(answer)
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        *self.worker.busy.lock() = false;
        trace!(worker_id = self.worker.id, "worker released");
    }
}

/// Fixed set of workers.
///
/// Selection is a linear scan for the first free worker. That is deliberately
/// simple and FIFO-fair enough for small pools; it is not a priority scheduler.
#[derive(Debug, Default)]
pub struct WorkerPool {
    workers: Vec<Arc<Worker>>,
}

impl WorkerPool {
    /// `size` workers sharing one credential
    pub fn new(size: usize, credential: &str) -> Self {
        Self::from_credentials(std::iter::repeat(credential).take(size))
    }

    /// One worker per credential
    pub fn from_credentials<I, S>(credentials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let workers = credentials
            .into_iter()
            .enumerate()
            .map(|(id, credential)| Arc::new(Worker::new(id, credential)))
            .collect();
        Self { workers }
    }

    /// Claim the first free worker, or `None` if all are busy
    pub fn acquire(&self) -> Option<WorkerLease> {
        self.workers.iter().find_map(Worker::try_claim)
    }

    /// Return a worker to the pool. Equivalent to dropping the lease.
    pub fn release(&self, lease: WorkerLease) {
        drop(lease);
    }

    pub fn available(&self) -> usize {
        self.workers.iter().filter(|w| !w.is_busy()).count()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[test]
    fn test_acquire_takes_first_free_worker() {
        let pool = WorkerPool::new(3, "key");
        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert_eq!(first.worker_id(), 0);
        assert_eq!(second.worker_id(), 1);
        assert_eq!(pool.available(), 1);

        pool.release(first);
        assert_eq!(pool.available(), 2);
        assert_eq!(pool.acquire().unwrap().worker_id(), 0);
    }

    #[test]
    fn test_acquire_exhausted_pool() {
        let pool = WorkerPool::new(1, "key");
        let _held = pool.acquire().unwrap();
        assert!(pool.acquire().is_none());

        assert!(WorkerPool::new(0, "key").acquire().is_none());
    }

    #[test]
    fn test_debug_redacts_credential() {
        let worker = Worker::new(7, "sk-secret");
        let printed = format!("{worker:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("7"));
    }

    #[tokio::test]
    async fn test_compile_releases_after_success() {
        let mut provider = MockProvider::new();
        provider
            .expect_prompt()
            .withf(|credential, text| credential.to_string() == "key-0" && text.to_string() == "hi")
            .returning(|_, _| Ok("hello".to_string()));

        let pool = WorkerPool::from_credentials(["key-0"]);
        let worker = Arc::clone(&pool.workers()[0]);
        assert_eq!(worker.compile(&provider, "hi").await.unwrap(), "hello");
        assert!(!worker.is_busy());
    }

    #[tokio::test]
    async fn test_compile_releases_after_provider_error() {
        let mut provider = MockProvider::new();
        provider
            .expect_prompt()
            .returning(|_, _| Err(ProviderError::Other("boom".to_string())));

        let worker = Arc::new(Worker::new(0, "key"));
        let err = worker.compile(&provider, "hi").await.unwrap_err();
        assert!(matches!(err, WorkerError::Provider(_)));
        assert!(!worker.is_busy());
    }

    struct HeldProvider {
        release: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl Provider for HeldProvider {
        async fn prompt(&self, _credential: &str, text: &str) -> Result<String, ProviderError> {
            self.release.notified().await;
            Ok(text.to_string())
        }

        async fn ping(&self, _credential: &str) -> Result<(), ProviderError> {
            Ok(())
        }

        fn name(&self) -> &str {
            "held"
        }
    }

    #[tokio::test]
    async fn test_compile_rejects_concurrent_reuse() {
        let release = Arc::new(Notify::new());
        let provider = Arc::new(HeldProvider {
            release: Arc::clone(&release),
        });
        let worker = Arc::new(Worker::new(3, "key"));

        let in_flight = {
            let worker = Arc::clone(&worker);
            let provider = Arc::clone(&provider);
            tokio::spawn(async move { worker.compile(provider.as_ref(), "first").await })
        };
        while !worker.is_busy() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let err = worker.compile(provider.as_ref(), "second").await.unwrap_err();
        assert!(matches!(err, WorkerError::Busy(3)));

        release.notify_one();
        assert_eq!(in_flight.await.unwrap().unwrap(), "first");
        assert!(!worker.is_busy());
    }

    #[tokio::test]
    async fn test_dropping_call_frees_worker() {
        let provider = HeldProvider {
            release: Arc::new(Notify::new()),
        };
        let pool = WorkerPool::new(1, "key");
        let lease = pool.acquire().unwrap();

        let call = lease.compile(&provider, "never");
        let timed_out = tokio::time::timeout(Duration::from_millis(20), call).await;
        assert!(timed_out.is_err());
        assert_eq!(pool.available(), 1);
    }
}
