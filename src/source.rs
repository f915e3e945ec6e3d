//! Data source abstraction for the polled feeds

use crate::error::SourceError;
use async_trait::async_trait;

/// Trait for feed data sources
///
/// A source issues one upstream request per call, normalizes the payload
/// into `Output` and never retries on its own. Retry is the scheduler's next
/// tick.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Normalized value produced by a successful fetch
    type Output: Clone + Send + Sync + 'static;

    /// Fetches and normalizes the feed once
    async fn fetch(&self) -> Result<Self::Output, SourceError>;

    /// Short feed name used in logs and surfaced error messages
    fn source_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    /// Scripted source for scheduler tests
    ///
    /// Pops one scripted response per fetch, falling back to `fallback` once
    /// the script is exhausted. Every fetch records its start instant.
    #[derive(Clone)]
    pub struct MockSource<T> {
        responses: Arc<Mutex<VecDeque<Result<T, SourceError>>>>,
        fallback: Option<T>,
        delay: Duration,
        started: Arc<Mutex<Vec<Instant>>>,
    }

    impl<T: Clone + Send + Sync + 'static> MockSource<T> {
        pub fn new(fallback: Option<T>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(VecDeque::new())),
                fallback,
                delay: Duration::ZERO,
                started: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn push_ok(&self, value: T) {
            self.responses.lock().unwrap().push_back(Ok(value));
        }

        pub fn push_err(&self, err: SourceError) {
            self.responses.lock().unwrap().push_back(Err(err));
        }

        pub fn call_count(&self) -> usize {
            self.started.lock().unwrap().len()
        }

        pub fn started_at(&self) -> Vec<Instant> {
            self.started.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<T: Clone + Send + Sync + 'static> DataSource for MockSource<T> {
        type Output = T;

        async fn fetch(&self) -> Result<T, SourceError> {
            self.started.lock().unwrap().push(Instant::now());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let scripted = self.responses.lock().unwrap().pop_front();
            match scripted {
                Some(result) => result,
                None => self
                    .fallback
                    .clone()
                    .ok_or_else(|| SourceError::parse("no scripted response")),
            }
        }

        fn source_name(&self) -> &'static str {
            "mock"
        }
    }
}
