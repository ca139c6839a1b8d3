//! Bulkhead for embedding calls.
//!
//! Embedding is the only externally latent operation in the pipeline. Every
//! provider call runs on the tokio blocking pool while holding a permit from a
//! shared semaphore. One deadline covers both waiting for a permit and the
//! provider call itself. A call that times out keeps its permit until the
//! provider actually returns, so the cap counts real in-flight requests, but
//! later callers never wait past their own deadline.
//!
//! # Usage
//!
//! ```rust,ignore
//! use taleprint::embedding::{BoundedEmbedder, HashEmbeddingProvider};
//!
//! let embedder = BoundedEmbedder::new(HashEmbeddingProvider::new(), &config.embedding);
//! let outcomes = embedder.embed_batch(&texts, 3).await;
//! ```

use super::{EmbedError, EmbedOutcome, EmbeddingProvider};
use crate::config::EmbeddingConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::instrument;

/// Provider wrapper with concurrency limiting and per-call timeouts.
pub struct BoundedEmbedder<P> {
    provider: Arc<P>,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    timeout: Duration,
}

impl<P> Clone for BoundedEmbedder<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            semaphore: Arc::clone(&self.semaphore),
            max_concurrent: self.max_concurrent,
            timeout: self.timeout,
        }
    }
}

impl<P: EmbeddingProvider + 'static> BoundedEmbedder<P> {
    /// Wraps a provider using the configured limits.
    #[must_use]
    pub fn new(provider: P, config: &EmbeddingConfig) -> Self {
        Self::with_limits(Arc::new(provider), config.max_concurrent, config.timeout())
    }

    /// Wraps a shared provider with explicit limits.
    #[must_use]
    pub fn with_limits(provider: Arc<P>, max_concurrent: usize, timeout: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            provider,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            timeout,
        }
    }

    /// Returns the provider's vector dimensions.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Returns the current number of available permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Returns the per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Embeds one text. Never fails: errors and timeouts become outcomes.
    #[instrument(skip(self, text), fields(operation = "embed", text_len = text.len()))]
    pub async fn embed(&self, text: &str) -> EmbedOutcome {
        self.run(text.to_string(), None).await
    }

    /// Embeds a batch with at most `max_concurrent` of its calls in flight
    /// (and never more than the embedder-wide cap).
    ///
    /// Outcomes are returned in input order. One failing input never fails
    /// the rest of the batch.
    #[instrument(skip(self, texts), fields(operation = "embed_batch", batch_size = texts.len()))]
    pub async fn embed_batch(&self, texts: &[String], max_concurrent: usize) -> Vec<EmbedOutcome> {
        let batch_limit = Arc::new(Semaphore::new(max_concurrent.max(1)));

        let handles: Vec<_> = texts
            .iter()
            .map(|text| {
                let this = self.clone();
                let text = text.clone();
                let limit = Arc::clone(&batch_limit);
                tokio::spawn(async move { this.run(text, Some(limit)).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            let outcome = handle.await.unwrap_or_else(|e| {
                EmbedOutcome::Unavailable(EmbedError::Unavailable(format!(
                    "embedding task failed: {e}"
                )))
            });
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| !o.is_ready()).count();
        if failed > 0 {
            tracing::warn!(
                failed,
                total = outcomes.len(),
                "Embedding batch completed with unavailable entries"
            );
        }
        outcomes
    }

    async fn run(&self, text: String, batch_limit: Option<Arc<Semaphore>>) -> EmbedOutcome {
        // The batch permit is released when this call returns, so a hung
        // provider never stalls the rest of its own batch.
        let _batch_permit = match batch_limit {
            Some(limit) => match limit.acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return closed(),
            },
            None => None,
        };

        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;
        let permit = match self.acquire_permit_with_deadline(deadline).await {
            Ok(permit) => permit,
            Err(outcome) => return self.degraded(outcome, start),
        };

        metrics::gauge!("embedding_bulkhead_available_permits")
            .set(self.semaphore.available_permits() as f64);
        metrics::counter!("embedding_bulkhead_permits_acquired_total").increment(1);
        tracing::trace!("Acquired embedding bulkhead permit");

        let provider = Arc::clone(&self.provider);
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            provider.embed(&text)
        });

        let outcome = match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(Ok(vector))) => EmbedOutcome::Ready(vector),
            Ok(Ok(Err(err))) => EmbedOutcome::Unavailable(err),
            Ok(Err(join_err)) => EmbedOutcome::Unavailable(EmbedError::Unavailable(format!(
                "embedding task failed: {join_err}"
            ))),
            Err(_) => self.timed_out(),
        };

        if outcome.is_ready() {
            metrics::histogram!("embedding_duration_ms")
                .record(start.elapsed().as_secs_f64() * 1000.0);
            outcome
        } else {
            self.degraded(outcome, start)
        }
    }

    /// Waits for an embedder-wide permit until `deadline`.
    ///
    /// Permits of timed-out calls stay with their blocking task, so without a
    /// deadline here a few hung provider calls would stall every later caller.
    async fn acquire_permit_with_deadline(
        &self,
        deadline: tokio::time::Instant,
    ) -> Result<OwnedSemaphorePermit, EmbedOutcome> {
        match tokio::time::timeout_at(deadline, Arc::clone(&self.semaphore).acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(closed()),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout_ms(),
                    max_concurrent = self.max_concurrent,
                    "Embedding bulkhead saturated until deadline"
                );
                Err(self.timed_out())
            },
        }
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    fn timed_out(&self) -> EmbedOutcome {
        EmbedOutcome::TimedOut {
            timeout_ms: self.timeout_ms(),
        }
    }

    fn degraded(&self, outcome: EmbedOutcome, start: Instant) -> EmbedOutcome {
        metrics::histogram!("embedding_duration_ms").record(start.elapsed().as_secs_f64() * 1000.0);
        metrics::counter!("embedding_bulkhead_rejections_total", "reason" => outcome.label())
            .increment(1);
        tracing::warn!(
            reason = outcome.label(),
            available_permits = self.semaphore.available_permits(),
            "Embedding call degraded"
        );
        outcome
    }
}

fn closed() -> EmbedOutcome {
    EmbedOutcome::Unavailable(EmbedError::Unavailable(
        "embedding bulkhead closed".to_string(),
    ))
}
