//! Optimistic read-modify-write over a shared document.
//!
//! [`DocumentClient::patch_with_lease`] lets any number of independently scheduled workers
//! mutate the same document without a lock service. The "lease" is nothing more than the
//! version token captured by the read: the replace built on it succeeds only if nobody wrote
//! the document in between, so of all replaces built on one token at most one can win. A
//! loser re-reads, re-applies its mutation to the fresh copy and tries again, sleeping a
//! jittered, exponentially growing delay between attempts, until the collection's
//! [`LeasePolicy`](crate::config::LeasePolicy) runs out of attempts.
//!
//! No round trip is paid for exclusion unless two writers actually collide.

use crate::{
    client::DocumentClient,
    context::Context,
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    options::Options,
};

impl<D: Document> DocumentClient<D> {
    /// Applies `mutate` to the current version of a document and writes the result back,
    /// retrying from a fresh read whenever another writer got there first.
    ///
    /// `mutate` may run several times and must not assume its result will be stored. An error
    /// it returns aborts the patch without writing.
    ///
    /// # Errors
    ///
    /// - the last [`Conflict`](crate::error::DocumentStoreError::Conflict) once the attempt
    ///   budget is exhausted
    /// - [`Validation`](crate::error::DocumentStoreError::Validation) if `mutate` changes the id
    /// - any other error from the read, the mutation, the triggers or the write, immediately
    pub async fn patch_with_lease<F>(
        &self,
        ctx: &Context,
        partition_key: &str,
        id: &str,
        mutate: F,
    ) -> DocumentStoreResult<D>
    where
        F: FnMut(&mut D) -> DocumentStoreResult<()> + Send,
    {
        self.patch_with_lease_options(ctx, partition_key, id, &Options::default(), mutate)
            .await
    }

    /// Same as [`patch_with_lease`](Self::patch_with_lease), running the pre-triggers in
    /// `options` on every attempt.
    pub async fn patch_with_lease_options<F>(
        &self,
        ctx: &Context,
        partition_key: &str,
        id: &str,
        options: &Options,
        mut mutate: F,
    ) -> DocumentStoreResult<D>
    where
        F: FnMut(&mut D) -> DocumentStoreResult<()> + Send,
    {
        let policy = &self.config().lease;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut document = self.get(ctx, partition_key, id, options).await?;
            mutate(&mut document)?;

            if document.id() != id {
                return Err(DocumentStoreError::Validation(format!(
                    "patch changed document id from {id} to {}",
                    document.id()
                )));
            }

            let err = match self.replace(ctx, partition_key, &document, options).await {
                Ok(updated) => {
                    if attempt > 1 {
                        tracing::debug!(collection = self.collection(), partition_key, id, attempt, "patch succeeded after contention");
                    }
                    return Ok(updated);
                }
                Err(err) if err.is_conflict() => err,
                Err(err) => return Err(err),
            };

            if attempt >= policy.max_attempts {
                tracing::warn!(
                    collection = self.collection(),
                    partition_key,
                    id,
                    attempts = attempt,
                    error = %err,
                    "patch gave up after exhausting its attempts"
                );
                return Err(err);
            }

            let delay = policy.jittered_backoff(attempt);
            tracing::debug!(
                collection = self.collection(),
                partition_key,
                id,
                attempt,
                delay_us = delay.as_micros() as u64,
                "patch lost a race, retrying"
            );

            ctx.guard(tokio::time::sleep(delay)).await?;
        }
    }
}
