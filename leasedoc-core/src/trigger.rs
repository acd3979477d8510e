//! Named pre-commit hooks.
//!
//! Before any write reaches the backend, the client runs the requested triggers, in order,
//! against its private copy of the document. A trigger may rewrite the copy or veto the write
//! by returning an error. Requesting a trigger that was never registered is itself an error,
//! so every environment has to wire the hooks its writes depend on.

use async_trait::async_trait;
use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    context::Context,
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// A pre-commit hook for documents of type `D`.
///
/// Triggers re-run on every attempt of a retried `patch_with_lease`, so they must be
/// idempotent or free of side effects outside the document.
#[async_trait]
pub trait Trigger<D: Document>: Send + Sync {
    async fn run(&self, ctx: &Context, document: &mut D) -> DocumentStoreResult<()>;
}

#[async_trait]
impl<D, F> Trigger<D> for F
where
    D: Document,
    F: Fn(&mut D) -> DocumentStoreResult<()> + Send + Sync,
{
    async fn run(&self, _ctx: &Context, document: &mut D) -> DocumentStoreResult<()> {
        self(document)
    }
}

/// Exact-name lookup table of triggers, owned by a single client.
pub struct TriggerRegistry<D: Document> {
    triggers: HashMap<String, Arc<dyn Trigger<D>>>,
}

impl<D: Document> TriggerRegistry<D> {
    pub fn new() -> Self {
        Self {
            triggers: HashMap::new(),
        }
    }

    /// Registers `trigger` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, trigger: impl Trigger<D> + 'static) {
        self.triggers.insert(name.into(), Arc::new(trigger));
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.triggers.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.triggers.contains_key(name)
    }

    /// Runs the named triggers in order against `document`.
    ///
    /// Every name is resolved before the first trigger runs, so a missing registration
    /// never leaves the document half-processed.
    pub async fn run<'n, I>(&self, ctx: &Context, names: I, document: &mut D) -> DocumentStoreResult<()>
    where
        I: IntoIterator<Item = &'n str>,
    {
        let pipeline = names
            .into_iter()
            .map(|name| {
                self.triggers
                    .get(name)
                    .map(|trigger| (name, trigger.clone()))
                    .ok_or_else(|| {
                        DocumentStoreError::NotImplemented(format!(
                            "trigger {name:?} is not registered for {}",
                            D::collection_name()
                        ))
                    })
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        for (name, trigger) in pipeline {
            ctx.check()?;

            if let Err(err) = trigger.run(ctx, document).await {
                tracing::debug!(
                    trigger = name,
                    collection = D::collection_name(),
                    id = document.id(),
                    error = %err,
                    "pre-trigger rejected write"
                );
                return Err(err);
            }
        }

        Ok(())
    }
}

impl<D: Document> Default for TriggerRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> fmt::Debug for TriggerRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerRegistry")
            .field("triggers", &self.triggers.keys().collect::<Vec<_>>())
            .finish()
    }
}
