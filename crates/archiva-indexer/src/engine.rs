//! Registry of open indexing contexts

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use crate::context::{IndexingContext, remove_database_files};
use crate::error::{IndexError, Result};

/// Open indexing contexts keyed by context id.
///
/// Repository contexts use the repository id as context id, so the merger
/// can find the index of every group member.
#[derive(Debug, Default)]
pub struct IndexEngine {
    contexts: RwLock<HashMap<String, Arc<IndexingContext>>>,
}

impl IndexEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a context in `directory` and register it
    pub fn add_indexing_context(
        &self,
        id: &str,
        repository_id: &str,
        directory: impl Into<PathBuf>,
    ) -> Result<Arc<IndexingContext>> {
        let mut contexts = self.contexts.write().unwrap_or_else(PoisonError::into_inner);
        if contexts.contains_key(id) {
            return Err(IndexError::ContextAlreadyExists { id: id.to_string() });
        }

        let context = Arc::new(IndexingContext::open(id, repository_id, directory)?);
        contexts.insert(id.to_string(), Arc::clone(&context));
        tracing::debug!("Added indexing context {}", id);
        Ok(context)
    }

    /// Open a context in `directory` and register it in place of any context
    /// with the same id.
    ///
    /// Lookups see either the previous or the new context, never none. Holders
    /// of the previous context keep reading the database it had open.
    pub fn replace_indexing_context(
        &self,
        id: &str,
        repository_id: &str,
        directory: impl Into<PathBuf>,
    ) -> Result<Arc<IndexingContext>> {
        let context = Arc::new(IndexingContext::open(id, repository_id, directory)?);
        let previous = self
            .contexts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), Arc::clone(&context));
        tracing::debug!(
            "{} indexing context {}",
            if previous.is_some() { "Replaced" } else { "Added" },
            id
        );
        Ok(context)
    }

    /// Return the registered context, opening it first if needed
    pub fn get_or_add_indexing_context(
        &self,
        id: &str,
        repository_id: &str,
        directory: impl Into<PathBuf>,
    ) -> Result<Arc<IndexingContext>> {
        if let Some(context) = self.indexing_context(id) {
            return Ok(context);
        }
        match self.add_indexing_context(id, repository_id, directory) {
            Err(IndexError::ContextAlreadyExists { .. }) => self
                .indexing_context(id)
                .ok_or_else(|| IndexError::ContextNotFound { id: id.to_string() }),
            other => other,
        }
    }

    pub fn indexing_context(&self, id: &str) -> Option<Arc<IndexingContext>> {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Unregister a context, optionally deleting its database.
    ///
    /// Returns whether the context was registered.
    pub fn remove_indexing_context(&self, id: &str, delete_files: bool) -> Result<bool> {
        let removed = self
            .contexts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);

        let Some(context) = removed else {
            return Ok(false);
        };
        if delete_files && !context.directory().as_os_str().is_empty() {
            remove_database_files(context.directory())?;
        }
        tracing::debug!("Removed indexing context {}", id);
        Ok(true)
    }

    /// Ids of all registered contexts, sorted
    pub fn context_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
