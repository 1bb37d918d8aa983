use std::cmp::Ordering;

use anyhow::{Result, anyhow};

use crate::models::{Ingredient, NewIngredient};
use crate::session::{SessionStore, USER_INGREDIENTS_KEY};

/// Default number of suggestions returned by the search operations.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Queries shorter than this (in characters) never match.
pub const MIN_QUERY_CHARS: usize = 2;

/// Backend access for the ingredient catalog.
///
/// The CLI implements this with reqwest; tests with an in-memory mock.
/// Called synchronously.
pub trait IngredientProvider {
    /// `GET /api/ingredients`
    fn fetch_all(&self) -> Result<Vec<Ingredient>>;
    /// `GET /api/ingredients/search?q=&limit=`
    fn search(&self, query: &str, limit: usize) -> Result<Vec<Ingredient>>;
    /// `GET /api/ingredients/{id}`; `Ok(None)` on 404.
    fn get(&self, id: i64) -> Result<Option<Ingredient>>;
    fn create(&self, ingredient: &NewIngredient) -> Result<Ingredient>;
    fn update(&self, id: i64, ingredient: &NewIngredient) -> Result<Ingredient>;
    fn delete(&self, id: i64) -> Result<()>;
}

/// Freshness of the cached snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    /// Nothing cached.
    Absent,
    /// Restored from the session, or kept after a failed reload.
    Stale,
    /// Fetched successfully by this cache.
    Fresh,
}

/// Returned by [`IngredientCache::load`] when the catalog could not be fetched.
///
/// The previous snapshot is left in place and handed back in `cached`.
#[derive(Debug, thiserror::Error)]
#[error("failed to load ingredients: {reason}")]
pub struct LoadError {
    pub reason: String,
    pub cached: Vec<Ingredient>,
}

/// Session-scoped copy of the user's ingredient catalog.
pub struct IngredientCache<S: SessionStore> {
    store: S,
    snapshot: Option<Vec<Ingredient>>,
    state: SnapshotState,
}

impl<S: SessionStore> IngredientCache<S> {
    /// Create a cache over `store`, restoring any snapshot the session already holds.
    ///
    /// A corrupt session value counts as no snapshot.
    pub fn new(store: S) -> Self {
        let snapshot = store
            .get(USER_INGREDIENTS_KEY)
            .and_then(|raw| match serde_json::from_str::<Vec<Ingredient>>(&raw) {
                Ok(list) => Some(list),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding corrupt ingredient snapshot");
                    None
                }
            });
        let state = if snapshot.is_some() {
            SnapshotState::Stale
        } else {
            SnapshotState::Absent
        };
        Self {
            store,
            snapshot,
            state,
        }
    }

    #[must_use]
    pub fn state(&self) -> SnapshotState {
        self.state
    }

    /// The cached catalog, empty when nothing is cached.
    #[must_use]
    pub fn snapshot(&self) -> &[Ingredient] {
        self.snapshot.as_deref().unwrap_or(&[])
    }

    /// True if a non-empty snapshot is held. No I/O.
    #[must_use]
    pub fn has_cache(&self) -> bool {
        !self.snapshot().is_empty()
    }

    /// Fetch the full catalog and replace the snapshot with it.
    ///
    /// On failure the snapshot is untouched and returned inside the error.
    pub fn load(&mut self, provider: &dyn IngredientProvider) -> Result<Vec<Ingredient>, LoadError> {
        match provider.fetch_all() {
            Ok(list) => {
                self.replace(list.clone());
                tracing::debug!(count = list.len(), "ingredient snapshot refreshed");
                Ok(list)
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "failed to load ingredients");
                if self.snapshot.is_some() {
                    self.state = SnapshotState::Stale;
                }
                Err(LoadError {
                    reason: format!("{e:#}"),
                    cached: self.snapshot().to_vec(),
                })
            }
        }
    }

    /// Drop the snapshot from memory and from the session.
    pub fn invalidate(&mut self) -> Result<()> {
        self.snapshot = None;
        self.state = SnapshotState::Absent;
        self.store.remove(USER_INGREDIENTS_KEY)
    }

    /// Case-insensitive substring match against the snapshot, sorted by name.
    #[must_use]
    pub fn search_local(&self, query: &str, limit: usize) -> Vec<Ingredient> {
        if !query_is_searchable(query) {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        let mut hits: Vec<&Ingredient> = self
            .snapshot()
            .iter()
            .filter(|i| i.name.to_lowercase().contains(&needle))
            .collect();
        hits.sort_by(|a, b| compare_names(a, b));
        hits.into_iter().take(limit).cloned().collect()
    }

    /// Ask the backend. Any failure yields no results.
    #[must_use]
    pub fn search_remote(
        &self,
        provider: &dyn IngredientProvider,
        query: &str,
        limit: usize,
    ) -> Vec<Ingredient> {
        if !query_is_searchable(query) {
            return Vec::new();
        }
        match provider.search(query, limit) {
            Ok(mut list) => {
                list.truncate(limit);
                list
            }
            Err(e) => {
                tracing::warn!(query, error = %format!("{e:#}"), "remote ingredient search failed");
                Vec::new()
            }
        }
    }

    /// Local results if there are any, otherwise the backend's.
    #[must_use]
    pub fn search(
        &self,
        provider: &dyn IngredientProvider,
        query: &str,
        limit: usize,
    ) -> Vec<Ingredient> {
        let local = self.search_local(query, limit);
        if !local.is_empty() {
            tracing::debug!(query, hits = local.len(), "served from cache");
            return local;
        }
        if query_is_searchable(query) {
            tracing::debug!(query, "no cached match, falling back to backend search");
        }
        self.search_remote(provider, query, limit)
    }

    pub fn get_by_id(
        &self,
        provider: &dyn IngredientProvider,
        id: i64,
    ) -> Result<Option<Ingredient>> {
        provider.get(id)
    }

    pub fn create(
        &mut self,
        provider: &dyn IngredientProvider,
        ingredient: &NewIngredient,
    ) -> Result<Ingredient> {
        ingredient.validate()?;
        let created = provider.create(ingredient)?;
        self.reload_after_change(provider);
        Ok(created)
    }

    pub fn update(
        &mut self,
        provider: &dyn IngredientProvider,
        id: i64,
        ingredient: &NewIngredient,
    ) -> Result<Ingredient> {
        ingredient.validate()?;
        let updated = provider.update(id, ingredient)?;
        self.reload_after_change(provider);
        Ok(updated)
    }

    pub fn delete(&mut self, provider: &dyn IngredientProvider, id: i64) -> Result<()> {
        provider.delete(id)?;
        self.reload_after_change(provider);
        Ok(())
    }

    fn reload_after_change(&mut self, provider: &dyn IngredientProvider) {
        // `load` has already logged the failure; the mutation itself succeeded.
        let _ = self.load(provider);
    }

    fn replace(&mut self, list: Vec<Ingredient>) {
        match serde_json::to_string(&list) {
            Ok(raw) => {
                if let Err(e) = self.store.set(USER_INGREDIENTS_KEY, &raw) {
                    tracing::warn!(error = %format!("{e:#}"), "failed to persist ingredient snapshot");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize ingredient snapshot"),
        }
        self.snapshot = Some(list);
        self.state = SnapshotState::Fresh;
    }
}

fn query_is_searchable(query: &str) -> bool {
    query.chars().count() >= MIN_QUERY_CHARS
}

fn compare_names(a: &Ingredient, b: &Ingredient) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Unwrap a provider response that may be missing, for callers that treat 404 as an error.
pub fn require_found(found: Option<Ingredient>, id: i64) -> Result<Ingredient> {
    found.ok_or_else(|| anyhow!("Ingredient {id} not found"))
}
