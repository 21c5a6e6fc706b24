//! # Workflow Config Cache
//!
//! Holds one [`ConfigCacheEntry`] per entity kind. An entry is served as long as it is
//! younger than the TTL and was loaded for the same context fingerprint; otherwise the
//! source is read again and the entry is swapped wholesale. Readers clone an `Arc` out of
//! the map, so a concurrent reload never exposes a partially built spec.
//!
//! Loading never fails from the caller's point of view: an absent document yields the
//! built-in workflow, and an unreadable or malformed one yields the built-in workflow plus
//! a warning.

use super::source::{ConfigContext, WorkflowConfigSource};
use super::workflow::WorkflowSpec;
use crate::config::CacheConfig;
use crate::constants::events;
use crate::models::EntityKind;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct ConfigCacheEntry {
    pub spec: Arc<WorkflowSpec>,
    pub loaded_at: Instant,
    pub source_fingerprint: String,
    /// True when the spec is the built-in fallback rather than a loaded document
    pub fallback: bool,
}

impl ConfigCacheEntry {
    fn is_fresh(&self, ttl: Duration, fingerprint: &str) -> bool {
        self.loaded_at.elapsed() < ttl && self.source_fingerprint == fingerprint
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub reloads: u64,
    pub fallbacks: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    reloads: AtomicU64,
    fallbacks: AtomicU64,
}

#[derive(Debug)]
pub struct ConfigCache {
    source: Arc<dyn WorkflowConfigSource>,
    entries: RwLock<HashMap<EntityKind, Arc<ConfigCacheEntry>>>,
    ttl: Duration,
    enabled: bool,
    counters: Counters,
}

impl ConfigCache {
    pub fn new(source: Arc<dyn WorkflowConfigSource>, config: &CacheConfig) -> Self {
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
            ttl: config.ttl(),
            enabled: config.enabled,
            counters: Counters::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Workflow spec for `kind` in `context`
    pub async fn get(&self, kind: EntityKind, context: &ConfigContext) -> Arc<WorkflowSpec> {
        let fingerprint = context.fingerprint();

        let stale = if self.enabled {
            let entries = self.entries.read().await;
            match entries.get(&kind) {
                Some(entry) if entry.is_fresh(self.ttl, &fingerprint) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(entity_kind = %kind, "Workflow config cache hit");
                    return entry.spec.clone();
                }
                Some(_) => true,
                None => false,
            }
        } else {
            false
        };

        if stale {
            self.counters.reloads.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }

        let entry = Arc::new(self.load(kind, context, fingerprint).await);
        let spec = entry.spec.clone();
        if self.enabled {
            self.entries.write().await.insert(kind, entry);
        }
        spec
    }

    /// Currently cached entry for `kind`, fresh or not
    pub async fn entry(&self, kind: EntityKind) -> Option<Arc<ConfigCacheEntry>> {
        self.entries.read().await.get(&kind).cloned()
    }

    pub async fn invalidate(&self, kind: EntityKind) {
        self.entries.write().await.remove(&kind);
        debug!(entity_kind = %kind, "Invalidated workflow config cache entry");
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
        info!("Cleared workflow config cache");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            reloads: self.counters.reloads.load(Ordering::Relaxed),
            fallbacks: self.counters.fallbacks.load(Ordering::Relaxed),
        }
    }

    async fn load(
        &self,
        kind: EntityKind,
        context: &ConfigContext,
        fingerprint: String,
    ) -> ConfigCacheEntry {
        let started = Instant::now();
        let loaded = match self.source.load(context).await {
            Ok(Some(document)) => document.spec_for(kind).map(Some),
            Ok(None) => Ok(None),
            Err(err) => Err(err),
        };

        let (spec, fallback) = match loaded {
            Ok(Some(spec)) => {
                info!(
                    event = events::WORKFLOW_CONFIG_RELOADED,
                    entity_kind = %kind,
                    context = %fingerprint,
                    statuses = spec.allowed_statuses.len(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Loaded workflow config"
                );
                (spec, false)
            }
            Ok(None) => {
                debug!(
                    event = events::WORKFLOW_CONFIG_FALLBACK,
                    entity_kind = %kind,
                    context = %fingerprint,
                    "No workflow document, using built-in workflow"
                );
                (WorkflowSpec::built_in(kind), true)
            }
            Err(err) => {
                warn!(
                    event = events::WORKFLOW_CONFIG_FALLBACK,
                    entity_kind = %kind,
                    context = %fingerprint,
                    error = %err,
                    "Workflow document unusable, using built-in workflow"
                );
                (WorkflowSpec::built_in(kind), true)
            }
        };

        if fallback {
            self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
        }

        ConfigCacheEntry {
            spec: Arc::new(spec),
            loaded_at: Instant::now(),
            source_fingerprint: fingerprint,
            fallback,
        }
    }
}
