//! Offline asset cache
//!
//! A named, versioned read-through cache for the widget's static assets:
//! - `install` fetches a fixed asset list into the current generation
//! - `activate` deletes every other generation, leaving exactly one live
//! - `fetch` serves the cached copy, then the origin, then a synthetic
//!   `503 Offline` response when both fail
//!
//! Entries live in a fjall keyspace, postcard-encoded, keyed by
//! `<generation>::<asset>`.

pub mod origin;

use std::path::Path;

use chrono::Utc;
use fjall::{Database, Keyspace};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::{debug, info, instrument, warn};

use crate::{CareMapError, Result};

pub use origin::{AssetOrigin, FetchedAsset, StaticOrigin};

const GENERATIONS_KEY: &str = "__generations";
const OFFLINE_BODY: &str = "⚠️ Offline. Resource not cached.";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedAsset {
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
    cached_at: i64, // Unix timestamp (seconds)
}

/// Response produced by [`OfflineCache::fetch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetResponse {
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub from_cache: bool,
}

impl AssetResponse {
    /// Synthetic response used when neither cache nor origin can serve
    #[must_use]
    pub fn offline() -> Self {
        Self {
            status: 503,
            status_text: "Offline".to_string(),
            content_type: Some("text/plain; charset=utf-8".to_string()),
            body: OFFLINE_BODY.as_bytes().to_vec(),
            from_cache: false,
        }
    }

    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.status == 503 && self.status_text == "Offline"
    }

    fn from_origin(fetched: FetchedAsset) -> Self {
        Self {
            status: fetched.status,
            status_text: fetched.status_text(),
            content_type: fetched.content_type,
            body: fetched.body,
            from_cache: false,
        }
    }

    fn from_cached(cached: CachedAsset) -> Self {
        Self {
            status: cached.status,
            status_text: "OK".to_string(),
            content_type: cached.content_type,
            body: cached.body,
            from_cache: true,
        }
    }
}

/// Asset paths are stored without a leading `./` or `/`.
fn normalize_asset(asset: &str) -> &str {
    asset.trim_start_matches("./").trim_start_matches('/')
}

fn entry_key(generation: &str, asset: &str) -> Vec<u8> {
    format!("{generation}::{}", normalize_asset(asset)).into_bytes()
}

fn index_key(generation: &str) -> Vec<u8> {
    format!("{generation}::__index").into_bytes()
}

/// Versioned asset cache. Clones share the same store.
#[derive(Clone)]
pub struct OfflineCache {
    db: Database,
    store: Keyspace,
    name: String,
}

/// Writes applied together by [`OfflineCache::commit`]
#[derive(Default)]
struct StoreBatch {
    puts: Vec<(Vec<u8>, Vec<u8>)>,
    removes: Vec<Vec<u8>>,
}

impl StoreBatch {
    fn put<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> Result<()> {
        let bytes = postcard::to_stdvec(value)
            .map_err(|e| CareMapError::cache(format!("Failed to encode cache entry: {e}")))?;
        self.puts.push((key, bytes));
        Ok(())
    }

    fn remove(&mut self, key: Vec<u8>) {
        self.removes.push(key);
    }
}

impl OfflineCache {
    /// Open (or create) the cache store at `path` with `name` as the current
    /// generation.
    pub fn open(path: impl AsRef<Path>, name: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let db = Database::builder(path).open().map_err(|e| {
            CareMapError::cache(format!("Failed to open cache at {}: {e}", path.display()))
        })?;
        let store = db
            .keyspace("assets", fjall::KeyspaceCreateOptions::default)
            .map_err(|e| CareMapError::cache(format!("Failed to open assets keyspace: {e}")))?;

        Ok(Self {
            db,
            store,
            name: name.into(),
        })
    }

    /// The same store viewed as a different generation
    #[must_use]
    pub fn with_generation(&self, name: impl Into<String>) -> Self {
        Self {
            db: self.db.clone(),
            store: self.store.clone(),
            name: name.into(),
        }
    }

    /// Name of the current generation
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn get_raw(&self, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let store = self.store.clone();
        task::spawn_blocking(move || store.get(key).map(|v| v.map(|v| v.to_vec())))
            .await
            .map_err(|e| CareMapError::cache(format!("Cache task failed: {e}")))?
            .map_err(|e| CareMapError::cache(e.to_string()))
    }

    /// Apply every write in `batch` atomically
    async fn commit(&self, batch: StoreBatch) -> Result<()> {
        let db = self.db.clone();
        let store = self.store.clone();
        task::spawn_blocking(move || {
            let mut writes = db.batch();
            for (key, value) in batch.puts {
                writes.insert(&store, key, value);
            }
            for key in batch.removes {
                writes.remove(&store, key);
            }
            writes.commit()
        })
        .await
        .map_err(|e| CareMapError::cache(format!("Cache task failed: {e}")))?
        .map_err(|e| CareMapError::cache(e.to_string()))
    }

    async fn get_decoded<T: for<'de> Deserialize<'de>>(&self, key: Vec<u8>) -> Result<Option<T>> {
        match self.get_raw(key).await? {
            Some(bytes) => postcard::from_bytes(&bytes)
                .map(Some)
                .map_err(|e| CareMapError::cache(format!("Corrupt cache entry: {e}"))),
            None => Ok(None),
        }
    }

    /// Generations currently holding entries
    pub async fn generations(&self) -> Result<Vec<String>> {
        Ok(self
            .get_decoded::<Vec<String>>(GENERATIONS_KEY.as_bytes().to_vec())
            .await?
            .unwrap_or_default())
    }

    /// Assets stored under the current generation
    pub async fn cached_assets(&self) -> Result<Vec<String>> {
        Ok(self
            .get_decoded::<Vec<String>>(index_key(&self.name))
            .await?
            .unwrap_or_default())
    }

    /// Whether `asset` is cached under the current generation
    pub async fn contains(&self, asset: &str) -> Result<bool> {
        Ok(self.get_raw(entry_key(&self.name, asset)).await?.is_some())
    }

    /// Fetch every asset from `origin` and store it under the current
    /// generation. All-or-nothing: if any asset fails, nothing is stored.
    #[instrument(skip(self, origin, assets), fields(cache = %self.name))]
    pub async fn install<O, S>(&self, origin: &O, assets: &[S]) -> Result<usize>
    where
        O: AssetOrigin + ?Sized,
        S: AsRef<str>,
    {
        let fetched = try_join_all(assets.iter().map(|asset| async move {
            let asset = asset.as_ref();
            let fetched = origin.fetch(asset).await?;
            if !fetched.is_success() {
                return Err(CareMapError::upstream(format!(
                    "Precache of {asset} failed with status {}",
                    fetched.status
                )));
            }
            Ok::<_, CareMapError>((normalize_asset(asset).to_string(), fetched))
        }))
        .await?;

        let cached_at = Utc::now().timestamp();
        let mut index = self.cached_assets().await?;
        let mut batch = StoreBatch::default();
        for (asset, fetched) in fetched {
            let entry = CachedAsset {
                status: fetched.status,
                content_type: fetched.content_type,
                body: fetched.body,
                cached_at,
            };
            batch.put(entry_key(&self.name, &asset), &entry)?;
            debug!("Caching {}", asset);
            if !index.contains(&asset) {
                index.push(asset);
            }
        }
        batch.put(index_key(&self.name), &index)?;

        let mut generations = self.generations().await?;
        if !generations.contains(&self.name) {
            generations.push(self.name.clone());
            batch.put(GENERATIONS_KEY.as_bytes().to_vec(), &generations)?;
        }
        self.commit(batch).await?;

        info!("Installed {} assets into {}", index.len(), self.name);
        Ok(index.len())
    }

    /// Delete every generation other than the current one. Returns the
    /// names removed.
    #[instrument(skip(self), fields(cache = %self.name))]
    pub async fn activate(&self) -> Result<Vec<String>> {
        let generations = self.generations().await?;
        let mut removed = Vec::new();
        let mut batch = StoreBatch::default();

        for generation in generations.iter().filter(|g| **g != self.name) {
            let assets: Vec<String> = self
                .get_decoded(index_key(generation))
                .await?
                .unwrap_or_default();
            for asset in &assets {
                batch.remove(entry_key(generation, asset));
            }
            batch.remove(index_key(generation));
            info!("Removing old cache: {}", generation);
            removed.push(generation.clone());
        }

        let live: Vec<String> = generations
            .into_iter()
            .filter(|g| *g == self.name)
            .collect();
        batch.put(GENERATIONS_KEY.as_bytes().to_vec(), &live)?;
        self.commit(batch).await?;

        Ok(removed)
    }

    /// Serve `asset` cache-first, falling back to `origin`, then to a
    /// synthetic offline response.
    #[instrument(skip(self, origin), fields(cache = %self.name))]
    pub async fn fetch<O>(&self, origin: &O, asset: &str) -> AssetResponse
    where
        O: AssetOrigin + ?Sized,
    {
        match self
            .get_decoded::<CachedAsset>(entry_key(&self.name, asset))
            .await
        {
            Ok(Some(cached)) => {
                debug!("Serving {} from cache", asset);
                return AssetResponse::from_cached(cached);
            }
            Ok(None) => {}
            Err(e) => warn!("Cache lookup for {} failed: {}", asset, e),
        }

        match origin.fetch(normalize_asset(asset)).await {
            Ok(fetched) => AssetResponse::from_origin(fetched),
            Err(e) => {
                warn!("Origin fetch for {} failed, answering offline: {}", asset, e);
                AssetResponse::offline()
            }
        }
    }
}
