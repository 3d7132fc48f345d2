//! Hash-gated on-disk cache for derived transfers
//!
//! One JSON file per build id. A cached bundle is reused only when both
//! its derivation version and its source hash match the current build;
//! anything else recomputes and rewrites the file. Writes go to a temp
//! file first and are renamed into place.

use super::{content_hash, derive_transfers, DerivedTransfer};
use crate::config::PreplineConfig;
use crate::models::Build;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bump when derivation output changes shape or meaning
pub const DERIVATION_VERSION: u32 = 1;

/// Derived-data bundle stored per build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedData {
    pub build_id: String,
    pub computed_at: String,
    pub derivation_version: u32,
    pub source_hash: String,
    pub transfers: Vec<DerivedTransfer>,
}

impl DerivedData {
    /// Compute a fresh bundle for a build
    pub fn compute(build: &Build, config: &PreplineConfig) -> Result<Self> {
        Ok(Self {
            build_id: build.id.clone(),
            computed_at: chrono::Utc::now().to_rfc3339(),
            derivation_version: DERIVATION_VERSION,
            source_hash: content_hash(build, config)?,
            transfers: derive_transfers(build, config),
        })
    }

    pub fn is_current(&self, source_hash: &str) -> bool {
        self.derivation_version == DERIVATION_VERSION && self.source_hash == source_hash
    }
}

/// Directory of derived-data files keyed by build id
pub struct DerivedDataCache {
    cache_dir: PathBuf,
}

impl DerivedDataCache {
    pub fn new(cache_dir: &Path) -> Self {
        let cache_dir = cache_dir.to_path_buf();
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!("Failed to create derived-data cache directory: {}", e);
        }
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// File holding a build's bundle; unsafe filename characters become `_`
    pub fn path_for(&self, build_id: &str) -> PathBuf {
        let safe: String = build_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.cache_dir.join(format!("{safe}.derived.json"))
    }

    /// Load a cached bundle, `None` when absent
    pub fn load(&self, build_id: &str) -> Result<Option<DerivedData>> {
        let path = self.path_for(build_id);
        if !path.exists() {
            debug!("No derived data cached at {}", path.display());
            return Ok(None);
        }
        let file = File::open(&path)
            .with_context(|| format!("Failed to open derived data {}", path.display()))?;
        let data: DerivedData = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse derived data {}", path.display()))?;
        Ok(Some(data))
    }

    /// Write a bundle atomically
    pub fn save(&self, data: &DerivedData) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).context("Failed to create cache directory")?;
        let path = self.path_for(&data.build_id);
        let tmp_file = path.with_extension("tmp");

        let file = File::create(&tmp_file).context("Failed to create temp derived-data file")?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, data).context("Failed to write derived data")?;
        writer.flush().context("Failed to flush derived data")?;

        fs::rename(&tmp_file, &path).context("Failed to rename temp derived-data file")?;
        debug!(
            "Saved {} transfers for build {}",
            data.transfers.len(),
            data.build_id
        );
        Ok(())
    }

    pub fn invalidate(&self, build_id: &str) -> Result<()> {
        let path = self.path_for(build_id);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// Return cached transfers when the build's hash and derivation version
/// still match, otherwise recompute and rewrite the cache
pub fn get_or_derive(
    cache: &DerivedDataCache,
    build: &Build,
    config: &PreplineConfig,
) -> Result<DerivedData> {
    let hash = content_hash(build, config)?;

    match cache.load(&build.id) {
        Ok(Some(cached)) if cached.is_current(&hash) => {
            debug!("Derived-data cache hit for build {}", build.id);
            return Ok(cached);
        }
        Ok(Some(cached)) => {
            info!(
                "Derived data for build {} is stale (version {}, hash {}), recomputing",
                build.id,
                cached.derivation_version,
                cached.source_hash.get(..12).unwrap_or(&cached.source_hash)
            );
        }
        Ok(None) => debug!("Derived-data cache miss for build {}", build.id),
        Err(e) => warn!("Ignoring unreadable derived data for {}: {:#}", build.id, e),
    }

    let data = DerivedData::compute(build, config)?;
    cache.save(&data)?;
    Ok(data)
}
