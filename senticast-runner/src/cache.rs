//! On-disk result cache keyed by run id.
//!
//! One pretty-printed JSON `RunReport` per file, `<run id>.json`. The run id
//! hashes the configuration, the dataset, and the model version, so a hit is
//! always a report for identical inputs.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::RunId;
use crate::export::{export_json, import_json, RunReport};

#[derive(Debug, Clone)]
pub struct ResultCache {
    cache_dir: PathBuf,
}

impl ResultCache {
    /// Open a cache rooted at `cache_dir`, creating the directory if needed.
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_dir).with_context(|| {
            format!("failed to create cache directory {}", cache_dir.display())
        })?;
        Ok(Self { cache_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn contains(&self, run_id: &RunId) -> bool {
        self.report_path(run_id).exists()
    }

    pub fn get(&self, run_id: &RunId) -> Result<Option<RunReport>> {
        let path = self.report_path(run_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path).context("failed to read cached report")?;
        let report = import_json(&json).context("failed to decode cached report")?;
        Ok(Some(report))
    }

    pub fn put(&self, report: &RunReport) -> Result<()> {
        let path = self.report_path(&report.run_id);
        std::fs::write(&path, export_json(report)?).context("failed to write cached report")?;
        tracing::debug!(run_id = %report.run_id, "cached run report");
        Ok(())
    }

    /// Cached report for `run_id`, or the result of `run` stored under it.
    /// The flag is true on a cache hit.
    pub fn get_or_insert_with<F>(&self, run_id: &RunId, run: F) -> Result<(RunReport, bool)>
    where
        F: FnOnce() -> Result<RunReport>,
    {
        if let Some(report) = self.get(run_id)? {
            tracing::info!(run_id = %run_id, "result cache hit");
            return Ok((report, true));
        }
        let report = run()?;
        self.put(&report)?;
        Ok((report, false))
    }

    pub fn remove(&self, run_id: &RunId) -> Result<()> {
        let path = self.report_path(run_id);
        if path.exists() {
            std::fs::remove_file(&path).context("failed to remove cached report")?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        for path in self.report_files()? {
            std::fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.report_files()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn report_files(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.cache_dir).context("failed to list cache")?;
        Ok(entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json")
            })
            .collect())
    }

    fn report_path(&self, run_id: &RunId) -> PathBuf {
        self.cache_dir.join(format!("{run_id}.json"))
    }
}
