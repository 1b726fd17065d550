use std::path::{Path, PathBuf};
use sunsetwx_core::{LaunchError, LaunchRecord, Result};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Append-only JSON-lines log of launch records
#[derive(Debug, Clone)]
pub struct RunHistory {
    path: PathBuf,
}

impl RunHistory {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &LaunchRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(record)
            .map_err(|e| LaunchError::HistoryError(format!("Failed to encode record: {}", e)))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// All records in the order they were written. Unreadable lines are skipped.
    pub async fn load(&self) -> Result<Vec<LaunchRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LaunchRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = idx + 1,
                    error = %e,
                    "Skipping unreadable history line"
                ),
            }
        }

        Ok(records)
    }

    /// Most recent records first
    pub async fn recent(&self, limit: usize) -> Result<Vec<LaunchRecord>> {
        let mut records = self.load().await?;
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(records.into_iter().take(limit).collect())
    }
}
