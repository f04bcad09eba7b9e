use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::action_processor::BazelTarget;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub targets: Vec<BazelTarget>,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheFile {
    pub entries: HashMap<String, CacheEntry>,
}

/// Computes the cache key for a set of top-level labels: sorted, `|`-joined.
pub fn cache_key(labels: &[String]) -> String {
    let mut sorted: Vec<&str> = labels.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join("|")
}

enum WriteRequest {
    Save {
        key: String,
        targets: Vec<BazelTarget>,
        reply: oneshot::Sender<EngineResult<()>>,
    },
}

/// Key-addressed, process-wide JSON file holding prior results. Reads
/// happen directly; writes are serialized through a dedicated task so
/// concurrent saves never interleave (spec §4.7).
pub struct BazelTargetCache {
    path: PathBuf,
    writer: mpsc::UnboundedSender<WriteRequest>,
}

impl BazelTargetCache {
    /// Opens the cache under `~/.bazel-sourcekit-bsp/bazel-targets-cache.json`,
    /// creating the directory if it does not exist.
    pub fn open() -> EngineResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::custom("could not determine home directory"))?;
        let dir = home.join(".bazel-sourcekit-bsp");
        std::fs::create_dir_all(&dir)
            .map_err(|e| EngineError::custom(format!("failed to create cache dir: {}", e)))?;
        Ok(Self::at(dir.join("bazel-targets-cache.json")))
    }

    /// Opens the cache at an explicit path (used by tests).
    pub fn at(path: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteRequest>();
        let writer_path = path.clone();

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match request {
                    WriteRequest::Save {
                        key,
                        targets,
                        reply,
                    } => {
                        let result = write_entry(&writer_path, key, targets);
                        let _ = reply.send(result);
                    }
                }
            }
        });

        Self { path, writer: tx }
    }

    pub fn load(&self, key: &str) -> Option<Vec<BazelTarget>> {
        let file = read_cache_file(&self.path).ok()?;
        file.entries.get(key).map(|entry| entry.targets.clone())
    }

    pub async fn save(&self, key: String, targets: Vec<BazelTarget>) -> EngineResult<()> {
        let (reply, rx) = oneshot::channel();
        self.writer
            .send(WriteRequest::Save {
                key,
                targets,
                reply,
            })
            .map_err(|_| EngineError::custom("cache writer task is gone"))?;
        rx.await
            .map_err(|_| EngineError::custom("cache writer task dropped the reply"))?
    }
}

fn read_cache_file(path: &PathBuf) -> EngineResult<CacheFile> {
    let bytes = std::fs::read(path).map_err(|e| EngineError::custom(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(EngineError::from)
}

fn write_entry(path: &PathBuf, key: String, targets: Vec<BazelTarget>) -> EngineResult<()> {
    // A failure to read the existing file is treated as an empty cache.
    let mut file = read_cache_file(path).unwrap_or_default();
    file.entries.insert(
        key,
        CacheEntry {
            targets,
            timestamp: SystemTime::now(),
        },
    );
    let pretty = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, pretty).map_err(|e| EngineError::custom(e.to_string()))?;
    Ok(())
}
