use flowcore::{FlowError, WorkflowDefinition};
use std::path::{Path, PathBuf};

/// Reads workflow definitions from `*.json` files in a directory.
pub struct WorkflowLoader {
    dir: PathBuf,
}

impl WorkflowLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Definitions in file name order.
    pub async fn load_all(&self) -> Result<Vec<WorkflowDefinition>, FlowError> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension() == Some("json".as_ref()) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut definitions = Vec::with_capacity(paths.len());
        for path in paths {
            definitions.push(load_file(&path).await?);
        }
        tracing::debug!("Loaded {} workflows from {}", definitions.len(), self.dir.display());
        Ok(definitions)
    }
}

pub async fn load_file(path: &Path) -> Result<WorkflowDefinition, FlowError> {
    let raw = tokio::fs::read(path).await?;
    serde_json::from_slice(&raw).map_err(|e| {
        FlowError::Configuration(format!("invalid workflow file {}: {}", path.display(), e))
    })
}
