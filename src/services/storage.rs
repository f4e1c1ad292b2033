use crate::domain::constants::DEFAULT_STANDARD;
use crate::domain::errors::WorkflowError;
use crate::domain::inputs::SimilarityIndex;
use crate::domain::mapping::MappingStore;
use crate::services::config::{load_config, ConfigFile};
use anyhow::Context as _;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Resolves every artifact path from (root, standard, batch, session).
pub struct Workspace {
    pub root: PathBuf,
    pub standard: String,
    pub config: ConfigFile,
}

impl Workspace {
    pub fn open(root: &Path, standard: Option<&str>) -> anyhow::Result<Self> {
        let config = load_config(root)?;
        let standard = standard
            .map(str::to_string)
            .or_else(|| config.workspace.standard.clone())
            .unwrap_or_else(|| DEFAULT_STANDARD.to_string());
        Ok(Self {
            root: root.to_path_buf(),
            standard,
            config,
        })
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.root
            .join(&self.config.paths.mappings)
            .join(format!("{}.json", self.standard))
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.mappings).join("backups")
    }

    pub fn progress_path(&self) -> PathBuf {
        self.root
            .join(&self.config.paths.progress)
            .join(format!("{}.json", self.standard))
    }

    pub fn verification_dir(&self) -> PathBuf {
        self.root
            .join(&self.config.paths.verification)
            .join(&self.standard)
    }

    pub fn report_path(&self, batch_id: u32, session_id: u32) -> PathBuf {
        self.verification_dir()
            .join(format!("batch{}_session{}.json", batch_id, session_id))
    }

    pub fn decisions_dir(&self, batch_id: u32) -> PathBuf {
        self.verification_dir()
            .join(format!("batch{}_decisions", batch_id))
    }

    pub fn similarity_path(&self) -> PathBuf {
        self.root
            .join(&self.config.paths.similarity)
            .join(&self.standard)
            .join("similarity.json")
    }

    pub fn standard_definition_path(&self) -> PathBuf {
        self.root
            .join(&self.config.paths.standards)
            .join(format!("{}.json", self.standard))
    }

    pub fn audit_path(&self) -> PathBuf {
        self.root.join(".stdmap").join("audit.jsonl")
    }

    /// Session ids of every report written for `batch_id`, ascending.
    pub fn report_sessions(&self, batch_id: u32) -> anyhow::Result<Vec<u32>> {
        let dir = self.verification_dir();
        if !dir.exists() {
            return Ok(vec![]);
        }
        let prefix = format!("batch{}_session", batch_id);
        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let name = entry?.file_name().to_string_lossy().to_string();
            if let Some(n) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|n| n.parse::<u32>().ok())
            {
                sessions.push(n);
            }
        }
        sessions.sort_unstable();
        Ok(sessions)
    }

    pub fn latest_report_path(&self, batch_id: u32) -> anyhow::Result<Option<PathBuf>> {
        Ok(self
            .report_sessions(batch_id)?
            .last()
            .map(|s| self.report_path(batch_id, *s)))
    }

    /// `session`, or the latest session on disk. Fails when no report exists.
    pub fn resolve_session(&self, batch_id: u32, session: Option<u32>) -> anyhow::Result<u32> {
        if let Some(s) = session {
            return Ok(s);
        }
        self.report_sessions(batch_id)?
            .last()
            .copied()
            .ok_or_else(|| WorkflowError::NotFound(format!("batch report for batch {}", batch_id)).into())
    }

    /// Every batch report file of the standard, in name order.
    pub fn all_report_paths(&self) -> anyhow::Result<Vec<PathBuf>> {
        let dir = self.verification_dir();
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut out: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("batch") && n.contains("_session") && n.ends_with(".json"))
            })
            .collect();
        out.sort();
        Ok(out)
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub fn read_json_value(path: &Path) -> anyhow::Result<serde_json::Value> {
    read_json(path)
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn load_mapping(ws: &Workspace) -> anyhow::Result<MappingStore> {
    let path = ws.mapping_path();
    if !path.exists() {
        return Err(WorkflowError::NotFound(format!("mapping store {}", path.display())).into());
    }
    read_json(&path)
}

/// Similarity results are optional; a missing file yields `None`.
pub fn load_similarity(ws: &Workspace) -> anyhow::Result<Option<SimilarityIndex>> {
    let path = ws.similarity_path();
    if !path.exists() {
        tracing::warn!(path = %path.display(), "similarity file not found");
        return Ok(None);
    }
    Ok(Some(read_json(&path)?))
}

pub fn save_mapping(ws: &Workspace, store: &MappingStore) -> anyhow::Result<()> {
    write_json(&ws.mapping_path(), store)
}

/// Copies `src` into `dir` under a timestamped name and returns the copy.
pub fn backup_file(src: &Path, dir: &Path, label: &str) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let dst = dir.join(format!("{}.{}.json", label, stamp));
    std::fs::copy(src, &dst)
        .with_context(|| format!("backing up {} to {}", src.display(), dst.display()))?;
    Ok(dst)
}

pub fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Appends one JSON line to the workspace audit log. Failures are ignored.
pub fn audit(ws: &Workspace, action: &str, data: serde_json::Value) {
    let path = ws.audit_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let event = serde_json::json!({
        "ts": chrono::Utc::now().to_rfc3339(),
        "standard": ws.standard,
        "action": action,
        "data": data
    });
    let line = format!("{}\n", event);
    let _ = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| std::io::Write::write_all(&mut f, line.as_bytes()));
}
