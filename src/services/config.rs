use crate::domain::constants::{
    DEFAULT_MAX_MATCHES, DEFAULT_PARAGRAPH_THRESHOLD, DEFAULT_SECTION_THRESHOLD,
};
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "stdmap.toml";

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub workspace: WorkspaceSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub evidence: EvidenceSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct WorkspaceSection {
    #[serde(default)]
    pub standard: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub mappings: String,
    pub progress: String,
    pub verification: String,
    pub similarity: String,
    pub standards: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            mappings: "mappings".to_string(),
            progress: "progress".to_string(),
            verification: "cache/verification".to_string(),
            similarity: "embeddings".to_string(),
            standards: "standards".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EvidenceSection {
    pub section_threshold: f64,
    pub paragraph_threshold: f64,
    pub max_matches: usize,
}

impl Default for EvidenceSection {
    fn default() -> Self {
        Self {
            section_threshold: DEFAULT_SECTION_THRESHOLD,
            paragraph_threshold: DEFAULT_PARAGRAPH_THRESHOLD,
            max_matches: DEFAULT_MAX_MATCHES,
        }
    }
}

pub fn load_config(root: &Path) -> anyhow::Result<ConfigFile> {
    let path = root.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: ConfigFile = toml::from_str(
            r#"[evidence]
section_threshold = 0.6
"#,
        )
        .unwrap();
        assert_eq!(cfg.evidence.section_threshold, 0.6);
        assert_eq!(cfg.evidence.paragraph_threshold, DEFAULT_PARAGRAPH_THRESHOLD);
        assert_eq!(cfg.paths.mappings, "mappings");
        assert!(cfg.workspace.standard.is_none());
    }
}
