//! Read-only inputs produced by external collaborators (standard extraction
//! and similarity search). Only the fields named here are interpreted.

use crate::domain::mapping::EvidenceMatch;
use crate::domain::vocab::GuidelineType;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
pub struct SimilarityResult {
    #[serde(default)]
    pub section_matches: Vec<EvidenceMatch>,
    #[serde(default)]
    pub paragraph_matches: Vec<EvidenceMatch>,
}

impl SimilarityResult {
    pub fn best_section_score(&self) -> Option<f64> {
        self.section_matches
            .iter()
            .map(|m| m.score)
            .fold(None, |acc, s| Some(acc.map_or(s, |a: f64| a.max(s))))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SimilarityIndex {
    #[serde(default)]
    pub results: BTreeMap<String, SimilarityResult>,
}

impl SimilarityIndex {
    pub fn best_score(&self, guideline_id: &str) -> Option<f64> {
        self.results
            .get(guideline_id)
            .and_then(|r| r.best_section_score())
    }
}

#[derive(Debug, Deserialize)]
pub struct StandardGuideline {
    pub id: String,
    #[serde(rename = "type")]
    pub guideline_type: GuidelineType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub decidability: Option<String>,
    #[serde(default)]
    pub analysis_scope: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StandardDefinition {
    #[serde(default)]
    pub standard: Option<String>,
    pub guidelines: Vec<StandardGuideline>,
}
