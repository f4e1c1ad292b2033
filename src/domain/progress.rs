use crate::domain::schema_version::SchemaVersion;
use crate::domain::vocab::{BatchStatus, Context};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextProgress {
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub session_id: Option<u32>,
    #[serde(default)]
    pub verified_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressGuideline {
    pub guideline_id: String,
    #[serde(default)]
    pub all_rust: ContextProgress,
    #[serde(default)]
    pub safe_rust: ContextProgress,
}

impl ProgressGuideline {
    pub fn new(guideline_id: impl Into<String>) -> Self {
        Self {
            guideline_id: guideline_id.into(),
            all_rust: ContextProgress::default(),
            safe_rust: ContextProgress::default(),
        }
    }

    pub fn context(&self, context: Context) -> &ContextProgress {
        match context {
            Context::AllRust => &self.all_rust,
            Context::SafeRust => &self.safe_rust,
        }
    }

    pub fn context_mut(&mut self, context: Context) -> &mut ContextProgress {
        match context {
            Context::AllRust => &mut self.all_rust,
            Context::SafeRust => &mut self.safe_rust,
        }
    }

    pub fn any_verified(&self) -> bool {
        self.all_rust.verified || self.safe_rust.verified
    }

    pub fn fully_verified(&self) -> bool {
        self.all_rust.verified && self.safe_rust.verified
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressBatch {
    pub batch_id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: BatchStatus,
    pub guidelines: Vec<ProgressGuideline>,
}

impl ProgressBatch {
    pub fn guideline_mut(&mut self, guideline_id: &str) -> Option<&mut ProgressGuideline> {
        self.guidelines
            .iter_mut()
            .find(|g| g.guideline_id == guideline_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total_guidelines: usize,
    pub verified_all_rust: usize,
    pub verified_safe_rust: usize,
    pub fully_verified: usize,
    pub batches_completed: usize,
    pub batches_in_progress: usize,
}

/// Progress tracker, always held in the per-context (2.0) shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressFile {
    pub schema_version: SchemaVersion,
    pub standard: String,
    pub batches: Vec<ProgressBatch>,
    #[serde(default)]
    pub summary: ProgressSummary,
}

impl ProgressFile {
    pub fn batch(&self, batch_id: u32) -> Option<&ProgressBatch> {
        self.batches.iter().find(|b| b.batch_id == batch_id)
    }

    pub fn batch_mut(&mut self, batch_id: u32) -> Option<&mut ProgressBatch> {
        self.batches.iter_mut().find(|b| b.batch_id == batch_id)
    }
}

/// 1.0 progress: one verified flag per guideline.
#[derive(Clone, Debug, Deserialize)]
pub struct LegacyProgressGuideline {
    pub guideline_id: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub session_id: Option<u32>,
    #[serde(default)]
    pub verified_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LegacyProgressBatch {
    pub batch_id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: BatchStatus,
    pub guidelines: Vec<LegacyProgressGuideline>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LegacyProgressFile {
    #[serde(default)]
    pub standard: String,
    pub batches: Vec<LegacyProgressBatch>,
}

impl From<LegacyProgressFile> for ProgressFile {
    fn from(legacy: LegacyProgressFile) -> Self {
        let batches = legacy
            .batches
            .into_iter()
            .map(|b| ProgressBatch {
                batch_id: b.batch_id,
                name: b.name,
                description: b.description,
                status: b.status,
                guidelines: b
                    .guidelines
                    .into_iter()
                    .map(|g| {
                        let ctx = ContextProgress {
                            verified: g.verified,
                            session_id: g.session_id,
                            verified_date: g.verified_date,
                        };
                        ProgressGuideline {
                            guideline_id: g.guideline_id,
                            all_rust: ctx.clone(),
                            safe_rust: ctx,
                        }
                    })
                    .collect(),
            })
            .collect();
        ProgressFile {
            schema_version: SchemaVersion::V2_0,
            standard: legacy.standard,
            batches,
            summary: ProgressSummary::default(),
        }
    }
}
