use crate::domain::schema_version::{applicability_v2_to_v1, detect_version, SchemaVersion};
use crate::domain::vocab::{
    AdjustedCategory, Applicability, ApplicabilityV1, Confidence, Context, GuidelineType,
    RationaleType,
};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// One candidate section of the target language specification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMatch {
    pub target_id: String,
    #[serde(default)]
    pub category: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub reason: String,
}

/// Classification data copied from the standard itself (1.2 / 2.2 and later).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub decidability: Option<String>,
    #[serde(default)]
    pub analysis_scope: Option<String>,
}

/// Legacy entry: one block shared by both contexts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlatEntry {
    pub schema_version: SchemaVersion,
    pub guideline_id: String,
    pub guideline_type: GuidelineType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guideline_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_metadata: Option<SourceMetadata>,
    #[serde(default)]
    pub applicability: Option<ApplicabilityV1>,
    #[serde(default)]
    pub adjusted_category: Option<AdjustedCategory>,
    #[serde(default)]
    pub rationale_type: Option<RationaleType>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub accepted_matches: Vec<EvidenceMatch>,
    #[serde(default)]
    pub rejected_matches: Vec<EvidenceMatch>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBlock {
    #[serde(default)]
    pub applicability: Option<Applicability>,
    #[serde(default)]
    pub adjusted_category: Option<AdjustedCategory>,
    #[serde(default)]
    pub rationale_type: Option<RationaleType>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub accepted_matches: Vec<EvidenceMatch>,
    #[serde(default)]
    pub rejected_matches: Vec<EvidenceMatch>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub verified_by_session: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
    /// 3.0+
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_date: Option<NaiveDate>,
    /// 3.0+
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_ids: Vec<String>,
}

/// Entry with independent `all_rust` / `safe_rust` blocks (2.0+).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub schema_version: SchemaVersion,
    pub guideline_id: String,
    pub guideline_type: GuidelineType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guideline_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_metadata: Option<SourceMetadata>,
    pub all_rust: ContextBlock,
    pub safe_rust: ContextBlock,
    /// 4.0+: revision of the target specification the matches refer to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_revision: Option<String>,
}

impl ContextEntry {
    pub fn block(&self, context: Context) -> &ContextBlock {
        match context {
            Context::AllRust => &self.all_rust,
            Context::SafeRust => &self.safe_rust,
        }
    }

    pub fn block_mut(&mut self, context: Context) -> &mut ContextBlock {
        match context {
            Context::AllRust => &mut self.all_rust,
            Context::SafeRust => &mut self.safe_rust,
        }
    }
}

/// Canonical per-guideline record, discriminated by `schema_version`.
///
/// Records without a version tag are classified structurally on load.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MappingEntry {
    Flat(FlatEntry),
    PerContext(ContextEntry),
}

impl<'de> Deserialize<'de> for MappingEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let mut raw = serde_json::Value::deserialize(deserializer)?;
        let version = detect_version(&raw).map_err(D::Error::custom)?;
        if let Some(obj) = raw.as_object_mut() {
            obj.insert(
                "schema_version".to_string(),
                serde_json::Value::String(version.to_string()),
            );
        }
        if version.is_flat() {
            serde_json::from_value(raw)
                .map(MappingEntry::Flat)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(raw)
                .map(MappingEntry::PerContext)
                .map_err(D::Error::custom)
        }
    }
}

impl MappingEntry {
    pub fn guideline_id(&self) -> &str {
        match self {
            MappingEntry::Flat(e) => &e.guideline_id,
            MappingEntry::PerContext(e) => &e.guideline_id,
        }
    }

    pub fn guideline_type(&self) -> GuidelineType {
        match self {
            MappingEntry::Flat(e) => e.guideline_type,
            MappingEntry::PerContext(e) => e.guideline_type,
        }
    }

    pub fn guideline_title(&self) -> Option<&str> {
        match self {
            MappingEntry::Flat(e) => e.guideline_title.as_deref(),
            MappingEntry::PerContext(e) => e.guideline_title.as_deref(),
        }
    }

    pub fn schema_version(&self) -> SchemaVersion {
        match self {
            MappingEntry::Flat(e) => e.schema_version,
            MappingEntry::PerContext(e) => e.schema_version,
        }
    }

    /// Applicability in the legacy vocabulary. Per-context entries report
    /// their `all_rust` value through the lossy v2 -> v1 conversion.
    pub fn applicability_v1(&self) -> Option<ApplicabilityV1> {
        match self {
            MappingEntry::Flat(e) => e.applicability,
            MappingEntry::PerContext(e) => e.all_rust.applicability.map(applicability_v2_to_v1),
        }
    }

    /// Flat confidence, or the `all_rust` confidence for per-context entries.
    pub fn confidence(&self) -> Option<Confidence> {
        match self {
            MappingEntry::Flat(e) => e.confidence,
            MappingEntry::PerContext(e) => e.all_rust.confidence,
        }
    }

    pub fn is_verified(&self, context: Context) -> bool {
        match self {
            MappingEntry::Flat(_) => false,
            MappingEntry::PerContext(e) => e.block(context).verified,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MappingStore {
    #[serde(default)]
    pub standard: String,
    #[serde(default)]
    pub mappings: Vec<MappingEntry>,
}

impl MappingStore {
    pub fn find(&self, guideline_id: &str) -> Option<&MappingEntry> {
        self.mappings
            .iter()
            .find(|m| m.guideline_id() == guideline_id)
    }

    pub fn position(&self, guideline_id: &str) -> Option<usize> {
        self.mappings
            .iter()
            .position(|m| m.guideline_id() == guideline_id)
    }
}

/// Numeric `(category, sub-index)` of an id such as `Rule 21.3` or `Dir 4.1`.
/// Unparseable parts sort last.
pub fn guideline_number(guideline_id: &str) -> (u32, u32) {
    let number = guideline_id
        .split_whitespace()
        .last()
        .unwrap_or(guideline_id);
    let mut parts = number.split('.');
    let category = parts
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or(u32::MAX);
    let sub = parts.next().and_then(|p| p.parse().ok()).unwrap_or(u32::MAX);
    (category, sub)
}

/// Reproducible ordering: directives before rules, then category, then sub-index.
pub fn guideline_sort_key(guideline_id: &str, guideline_type: GuidelineType) -> (u8, u32, u32, String) {
    let type_rank = match guideline_type {
        GuidelineType::Directive => 0,
        GuidelineType::Rule => 1,
    };
    let (category, sub) = guideline_number(guideline_id);
    (type_rank, category, sub, guideline_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn untagged_flat_record_loads_as_v1() {
        let entry: MappingEntry = serde_json::from_value(json!({
            "guideline_id": "Rule 21.3",
            "guideline_type": "rule",
            "applicability": "direct",
            "confidence": "medium",
            "accepted_matches": []
        }))
        .unwrap();
        assert_eq!(entry.schema_version(), SchemaVersion::V1_0);
        assert!(matches!(entry, MappingEntry::Flat(_)));
        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["schema_version"], "1.0");
    }

    #[test]
    fn per_context_record_keeps_declared_version() {
        let entry: MappingEntry = serde_json::from_value(json!({
            "schema_version": "3.1",
            "guideline_id": "Dir 4.1",
            "guideline_type": "directive",
            "all_rust": {"applicability": "no", "verified": true},
            "safe_rust": {"applicability": "yes"}
        }))
        .unwrap();
        assert_eq!(entry.schema_version(), SchemaVersion::V3_1);
        assert_eq!(entry.applicability_v1(), Some(ApplicabilityV1::NotApplicable));
        assert!(entry.is_verified(Context::AllRust));
        assert!(!entry.is_verified(Context::SafeRust));
    }

    #[test]
    fn sort_key_puts_directives_first_and_orders_numerically() {
        let mut ids = vec![
            ("Rule 10.2", GuidelineType::Rule),
            ("Rule 2.1", GuidelineType::Rule),
            ("Dir 4.10", GuidelineType::Directive),
            ("Dir 4.2", GuidelineType::Directive),
        ];
        ids.sort_by_key(|(id, t)| guideline_sort_key(id, *t));
        let ordered: Vec<&str> = ids.iter().map(|(id, _)| *id).collect();
        assert_eq!(ordered, vec!["Dir 4.2", "Dir 4.10", "Rule 2.1", "Rule 10.2"]);
    }
}
