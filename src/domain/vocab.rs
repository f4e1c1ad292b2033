use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidelineType {
    Rule,
    Directive,
}

/// One of the two independent verification dimensions.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Context {
    #[value(name = "all_rust")]
    AllRust,
    #[value(name = "safe_rust")]
    SafeRust,
}

impl Context {
    pub const ALL: [Context; 2] = [Context::AllRust, Context::SafeRust];

    pub fn as_str(&self) -> &'static str {
        match self {
            Context::AllRust => "all_rust",
            Context::SafeRust => "safe_rust",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ContextScope {
    #[value(name = "all_rust")]
    AllRust,
    #[value(name = "safe_rust")]
    SafeRust,
    Both,
}

impl ContextScope {
    pub fn contexts(&self) -> &'static [Context] {
        match self {
            ContextScope::AllRust => &[Context::AllRust],
            ContextScope::SafeRust => &[Context::SafeRust],
            ContextScope::Both => &Context::ALL,
        }
    }

    pub fn includes(&self, context: Context) -> bool {
        self.contexts().contains(&context)
    }
}

/// Legacy (flat, v1.x) applicability vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicabilityV1 {
    Direct,
    Partial,
    NotApplicable,
    RustPrevents,
    Unmapped,
}

/// Per-context (v2.0+) applicability vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Applicability {
    Yes,
    No,
    Partial,
}

impl Applicability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Applicability::Yes => "yes",
            Applicability::No => "no",
            Applicability::Partial => "partial",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RationaleType {
    #[value(name = "direct_mapping")]
    DirectMapping,
    #[value(name = "partial_mapping")]
    PartialMapping,
    #[value(name = "rust_alternative")]
    RustAlternative,
    #[value(name = "rust_prevents")]
    RustPrevents,
    #[value(name = "no_equivalent")]
    NoEquivalent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AdjustedCategory {
    Required,
    Advisory,
    Recommended,
    Disapplied,
    Implicit,
    #[value(name = "n_a")]
    NA,
}

impl AdjustedCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustedCategory::Required => "required",
            AdjustedCategory::Advisory => "advisory",
            AdjustedCategory::Recommended => "recommended",
            AdjustedCategory::Disapplied => "disapplied",
            AdjustedCategory::Implicit => "implicit",
            AdjustedCategory::NA => "n_a",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    #[value(name = "accept_with_modifications")]
    AcceptWithModifications,
    #[value(name = "accept_no_matches")]
    AcceptNoMatches,
    #[value(name = "accept_existing")]
    AcceptExisting,
    Reject,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SearchTool {
    #[value(name = "semantic_search")]
    SemanticSearch,
    #[value(name = "deep_search")]
    DeepSearch,
    #[value(name = "keyword_search")]
    KeywordSearch,
    #[value(name = "section_read")]
    SectionRead,
    #[value(name = "similarity_recompute")]
    SimilarityRecompute,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WaiverReason {
    #[value(name = "tool_unavailable")]
    ToolUnavailable,
    #[value(name = "evidence_precomputed")]
    EvidencePrecomputed,
    #[value(name = "trivial_guideline")]
    TrivialGuideline,
    #[value(name = "reviewer_override")]
    ReviewerOverride,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeField {
    Applicability,
    AdjustedCategory,
}

/// Tri-state gate on a proposed applicability change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approval {
    #[default]
    Unset,
    Approved,
    Rejected,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BatchStatus::Pending => "pending",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
        })
    }
}
