use crate::domain::mapping::EvidenceMatch;
use crate::domain::vocab::{
    AdjustedCategory, Applicability, ChangeField, Confidence, Context, DecisionKind,
    RationaleType, SearchTool, WaiverReason,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchToolUsage {
    pub search_id: String,
    pub tool: SearchTool,
    pub query: String,
    #[serde(default)]
    pub result_count: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchWaiver {
    pub search_id: String,
    pub reason: WaiverReason,
    pub approver: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
}

/// Proof that evidence was gathered: a non-empty list of tool usages or a
/// single approved waiver, never both.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchEvidence {
    Usage { searches: Vec<SearchToolUsage> },
    Waiver { waiver: SearchWaiver },
}

impl SearchEvidence {
    pub fn search_ids(&self) -> Vec<&str> {
        match self {
            SearchEvidence::Usage { searches } => {
                searches.iter().map(|s| s.search_id.as_str()).collect()
            }
            SearchEvidence::Waiver { waiver } => vec![waiver.search_id.as_str()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum ProposedChange {
    Applicability {
        proposed_value: Applicability,
        #[serde(default)]
        rationale: String,
    },
    AdjustedCategory {
        proposed_value: AdjustedCategory,
        #[serde(default)]
        rationale: String,
    },
}

impl ProposedChange {
    pub fn field(&self) -> ChangeField {
        match self {
            ProposedChange::Applicability { .. } => ChangeField::Applicability,
            ProposedChange::AdjustedCategory { .. } => ChangeField::AdjustedCategory,
        }
    }

    pub fn value_str(&self) -> &'static str {
        match self {
            ProposedChange::Applicability { proposed_value, .. } => proposed_value.as_str(),
            ProposedChange::AdjustedCategory { proposed_value, .. } => proposed_value.as_str(),
        }
    }
}

/// Decision for one context. Every field is optional so that the empty
/// value doubles as the scaffold a batch report hands to workers; a
/// context counts as decided once `decision` is set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextDecision {
    #[serde(default)]
    pub decision: Option<DecisionKind>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub rationale_type: Option<RationaleType>,
    #[serde(default)]
    pub adjusted_category: Option<AdjustedCategory>,
    #[serde(default)]
    pub accepted_matches: Vec<EvidenceMatch>,
    #[serde(default)]
    pub rejected_matches: Vec<EvidenceMatch>,
    #[serde(default)]
    pub search_evidence: Option<SearchEvidence>,
    #[serde(default)]
    pub proposed_changes: Vec<ProposedChange>,
    #[serde(default)]
    pub forced_no_matches: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ContextDecision {
    pub fn is_decided(&self) -> bool {
        self.decision.is_some()
    }

    /// Problems that make this decision unusable, empty when complete.
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.decision.is_none() {
            out.push("decision is not set".to_string());
        }
        if self.confidence.is_none() {
            out.push("confidence is not set".to_string());
        }
        if self.rationale_type.is_none() {
            out.push("rationale_type is not set".to_string());
        }
        if self.accepted_matches.is_empty() && self.rejected_matches.is_empty() {
            if !self.forced_no_matches {
                out.push("at least one accepted or rejected match is required".to_string());
            } else if self.notes.as_deref().map(str::trim).unwrap_or("").is_empty() {
                out.push("forced_no_matches requires a justification note".to_string());
            }
        }
        match &self.search_evidence {
            None => out.push("search_evidence (usage or waiver) is required".to_string()),
            Some(SearchEvidence::Usage { searches }) if searches.is_empty() => {
                out.push("search usage list must not be empty".to_string())
            }
            Some(SearchEvidence::Waiver { waiver }) if waiver.approver.trim().is_empty() => {
                out.push("search waiver requires an approver".to_string())
            }
            Some(_) => {}
        }
        for m in self.accepted_matches.iter().chain(&self.rejected_matches) {
            if !(0.0..=1.0).contains(&m.score) {
                out.push(format!("match {} has score {} outside [0, 1]", m.target_id, m.score));
            }
        }
        out
    }

    pub fn search_ids(&self) -> Vec<&str> {
        self.search_evidence
            .as_ref()
            .map(|e| e.search_ids())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionContexts {
    #[serde(default)]
    pub all_rust: Option<ContextDecision>,
    #[serde(default)]
    pub safe_rust: Option<ContextDecision>,
}

impl DecisionContexts {
    pub fn get(&self, context: Context) -> Option<&ContextDecision> {
        match context {
            Context::AllRust => self.all_rust.as_ref(),
            Context::SafeRust => self.safe_rust.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, context: Context) -> &mut Option<ContextDecision> {
        match context {
            Context::AllRust => &mut self.all_rust,
            Context::SafeRust => &mut self.safe_rust,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all_rust.is_none() && self.safe_rust.is_none()
    }
}

/// Legacy flat shape (one decision for both contexts) or per-context shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum DecisionBody {
    Flat(ContextDecision),
    PerContext(DecisionContexts),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionFile {
    pub guideline_id: String,
    pub batch_id: u32,
    #[serde(default)]
    pub session_id: Option<u32>,
    pub recorded_at: DateTime<Utc>,
    pub decision: DecisionBody,
}

impl DecisionFile {
    /// `(context, decision)` pairs present in the file. A flat decision is
    /// reported once with no context.
    pub fn claims(&self) -> Vec<(Option<Context>, &ContextDecision)> {
        match &self.decision {
            DecisionBody::Flat(d) => vec![(None, d)],
            DecisionBody::PerContext(c) => Context::ALL
                .iter()
                .filter_map(|ctx| c.get(*ctx).map(|d| (Some(*ctx), d)))
                .collect(),
        }
    }
}

/// `Rule 21.3` -> `Rule_21.3.json`
pub fn decision_file_name(guideline_id: &str) -> String {
    format!("{}.json", guideline_id.trim().replace(' ', "_"))
}
