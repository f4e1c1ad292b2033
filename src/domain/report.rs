use crate::domain::decision::{ContextDecision, ProposedChange};
use crate::domain::mapping::{EvidenceMatch, MappingEntry};
use crate::domain::schema_version::{applicability_v1_to_v2, SchemaVersion};
use crate::domain::vocab::{Approval, ChangeField, Context, GuidelineType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceThresholds {
    pub section: f64,
    pub paragraph: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuidelineEvidence {
    #[serde(default)]
    pub section_matches: Vec<EvidenceMatch>,
    #[serde(default)]
    pub paragraph_matches: Vec<EvidenceMatch>,
    #[serde(default)]
    pub best_score: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextPair {
    #[serde(default)]
    pub all_rust: ContextDecision,
    #[serde(default)]
    pub safe_rust: ContextDecision,
}

impl ContextPair {
    pub fn get(&self, context: Context) -> &ContextDecision {
        match context {
            Context::AllRust => &self.all_rust,
            Context::SafeRust => &self.safe_rust,
        }
    }

    pub fn get_mut(&mut self, context: Context) -> &mut ContextDecision {
        match context {
            Context::AllRust => &mut self.all_rust,
            Context::SafeRust => &mut self.safe_rust,
        }
    }
}

/// Where workers' decisions land inside a batch report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum DecisionSlot {
    Flat(ContextDecision),
    PerContext(ContextPair),
}

impl DecisionSlot {
    pub fn scaffold(version: SchemaVersion) -> Self {
        if version.is_flat() {
            DecisionSlot::Flat(ContextDecision::default())
        } else {
            DecisionSlot::PerContext(ContextPair::default())
        }
    }

    /// Decision that applies to `context`; a flat slot answers for both.
    pub fn for_context(&self, context: Context) -> Option<&ContextDecision> {
        let d = match self {
            DecisionSlot::Flat(d) => d,
            DecisionSlot::PerContext(pair) => pair.get(context),
        };
        d.is_decided().then_some(d)
    }

    pub fn is_decided(&self, context: Context) -> bool {
        self.for_context(context).is_some()
    }

    /// Converts a flat slot into a per-context one, broadcasting its content.
    pub fn ensure_per_context(&mut self) -> &mut ContextPair {
        if let DecisionSlot::Flat(d) = self {
            let pair = ContextPair {
                all_rust: d.clone(),
                safe_rust: d.clone(),
            };
            *self = DecisionSlot::PerContext(pair);
        }
        match self {
            DecisionSlot::PerContext(pair) => pair,
            DecisionSlot::Flat(_) => unreachable!("slot converted above"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportGuideline {
    pub guideline_id: String,
    pub guideline_type: GuidelineType,
    #[serde(default)]
    pub guideline_title: Option<String>,
    pub current_state: MappingEntry,
    #[serde(default)]
    pub evidence: GuidelineEvidence,
    pub verification_decision: DecisionSlot,
}

/// Proposed change to a canonical field, gated by human approval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicabilityChange {
    pub guideline_id: String,
    pub context: Context,
    pub change: ProposedChange,
    #[serde(default)]
    pub current_value: Option<String>,
    #[serde(default)]
    pub approval: Approval,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_guidelines: usize,
    pub verified_all_rust: usize,
    pub verified_safe_rust: usize,
    pub fully_verified: usize,
    pub proposed_changes: usize,
    pub approved_changes: usize,
    pub rejected_changes: usize,
    pub pending_changes: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub schema_version: SchemaVersion,
    pub standard: String,
    pub batch_id: u32,
    #[serde(default)]
    pub batch_name: String,
    pub session_id: u32,
    pub generated_at: DateTime<Utc>,
    pub thresholds: EvidenceThresholds,
    pub guidelines: Vec<ReportGuideline>,
    #[serde(default)]
    pub applicability_changes: Vec<ApplicabilityChange>,
    #[serde(default)]
    pub summary: ReportSummary,
}

impl BatchReport {
    pub fn guideline(&self, guideline_id: &str) -> Option<&ReportGuideline> {
        self.guidelines
            .iter()
            .find(|g| g.guideline_id == guideline_id)
    }

    pub fn guideline_mut(&mut self, guideline_id: &str) -> Option<&mut ReportGuideline> {
        self.guidelines
            .iter_mut()
            .find(|g| g.guideline_id == guideline_id)
    }

    /// Adds a proposed change keyed by (guideline, context, field). A later
    /// proposal supersedes an earlier one; its approval survives only when
    /// the proposed value is unchanged. Returns true when a new key was added.
    pub fn upsert_change(
        &mut self,
        guideline_id: &str,
        context: Context,
        change: ProposedChange,
    ) -> bool {
        let current_value = self
            .guideline(guideline_id)
            .and_then(|g| current_value(&g.current_state, context, change.field()));
        let existing = self.applicability_changes.iter_mut().find(|c| {
            c.guideline_id == guideline_id && c.context == context && c.change.field() == change.field()
        });
        match existing {
            Some(c) => {
                if c.change.value_str() != change.value_str() {
                    c.approval = Approval::Unset;
                }
                c.change = change;
                c.current_value = current_value;
                false
            }
            None => {
                self.applicability_changes.push(ApplicabilityChange {
                    guideline_id: guideline_id.to_string(),
                    context,
                    change,
                    current_value,
                    approval: Approval::Unset,
                });
                true
            }
        }
    }
}

/// Canonical value of `field` for `context`, in the per-context vocabulary.
pub fn current_value(entry: &MappingEntry, context: Context, field: ChangeField) -> Option<String> {
    match (entry, field) {
        (MappingEntry::Flat(e), ChangeField::Applicability) => e
            .applicability
            .map(|a| applicability_v1_to_v2(a).as_str().to_string()),
        (MappingEntry::Flat(e), ChangeField::AdjustedCategory) => {
            e.adjusted_category.map(|c| c.as_str().to_string())
        }
        (MappingEntry::PerContext(e), ChangeField::Applicability) => e
            .block(context)
            .applicability
            .map(|a| a.as_str().to_string()),
        (MappingEntry::PerContext(e), ChangeField::AdjustedCategory) => e
            .block(context)
            .adjusted_category
            .map(|c| c.as_str().to_string()),
    }
}

/// Summary counters as a pure function of report state.
pub fn compute_summary(report: &BatchReport) -> ReportSummary {
    let mut s = ReportSummary {
        total_guidelines: report.guidelines.len(),
        ..Default::default()
    };
    for g in &report.guidelines {
        let all = g.verification_decision.is_decided(Context::AllRust);
        let safe = g.verification_decision.is_decided(Context::SafeRust);
        s.verified_all_rust += usize::from(all);
        s.verified_safe_rust += usize::from(safe);
        s.fully_verified += usize::from(all && safe);
    }
    s.proposed_changes = report.applicability_changes.len();
    for c in &report.applicability_changes {
        match c.approval {
            Approval::Approved => s.approved_changes += 1,
            Approval::Rejected => s.rejected_changes += 1,
            Approval::Unset => s.pending_changes += 1,
        }
    }
    s
}
