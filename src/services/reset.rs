//! Reverting a batch, or part of it, to the unverified state.
//!
//! Each artifact is planned independently so a dry run can report exactly
//! what a real run would touch.

use crate::domain::decision::{ContextDecision, DecisionBody, DecisionContexts, DecisionFile};
use crate::domain::progress::ProgressFile;
use crate::domain::report::{compute_summary, BatchReport, DecisionSlot};
use crate::domain::vocab::{Context, ContextScope};
use crate::services::progress::refresh_rollups;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
pub struct ResetScope {
    pub batch_id: u32,
    /// `None` covers every guideline of the batch.
    pub guidelines: Option<BTreeSet<String>>,
    pub contexts: ContextScope,
}

impl ResetScope {
    pub fn covers(&self, guideline_id: &str) -> bool {
        self.guidelines
            .as_ref()
            .map_or(true, |set| set.contains(guideline_id))
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ReportResetStats {
    pub slots_cleared: usize,
    pub changes_removed: usize,
}

/// Nulls every in-scope slot and drops in-scope proposed changes.
pub fn reset_report(mut report: BatchReport, scope: &ResetScope) -> (BatchReport, ReportResetStats) {
    let mut stats = ReportResetStats::default();
    for g in report.guidelines.iter_mut().filter(|g| scope.covers(&g.guideline_id)) {
        match (&mut g.verification_decision, scope.contexts) {
            (DecisionSlot::Flat(d), ContextScope::Both) => {
                if d.is_decided() {
                    stats.slots_cleared += Context::ALL.len();
                }
                *d = ContextDecision::default();
            }
            (slot, contexts) => {
                let pair = slot.ensure_per_context();
                for c in contexts.contexts() {
                    if pair.get(*c).is_decided() {
                        stats.slots_cleared += 1;
                    }
                    *pair.get_mut(*c) = ContextDecision::default();
                }
            }
        }
    }
    let before = report.applicability_changes.len();
    report
        .applicability_changes
        .retain(|c| !(scope.covers(&c.guideline_id) && scope.contexts.includes(c.context)));
    stats.changes_removed = before - report.applicability_changes.len();
    report.summary = compute_summary(&report);
    (report, stats)
}

#[derive(Clone, Debug, PartialEq)]
pub enum DecisionFileAction {
    Untouched,
    Delete,
    /// Some contexts survive; the file is rewritten with the rest cleared.
    Rewrite(DecisionFile),
}

pub fn plan_decision_reset(file: &DecisionFile, scope: &ResetScope) -> DecisionFileAction {
    if !scope.covers(&file.guideline_id) {
        return DecisionFileAction::Untouched;
    }
    let mut contexts = match &file.decision {
        DecisionBody::Flat(_) if scope.contexts == ContextScope::Both => {
            return DecisionFileAction::Delete
        }
        DecisionBody::Flat(d) => DecisionContexts {
            all_rust: Some(d.clone()),
            safe_rust: Some(d.clone()),
        },
        DecisionBody::PerContext(c) => c.clone(),
    };
    let mut cleared = false;
    for c in scope.contexts.contexts() {
        cleared |= contexts.slot_mut(*c).take().is_some();
    }
    if contexts.is_empty() {
        DecisionFileAction::Delete
    } else if cleared {
        let mut next = file.clone();
        next.decision = DecisionBody::PerContext(contexts);
        DecisionFileAction::Rewrite(next)
    } else {
        DecisionFileAction::Untouched
    }
}

/// Clears verification state for the scope and recomputes statuses.
/// Returns the number of (guideline, context) pairs that were verified.
pub fn reset_progress(mut progress: ProgressFile, scope: &ResetScope) -> (ProgressFile, usize) {
    let mut cleared = 0;
    if let Some(batch) = progress.batch_mut(scope.batch_id) {
        for g in batch.guidelines.iter_mut().filter(|g| scope.covers(&g.guideline_id)) {
            for c in scope.contexts.contexts() {
                let cp = g.context_mut(*c);
                if cp.verified {
                    cleared += 1;
                }
                *cp = Default::default();
            }
        }
    }
    refresh_rollups(&mut progress);
    (progress, cleared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::{SearchEvidence, SearchToolUsage};
    use crate::domain::progress::{ProgressBatch, ProgressGuideline, ProgressSummary};
    use crate::domain::schema_version::SchemaVersion;
    use crate::domain::vocab::{BatchStatus, DecisionKind, SearchTool};

    fn decided() -> ContextDecision {
        ContextDecision {
            decision: Some(DecisionKind::AcceptExisting),
            search_evidence: Some(SearchEvidence::Usage {
                searches: vec![SearchToolUsage {
                    search_id: "s".into(),
                    tool: SearchTool::KeywordSearch,
                    query: "q".into(),
                    result_count: None,
                }],
            }),
            ..Default::default()
        }
    }

    fn file(body: DecisionBody) -> DecisionFile {
        DecisionFile {
            guideline_id: "Rule 1.1".into(),
            batch_id: 1,
            session_id: None,
            recorded_at: chrono::Utc::now(),
            decision: body,
        }
    }

    fn scope(contexts: ContextScope) -> ResetScope {
        ResetScope {
            batch_id: 1,
            guidelines: None,
            contexts,
        }
    }

    #[test]
    fn resetting_one_context_keeps_the_other_and_the_file() {
        let f = file(DecisionBody::PerContext(DecisionContexts {
            all_rust: Some(decided()),
            safe_rust: Some(decided()),
        }));
        match plan_decision_reset(&f, &scope(ContextScope::AllRust)) {
            DecisionFileAction::Rewrite(next) => match next.decision {
                DecisionBody::PerContext(c) => {
                    assert!(c.all_rust.is_none());
                    assert!(c.safe_rust.is_some());
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn resetting_last_context_deletes_the_file() {
        let f = file(DecisionBody::PerContext(DecisionContexts {
            all_rust: None,
            safe_rust: Some(decided()),
        }));
        assert_eq!(
            plan_decision_reset(&f, &scope(ContextScope::SafeRust)),
            DecisionFileAction::Delete
        );
        assert_eq!(
            plan_decision_reset(&f, &scope(ContextScope::AllRust)),
            DecisionFileAction::Untouched
        );
    }

    #[test]
    fn flat_file_partially_reset_becomes_per_context() {
        let f = file(DecisionBody::Flat(decided()));
        match plan_decision_reset(&f, &scope(ContextScope::SafeRust)) {
            DecisionFileAction::Rewrite(next) => {
                assert!(matches!(next.decision, DecisionBody::PerContext(ref c) if c.all_rust.is_some()))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            plan_decision_reset(&f, &scope(ContextScope::Both)),
            DecisionFileAction::Delete
        );
    }

    #[test]
    fn progress_reset_only_touches_listed_guidelines() {
        let mut a = ProgressGuideline::new("Rule 1.1");
        a.all_rust.verified = true;
        a.safe_rust.verified = true;
        let mut b = ProgressGuideline::new("Rule 1.2");
        b.all_rust.verified = true;
        b.safe_rust.verified = true;
        let progress = ProgressFile {
            schema_version: SchemaVersion::V2_0,
            standard: "misra_c".into(),
            batches: vec![ProgressBatch {
                batch_id: 1,
                name: "b".into(),
                description: String::new(),
                status: BatchStatus::Completed,
                guidelines: vec![a, b],
            }],
            summary: ProgressSummary::default(),
        };
        let s = ResetScope {
            batch_id: 1,
            guidelines: Some(["Rule 1.2".to_string()].into_iter().collect()),
            contexts: ContextScope::Both,
        };
        let (p, cleared) = reset_progress(progress, &s);
        assert_eq!(cleared, 2);
        assert_eq!(p.batches[0].status, BatchStatus::InProgress);
        assert!(p.batches[0].guidelines[0].fully_verified());
        assert!(!p.batches[0].guidelines[1].any_verified());
    }
}
