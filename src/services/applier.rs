//! Application of a completed batch report to the mapping store and the
//! progress tracker.
//!
//! `apply_report` is pure: it takes both stores by value and returns the
//! updated pair, so a caller can validate before anything touches disk.

use crate::domain::decision::{ContextDecision, ProposedChange};
use crate::domain::errors::WorkflowError;
use crate::domain::mapping::{ContextBlock, EvidenceMatch, FlatEntry, MappingEntry, MappingStore};
use crate::domain::progress::ProgressFile;
use crate::domain::report::{BatchReport, DecisionSlot};
use crate::domain::schema_version::SchemaVersion;
use crate::domain::vocab::{Approval, BatchStatus, Context, DecisionKind};
use crate::services::merger::report_search_id_conflicts;
use crate::services::migration::split_flat;
use crate::services::progress::refresh_rollups;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Clone, Copy, Debug)]
pub struct ApplyOptions {
    pub apply_changes: bool,
    pub date: NaiveDate,
}

#[derive(Clone, Debug, Serialize)]
pub struct GuidelineContext {
    pub guideline_id: String,
    pub context: Option<Context>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EntryUpgrade {
    pub guideline_id: String,
    pub from: SchemaVersion,
    pub to: SchemaVersion,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ApplyReport {
    pub batch_id: u32,
    pub session_id: u32,
    pub applied: Vec<GuidelineContext>,
    pub undecided: Vec<GuidelineContext>,
    pub migrated: Vec<EntryUpgrade>,
    pub missing_from_mapping: Vec<String>,
    pub changes_applied: usize,
    pub changes_pending: usize,
    pub changes_rejected: usize,
    pub batch_status: Option<BatchStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_sha256_before: Option<String>,
    pub dry_run: bool,
}

fn contains(list: &[EvidenceMatch], m: &EvidenceMatch) -> bool {
    list.iter().any(|x| x.target_id == m.target_id)
}

fn push_unique(list: &mut Vec<EvidenceMatch>, items: impl IntoIterator<Item = EvidenceMatch>) {
    for m in items {
        if !contains(list, &m) {
            list.push(m);
        }
    }
}

/// New (accepted, rejected) lists for `decision` given the current lists.
fn resolve_matches(
    accepted: &[EvidenceMatch],
    rejected: &[EvidenceMatch],
    decision: &ContextDecision,
) -> (Vec<EvidenceMatch>, Vec<EvidenceMatch>) {
    match decision.decision {
        Some(DecisionKind::AcceptExisting) => {
            let mut r = rejected.to_vec();
            push_unique(&mut r, decision.rejected_matches.iter().cloned());
            (accepted.to_vec(), r)
        }
        Some(DecisionKind::AcceptNoMatches) => (vec![], decision.rejected_matches.clone()),
        Some(DecisionKind::Reject) => {
            // Matches already rejected stay rejected unless the decision keeps them.
            let mut r: Vec<EvidenceMatch> = rejected
                .iter()
                .filter(|m| !contains(&decision.accepted_matches, m))
                .cloned()
                .collect();
            push_unique(&mut r, decision.rejected_matches.iter().cloned());
            push_unique(
                &mut r,
                accepted
                    .iter()
                    .filter(|m| !contains(&decision.accepted_matches, m))
                    .cloned(),
            );
            (decision.accepted_matches.clone(), r)
        }
        Some(DecisionKind::AcceptWithModifications) | None => (
            decision.accepted_matches.clone(),
            decision.rejected_matches.clone(),
        ),
    }
}

fn apply_to_block(
    block: &mut ContextBlock,
    decision: &ContextDecision,
    version: SchemaVersion,
    session_id: u32,
    date: NaiveDate,
) {
    let (accepted, rejected) =
        resolve_matches(&block.accepted_matches, &block.rejected_matches, decision);
    block.accepted_matches = accepted;
    block.rejected_matches = rejected;
    block.confidence = decision.confidence.or(block.confidence);
    block.rationale_type = decision.rationale_type.or(block.rationale_type);
    if decision.adjusted_category.is_some() {
        block.adjusted_category = decision.adjusted_category;
    }
    if decision.notes.is_some() {
        block.notes = decision.notes.clone();
    }
    block.verified = true;
    block.verified_by_session = Some(session_id);
    if version.has_context_provenance() {
        block.verified_date = Some(date);
        block.search_ids = decision.search_ids().into_iter().map(str::to_string).collect();
    }
}

fn apply_to_flat(entry: &mut FlatEntry, decision: &ContextDecision) {
    let (accepted, rejected) =
        resolve_matches(&entry.accepted_matches, &entry.rejected_matches, decision);
    entry.accepted_matches = accepted;
    entry.rejected_matches = rejected;
    entry.confidence = decision.confidence.or(entry.confidence);
    entry.rationale_type = decision.rationale_type.or(entry.rationale_type);
    if decision.adjusted_category.is_some() {
        entry.adjusted_category = decision.adjusted_category;
    }
    if decision.notes.is_some() {
        entry.notes = decision.notes.clone();
    }
}

fn apply_change(block: &mut ContextBlock, change: &ProposedChange) {
    match change {
        ProposedChange::Applicability { proposed_value, .. } => {
            block.applicability = Some(*proposed_value)
        }
        ProposedChange::AdjustedCategory { proposed_value, .. } => {
            block.adjusted_category = Some(*proposed_value)
        }
    }
}

/// Splits a flat entry so per-context data can land on it. Records the
/// upgrade in `report`.
fn ensure_per_context_entry(entry: &mut MappingEntry, report: &mut ApplyReport) {
    if let MappingEntry::Flat(flat) = entry {
        let split = split_flat(flat, flat.schema_version);
        report.migrated.push(EntryUpgrade {
            guideline_id: split.guideline_id.clone(),
            from: flat.schema_version,
            to: split.schema_version,
        });
        *entry = MappingEntry::PerContext(split);
    }
}

/// Applies every decided slot of `report` (and, when asked, every approved
/// change) to the stores. Undecided slots are reported, never treated as
/// errors. A report with a search id claimed twice is refused outright.
pub fn apply_report(
    mut store: MappingStore,
    mut progress: ProgressFile,
    report: &BatchReport,
    opts: &ApplyOptions,
) -> anyhow::Result<(MappingStore, ProgressFile, ApplyReport)> {
    if progress.batch(report.batch_id).is_none() {
        return Err(WorkflowError::NotFound(format!("batch {} in progress file", report.batch_id)).into());
    }
    let conflicts = report_search_id_conflicts(report);
    if !conflicts.is_empty() {
        return Err(WorkflowError::DuplicateSearchIds(conflicts).into());
    }
    let mut out = ApplyReport {
        batch_id: report.batch_id,
        session_id: report.session_id,
        ..Default::default()
    };

    for g in &report.guidelines {
        let Some(idx) = store.position(&g.guideline_id) else {
            tracing::warn!(guideline = %g.guideline_id, "not in mapping store, skipping");
            out.missing_from_mapping.push(g.guideline_id.clone());
            continue;
        };
        let mut verified: Vec<Context> = Vec::new();
        match &g.verification_decision {
            DecisionSlot::Flat(d) if d.is_decided() => {
                match &mut store.mappings[idx] {
                    MappingEntry::Flat(entry) => apply_to_flat(entry, d),
                    MappingEntry::PerContext(entry) => {
                        let version = entry.schema_version;
                        for c in Context::ALL {
                            apply_to_block(entry.block_mut(c), d, version, report.session_id, opts.date);
                        }
                    }
                }
                verified.extend(Context::ALL);
                out.applied.push(GuidelineContext {
                    guideline_id: g.guideline_id.clone(),
                    context: None,
                });
            }
            DecisionSlot::Flat(_) => out.undecided.push(GuidelineContext {
                guideline_id: g.guideline_id.clone(),
                context: None,
            }),
            DecisionSlot::PerContext(pair) => {
                let decided: Vec<Context> = Context::ALL
                    .into_iter()
                    .filter(|c| pair.get(*c).is_decided())
                    .collect();
                for c in Context::ALL.into_iter().filter(|c| !decided.contains(c)) {
                    out.undecided.push(GuidelineContext {
                        guideline_id: g.guideline_id.clone(),
                        context: Some(c),
                    });
                }
                if !decided.is_empty() {
                    ensure_per_context_entry(&mut store.mappings[idx], &mut out);
                    if let MappingEntry::PerContext(entry) = &mut store.mappings[idx] {
                        let version = entry.schema_version;
                        for c in &decided {
                            apply_to_block(
                                entry.block_mut(*c),
                                pair.get(*c),
                                version,
                                report.session_id,
                                opts.date,
                            );
                            out.applied.push(GuidelineContext {
                                guideline_id: g.guideline_id.clone(),
                                context: Some(*c),
                            });
                        }
                    }
                    verified.extend(decided);
                }
            }
        }

        if let Some(pg) = progress
            .batch_mut(report.batch_id)
            .and_then(|b| b.guideline_mut(&g.guideline_id))
        {
            for c in verified {
                let cp = pg.context_mut(c);
                cp.verified = true;
                cp.session_id = Some(report.session_id);
                cp.verified_date = Some(opts.date);
            }
        } else if !verified.is_empty() {
            tracing::warn!(guideline = %g.guideline_id, batch = report.batch_id, "not tracked in progress batch");
        }
    }

    for change in &report.applicability_changes {
        match change.approval {
            Approval::Unset => out.changes_pending += 1,
            Approval::Rejected => out.changes_rejected += 1,
            Approval::Approved if !opts.apply_changes => out.changes_pending += 1,
            Approval::Approved => {
                let Some(idx) = store.position(&change.guideline_id) else {
                    out.missing_from_mapping.push(change.guideline_id.clone());
                    continue;
                };
                ensure_per_context_entry(&mut store.mappings[idx], &mut out);
                if let MappingEntry::PerContext(entry) = &mut store.mappings[idx] {
                    apply_change(entry.block_mut(change.context), &change.change);
                    out.changes_applied += 1;
                }
            }
        }
    }

    refresh_rollups(&mut progress);
    out.batch_status = progress.batch(report.batch_id).map(|b| b.status);
    Ok((store, progress, out))
}
