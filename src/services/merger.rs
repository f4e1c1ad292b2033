//! Folding per-guideline decision files into a batch report.
//!
//! Structural problems in any file abort the merge with every offending
//! file named. Search ids are indexed across the whole set before anything
//! is merged, so a duplicate anywhere blocks the entire batch.

use crate::domain::decision::{decision_file_name, ContextDecision, DecisionBody, DecisionFile};
use crate::domain::errors::{SearchIdClaim, SearchIdConflict, WorkflowError};
use crate::domain::report::{compute_summary, BatchReport, DecisionSlot, ReportSummary};
use crate::domain::vocab::Context;
use crate::services::schema_check::{schema_errors, ArtifactSchema};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Clone, Debug)]
pub struct LoadedDecision {
    pub file_name: String,
    pub file: DecisionFile,
}

#[derive(Clone, Debug, Serialize)]
pub struct SkippedDecision {
    pub file: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MergeOutcome {
    pub files_read: usize,
    pub guidelines_merged: Vec<String>,
    pub contexts_merged: usize,
    pub changes_added: usize,
    pub changes_superseded: usize,
    pub skipped: Vec<SkippedDecision>,
    pub summary: ReportSummary,
}

fn structural_problems(
    file_name: &str,
    batch_id: u32,
    raw: &serde_json::Value,
) -> anyhow::Result<(Option<DecisionFile>, Vec<String>)> {
    let mut problems: Vec<String> = schema_errors(ArtifactSchema::DecisionFile, raw)?
        .into_iter()
        .map(|e| format!("{}: {}", file_name, e))
        .collect();
    if !problems.is_empty() {
        return Ok((None, problems));
    }
    let file: DecisionFile = match serde_json::from_value(raw.clone()) {
        Ok(f) => f,
        Err(e) => {
            problems.push(format!("{}: {}", file_name, e));
            return Ok((None, problems));
        }
    };
    let expected = decision_file_name(&file.guideline_id);
    if expected != file_name {
        problems.push(format!(
            "{}: holds {} but should be named {}",
            file_name, file.guideline_id, expected
        ));
    }
    if file.batch_id != batch_id {
        problems.push(format!(
            "{}: batch_id {} does not match batch {}",
            file_name, file.batch_id, batch_id
        ));
    }
    if let DecisionBody::PerContext(c) = &file.decision {
        if c.is_empty() {
            problems.push(format!("{}: no context carries a decision", file_name));
        }
    }
    for (ctx, d) in file.claims() {
        let label = ctx.map(|c| c.as_str()).unwrap_or("flat");
        for p in d.problems() {
            problems.push(format!("{} ({}): {}", file_name, label, p));
        }
    }
    Ok((Some(file), problems))
}

/// Reads every `*.json` in `dir` in file-name order. Fails with all
/// structural problems collected when any file is malformed.
pub fn load_decision_dir(dir: &Path, batch_id: u32) -> anyhow::Result<Vec<LoadedDecision>> {
    if !dir.exists() {
        return Err(WorkflowError::NotFound(format!("decision directory {}", dir.display())).into());
    }
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| n.ends_with(".json"))
        .collect();
    names.sort();

    let mut loaded = Vec::with_capacity(names.len());
    let mut problems = Vec::new();
    for name in names {
        let path = dir.join(&name);
        let raw: serde_json::Value = match std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|s| serde_json::from_str(&s).map_err(anyhow::Error::from))
        {
            Ok(v) => v,
            Err(e) => {
                problems.push(format!("{}: {}", name, e));
                continue;
            }
        };
        let (file, mut found) = structural_problems(&name, batch_id, &raw)?;
        if found.is_empty() {
            if let Some(file) = file {
                loaded.push(LoadedDecision {
                    file_name: name,
                    file,
                });
            }
        } else {
            problems.append(&mut found);
        }
    }
    if !problems.is_empty() {
        return Err(WorkflowError::Validation(problems).into());
    }
    Ok(loaded)
}

/// First pass: every claim of every search id.
pub fn index_search_ids(decisions: &[LoadedDecision]) -> BTreeMap<String, Vec<SearchIdClaim>> {
    let mut index: BTreeMap<String, Vec<SearchIdClaim>> = BTreeMap::new();
    for d in decisions {
        for (ctx, decision) in d.file.claims() {
            for id in decision.search_ids() {
                index.entry(id.to_string()).or_default().push(SearchIdClaim {
                    file: d.file_name.clone(),
                    guideline_id: d.file.guideline_id.clone(),
                    context: ctx,
                });
            }
        }
    }
    index
}

/// Second pass: ids with more than one claimant.
pub fn find_duplicate_search_ids(index: &BTreeMap<String, Vec<SearchIdClaim>>) -> Vec<SearchIdConflict> {
    index
        .iter()
        .filter(|(_, claims)| claims.len() > 1)
        .map(|(id, claims)| SearchIdConflict {
            search_id: id.clone(),
            claimants: claims.clone(),
        })
        .collect()
}

/// Search ids claimed more than once by the decisions already sitting in
/// `report`. Every claimant is labelled with the report's file name.
pub fn report_search_id_conflicts(report: &BatchReport) -> Vec<SearchIdConflict> {
    let label = format!("batch{}_session{}.json", report.batch_id, report.session_id);
    let mut index: BTreeMap<String, Vec<SearchIdClaim>> = BTreeMap::new();
    for g in &report.guidelines {
        let slots: Vec<(Option<Context>, &ContextDecision)> = match &g.verification_decision {
            DecisionSlot::Flat(d) => vec![(None, d)],
            DecisionSlot::PerContext(pair) => {
                Context::ALL.iter().map(|c| (Some(*c), pair.get(*c))).collect()
            }
        };
        for (ctx, decision) in slots {
            for id in decision.search_ids() {
                index.entry(id.to_string()).or_default().push(SearchIdClaim {
                    file: label.clone(),
                    guideline_id: g.guideline_id.clone(),
                    context: ctx,
                });
            }
        }
    }
    find_duplicate_search_ids(&index)
}

/// Merges validated decisions into `report`. Decision files whose guideline
/// is not part of the report are skipped and listed in the outcome.
pub fn merge_into_report(
    mut report: BatchReport,
    decisions: &[LoadedDecision],
) -> Result<(BatchReport, MergeOutcome), WorkflowError> {
    let conflicts = find_duplicate_search_ids(&index_search_ids(decisions));
    if !conflicts.is_empty() {
        return Err(WorkflowError::DuplicateSearchIds(conflicts));
    }

    let mut outcome = MergeOutcome {
        files_read: decisions.len(),
        ..Default::default()
    };
    for d in decisions {
        let id = d.file.guideline_id.as_str();
        let Some(g) = report.guideline_mut(id) else {
            tracing::warn!(file = %d.file_name, guideline = %id, "guideline not in batch report, skipping");
            outcome.skipped.push(SkippedDecision {
                file: d.file_name.clone(),
                reason: format!("{} is not part of batch {}", id, d.file.batch_id),
            });
            continue;
        };
        let pair = g.verification_decision.ensure_per_context();
        let mut merged = Vec::new();
        for (ctx, decision) in d.file.claims() {
            let targets: Vec<Context> = match ctx {
                Some(c) => vec![c],
                None => Context::ALL.to_vec(),
            };
            for c in targets {
                *pair.get_mut(c) = decision.clone();
                merged.push((c, decision.proposed_changes.clone()));
            }
        }
        outcome.contexts_merged += merged.len();
        outcome.guidelines_merged.push(id.to_string());
        for (ctx, changes) in merged {
            for change in changes {
                if report.upsert_change(id, ctx, change) {
                    outcome.changes_added += 1;
                } else {
                    outcome.changes_superseded += 1;
                }
            }
        }
    }
    let conflicts = report_search_id_conflicts(&report);
    if !conflicts.is_empty() {
        return Err(WorkflowError::DuplicateSearchIds(conflicts));
    }
    report.summary = compute_summary(&report);
    outcome.summary = report.summary.clone();
    Ok((report, outcome))
}
