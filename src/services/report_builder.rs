use crate::domain::errors::WorkflowError;
use crate::domain::inputs::SimilarityIndex;
use crate::domain::mapping::{EvidenceMatch, MappingStore};
use crate::domain::progress::ProgressFile;
use crate::domain::report::{
    compute_summary, BatchReport, DecisionSlot, EvidenceThresholds, GuidelineEvidence,
    ReportGuideline,
};
use crate::domain::schema_version::SchemaVersion;
use crate::domain::vocab::Context;

#[derive(Clone, Copy, Debug)]
pub struct BuildOptions {
    pub batch_id: u32,
    pub session_id: u32,
    /// Shape of the decision scaffold (flat below 2.0).
    pub schema_version: SchemaVersion,
    pub thresholds: EvidenceThresholds,
    pub max_matches: usize,
}

fn filter_matches(matches: &[EvidenceMatch], threshold: f64, max: usize) -> Vec<EvidenceMatch> {
    let mut kept: Vec<EvidenceMatch> = matches
        .iter()
        .filter(|m| m.score >= threshold)
        .cloned()
        .collect();
    kept.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.target_id.cmp(&b.target_id))
    });
    kept.truncate(max);
    kept
}

/// Assembles the batch report for one session. Every guideline of the batch
/// must exist in the mapping store; all missing ids are reported together.
pub fn build_report(
    standard: &str,
    progress: &ProgressFile,
    store: &MappingStore,
    similarity: Option<&SimilarityIndex>,
    opts: &BuildOptions,
) -> anyhow::Result<BatchReport> {
    let batch = progress
        .batch(opts.batch_id)
        .ok_or_else(|| WorkflowError::NotFound(format!("batch {}", opts.batch_id)))?;

    let missing: Vec<String> = batch
        .guidelines
        .iter()
        .filter(|g| store.find(&g.guideline_id).is_none())
        .map(|g| g.guideline_id.clone())
        .collect();
    if !missing.is_empty() {
        return Err(WorkflowError::MissingGuidelines(missing).into());
    }
    if similarity.is_none() {
        tracing::warn!(batch = opts.batch_id, "no similarity data, evidence will be empty");
    }

    let mut guidelines = Vec::with_capacity(batch.guidelines.len());
    for g in &batch.guidelines {
        let Some(entry) = store.find(&g.guideline_id) else {
            continue;
        };
        let evidence = match similarity.and_then(|s| s.results.get(&g.guideline_id)) {
            Some(r) => GuidelineEvidence {
                section_matches: filter_matches(
                    &r.section_matches,
                    opts.thresholds.section,
                    opts.max_matches,
                ),
                paragraph_matches: filter_matches(
                    &r.paragraph_matches,
                    opts.thresholds.paragraph,
                    opts.max_matches,
                ),
                best_score: r.best_section_score(),
            },
            None => GuidelineEvidence::default(),
        };
        guidelines.push(ReportGuideline {
            guideline_id: g.guideline_id.clone(),
            guideline_type: entry.guideline_type(),
            guideline_title: entry.guideline_title().map(str::to_string),
            current_state: entry.clone(),
            evidence,
            verification_decision: DecisionSlot::scaffold(opts.schema_version),
        });
    }

    let mut report = BatchReport {
        schema_version: opts.schema_version,
        standard: standard.to_string(),
        batch_id: opts.batch_id,
        batch_name: batch.name.clone(),
        session_id: opts.session_id,
        generated_at: chrono::Utc::now(),
        thresholds: opts.thresholds,
        guidelines,
        applicability_changes: vec![],
        summary: Default::default(),
    };
    report.summary = compute_summary(&report);
    Ok(report)
}

/// Number of (guideline, context) slots already holding a decision.
pub fn decided_slots(report: &BatchReport) -> usize {
    report
        .guidelines
        .iter()
        .map(|g| {
            Context::ALL
                .iter()
                .filter(|c| g.verification_decision.is_decided(**c))
                .count()
        })
        .sum()
}
