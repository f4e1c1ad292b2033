//! Recording of one guideline/context decision, either into the batch's
//! per-guideline decision directory or straight into a batch report.
//!
//! Nothing is written unless the decision passes every check.

use crate::domain::decision::{
    decision_file_name, ContextDecision, DecisionBody, DecisionContexts, DecisionFile,
    SearchEvidence, SearchToolUsage, SearchWaiver,
};
use crate::domain::errors::{SearchIdClaim, SearchIdConflict, WorkflowError};
use crate::domain::mapping::{EvidenceMatch, MappingEntry};
use crate::domain::report::{compute_summary, BatchReport, DecisionSlot, ReportGuideline};
use crate::domain::vocab::{Context, SearchTool};
use crate::services::merger::report_search_id_conflicts;
use clap::ValueEnum;
use std::collections::BTreeMap;
use std::path::Path;

/// Parses `SEARCH_ID:TOOL:COUNT:QUERY`. `COUNT` may be empty and `QUERY`
/// takes the rest of the string, colons included.
pub fn parse_search_usage(raw: &str) -> anyhow::Result<SearchToolUsage> {
    let mut parts = raw.splitn(4, ':');
    let (Some(id), Some(tool), Some(count), Some(query)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        anyhow::bail!(
            "invalid --search-used '{}': expected SEARCH_ID:TOOL:COUNT:QUERY",
            raw
        );
    };
    if id.trim().is_empty() {
        anyhow::bail!("invalid --search-used '{}': empty search id", raw);
    }
    let tool = SearchTool::from_str(tool.trim(), true)
        .map_err(|_| anyhow::anyhow!("invalid --search-used '{}': unknown tool '{}'", raw, tool))?;
    let result_count = match count.trim() {
        "" => None,
        n => Some(
            n.parse::<u32>()
                .map_err(|_| anyhow::anyhow!("invalid --search-used '{}': bad count '{}'", raw, n))?,
        ),
    };
    Ok(SearchToolUsage {
        search_id: id.trim().to_string(),
        tool,
        query: query.to_string(),
        result_count,
    })
}

/// Exactly one of tool usage or a waiver.
pub fn provenance(
    guideline_id: &str,
    context: &str,
    searches: Vec<SearchToolUsage>,
    waiver: Option<SearchWaiver>,
) -> Result<SearchEvidence, WorkflowError> {
    match (searches.is_empty(), waiver) {
        (false, None) => Ok(SearchEvidence::Usage { searches }),
        (true, Some(waiver)) => Ok(SearchEvidence::Waiver { waiver }),
        _ => Err(WorkflowError::MissingProvenance {
            guideline: guideline_id.to_string(),
            context: context.to_string(),
        }),
    }
}

/// Candidate matches a reviewer can reference by id: report evidence first,
/// then the matches already on the canonical record.
pub fn known_matches(guideline: &ReportGuideline) -> Vec<EvidenceMatch> {
    let mut out: Vec<EvidenceMatch> = guideline
        .evidence
        .section_matches
        .iter()
        .chain(&guideline.evidence.paragraph_matches)
        .cloned()
        .collect();
    let existing: Vec<&EvidenceMatch> = match &guideline.current_state {
        MappingEntry::Flat(e) => e.accepted_matches.iter().chain(&e.rejected_matches).collect(),
        MappingEntry::PerContext(e) => e
            .all_rust
            .accepted_matches
            .iter()
            .chain(&e.all_rust.rejected_matches)
            .chain(&e.safe_rust.accepted_matches)
            .chain(&e.safe_rust.rejected_matches)
            .collect(),
    };
    for m in existing {
        if !out.iter().any(|k| k.target_id == m.target_id) {
            out.push(m.clone());
        }
    }
    out
}

/// Resolves `TARGET_ID[:REASON]` against the known candidates. Unknown ids
/// are kept with zero score.
pub fn resolve_match(raw: &str, known: &[EvidenceMatch]) -> EvidenceMatch {
    let (id, reason) = match raw.split_once(':') {
        Some((id, reason)) => (id.trim(), Some(reason.trim())),
        None => (raw.trim(), None),
    };
    let mut m = known
        .iter()
        .find(|k| k.target_id == id)
        .cloned()
        .unwrap_or_else(|| {
            tracing::warn!(target_id = %id, "match not among known candidates");
            EvidenceMatch {
                target_id: id.to_string(),
                category: 0,
                title: String::new(),
                score: 0.0,
                reason: String::new(),
            }
        });
    if let Some(r) = reason {
        m.reason = r.to_string();
    }
    m
}

fn context_label(context: Option<Context>) -> String {
    context.map(|c| c.as_str()).unwrap_or("flat").to_string()
}

/// Completeness plus no search id repeated inside the decision itself.
pub fn validate_decision(
    guideline_id: &str,
    context: Option<Context>,
    decision: &ContextDecision,
) -> Result<(), WorkflowError> {
    if decision.search_evidence.is_none() {
        return Err(WorkflowError::MissingProvenance {
            guideline: guideline_id.to_string(),
            context: context_label(context),
        });
    }
    let problems = decision.problems();
    if !problems.is_empty() {
        return Err(WorkflowError::InvalidDecision {
            guideline: guideline_id.to_string(),
            context: context_label(context),
            problems,
        });
    }
    Ok(())
}

/// Search ids claimed more than once inside one file.
pub fn in_file_conflicts(file_name: &str, file: &DecisionFile) -> Vec<SearchIdConflict> {
    let mut index: BTreeMap<&str, Vec<SearchIdClaim>> = BTreeMap::new();
    for (ctx, d) in file.claims() {
        for id in d.search_ids() {
            index.entry(id).or_default().push(SearchIdClaim {
                file: file_name.to_string(),
                guideline_id: file.guideline_id.clone(),
                context: ctx,
            });
        }
    }
    index
        .into_iter()
        .filter(|(_, c)| c.len() > 1)
        .map(|(id, claimants)| SearchIdConflict {
            search_id: id.to_string(),
            claimants,
        })
        .collect()
}

/// Places `decision` into the guideline's decision file, keeping the other
/// context intact. A flat legacy file is converted to per-context first.
pub fn upsert_decision_file(
    existing: Option<DecisionFile>,
    guideline_id: &str,
    batch_id: u32,
    session_id: Option<u32>,
    context: Context,
    decision: ContextDecision,
    overwrite: bool,
) -> Result<DecisionFile, WorkflowError> {
    let exists = || WorkflowError::DecisionExists {
        guideline: guideline_id.to_string(),
        context: context.to_string(),
    };
    let mut contexts = match existing.map(|f| f.decision) {
        None => DecisionContexts::default(),
        Some(DecisionBody::Flat(flat)) => {
            if !overwrite {
                return Err(exists());
            }
            let mut c = DecisionContexts::default();
            for ctx in Context::ALL {
                *c.slot_mut(ctx) = Some(flat.clone());
            }
            c
        }
        Some(DecisionBody::PerContext(c)) => {
            if c.get(context).is_some() && !overwrite {
                return Err(exists());
            }
            c
        }
    };
    *contexts.slot_mut(context) = Some(decision);
    let file = DecisionFile {
        guideline_id: guideline_id.to_string(),
        batch_id,
        session_id,
        recorded_at: chrono::Utc::now(),
        decision: DecisionBody::PerContext(contexts),
    };
    let conflicts = in_file_conflicts(&decision_file_name(guideline_id), &file);
    if !conflicts.is_empty() {
        return Err(WorkflowError::DuplicateSearchIds(conflicts));
    }
    Ok(file)
}

/// Writes `decision` into the report slot. A flat (pre-2.0) slot takes the
/// decision for both contexts, and so do its proposed changes.
///
/// Fails without touching `report` when the decision would leave a search id
/// claimed twice anywhere in the report.
pub fn record_in_report(
    report: &mut BatchReport,
    guideline_id: &str,
    context: Context,
    decision: ContextDecision,
    overwrite: bool,
) -> Result<(), WorkflowError> {
    let mut next = report.clone();
    let proposed = decision.proposed_changes.clone();
    let g = next
        .guideline_mut(guideline_id)
        .ok_or_else(|| WorkflowError::UnknownGuideline(guideline_id.to_string()))?;
    let exists = |label: &str| WorkflowError::DecisionExists {
        guideline: guideline_id.to_string(),
        context: label.to_string(),
    };
    let targets: Vec<Context> = match &mut g.verification_decision {
        DecisionSlot::Flat(slot) => {
            if slot.is_decided() && !overwrite {
                return Err(exists("flat"));
            }
            tracing::info!(guideline = %guideline_id, "flat report slot, decision covers both contexts");
            *slot = decision;
            Context::ALL.to_vec()
        }
        DecisionSlot::PerContext(pair) => {
            if pair.get(context).is_decided() && !overwrite {
                return Err(exists(context.as_str()));
            }
            *pair.get_mut(context) = decision;
            vec![context]
        }
    };
    let conflicts = report_search_id_conflicts(&next);
    if !conflicts.is_empty() {
        return Err(WorkflowError::DuplicateSearchIds(conflicts));
    }
    for c in targets {
        for change in &proposed {
            next.upsert_change(guideline_id, c, change.clone());
        }
    }
    next.summary = compute_summary(&next);
    *report = next;
    Ok(())
}

/// Warns about search ids that other decision files of the batch already
/// claim. Only the merge treats these as fatal.
pub fn warn_cross_file_duplicates(dir: &Path, own_file: &str, file: &DecisionFile) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut mine: Vec<&str> = Vec::new();
    for (_, d) in file.claims() {
        mine.extend(d.search_ids());
    }
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name == own_file || !name.ends_with(".json") {
            continue;
        }
        let Ok(other) = crate::services::storage::read_json::<DecisionFile>(&entry.path()) else {
            tracing::debug!(file = %name, "skipping unreadable decision file");
            continue;
        };
        for (_, d) in other.claims() {
            for id in d.search_ids() {
                if mine.contains(&id) {
                    tracing::warn!(
                        search_id = %id,
                        file = %name,
                        "search id already claimed by another decision file; merge will reject this batch"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocab::{Confidence, DecisionKind, RationaleType};

    fn usage(id: &str) -> SearchToolUsage {
        SearchToolUsage {
            search_id: id.into(),
            tool: SearchTool::SemanticSearch,
            query: "q".into(),
            result_count: None,
        }
    }

    fn decision(search_id: &str) -> ContextDecision {
        ContextDecision {
            decision: Some(DecisionKind::AcceptWithModifications),
            confidence: Some(Confidence::High),
            rationale_type: Some(RationaleType::DirectMapping),
            accepted_matches: vec![EvidenceMatch {
                target_id: "fls_a".into(),
                category: 0,
                title: "Arrays".into(),
                score: 0.7,
                reason: String::new(),
            }],
            search_evidence: Some(SearchEvidence::Usage {
                searches: vec![usage(search_id)],
            }),
            ..Default::default()
        }
    }

    #[test]
    fn search_usage_keeps_colons_in_query() {
        let u = parse_search_usage("s-1:deep_search:3:unsafe: raw pointers").unwrap();
        assert_eq!(u.search_id, "s-1");
        assert_eq!(u.tool, SearchTool::DeepSearch);
        assert_eq!(u.result_count, Some(3));
        assert_eq!(u.query, "unsafe: raw pointers");

        let u = parse_search_usage("s-2:keyword_search::malloc").unwrap();
        assert_eq!(u.result_count, None);
        assert!(parse_search_usage("s-3:grep:1:x").is_err());
        assert!(parse_search_usage("s-4:keyword_search").is_err());
    }

    #[test]
    fn provenance_requires_exactly_one_source() {
        assert!(provenance("Rule 1.1", "all_rust", vec![], None).is_err());
        assert!(provenance("Rule 1.1", "all_rust", vec![usage("a")], None).is_ok());
        let waiver = SearchWaiver {
            search_id: "w".into(),
            reason: crate::domain::vocab::WaiverReason::TrivialGuideline,
            approver: "lead".into(),
            date: chrono::NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            note: None,
        };
        let err = provenance("Rule 1.1", "all_rust", vec![usage("a")], Some(waiver)).unwrap_err();
        assert_eq!(err.code(), "MISSING_PROVENANCE");
    }

    #[test]
    fn second_context_keeps_first() {
        let f = upsert_decision_file(None, "Rule 1.1", 1, Some(1), Context::AllRust, decision("a"), false)
            .unwrap();
        let f = upsert_decision_file(Some(f), "Rule 1.1", 1, Some(1), Context::SafeRust, decision("b"), false)
            .unwrap();
        match &f.decision {
            DecisionBody::PerContext(c) => assert!(c.all_rust.is_some() && c.safe_rust.is_some()),
            other => panic!("unexpected {:?}", other),
        }
        let again =
            upsert_decision_file(Some(f.clone()), "Rule 1.1", 1, None, Context::SafeRust, decision("c"), false);
        assert_eq!(again.unwrap_err().code(), "DECISION_EXISTS");
        let replaced =
            upsert_decision_file(Some(f), "Rule 1.1", 1, None, Context::SafeRust, decision("c"), true);
        assert!(replaced.is_ok());
    }

    #[test]
    fn same_search_id_in_both_contexts_is_rejected() {
        let f = upsert_decision_file(None, "Rule 1.1", 1, None, Context::AllRust, decision("dup"), false)
            .unwrap();
        let err = upsert_decision_file(Some(f), "Rule 1.1", 1, None, Context::SafeRust, decision("dup"), false)
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_SEARCH_ID");
        assert_eq!(err.details().len(), 1);
    }

    fn report(slots: Vec<(&str, DecisionSlot)>) -> BatchReport {
        use crate::domain::mapping::FlatEntry;
        use crate::domain::report::{EvidenceThresholds, GuidelineEvidence};
        use crate::domain::schema_version::SchemaVersion;
        use crate::domain::vocab::{ApplicabilityV1, GuidelineType};
        BatchReport {
            schema_version: SchemaVersion::V2_0,
            standard: "misra_c".into(),
            batch_id: 1,
            batch_name: String::new(),
            session_id: 1,
            generated_at: chrono::Utc::now(),
            thresholds: EvidenceThresholds {
                section: 0.5,
                paragraph: 0.55,
            },
            guidelines: slots
                .into_iter()
                .map(|(id, slot)| ReportGuideline {
                    guideline_id: id.to_string(),
                    guideline_type: GuidelineType::Rule,
                    guideline_title: None,
                    current_state: MappingEntry::Flat(FlatEntry {
                        schema_version: SchemaVersion::V1_0,
                        guideline_id: id.to_string(),
                        guideline_type: GuidelineType::Rule,
                        guideline_title: None,
                        source_metadata: None,
                        applicability: Some(ApplicabilityV1::Direct),
                        adjusted_category: None,
                        rationale_type: None,
                        confidence: None,
                        accepted_matches: vec![],
                        rejected_matches: vec![],
                        notes: None,
                    }),
                    evidence: Default::default(),
                    verification_decision: slot,
                })
                .collect(),
            applicability_changes: vec![],
            summary: Default::default(),
        }
    }

    fn per_context_slot() -> DecisionSlot {
        DecisionSlot::PerContext(Default::default())
    }

    #[test]
    fn in_report_search_id_reuse_is_refused_without_touching_the_report() {
        let mut r = report(vec![("Rule 1.1", per_context_slot()), ("Rule 1.2", per_context_slot())]);
        record_in_report(&mut r, "Rule 1.1", Context::AllRust, decision("dup"), false).unwrap();
        let before = r.clone();

        let err = record_in_report(&mut r, "Rule 1.2", Context::SafeRust, decision("dup"), false)
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_SEARCH_ID");
        let err = record_in_report(&mut r, "Rule 1.1", Context::SafeRust, decision("dup"), false)
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_SEARCH_ID");
        assert_eq!(r, before);

        record_in_report(&mut r, "Rule 1.1", Context::AllRust, decision("dup"), true).unwrap();
        record_in_report(&mut r, "Rule 1.2", Context::SafeRust, decision("other"), false).unwrap();
        assert_eq!(r.summary.verified_safe_rust, 1);
    }

    #[test]
    fn flat_slot_records_proposed_changes_for_both_contexts() {
        let mut r = report(vec![("Rule 1.1", DecisionSlot::Flat(ContextDecision::default()))]);
        let mut d = decision("a");
        d.proposed_changes.push(crate::domain::decision::ProposedChange::Applicability {
            proposed_value: crate::domain::vocab::Applicability::Partial,
            rationale: "only some casts".into(),
        });
        record_in_report(&mut r, "Rule 1.1", Context::SafeRust, d, false).unwrap();

        let contexts: Vec<Context> = r.applicability_changes.iter().map(|c| c.context).collect();
        assert_eq!(contexts, Context::ALL.to_vec());
        assert!(r
            .applicability_changes
            .iter()
            .all(|c| c.change.value_str() == "partial"));
        assert_eq!(r.summary.fully_verified, 1);
    }

    #[test]
    fn no_matches_needs_force_and_note() {
        let mut d = decision("a");
        d.accepted_matches.clear();
        d.decision = Some(DecisionKind::AcceptNoMatches);
        let err = validate_decision("Rule 1.1", Some(Context::AllRust), &d).unwrap_err();
        assert_eq!(err.code(), "INVALID_DECISION");
        d.forced_no_matches = true;
        d.notes = Some("nothing in the reference covers this".into());
        assert!(validate_decision("Rule 1.1", Some(Context::AllRust), &d).is_ok());
    }

    #[test]
    fn match_ids_resolve_against_known_candidates() {
        let known = vec![EvidenceMatch {
            target_id: "fls_a".into(),
            category: 2,
            title: "Arrays".into(),
            score: 0.8,
            reason: String::new(),
        }];
        let m = resolve_match("fls_a:covers bounds", &known);
        assert_eq!(m.title, "Arrays");
        assert_eq!(m.reason, "covers bounds");
        let unknown = resolve_match("fls_z", &known);
        assert_eq!(unknown.score, 0.0);
    }
}
