//! Partitioning of a mapping store into verification batches.
//!
//! Rules are evaluated in order and the first match wins, so every
//! guideline lands in exactly one batch.

use crate::domain::constants::{
    BatchDefinition, BATCH_DEFINITIONS, HIGH_SCORE_THRESHOLD, LIBRARY_CATEGORIES,
    MEDIUM_SCORE_THRESHOLD,
};
use crate::domain::inputs::SimilarityIndex;
use crate::domain::mapping::{guideline_number, guideline_sort_key, MappingEntry, MappingStore};
use crate::domain::progress::{ProgressBatch, ProgressFile, ProgressGuideline, ProgressSummary};
use crate::domain::schema_version::SchemaVersion;
use crate::domain::vocab::{ApplicabilityV1, Confidence, GuidelineType};
use crate::services::progress::refresh_rollups;
use std::collections::{BTreeMap, HashMap};

/// Batch id for one guideline given its best section similarity.
pub fn assign_batch(entry: &MappingEntry, best_score: Option<f64>) -> u32 {
    let applicability = entry.applicability_v1();
    let direct = applicability == Some(ApplicabilityV1::Direct);
    let best = best_score.unwrap_or(f64::NEG_INFINITY);
    let (category, _) = guideline_number(entry.guideline_id());

    if entry.confidence() == Some(Confidence::High) || (direct && best >= HIGH_SCORE_THRESHOLD) {
        1
    } else if applicability == Some(ApplicabilityV1::NotApplicable) {
        2
    } else if direct && LIBRARY_CATEGORIES.contains(&category) {
        3
    } else if direct && (MEDIUM_SCORE_THRESHOLD..HIGH_SCORE_THRESHOLD).contains(&best) {
        4
    } else {
        5
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ScaffoldOptions {
    /// Keep guidelines that are already verified in their current batch.
    pub preserve_completed: bool,
}

fn empty_batch(def: &BatchDefinition) -> ProgressBatch {
    ProgressBatch {
        batch_id: def.id,
        name: def.name.to_string(),
        description: def.description.to_string(),
        status: Default::default(),
        guidelines: vec![],
    }
}

/// Builds a fresh progress tracker. With `preserve_completed`, guidelines
/// verified in `existing` keep their batch and per-context state; everything
/// else is routed by the rules again.
pub fn scaffold_progress(
    standard: &str,
    store: &MappingStore,
    similarity: &SimilarityIndex,
    existing: Option<&ProgressFile>,
    opts: ScaffoldOptions,
) -> ProgressFile {
    let mut batches: BTreeMap<u32, ProgressBatch> = BATCH_DEFINITIONS
        .iter()
        .map(|d| (d.id, empty_batch(d)))
        .collect();

    let mut preserved: HashMap<&str, (u32, &ProgressGuideline)> = HashMap::new();
    if let (true, Some(prev)) = (opts.preserve_completed, existing) {
        for b in &prev.batches {
            for g in b.guidelines.iter().filter(|g| g.any_verified()) {
                preserved.insert(g.guideline_id.as_str(), (b.batch_id, g));
                batches.entry(b.batch_id).or_insert_with(|| ProgressBatch {
                    batch_id: b.batch_id,
                    name: b.name.clone(),
                    description: b.description.clone(),
                    status: Default::default(),
                    guidelines: vec![],
                });
            }
        }
    }

    let mut types: HashMap<String, GuidelineType> = HashMap::new();
    for entry in &store.mappings {
        let id = entry.guideline_id();
        if types.insert(id.to_string(), entry.guideline_type()).is_some() {
            tracing::warn!(guideline = %id, "duplicate guideline in mapping store, keeping first");
            continue;
        }
        let (batch_id, record) = match preserved.get(id) {
            Some((batch_id, g)) => (*batch_id, (*g).clone()),
            None => (
                assign_batch(entry, similarity.best_score(id)),
                ProgressGuideline::new(id),
            ),
        };
        if let Some(b) = batches.get_mut(&batch_id) {
            b.guidelines.push(record);
        }
    }

    for b in batches.values_mut() {
        b.guidelines.sort_by_key(|g| {
            let t = types
                .get(&g.guideline_id)
                .copied()
                .unwrap_or(GuidelineType::Rule);
            guideline_sort_key(&g.guideline_id, t)
        });
    }

    let mut progress = ProgressFile {
        schema_version: SchemaVersion::V2_0,
        standard: standard.to_string(),
        batches: batches.into_values().collect(),
        summary: ProgressSummary::default(),
    };
    refresh_rollups(&mut progress);
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::inputs::SimilarityResult;
    use crate::domain::mapping::{EvidenceMatch, FlatEntry};
    use std::collections::HashSet;

    fn entry(id: &str, applicability: ApplicabilityV1, confidence: Confidence) -> MappingEntry {
        MappingEntry::Flat(FlatEntry {
            schema_version: SchemaVersion::V1_0,
            guideline_id: id.to_string(),
            guideline_type: if id.starts_with("Dir") {
                GuidelineType::Directive
            } else {
                GuidelineType::Rule
            },
            guideline_title: None,
            source_metadata: None,
            applicability: Some(applicability),
            adjusted_category: None,
            rationale_type: None,
            confidence: Some(confidence),
            accepted_matches: vec![],
            rejected_matches: vec![],
            notes: None,
        })
    }

    fn similarity(scores: &[(&str, f64)]) -> SimilarityIndex {
        SimilarityIndex {
            results: scores
                .iter()
                .map(|(id, s)| {
                    (
                        id.to_string(),
                        SimilarityResult {
                            section_matches: vec![EvidenceMatch {
                                target_id: "fls_x".into(),
                                category: 0,
                                title: String::new(),
                                score: *s,
                                reason: String::new(),
                            }],
                            paragraph_matches: vec![],
                        },
                    )
                })
                .collect(),
        }
    }

    fn fixture() -> (MappingStore, SimilarityIndex) {
        let store = MappingStore {
            standard: "misra_c".into(),
            mappings: vec![
                entry("Rule 1.1", ApplicabilityV1::Direct, Confidence::High),
                entry("Rule 2.1", ApplicabilityV1::NotApplicable, Confidence::Medium),
                entry("Rule 21.3", ApplicabilityV1::Direct, Confidence::Medium),
                entry("Rule 8.4", ApplicabilityV1::Direct, Confidence::Low),
                entry("Rule 9.1", ApplicabilityV1::Partial, Confidence::Low),
                entry("Dir 4.1", ApplicabilityV1::Direct, Confidence::Low),
            ],
        };
        let sim = similarity(&[("Rule 21.3", 0.4), ("Rule 8.4", 0.55), ("Dir 4.1", 0.7)]);
        (store, sim)
    }

    #[test]
    fn rules_apply_in_order() {
        let (store, sim) = fixture();
        let batch_of = |id: &str| assign_batch(store.find(id).unwrap(), sim.best_score(id));
        assert_eq!(batch_of("Rule 1.1"), 1);
        assert_eq!(batch_of("Dir 4.1"), 1);
        assert_eq!(batch_of("Rule 2.1"), 2);
        assert_eq!(batch_of("Rule 21.3"), 3);
        assert_eq!(batch_of("Rule 8.4"), 4);
        assert_eq!(batch_of("Rule 9.1"), 5);
    }

    #[test]
    fn every_guideline_assigned_once_and_sorted() {
        let (store, sim) = fixture();
        let p = scaffold_progress("misra_c", &store, &sim, None, ScaffoldOptions::default());
        let mut seen = HashSet::new();
        for b in &p.batches {
            for g in &b.guidelines {
                assert!(seen.insert(g.guideline_id.clone()), "{} twice", g.guideline_id);
            }
        }
        assert_eq!(seen.len(), store.mappings.len());
        let first: Vec<&str> = p.batches[0]
            .guidelines
            .iter()
            .map(|g| g.guideline_id.as_str())
            .collect();
        assert_eq!(first, vec!["Dir 4.1", "Rule 1.1"]);
    }

    #[test]
    fn scaffolding_is_idempotent() {
        let (store, sim) = fixture();
        let a = scaffold_progress("misra_c", &store, &sim, None, ScaffoldOptions::default());
        let b = scaffold_progress("misra_c", &store, &sim, Some(&a), ScaffoldOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn preserve_completed_keeps_verified_guideline_in_place() {
        let (store, sim) = fixture();
        let mut prev = scaffold_progress("misra_c", &store, &sim, None, ScaffoldOptions::default());
        // move Rule 9.1 to batch 4 and mark it verified
        let mut g = prev.batches[4].guidelines.remove(0);
        g.all_rust.verified = true;
        prev.batches[3].guidelines.push(g);

        let next = scaffold_progress(
            "misra_c",
            &store,
            &sim,
            Some(&prev),
            ScaffoldOptions {
                preserve_completed: true,
            },
        );
        let b4 = next.batches.iter().find(|b| b.batch_id == 4).unwrap();
        assert!(b4
            .guidelines
            .iter()
            .any(|g| g.guideline_id == "Rule 9.1" && g.all_rust.verified));
        let b5 = next.batches.iter().find(|b| b.batch_id == 5).unwrap();
        assert!(b5.guidelines.is_empty());
    }
}
