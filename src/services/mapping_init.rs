use crate::domain::inputs::{StandardDefinition, StandardGuideline};
use crate::domain::mapping::{
    guideline_sort_key, ContextBlock, ContextEntry, FlatEntry, MappingEntry, MappingStore,
    SourceMetadata,
};
use crate::domain::schema_version::SchemaVersion;
use serde::Serialize;

#[derive(Clone, Debug, Default, Serialize)]
pub struct InitOutcome {
    pub added: Vec<String>,
    pub existing: usize,
    pub total: usize,
}

fn skeleton(g: &StandardGuideline, version: SchemaVersion) -> MappingEntry {
    let title = if version.has_title() { g.title.clone() } else { None };
    let source_metadata = version.has_source_metadata().then(|| SourceMetadata {
        category: g.category.clone(),
        decidability: g.decidability.clone(),
        analysis_scope: g.analysis_scope.clone(),
    });
    if version.is_flat() {
        MappingEntry::Flat(FlatEntry {
            schema_version: version,
            guideline_id: g.id.clone(),
            guideline_type: g.guideline_type,
            guideline_title: title,
            source_metadata,
            applicability: None,
            adjusted_category: None,
            rationale_type: None,
            confidence: None,
            accepted_matches: vec![],
            rejected_matches: vec![],
            notes: None,
        })
    } else {
        MappingEntry::PerContext(ContextEntry {
            schema_version: version,
            guideline_id: g.id.clone(),
            guideline_type: g.guideline_type,
            guideline_title: title,
            source_metadata,
            all_rust: ContextBlock::default(),
            safe_rust: ContextBlock::default(),
            target_revision: None,
        })
    }
}

/// Adds an unverified skeleton for every guideline of the standard that the
/// store does not know yet. Existing entries are left alone.
pub fn init_mapping(
    standard: &str,
    existing: Option<MappingStore>,
    definition: &StandardDefinition,
    version: SchemaVersion,
) -> (MappingStore, InitOutcome) {
    let mut store = existing.unwrap_or_else(|| MappingStore {
        standard: standard.to_string(),
        mappings: vec![],
    });
    let mut outcome = InitOutcome {
        existing: store.mappings.len(),
        ..Default::default()
    };
    for g in &definition.guidelines {
        if store.find(&g.id).is_some() {
            continue;
        }
        store.mappings.push(skeleton(g, version));
        outcome.added.push(g.id.clone());
    }
    store
        .mappings
        .sort_by_key(|e| guideline_sort_key(e.guideline_id(), e.guideline_type()));
    outcome.total = store.mappings.len();
    (store, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocab::GuidelineType;

    fn definition() -> StandardDefinition {
        serde_json::from_value(serde_json::json!({
            "guidelines": [
                {"id": "Rule 21.3", "type": "rule", "title": "No malloc", "category": "Required"},
                {"id": "Dir 4.1", "type": "directive", "title": "Run-time failures"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn builds_sorted_skeletons_with_version_fields() {
        let (store, outcome) = init_mapping("misra_c", None, &definition(), SchemaVersion::V4_0);
        assert_eq!(outcome.added.len(), 2);
        assert_eq!(store.mappings[0].guideline_id(), "Dir 4.1");
        assert_eq!(store.mappings[0].guideline_type(), GuidelineType::Directive);
        match &store.mappings[1] {
            MappingEntry::PerContext(e) => {
                assert_eq!(e.guideline_title.as_deref(), Some("No malloc"));
                assert_eq!(
                    e.source_metadata.as_ref().and_then(|m| m.category.as_deref()),
                    Some("Required")
                );
                assert!(!e.all_rust.verified);
            }
            other => panic!("unexpected {:?}", other),
        }
        let (_, flat) = init_mapping("misra_c", None, &definition(), SchemaVersion::V1_0);
        assert_eq!(flat.total, 2);
    }

    #[test]
    fn rerun_keeps_existing_entries() {
        let (store, _) = init_mapping("misra_c", None, &definition(), SchemaVersion::V1_0);
        let (again, outcome) = init_mapping("misra_c", Some(store.clone()), &definition(), SchemaVersion::V4_0);
        assert!(outcome.added.is_empty());
        assert_eq!(again.mappings, store.mappings);
    }
}
