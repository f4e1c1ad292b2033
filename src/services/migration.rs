//! Forward-only migration of mapping entries along the version lattice.
//!
//! One function per edge kind; `migrate_to` composes them one step at a
//! time and stops at the first edge whose preconditions are not met.

use crate::domain::mapping::{ContextBlock, ContextEntry, FlatEntry, MappingEntry, MappingStore};
use crate::domain::schema_version::{applicability_v1_to_v2, SchemaVersion};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrationOutcome {
    Migrated {
        from: SchemaVersion,
        to: SchemaVersion,
    },
    Unchanged {
        version: SchemaVersion,
    },
    /// Stopped before reaching the target; the entry keeps `at`.
    Blocked {
        from: SchemaVersion,
        at: SchemaVersion,
        reason: String,
    },
}

/// Copies the flat block into both contexts without any precondition.
/// The result is unverified in both contexts.
pub fn split_flat(flat: &FlatEntry, version: SchemaVersion) -> ContextEntry {
    let block = ContextBlock {
        applicability: flat.applicability.map(applicability_v1_to_v2),
        adjusted_category: flat.adjusted_category,
        rationale_type: flat.rationale_type,
        confidence: flat.confidence,
        accepted_matches: flat.accepted_matches.clone(),
        rejected_matches: flat.rejected_matches.clone(),
        verified: false,
        verified_by_session: None,
        notes: flat.notes.clone(),
        verified_date: None,
        search_ids: vec![],
    };
    ContextEntry {
        schema_version: version.per_context_counterpart(),
        guideline_id: flat.guideline_id.clone(),
        guideline_type: flat.guideline_type,
        guideline_title: flat.guideline_title.clone(),
        source_metadata: flat.source_metadata.clone(),
        all_rust: block.clone(),
        safe_rust: block,
        target_revision: None,
    }
}

fn flat_minor_step(mut flat: FlatEntry, to: SchemaVersion) -> MappingEntry {
    flat.schema_version = to;
    MappingEntry::Flat(flat)
}

fn flat_to_per_context(flat: FlatEntry, to: SchemaVersion) -> Result<MappingEntry, String> {
    if flat.applicability.is_none() {
        return Err("no applicability data to split into contexts".to_string());
    }
    Ok(MappingEntry::PerContext(split_flat(&flat, to)))
}

fn per_context_step(mut entry: ContextEntry, to: SchemaVersion) -> MappingEntry {
    entry.schema_version = to;
    MappingEntry::PerContext(entry)
}

/// Applies exactly one edge.
pub fn step(entry: MappingEntry, to: SchemaVersion) -> Result<MappingEntry, String> {
    match entry {
        MappingEntry::Flat(flat) if to.is_flat() => Ok(flat_minor_step(flat, to)),
        MappingEntry::Flat(flat) => flat_to_per_context(flat, to),
        MappingEntry::PerContext(e) if to.is_flat() => Err(format!(
            "{} is per-context and cannot move to flat version {}",
            e.guideline_id, to
        )),
        MappingEntry::PerContext(e) => Ok(per_context_step(e, to)),
    }
}

/// Moves `entry` toward `target`. Never lowers the version; an entry
/// already at or above `target` comes back unchanged.
pub fn migrate_to(entry: &MappingEntry, target: SchemaVersion) -> (MappingEntry, MigrationOutcome) {
    let from = entry.schema_version();
    let mut current = entry.clone();
    while let Some(next) = current.schema_version().next_toward(target) {
        let at = current.schema_version();
        match step(current.clone(), next) {
            Ok(e) => current = e,
            Err(reason) => {
                return (
                    current,
                    MigrationOutcome::Blocked { from, at, reason },
                )
            }
        }
    }
    let to = current.schema_version();
    let outcome = if to == from {
        MigrationOutcome::Unchanged { version: from }
    } else {
        MigrationOutcome::Migrated { from, to }
    };
    (current, outcome)
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct StoreMigrationReport {
    pub target: Option<SchemaVersion>,
    pub migrated: Vec<EntryMigration>,
    pub unchanged: usize,
    pub blocked: Vec<EntryMigration>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EntryMigration {
    pub guideline_id: String,
    #[serde(flatten)]
    pub outcome: MigrationOutcome,
}

pub fn migrate_store(store: MappingStore, target: SchemaVersion) -> (MappingStore, StoreMigrationReport) {
    let mut report = StoreMigrationReport {
        target: Some(target),
        ..Default::default()
    };
    let mut mappings = Vec::with_capacity(store.mappings.len());
    for entry in &store.mappings {
        let (migrated, outcome) = migrate_to(entry, target);
        let guideline_id = entry.guideline_id().to_string();
        match &outcome {
            MigrationOutcome::Migrated { .. } => report.migrated.push(EntryMigration {
                guideline_id,
                outcome,
            }),
            MigrationOutcome::Unchanged { .. } => report.unchanged += 1,
            MigrationOutcome::Blocked { from, at, reason } => {
                tracing::warn!(guideline = %guideline_id, %from, %at, %reason, "migration blocked");
                report.blocked.push(EntryMigration {
                    guideline_id,
                    outcome,
                })
            }
        }
        mappings.push(migrated);
    }
    (
        MappingStore {
            standard: store.standard,
            mappings,
        },
        report,
    )
}
