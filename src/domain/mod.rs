//! Shared data model layer (types, vocabularies, constants).
//!
//! ## Purpose
//! - Keep every on-disk artifact shape in one place.
//! - Avoid cyclic imports between the workflow services.
//! - Make JSON schema changes explicit and reviewable.
//!
//! ## Files
//! - `vocab.rs` — closed vocabularies (contexts, decision kinds, tools, ...).
//! - `schema_version.rs` — version lattice, version detection, applicability conversion.
//! - `mapping.rs` — canonical mapping store and its version-tagged entries.
//! - `decision.rs` — decision files, search provenance, proposed changes.
//! - `report.rs` — batch reports and their decision slots.
//! - `progress.rs` — progress tracker (current and legacy shapes).
//! - `inputs.rs` — similarity results and standard definitions (read-only).
//! - `errors.rs` — workflow error taxonomy with stable machine codes.
//! - `constants.rs` — batch definitions and default thresholds.
//!
//! ## Rule of thumb
//! Domain types are data-only: no filesystem side effects.
//!
//! ## Compatibility note
//! Changes in these structs alter the artifacts under the workspace root and
//! the `--json` outputs. Keep `schemas/*.schema.json` in sync.

pub mod constants;
pub mod decision;
pub mod errors;
pub mod inputs;
pub mod mapping;
pub mod progress;
pub mod report;
pub mod schema_version;
pub mod vocab;
