//! Service layer containing workflow logic and side-effect helpers.
//!
//! ## Service map
//! - `config.rs` — `stdmap.toml` loading with defaults.
//! - `storage.rs` — workspace paths, JSON persistence, backups, audit log.
//! - `schema_check.rs` — JSON Schema validation of reports and decision files.
//! - `migration.rs` — forward-only version edges and store migration.
//! - `progress.rs` — progress file load/upgrade and rollups.
//! - `batching.rs` — batch assignment rules and progress scaffolding.
//! - `report_builder.rs` — batch report assembly from mapping + similarity.
//! - `recorder.rs` — single decision recording and provenance checks.
//! - `merger.rs` — decision directory validation and merge.
//! - `applier.rs` — report application to mapping store and progress.
//! - `reset.rs` — batch/guideline/context rollback planning.
//! - `validation.rs` — store and cross-artifact consistency checks.
//! - `mapping_init.rs` — skeleton entries from a standard definition.
//! - `output.rs` — JSON/text output helpers.
//!
//! ## Conventions
//! - Prefer pure helpers that take a store and return the updated store.
//! - Side effects should be explicit and localized.
//! - Keep command handlers thin; delegate to services.

pub mod applier;
pub mod batching;
pub mod config;
pub mod mapping_init;
pub mod merger;
pub mod migration;
pub mod output;
pub mod progress;
pub mod recorder;
pub mod report_builder;
pub mod reset;
pub mod schema_check;
pub mod storage;
pub mod validation;
