//! Command handler layer.
//!
//! This module owns CLI-oriented orchestration and output wiring.
//!
//! ## Files
//! - `admin.rs` — init-mapping/scaffold-progress/migrate-mappings/status/validate.
//! - `workflow.rs` — verify-batch/record-decision/merge-decisions/apply-verification/reset-batch.
//!
//! ## Principles
//! - Parse/match CLI inputs here.
//! - Delegate business logic to `services/*`.
//! - Every write happens after all checks for that command have passed.

pub mod admin;
pub mod workflow;

pub use admin::handle_admin_commands;
pub use workflow::handle_workflow_commands;
