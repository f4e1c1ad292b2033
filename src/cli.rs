use crate::domain::schema_version::SchemaVersion;
use crate::domain::vocab::{
    AdjustedCategory, Applicability, Confidence, Context, ContextScope, DecisionKind,
    RationaleType, WaiverReason,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "stdmap",
    version,
    about = "Verification workflow for coding-standard to language-reference mappings"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON on stdout")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        env = "STDMAP_ROOT",
        default_value = ".",
        help = "Workspace root holding mappings/, cache/ and stdmap.toml"
    )]
    pub root: PathBuf,
    #[arg(
        long,
        global = true,
        env = "STDMAP_STANDARD",
        help = "Coding standard to operate on (defaults to stdmap.toml or misra_c)"
    )]
    pub standard: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create skeleton mapping entries for every guideline of the standard.
    InitMapping {
        #[arg(long, default_value_t = SchemaVersion::V1_0, help = "Version of newly created entries")]
        schema_version: SchemaVersion,
    },
    /// Partition the mapping store into verification batches.
    ScaffoldProgress {
        #[arg(long, default_value_t = false)]
        preserve_completed: bool,
        #[arg(long, default_value_t = false, help = "Replace an existing progress file")]
        force: bool,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Build the batch report a verification session works from.
    VerifyBatch {
        #[arg(long)]
        batch: u32,
        #[arg(long)]
        session: u32,
        #[arg(long, default_value_t = SchemaVersion::V2_0, help = "Decision scaffold shape")]
        schema_version: SchemaVersion,
        #[arg(long)]
        section_threshold: Option<f64>,
        #[arg(long)]
        paragraph_threshold: Option<f64>,
        #[arg(long)]
        max_matches: Option<usize>,
        #[arg(long, default_value_t = false, help = "Replace a report that already holds decisions")]
        force: bool,
    },
    /// Record one guideline/context decision.
    RecordDecision(RecordArgs),
    /// Fold the batch's decision directory into its report.
    MergeDecisions {
        #[arg(long)]
        batch: u32,
        #[arg(long, help = "Report session (defaults to the latest)")]
        session: Option<u32>,
        #[arg(long, default_value_t = false, help = "Schema-check the merged report")]
        validate: bool,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Write a batch report's decisions into the mapping store and progress.
    ApplyVerification {
        #[arg(long)]
        batch: u32,
        #[arg(long, help = "Report session (defaults to the latest)")]
        session: Option<u32>,
        #[arg(long, default_value_t = false)]
        apply_applicability_changes: bool,
        #[arg(long, default_value_t = false, help = "Validate after writing and roll back on failure")]
        validate: bool,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Return a batch (or part of it) to the unverified state.
    ResetBatch {
        #[arg(long)]
        batch: u32,
        #[arg(long, help = "Report session to reset (defaults to the latest)")]
        session: Option<u32>,
        #[arg(long, value_delimiter = ',', help = "Comma-separated guideline ids")]
        guidelines: Vec<String>,
        #[arg(long, value_enum, default_value_t = ContextScope::Both)]
        context: ContextScope,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, short = 'y', default_value_t = false, help = "Skip the confirmation prompt")]
        yes: bool,
    },
    /// Move mapping entries forward along the schema version lattice.
    MigrateMappings {
        #[arg(long, default_value_t = SchemaVersion::LATEST)]
        to: SchemaVersion,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Show progress per batch.
    Status {
        #[arg(long)]
        batch: Option<u32>,
    },
    /// Check the mapping store and progress file for consistency.
    Validate,
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    #[arg(long, required_unless_present = "batch_report")]
    pub batch: Option<u32>,
    #[arg(long, help = "Session recorded in the decision file")]
    pub session: Option<u32>,
    #[arg(long, conflicts_with = "batch", help = "Write into this report instead of the decision directory")]
    pub batch_report: Option<PathBuf>,
    #[arg(long)]
    pub guideline: String,
    #[arg(long, value_enum)]
    pub context: Context,
    #[arg(long, value_enum)]
    pub decision: DecisionKind,
    #[arg(long, value_enum)]
    pub confidence: Confidence,
    #[arg(long, value_enum)]
    pub rationale_type: RationaleType,
    #[arg(long, value_enum)]
    pub adjusted_category: Option<AdjustedCategory>,
    #[arg(long = "accept-match", value_name = "TARGET_ID[:REASON]")]
    pub accept_matches: Vec<String>,
    #[arg(long = "reject-match", value_name = "TARGET_ID[:REASON]")]
    pub reject_matches: Vec<String>,
    #[arg(long = "search-used", value_name = "SEARCH_ID:TOOL:COUNT:QUERY")]
    pub search_used: Vec<String>,
    #[arg(long, value_enum, conflicts_with = "search_used")]
    pub search_waiver: Option<WaiverReason>,
    #[arg(long, requires = "search_waiver")]
    pub waiver_approver: Option<String>,
    #[arg(long, requires = "search_waiver", help = "Defaults to today (UTC)")]
    pub waiver_date: Option<NaiveDate>,
    #[arg(long, requires = "search_waiver")]
    pub waiver_note: Option<String>,
    #[arg(long, requires = "search_waiver", help = "Defaults to waiver:<guideline>:<context>")]
    pub waiver_id: Option<String>,
    #[arg(long, value_enum)]
    pub propose_applicability: Option<Applicability>,
    #[arg(long, value_enum)]
    pub propose_category: Option<AdjustedCategory>,
    #[arg(long, default_value = "")]
    pub change_rationale: String,
    #[arg(long, default_value_t = false, help = "Allow a decision with no matches (needs --notes)")]
    pub force_no_matches: bool,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}
