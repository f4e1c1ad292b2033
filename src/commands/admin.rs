use crate::*;
use serde::Serialize;

#[derive(Serialize)]
struct BatchRow {
    batch_id: u32,
    name: String,
    status: BatchStatus,
    guidelines: usize,
    verified_all_rust: usize,
    verified_safe_rust: usize,
    report_sessions: Vec<u32>,
    decision_files: usize,
}

fn batch_rows(ws: &Workspace, progress: &ProgressFile, only: Option<u32>) -> anyhow::Result<Vec<BatchRow>> {
    let mut rows = Vec::new();
    for b in progress
        .batches
        .iter()
        .filter(|b| only.map_or(true, |id| id == b.batch_id))
    {
        let dir = ws.decisions_dir(b.batch_id);
        let decision_files = if dir.exists() {
            std::fs::read_dir(&dir)?
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().ends_with(".json"))
                .count()
        } else {
            0
        };
        rows.push(BatchRow {
            batch_id: b.batch_id,
            name: b.name.clone(),
            status: b.status,
            guidelines: b.guidelines.len(),
            verified_all_rust: b.guidelines.iter().filter(|g| g.all_rust.verified).count(),
            verified_safe_rust: b.guidelines.iter().filter(|g| g.safe_rust.verified).count(),
            report_sessions: ws.report_sessions(b.batch_id)?,
            decision_files,
        });
    }
    Ok(rows)
}

fn batch_row_line(r: &BatchRow) -> String {
    format!(
        "batch {}\t{}\t{}\t{} guideline(s)\tall_rust {}/{}\tsafe_rust {}/{}",
        r.batch_id,
        r.name,
        r.status,
        r.guidelines,
        r.verified_all_rust,
        r.guidelines,
        r.verified_safe_rust,
        r.guidelines
    )
}

#[derive(Serialize)]
struct MigrateOutput {
    #[serde(flatten)]
    report: StoreMigrationReport,
    sha256_before: String,
    backup: Option<String>,
    dry_run: bool,
}

#[derive(Serialize)]
struct ValidateOutput {
    guidelines: usize,
    batches: usize,
    reports_checked: usize,
}

pub fn handle_admin_commands(cli: &Cli, ws: &Workspace) -> anyhow::Result<bool> {
    match &cli.command {
        Commands::InitMapping { schema_version } => {
            let def_path = ws.standard_definition_path();
            if !def_path.exists() {
                return Err(WorkflowError::NotFound(format!(
                    "standard definition {}",
                    def_path.display()
                ))
                .into());
            }
            let definition: StandardDefinition = read_json(&def_path)?;
            let existing = if ws.mapping_path().exists() {
                Some(load_mapping(ws)?)
            } else {
                None
            };
            let fresh = existing.is_none();
            let (store, outcome) = init_mapping(&ws.standard, existing, &definition, *schema_version);
            if fresh || !outcome.added.is_empty() {
                save_mapping(ws, &store)?;
                audit(
                    ws,
                    "init-mapping",
                    serde_json::json!({"added": outcome.added.len(), "total": outcome.total}),
                );
            }
            print_one(cli.json, outcome, |o| {
                format!(
                    "added {} guideline(s) to {} ({} total)",
                    o.added.len(),
                    ws.mapping_path().display(),
                    o.total
                )
            })?;
        }
        Commands::ScaffoldProgress {
            preserve_completed,
            force,
            dry_run,
        } => {
            let store = load_mapping(ws)?;
            let similarity = load_similarity(ws)?.unwrap_or_default();
            let existing = load_progress_opt(ws)?;
            if existing.is_some() && !force && !preserve_completed && !dry_run {
                return Err(WorkflowError::ConfirmationRequired(format!(
                    "{} already exists; pass --force to replace it or --preserve-completed to keep verified guidelines",
                    ws.progress_path().display()
                ))
                .into());
            }
            let progress = scaffold_progress(
                &ws.standard,
                &store,
                &similarity,
                existing.as_ref(),
                ScaffoldOptions {
                    preserve_completed: *preserve_completed,
                },
            );
            if !dry_run {
                save_progress(ws, &progress)?;
                audit(
                    ws,
                    "scaffold-progress",
                    serde_json::json!({
                        "total_guidelines": progress.summary.total_guidelines,
                        "preserve_completed": preserve_completed
                    }),
                );
            }
            let rows = batch_rows(ws, &progress, None)?;
            print_out(cli.json, &rows, batch_row_line)?;
        }
        Commands::MigrateMappings { to, dry_run } => {
            let path = ws.mapping_path();
            let store = load_mapping(ws)?;
            let sha256_before = sha256_file(&path)?;
            let (migrated, report) = migrate_store(store, *to);
            let mut backup = None;
            if !dry_run && !report.migrated.is_empty() {
                let copy = backup_file(&path, &ws.backups_dir(), &ws.standard)?;
                save_mapping(ws, &migrated)?;
                audit(
                    ws,
                    "migrate-mappings",
                    serde_json::json!({
                        "to": to,
                        "migrated": report.migrated.len(),
                        "blocked": report.blocked.len(),
                        "backup": copy.display().to_string()
                    }),
                );
                backup = Some(copy.display().to_string());
            }
            let out = MigrateOutput {
                report,
                sha256_before,
                backup,
                dry_run: *dry_run,
            };
            print_one(cli.json, out, |o| {
                format!(
                    "{}migrated {} entr(ies) toward {}, {} unchanged, {} blocked",
                    if o.dry_run { "[dry-run] " } else { "" },
                    o.report.migrated.len(),
                    to,
                    o.report.unchanged,
                    o.report.blocked.len()
                )
            })?;
        }
        Commands::Status { batch } => {
            let progress = load_progress(ws)?;
            if let Some(id) = batch {
                if progress.batch(*id).is_none() {
                    return Err(WorkflowError::NotFound(format!("batch {}", id)).into());
                }
            }
            let rows = batch_rows(ws, &progress, *batch)?;
            print_out(cli.json, &rows, batch_row_line)?;
            let s = &progress.summary;
            eprintln!(
                "total {}\tall_rust {}\tsafe_rust {}\tfully verified {}\tbatches completed {}",
                s.total_guidelines,
                s.verified_all_rust,
                s.verified_safe_rust,
                s.fully_verified,
                s.batches_completed
            );
        }
        Commands::Validate => {
            let store = load_mapping(ws)?;
            let progress = load_progress_opt(ws)?;
            let mut problems = validate_all(&store, progress.as_ref());
            let reports = ws.all_report_paths()?;
            for path in &reports {
                let value = read_json_value(path)?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                for e in schema_errors(ArtifactSchema::BatchReport, &value)? {
                    problems.push(format!("{}: {}", name, e));
                }
            }
            if !problems.is_empty() {
                return Err(WorkflowError::Validation(problems).into());
            }
            let out = ValidateOutput {
                guidelines: store.mappings.len(),
                batches: progress.as_ref().map_or(0, |p| p.batches.len()),
                reports_checked: reports.len(),
            };
            print_one(cli.json, out, |o| {
                format!(
                    "ok: {} guideline(s), {} batch(es), {} report(s) checked",
                    o.guidelines, o.batches, o.reports_checked
                )
            })?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}
