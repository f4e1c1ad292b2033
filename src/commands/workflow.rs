use crate::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct VerifyOutput {
    report: String,
    batch_id: u32,
    session_id: u32,
    schema_version: SchemaVersion,
    guidelines: usize,
    with_evidence: usize,
}

#[derive(Serialize)]
struct RecordOutput {
    guideline_id: String,
    context: Context,
    decision: DecisionKind,
    target: String,
    in_place: bool,
}

#[derive(Serialize)]
struct MergeOutput {
    report: String,
    dry_run: bool,
    #[serde(flatten)]
    outcome: MergeOutcome,
}

#[derive(Serialize, Default)]
struct ResetOutput {
    batch_id: u32,
    report: Option<String>,
    slots_cleared: usize,
    changes_removed: usize,
    files_deleted: Vec<String>,
    files_rewritten: Vec<String>,
    progress_cleared: usize,
    batch_status: Option<BatchStatus>,
    dry_run: bool,
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Reads a batch report after checking it against the report schema.
fn load_report(path: &Path) -> anyhow::Result<BatchReport> {
    if !path.exists() {
        return Err(WorkflowError::NotFound(format!("batch report {}", path.display())).into());
    }
    let value = read_json_value(path)?;
    ensure_conforms(ArtifactSchema::BatchReport, &display(path), &value)?;
    Ok(serde_json::from_value(value)?)
}

fn write_report(path: &Path, report: &BatchReport) -> anyhow::Result<()> {
    let value = serde_json::to_value(report)?;
    ensure_conforms(ArtifactSchema::BatchReport, &display(path), &value)?;
    write_json(path, &value)
}

fn confirm(prompt: &str) -> anyhow::Result<()> {
    use std::io::{BufRead, IsTerminal, Write};

    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return Err(WorkflowError::ConfirmationRequired(format!(
            "{}; pass --yes to proceed without a prompt",
            prompt
        ))
        .into());
    }
    eprint!("{} [y/N] ", prompt);
    std::io::stderr().flush()?;
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    if matches!(line.trim(), "y" | "Y" | "yes") {
        Ok(())
    } else {
        Err(WorkflowError::ConfirmationRequired("aborted by user".to_string()).into())
    }
}

fn record_decision(cli: &Cli, ws: &Workspace, args: &RecordArgs) -> anyhow::Result<()> {
    let searches = args
        .search_used
        .iter()
        .map(|s| parse_search_usage(s))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let waiver = args.search_waiver.map(|reason| SearchWaiver {
        search_id: args.waiver_id.clone().unwrap_or_else(|| {
            format!("waiver:{}:{}", args.guideline.replace(' ', "_"), args.context)
        }),
        reason,
        approver: args.waiver_approver.clone().unwrap_or_default(),
        date: args
            .waiver_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive()),
        note: args.waiver_note.clone(),
    });
    let evidence = provenance(&args.guideline, args.context.as_str(), searches, waiver)?;

    let report_path: Option<PathBuf> = match (&args.batch_report, args.batch) {
        (Some(p), _) => Some(p.clone()),
        (None, Some(b)) => match args.session {
            Some(s) => Some(ws.report_path(b, s)).filter(|p| p.exists()),
            None => ws.latest_report_path(b)?,
        },
        (None, None) => None,
    };
    let report = match &report_path {
        Some(p) if p.exists() => Some(load_report(p)?),
        Some(p) if args.batch_report.is_some() => {
            return Err(WorkflowError::NotFound(format!("batch report {}", p.display())).into())
        }
        _ => None,
    };

    let known = match &report {
        Some(r) => {
            let g = r
                .guideline(&args.guideline)
                .ok_or_else(|| WorkflowError::UnknownGuideline(args.guideline.clone()))?;
            known_matches(g)
        }
        None => {
            let batch = args.batch.unwrap_or_default();
            match load_progress_opt(ws)? {
                Some(p) => {
                    let member = p
                        .batch(batch)
                        .is_some_and(|b| b.guidelines.iter().any(|g| g.guideline_id == args.guideline));
                    if !member {
                        return Err(WorkflowError::UnknownGuideline(format!(
                            "{} (not in batch {})",
                            args.guideline, batch
                        ))
                        .into());
                    }
                }
                None => tracing::warn!("no report or progress file; batch membership not checked"),
            }
            vec![]
        }
    };

    let mut proposed_changes = Vec::new();
    if let Some(v) = args.propose_applicability {
        proposed_changes.push(ProposedChange::Applicability {
            proposed_value: v,
            rationale: args.change_rationale.clone(),
        });
    }
    if let Some(v) = args.propose_category {
        proposed_changes.push(ProposedChange::AdjustedCategory {
            proposed_value: v,
            rationale: args.change_rationale.clone(),
        });
    }
    let decision = ContextDecision {
        decision: Some(args.decision),
        confidence: Some(args.confidence),
        rationale_type: Some(args.rationale_type),
        adjusted_category: args.adjusted_category,
        accepted_matches: args
            .accept_matches
            .iter()
            .map(|m| resolve_match(m, &known))
            .collect(),
        rejected_matches: args
            .reject_matches
            .iter()
            .map(|m| resolve_match(m, &known))
            .collect(),
        search_evidence: Some(evidence),
        proposed_changes,
        forced_no_matches: args.force_no_matches,
        notes: args.notes.clone(),
    };
    validate_decision(&args.guideline, Some(args.context), &decision)?;

    let target = match (&args.batch_report, report) {
        (Some(path), Some(mut report)) => {
            record_in_report(&mut report, &args.guideline, args.context, decision, args.overwrite)?;
            write_report(path, &report)?;
            display(path)
        }
        _ => {
            let batch = args
                .batch
                .ok_or_else(|| anyhow::anyhow!("--batch or --batch-report is required"))?;
            let dir = ws.decisions_dir(batch);
            let name = decision_file_name(&args.guideline);
            let path = dir.join(&name);
            let existing = if path.exists() {
                let f: DecisionFile = read_json(&path)?;
                if f.guideline_id != args.guideline {
                    return Err(WorkflowError::Validation(vec![format!(
                        "{} holds {} instead of {}",
                        name, f.guideline_id, args.guideline
                    )])
                    .into());
                }
                Some(f)
            } else {
                None
            };
            let file = upsert_decision_file(
                existing,
                &args.guideline,
                batch,
                args.session,
                args.context,
                decision,
                args.overwrite,
            )?;
            let value = serde_json::to_value(&file)?;
            ensure_conforms(ArtifactSchema::DecisionFile, &name, &value)?;
            warn_cross_file_duplicates(&dir, &name, &file);
            write_json(&path, &value)?;
            display(&path)
        }
    };

    audit(
        ws,
        "record-decision",
        serde_json::json!({
            "guideline": args.guideline,
            "context": args.context,
            "decision": args.decision,
            "target": target
        }),
    );
    let out = RecordOutput {
        guideline_id: args.guideline.clone(),
        context: args.context,
        decision: args.decision,
        target,
        in_place: args.batch_report.is_some(),
    };
    print_one(cli.json, out, |o| {
        format!("recorded {} ({}) -> {}", o.guideline_id, o.context, o.target)
    })
}

fn reset_batch(
    cli: &Cli,
    ws: &Workspace,
    scope: ResetScope,
    session: Option<u32>,
    dry_run: bool,
    yes: bool,
) -> anyhow::Result<()> {
    let mut out = ResetOutput {
        batch_id: scope.batch_id,
        dry_run,
        ..Default::default()
    };

    let progress = load_progress_opt(ws)?;
    if let (Some(p), Some(ids)) = (&progress, &scope.guidelines) {
        let members: BTreeSet<&str> = p
            .batch(scope.batch_id)
            .map(|b| b.guidelines.iter().map(|g| g.guideline_id.as_str()).collect())
            .unwrap_or_default();
        for id in ids.iter().filter(|id| !members.contains(id.as_str())) {
            tracing::warn!(guideline = %id, batch = scope.batch_id, "not a member of the batch");
        }
    }
    let progress_plan = progress.map(|p| reset_progress(p, &scope));
    if let Some((p, cleared)) = &progress_plan {
        out.progress_cleared = *cleared;
        out.batch_status = p.batch(scope.batch_id).map(|b| b.status);
    }

    let report_path = match session {
        Some(s) => Some(ws.report_path(scope.batch_id, s)).filter(|p| p.exists()),
        None => ws.latest_report_path(scope.batch_id)?,
    };
    let report_plan = match &report_path {
        Some(path) => {
            let (report, stats) = reset_report(load_report(path)?, &scope);
            out.report = Some(display(path));
            out.slots_cleared = stats.slots_cleared;
            out.changes_removed = stats.changes_removed;
            Some((path.clone(), report))
        }
        None => None,
    };

    let dir = ws.decisions_dir(scope.batch_id);
    let mut file_plan: Vec<(PathBuf, DecisionFileAction)> = Vec::new();
    if dir.exists() {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|x| x == "json"))
            .collect();
        paths.sort();
        for path in paths {
            let file: DecisionFile = match read_json(&path) {
                Ok(f) => f,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable decision file");
                    continue;
                }
            };
            let action = plan_decision_reset(&file, &scope);
            match &action {
                DecisionFileAction::Delete => out.files_deleted.push(display(&path)),
                DecisionFileAction::Rewrite(_) => out.files_rewritten.push(display(&path)),
                DecisionFileAction::Untouched => continue,
            }
            file_plan.push((path, action));
        }
    }

    let changes = out.progress_cleared
        + out.slots_cleared
        + out.changes_removed
        + out.files_deleted.len()
        + out.files_rewritten.len();
    if !dry_run && changes > 0 {
        if !yes {
            confirm(&format!(
                "reset batch {}: clear {} verified pair(s), {} report slot(s), delete {} and rewrite {} decision file(s)",
                scope.batch_id,
                out.progress_cleared,
                out.slots_cleared,
                out.files_deleted.len(),
                out.files_rewritten.len()
            ))?;
        }
        if let Some((path, report)) = &report_plan {
            write_report(path, report)?;
        }
        for (path, action) in &file_plan {
            match action {
                DecisionFileAction::Delete => std::fs::remove_file(path)?,
                DecisionFileAction::Rewrite(file) => write_json(path, file)?,
                DecisionFileAction::Untouched => {}
            }
        }
        if let Some((p, _)) = &progress_plan {
            save_progress(ws, p)?;
        }
        audit(
            ws,
            "reset-batch",
            serde_json::json!({
                "batch": scope.batch_id,
                "contexts": scope.contexts,
                "guidelines": scope.guidelines,
                "files_deleted": out.files_deleted.len(),
                "progress_cleared": out.progress_cleared
            }),
        );
    }

    print_one(cli.json, out, |o| {
        format!(
            "{}batch {}: {} verified pair(s), {} slot(s), {} change(s) cleared; {} file(s) deleted, {} rewritten",
            if o.dry_run { "[dry-run] " } else { "" },
            o.batch_id,
            o.progress_cleared,
            o.slots_cleared,
            o.changes_removed,
            o.files_deleted.len(),
            o.files_rewritten.len()
        )
    })
}

pub fn handle_workflow_commands(cli: &Cli, ws: &Workspace) -> anyhow::Result<()> {
    match &cli.command {
        Commands::VerifyBatch {
            batch,
            session,
            schema_version,
            section_threshold,
            paragraph_threshold,
            max_matches,
            force,
        } => {
            let progress = load_progress(ws)?;
            let store = load_mapping(ws)?;
            let similarity = load_similarity(ws)?;
            let path = ws.report_path(*batch, *session);
            if path.exists() && !force {
                let previous: BatchReport = read_json(&path)?;
                let decided = decided_slots(&previous);
                if decided > 0 {
                    return Err(WorkflowError::ConfirmationRequired(format!(
                        "{} already holds {} decided slot(s); pass --force to replace it",
                        path.display(),
                        decided
                    ))
                    .into());
                }
            }
            let evidence = &ws.config.evidence;
            let opts = BuildOptions {
                batch_id: *batch,
                session_id: *session,
                schema_version: *schema_version,
                thresholds: EvidenceThresholds {
                    section: section_threshold.unwrap_or(evidence.section_threshold),
                    paragraph: paragraph_threshold.unwrap_or(evidence.paragraph_threshold),
                },
                max_matches: max_matches.unwrap_or(evidence.max_matches),
            };
            let report = build_report(&ws.standard, &progress, &store, similarity.as_ref(), &opts)?;
            write_report(&path, &report)?;
            audit(
                ws,
                "verify-batch",
                serde_json::json!({"batch": batch, "session": session, "guidelines": report.guidelines.len()}),
            );
            let out = VerifyOutput {
                report: display(&path),
                batch_id: *batch,
                session_id: *session,
                schema_version: *schema_version,
                guidelines: report.guidelines.len(),
                with_evidence: report
                    .guidelines
                    .iter()
                    .filter(|g| !g.evidence.section_matches.is_empty())
                    .count(),
            };
            print_one(cli.json, out, |o| {
                format!(
                    "wrote {} ({} guideline(s), {} with evidence)",
                    o.report, o.guidelines, o.with_evidence
                )
            })?;
        }
        Commands::RecordDecision(args) => record_decision(cli, ws, args)?,
        Commands::MergeDecisions {
            batch,
            session,
            validate,
            dry_run,
        } => {
            let session = ws.resolve_session(*batch, *session)?;
            let path = ws.report_path(*batch, session);
            let report = load_report(&path)?;
            let decisions = load_decision_dir(&ws.decisions_dir(*batch), *batch)?;
            let (merged, outcome) = merge_into_report(report, &decisions)?;
            let value = serde_json::to_value(&merged)?;
            if *validate {
                ensure_conforms(ArtifactSchema::BatchReport, &display(&path), &value)?;
            }
            if !dry_run {
                write_json(&path, &value)?;
                audit(
                    ws,
                    "merge-decisions",
                    serde_json::json!({
                        "batch": batch,
                        "session": session,
                        "files": outcome.files_read,
                        "skipped": outcome.skipped.len()
                    }),
                );
            }
            let out = MergeOutput {
                report: display(&path),
                dry_run: *dry_run,
                outcome,
            };
            print_one(cli.json, out, |o| {
                format!(
                    "{}merged {} file(s) into {} ({} context(s), {} skipped, {} change(s) added)",
                    if o.dry_run { "[dry-run] " } else { "" },
                    o.outcome.files_read.saturating_sub(o.outcome.skipped.len()),
                    o.report,
                    o.outcome.contexts_merged,
                    o.outcome.skipped.len(),
                    o.outcome.changes_added
                )
            })?;
        }
        Commands::ApplyVerification {
            batch,
            session,
            apply_applicability_changes,
            validate,
            dry_run,
        } => {
            let session = ws.resolve_session(*batch, *session)?;
            let report = load_report(&ws.report_path(*batch, session))?;
            let mapping_path = ws.mapping_path();
            let store = load_mapping(ws)?;
            let progress = load_progress(ws)?;
            let sha256_before = sha256_file(&mapping_path)?;
            let opts = ApplyOptions {
                apply_changes: *apply_applicability_changes,
                date: chrono::Utc::now().date_naive(),
            };
            let (store, progress, mut out) = apply_report(store, progress, &report, &opts)?;
            out.mapping_sha256_before = Some(sha256_before);
            out.dry_run = *dry_run;

            if !dry_run {
                let mapping_backup = backup_file(&mapping_path, &ws.backups_dir(), &ws.standard)?;
                let progress_backup = backup_file(
                    &ws.progress_path(),
                    &ws.backups_dir(),
                    &format!("{}.progress", ws.standard),
                )?;
                out.backup = Some(display(&mapping_backup));
                save_mapping(ws, &store)?;
                save_progress(ws, &progress)?;
                if *validate {
                    let problems = validate_all(&load_mapping(ws)?, Some(&load_progress(ws)?));
                    if !problems.is_empty() {
                        std::fs::copy(&mapping_backup, &mapping_path)?;
                        std::fs::copy(&progress_backup, ws.progress_path())?;
                        tracing::error!(count = problems.len(), "post-apply validation failed, restored backups");
                        return Err(WorkflowError::Validation(problems).into());
                    }
                }
                audit(
                    ws,
                    "apply-verification",
                    serde_json::json!({
                        "batch": batch,
                        "session": session,
                        "applied": out.applied.len(),
                        "migrated": out.migrated.len(),
                        "changes_applied": out.changes_applied,
                        "backup": out.backup
                    }),
                );
            }
            print_one(cli.json, out, |o| {
                format!(
                    "{}applied {} decision(s) from batch {} session {} ({} undecided, {} migrated, {} change(s) applied, {} pending); batch {}",
                    if o.dry_run { "[dry-run] " } else { "" },
                    o.applied.len(),
                    o.batch_id,
                    o.session_id,
                    o.undecided.len(),
                    o.migrated.len(),
                    o.changes_applied,
                    o.changes_pending,
                    o.batch_status.map(|s| s.to_string()).unwrap_or_default()
                )
            })?;
        }
        Commands::ResetBatch {
            batch,
            session,
            guidelines,
            context,
            dry_run,
            yes,
        } => {
            let scope = ResetScope {
                batch_id: *batch,
                guidelines: (!guidelines.is_empty())
                    .then(|| guidelines.iter().map(|g| g.trim().to_string()).collect()),
                contexts: *context,
            };
            reset_batch(cli, ws, scope, *session, *dry_run, *yes)?;
        }
        other => anyhow::bail!("unhandled command {:?}", other),
    }
    Ok(())
}
