use crate::domain::errors::WorkflowError;
use crate::domain::progress::{
    LegacyProgressFile, ProgressBatch, ProgressFile, ProgressSummary,
};
use crate::domain::schema_version::SchemaVersion;
use crate::domain::vocab::{BatchStatus, Context};
use crate::services::storage::{read_json_value, write_json, Workspace};

/// Loads the progress file, upgrading a 1.0 (flat) file to the 2.0 shape.
pub fn load_progress(ws: &Workspace) -> anyhow::Result<ProgressFile> {
    let path = ws.progress_path();
    if !path.exists() {
        return Err(
            WorkflowError::NotFound(format!("progress file {}", path.display())).into(),
        );
    }
    let raw = read_json_value(&path)?;
    let declared = raw.get("schema_version").and_then(|v| v.as_str());
    let mut progress: ProgressFile = match declared {
        Some("1.0") | None => {
            let legacy: LegacyProgressFile = serde_json::from_value(raw)?;
            tracing::info!(path = %path.display(), "upgrading 1.0 progress file to 2.0");
            legacy.into()
        }
        Some(_) => serde_json::from_value(raw)?,
    };
    if progress.standard.is_empty() {
        progress.standard = ws.standard.clone();
    }
    refresh_rollups(&mut progress);
    Ok(progress)
}

pub fn load_progress_opt(ws: &Workspace) -> anyhow::Result<Option<ProgressFile>> {
    if ws.progress_path().exists() {
        Ok(Some(load_progress(ws)?))
    } else {
        Ok(None)
    }
}

pub fn save_progress(ws: &Workspace, progress: &ProgressFile) -> anyhow::Result<()> {
    write_json(&ws.progress_path(), progress)
}

/// `completed` iff every guideline/context pair is verified.
pub fn batch_status(batch: &ProgressBatch) -> BatchStatus {
    let total = batch.guidelines.len() * Context::ALL.len();
    let verified: usize = batch
        .guidelines
        .iter()
        .map(|g| {
            Context::ALL
                .iter()
                .filter(|c| g.context(**c).verified)
                .count()
        })
        .sum();
    if total > 0 && verified == total {
        BatchStatus::Completed
    } else if verified > 0 {
        BatchStatus::InProgress
    } else {
        BatchStatus::Pending
    }
}

pub fn compute_progress_summary(progress: &ProgressFile) -> ProgressSummary {
    let mut s = ProgressSummary::default();
    for b in &progress.batches {
        match b.status {
            BatchStatus::Completed => s.batches_completed += 1,
            BatchStatus::InProgress => s.batches_in_progress += 1,
            BatchStatus::Pending => {}
        }
        for g in &b.guidelines {
            s.total_guidelines += 1;
            s.verified_all_rust += usize::from(g.all_rust.verified);
            s.verified_safe_rust += usize::from(g.safe_rust.verified);
            s.fully_verified += usize::from(g.fully_verified());
        }
    }
    s
}

/// Recomputes every batch status and the rollup counters from scratch.
pub fn refresh_rollups(progress: &mut ProgressFile) {
    progress.schema_version = SchemaVersion::V2_0;
    for b in &mut progress.batches {
        b.status = batch_status(b);
    }
    progress.summary = compute_progress_summary(progress);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::progress::ProgressGuideline;

    fn batch(flags: &[(bool, bool)]) -> ProgressBatch {
        ProgressBatch {
            batch_id: 1,
            name: "b".into(),
            description: String::new(),
            status: BatchStatus::Pending,
            guidelines: flags
                .iter()
                .enumerate()
                .map(|(i, (a, s))| {
                    let mut g = ProgressGuideline::new(format!("Rule 1.{}", i + 1));
                    g.all_rust.verified = *a;
                    g.safe_rust.verified = *s;
                    g
                })
                .collect(),
        }
    }

    #[test]
    fn status_requires_every_pair() {
        assert_eq!(batch_status(&batch(&[(false, false)])), BatchStatus::Pending);
        assert_eq!(batch_status(&batch(&[(true, false)])), BatchStatus::InProgress);
        assert_eq!(
            batch_status(&batch(&[(true, true), (true, false)])),
            BatchStatus::InProgress
        );
        assert_eq!(
            batch_status(&batch(&[(true, true), (true, true)])),
            BatchStatus::Completed
        );
        assert_eq!(batch_status(&batch(&[])), BatchStatus::Pending);
    }

    #[test]
    fn legacy_progress_broadcasts_flag_to_both_contexts() {
        let legacy: LegacyProgressFile = serde_json::from_value(serde_json::json!({
            "schema_version": "1.0",
            "standard": "misra_c",
            "batches": [{
                "batch_id": 2,
                "name": "not_applicable",
                "guidelines": [{"guideline_id": "Rule 1.1", "verified": true, "session_id": 4}]
            }]
        }))
        .unwrap();
        let mut p: ProgressFile = legacy.into();
        refresh_rollups(&mut p);
        let g = &p.batches[0].guidelines[0];
        assert!(g.all_rust.verified && g.safe_rust.verified);
        assert_eq!(g.safe_rust.session_id, Some(4));
        assert_eq!(p.batches[0].status, BatchStatus::Completed);
        assert_eq!(p.summary.fully_verified, 1);
    }
}
