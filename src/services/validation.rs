use crate::domain::mapping::{ContextBlock, EvidenceMatch, MappingEntry, MappingStore};
use crate::domain::progress::ProgressFile;
use crate::domain::vocab::Context;
use crate::services::progress::batch_status;
use std::collections::{HashMap, HashSet};

fn check_matches(id: &str, label: &str, matches: &[EvidenceMatch], out: &mut Vec<String>) {
    for m in matches {
        if !(0.0..=1.0).contains(&m.score) {
            out.push(format!(
                "{} ({}): match {} has score {} outside [0, 1]",
                id, label, m.target_id, m.score
            ));
        }
    }
}

fn check_block(id: &str, ctx: Context, block: &ContextBlock, out: &mut Vec<String>) {
    check_matches(id, ctx.as_str(), &block.accepted_matches, out);
    check_matches(id, ctx.as_str(), &block.rejected_matches, out);
    if block.verified {
        if block.confidence.is_none() {
            out.push(format!("{} ({}): verified without confidence", id, ctx));
        }
        if block.verified_by_session.is_none() {
            out.push(format!("{} ({}): verified without a session id", id, ctx));
        }
    }
    if block
        .accepted_matches
        .iter()
        .any(|a| block.rejected_matches.iter().any(|r| r.target_id == a.target_id))
    {
        out.push(format!("{} ({}): a match is both accepted and rejected", id, ctx));
    }
}

/// Problems in the mapping store on its own.
pub fn validate_store(store: &MappingStore) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for entry in &store.mappings {
        let id = entry.guideline_id();
        if !seen.insert(id) {
            out.push(format!("{}: appears more than once in the mapping store", id));
        }
        match entry {
            MappingEntry::Flat(e) => {
                check_matches(id, "flat", &e.accepted_matches, &mut out);
                check_matches(id, "flat", &e.rejected_matches, &mut out);
            }
            MappingEntry::PerContext(e) => {
                for c in Context::ALL {
                    check_block(id, c, e.block(c), &mut out);
                }
            }
        }
    }
    out
}

/// Cross-artifact checks: progress must reference known guidelines, assign
/// each one once, carry statuses consistent with its flags, and agree with
/// the verified flags on per-context mapping entries.
pub fn validate_progress(progress: &ProgressFile, store: &MappingStore) -> Vec<String> {
    let mut out = Vec::new();
    let mut assigned: HashMap<&str, u32> = HashMap::new();
    for b in &progress.batches {
        let expected = batch_status(b);
        if b.status != expected {
            out.push(format!(
                "batch {}: status {} but guidelines say {}",
                b.batch_id, b.status, expected
            ));
        }
        for g in &b.guidelines {
            if let Some(prev) = assigned.insert(g.guideline_id.as_str(), b.batch_id) {
                out.push(format!(
                    "{}: assigned to batch {} and batch {}",
                    g.guideline_id, prev, b.batch_id
                ));
            }
            let Some(entry) = store.find(&g.guideline_id) else {
                out.push(format!("{}: in progress but not in the mapping store", g.guideline_id));
                continue;
            };
            if let MappingEntry::PerContext(e) = entry {
                for c in Context::ALL {
                    if g.context(c).verified && !e.block(c).verified {
                        out.push(format!(
                            "{} ({}): verified in progress but not in the mapping store",
                            g.guideline_id, c
                        ));
                    }
                }
            }
        }
    }
    out
}

pub fn validate_all(store: &MappingStore, progress: Option<&ProgressFile>) -> Vec<String> {
    let mut out = validate_store(store);
    if let Some(p) = progress {
        out.extend(validate_progress(p, store));
    }
    out
}
