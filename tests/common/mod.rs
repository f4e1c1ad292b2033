#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestEnv {
    _tmp: TempDir,
    pub root: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = make_fixture_workspace(tmp.path());
        Self { _tmp: tmp, root }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("stdmap");
        cmd.env("STDMAP_ROOT", &self.root)
            .env_remove("STDMAP_STANDARD")
            .env("STDMAP_LOG", "warn")
            .write_stdin("");
        cmd
    }

    pub fn run_json(&self, args: &[&str]) -> Value {
        let mut cmd = self.cmd();
        let out = cmd
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let v: Value = serde_json::from_slice(&out).expect("valid json output");
        assert_eq!(v["ok"], true, "unexpected output: {}", v);
        v
    }

    /// Runs a command expected to fail and returns its JSON error body.
    pub fn run_json_fail(&self, args: &[&str]) -> Value {
        let mut cmd = self.cmd();
        let out = cmd
            .arg("--json")
            .args(args)
            .assert()
            .failure()
            .get_output()
            .stdout
            .clone();
        let v: Value = serde_json::from_slice(&out).expect("valid json error output");
        assert_eq!(v["ok"], false, "unexpected output: {}", v);
        v
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn read(&self, rel: &str) -> Value {
        let raw = fs::read_to_string(self.path(rel)).expect("read artifact");
        serde_json::from_str(&raw).expect("artifact is json")
    }

    pub fn mapping(&self) -> Value {
        self.read("mappings/misra_c.json")
    }

    pub fn progress(&self) -> Value {
        self.read("progress/misra_c.json")
    }

    pub fn report(&self, batch: u32, session: u32) -> Value {
        self.read(&format!(
            "cache/verification/misra_c/batch{}_session{}.json",
            batch, session
        ))
    }

    pub fn decision_path(&self, batch: u32, file: &str) -> PathBuf {
        self.path(&format!(
            "cache/verification/misra_c/batch{}_decisions/{}",
            batch, file
        ))
    }

    /// scaffold-progress followed by verify-batch for batch 1, session 1.
    pub fn prepare_batch1(&self) {
        self.run_json(&["scaffold-progress"]);
        self.run_json(&["verify-batch", "--batch", "1", "--session", "1"]);
    }

    /// Records a decision for batch 1 in the decision directory.
    pub fn record(&self, guideline: &str, context: &str, search_id: &str) -> Value {
        let search = format!("{}:semantic_search:4:{} behaviour", search_id, guideline);
        self.run_json(&[
            "record-decision",
            "--batch",
            "1",
            "--session",
            "1",
            "--guideline",
            guideline,
            "--context",
            context,
            "--decision",
            "accept_with_modifications",
            "--confidence",
            "high",
            "--rationale-type",
            "direct_mapping",
            "--accept-match",
            "fls_abc123:covers the conversion rules",
            "--search-used",
            &search,
        ])
    }
}

pub fn entry<'a>(store: &'a Value, guideline: &str) -> &'a Value {
    store["mappings"]
        .as_array()
        .expect("mappings array")
        .iter()
        .find(|e| e["guideline_id"] == guideline)
        .unwrap_or_else(|| panic!("{} not in store", guideline))
}

pub fn progress_guideline<'a>(progress: &'a Value, guideline: &str) -> &'a Value {
    progress["batches"]
        .as_array()
        .expect("batches array")
        .iter()
        .flat_map(|b| b["guidelines"].as_array().expect("guidelines array"))
        .find(|g| g["guideline_id"] == guideline)
        .unwrap_or_else(|| panic!("{} not in progress", guideline))
}

pub fn batch<'a>(progress: &'a Value, id: u64) -> &'a Value {
    progress["batches"]
        .as_array()
        .expect("batches array")
        .iter()
        .find(|b| b["batch_id"] == id)
        .unwrap_or_else(|| panic!("batch {} missing", id))
}

fn write(path: &Path, value: &Value) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dir");
    }
    fs::write(
        path,
        serde_json::to_string_pretty(value).expect("serialize fixture"),
    )
    .expect("write fixture");
}

/// Workspace with mixed 1.0 (flat) and 2.0 (per-context) entries.
///
/// Expected batches: 1 = Dir 4.1, Rule 11.1; 2 = Rule 2.1; 3 = Rule 21.3;
/// 5 = Rule 8.4, Rule 10.2.
fn make_fixture_workspace(base: &Path) -> PathBuf {
    let root = base.join("ws");

    let mappings = json!({
        "standard": "misra_c",
        "mappings": [
            {
                "guideline_id": "Rule 11.1",
                "guideline_type": "rule",
                "applicability": "direct",
                "confidence": "medium",
                "rationale_type": "direct_mapping",
                "accepted_matches": [
                    {"target_id": "fls_old001", "category": 1, "title": "Casts", "score": 0.6, "reason": "initial guess"}
                ],
                "rejected_matches": [
                    {"target_id": "fls_rej002", "category": 1, "title": "Pointer provenance", "score": 0.4, "reason": "different concern"}
                ]
            },
            {
                "schema_version": "2.0",
                "guideline_id": "Dir 4.1",
                "guideline_type": "directive",
                "all_rust": {"applicability": "yes", "confidence": "high", "accepted_matches": []},
                "safe_rust": {"applicability": "no", "confidence": "high", "accepted_matches": []}
            },
            {
                "schema_version": "1.0",
                "guideline_id": "Rule 21.3",
                "guideline_type": "rule",
                "applicability": "direct",
                "confidence": "medium",
                "accepted_matches": []
            },
            {
                "guideline_id": "Rule 2.1",
                "guideline_type": "rule",
                "applicability": "not_applicable",
                "confidence": "low",
                "accepted_matches": []
            },
            {
                "schema_version": "1.0",
                "guideline_id": "Rule 8.4",
                "guideline_type": "rule",
                "accepted_matches": []
            },
            {
                "schema_version": "2.0",
                "guideline_id": "Rule 10.2",
                "guideline_type": "rule",
                "all_rust": {"applicability": "partial", "confidence": "low"},
                "safe_rust": {"applicability": "partial", "confidence": "low"}
            }
        ]
    });
    write(&root.join("mappings/misra_c.json"), &mappings);

    let similarity = json!({
        "results": {
            "Rule 11.1": {
                "section_matches": [
                    {"target_id": "fls_abc123", "category": 1, "title": "Type coercion", "score": 0.82},
                    {"target_id": "fls_low999", "category": 1, "title": "Unrelated", "score": 0.2}
                ],
                "paragraph_matches": [
                    {"target_id": "fls_abc123_p4", "category": 1, "title": "Coercion sites", "score": 0.74}
                ]
            },
            "Dir 4.1": {
                "section_matches": [
                    {"target_id": "fls_def456", "category": 1, "title": "Runtime checks", "score": 0.71}
                ],
                "paragraph_matches": []
            },
            "Rule 21.3": {
                "section_matches": [
                    {"target_id": "fls_ghi789", "category": 1, "title": "Allocation", "score": 0.3}
                ]
            }
        }
    });
    write(&root.join("embeddings/misra_c/similarity.json"), &similarity);

    let standard = json!({
        "standard": "misra_c",
        "guidelines": [
            {"id": "Dir 4.1", "type": "directive", "title": "Run-time failures shall be minimized", "category": "Required"},
            {"id": "Rule 1.3", "type": "rule", "title": "No undefined behaviour", "category": "Required", "decidability": "Undecidable"},
            {"id": "Rule 2.1", "type": "rule", "title": "No unreachable code"},
            {"id": "Rule 8.4", "type": "rule"},
            {"id": "Rule 10.2", "type": "rule"},
            {"id": "Rule 11.1", "type": "rule", "title": "Conversions between function pointers"},
            {"id": "Rule 21.3", "type": "rule", "title": "No dynamic allocation"}
        ]
    });
    write(&root.join("standards/misra_c.json"), &standard);

    root
}
