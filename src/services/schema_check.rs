//! JSON Schema conformance for on-disk artifacts.
//!
//! Schemas are embedded at build time; errors are reported with the JSON
//! pointer of the offending field.

use crate::domain::errors::WorkflowError;
use jsonschema::JSONSchema;

const BATCH_REPORT_SCHEMA: &str = include_str!("../../schemas/batch_report.schema.json");
const DECISION_FILE_SCHEMA: &str = include_str!("../../schemas/decision_file.schema.json");

#[derive(Clone, Copy, Debug)]
pub enum ArtifactSchema {
    BatchReport,
    DecisionFile,
}

impl ArtifactSchema {
    fn source(&self) -> &'static str {
        match self {
            ArtifactSchema::BatchReport => BATCH_REPORT_SCHEMA,
            ArtifactSchema::DecisionFile => DECISION_FILE_SCHEMA,
        }
    }
}

/// Every violation as `<pointer>: <message>`; empty when the instance conforms.
pub fn schema_errors(
    schema: ArtifactSchema,
    instance: &serde_json::Value,
) -> anyhow::Result<Vec<String>> {
    let doc: serde_json::Value = serde_json::from_str(schema.source())?;
    let compiled = JSONSchema::compile(&doc)
        .map_err(|e| anyhow::anyhow!("invalid embedded schema {:?}: {}", schema, e))?;
    let out = match compiled.validate(instance) {
        Ok(()) => vec![],
        Err(errors) => errors
            .map(|e| {
                let path = e.instance_path.to_string();
                let path = if path.is_empty() { "/".to_string() } else { path };
                format!("{}: {}", path, e)
            })
            .collect(),
    };
    Ok(out)
}

pub fn ensure_conforms(
    schema: ArtifactSchema,
    artifact: &str,
    instance: &serde_json::Value,
) -> anyhow::Result<()> {
    let errors = schema_errors(schema, instance)?;
    if errors.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Schema {
            artifact: artifact.to_string(),
            errors,
        }
        .into())
    }
}
