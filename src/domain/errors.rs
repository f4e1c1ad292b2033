use crate::domain::vocab::Context;
use serde::Serialize;

/// One (file, guideline, context) that claimed a search id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchIdClaim {
    pub file: String,
    pub guideline_id: String,
    /// `None` for a legacy flat decision.
    pub context: Option<Context>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchIdConflict {
    pub search_id: String,
    pub claimants: Vec<SearchIdClaim>,
}

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("{artifact}: schema validation failed ({} error(s))", .errors.len())]
    Schema {
        artifact: String,
        errors: Vec<String>,
    },
    #[error("unknown guideline: {0}")]
    UnknownGuideline(String),
    #[error("guidelines missing from mapping store: {}", .0.join(", "))]
    MissingGuidelines(Vec<String>),
    #[error("decision for {guideline} ({context}) is invalid")]
    InvalidDecision {
        guideline: String,
        context: String,
        problems: Vec<String>,
    },
    #[error("decision for {guideline} ({context}) needs exactly one of search usage or a waiver")]
    MissingProvenance { guideline: String, context: String },
    #[error("duplicate search ids across decision set: {} conflicting id(s)", .0.len())]
    DuplicateSearchIds(Vec<SearchIdConflict>),
    #[error("decision already recorded for {guideline} ({context}); pass --overwrite to replace it")]
    DecisionExists { guideline: String, context: String },
    #[error("{0}")]
    ConfirmationRequired(String),
    #[error("validation failed with {} error(s)", .0.len())]
    Validation(Vec<String>),
    #[error("{0} not found")]
    NotFound(String),
}

impl WorkflowError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::Schema { .. } => "SCHEMA_INVALID",
            WorkflowError::UnknownGuideline(_) | WorkflowError::MissingGuidelines(_) => {
                "UNKNOWN_GUIDELINE"
            }
            WorkflowError::InvalidDecision { .. } => "INVALID_DECISION",
            WorkflowError::MissingProvenance { .. } => "MISSING_PROVENANCE",
            WorkflowError::DuplicateSearchIds(_) => "DUPLICATE_SEARCH_ID",
            WorkflowError::DecisionExists { .. } => "DECISION_EXISTS",
            WorkflowError::ConfirmationRequired(_) => "CONFIRMATION_REQUIRED",
            WorkflowError::Validation(_) => "VALIDATION_FAILED",
            WorkflowError::NotFound(_) => "NOT_FOUND",
        }
    }

    /// One line per offending item, so every culprit gets named.
    pub fn details(&self) -> Vec<String> {
        match self {
            WorkflowError::Schema { artifact, errors } => errors
                .iter()
                .map(|e| format!("{}: {}", artifact, e))
                .collect(),
            WorkflowError::MissingGuidelines(ids) => ids.clone(),
            WorkflowError::InvalidDecision { problems, .. } => problems.clone(),
            WorkflowError::DuplicateSearchIds(conflicts) => conflicts
                .iter()
                .map(|c| {
                    let who: Vec<String> = c
                        .claimants
                        .iter()
                        .map(|cl| {
                            format!(
                                "{} ({}, {})",
                                cl.file,
                                cl.guideline_id,
                                cl.context.map(|x| x.as_str()).unwrap_or("flat")
                            )
                        })
                        .collect();
                    format!("search_id {} claimed by {}", c.search_id, who.join("; "))
                })
                .collect(),
            WorkflowError::Validation(errors) => errors.clone(),
            _ => vec![],
        }
    }
}
