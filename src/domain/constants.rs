pub const DEFAULT_STANDARD: &str = "misra_c";

pub const DEFAULT_SECTION_THRESHOLD: f64 = 0.5;
pub const DEFAULT_PARAGRAPH_THRESHOLD: f64 = 0.55;
pub const DEFAULT_MAX_MATCHES: usize = 10;

/// Best-similarity floor for the high-score batch.
pub const HIGH_SCORE_THRESHOLD: f64 = 0.65;
/// Best-similarity floor for the medium-score batch (upper bound is exclusive
/// at `HIGH_SCORE_THRESHOLD`).
pub const MEDIUM_SCORE_THRESHOLD: f64 = 0.5;

/// Guideline categories covering standard library and resource usage.
pub const LIBRARY_CATEGORIES: [u32; 2] = [21, 22];

pub struct BatchDefinition {
    pub id: u32,
    pub name: &'static str,
    pub description: &'static str,
}

pub const BATCH_DEFINITIONS: [BatchDefinition; 5] = [
    BatchDefinition {
        id: 1,
        name: "high_score_direct",
        description: "High confidence or direct mappings with best similarity >= 0.65",
    },
    BatchDefinition {
        id: 2,
        name: "not_applicable",
        description: "Guidelines currently marked not applicable to Rust",
    },
    BatchDefinition {
        id: 3,
        name: "library_direct",
        description: "Direct mappings in the standard library categories (21, 22)",
    },
    BatchDefinition {
        id: 4,
        name: "medium_score_direct",
        description: "Direct mappings with best similarity in [0.5, 0.65)",
    },
    BatchDefinition {
        id: 5,
        name: "remaining",
        description: "Everything not captured by an earlier batch",
    },
];
