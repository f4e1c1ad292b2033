//! Schema version lattice for mapping entries and version-tagged artifacts.
//!
//! Versions are totally ordered (`1.0 < 1.1 < ... < 3.2 < 4.0`). Versions
//! below 2.0 carry one flat block shared by both contexts; 2.0 and above
//! carry independent `all_rust` / `safe_rust` blocks.
//!
//! Applicability conversion between the flat (v1) and per-context (v2)
//! vocabularies is lossy in one direction: `rust_prevents` becomes `no`
//! and comes back as `not_applicable`. That loss is accepted behavior.

use crate::domain::vocab::{Applicability, ApplicabilityV1};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaVersion {
    V1_0,
    V1_1,
    V1_2,
    V2_0,
    V2_1,
    V2_2,
    V3_0,
    V3_1,
    V3_2,
    V4_0,
}

impl SchemaVersion {
    pub const ALL: [SchemaVersion; 10] = [
        SchemaVersion::V1_0,
        SchemaVersion::V1_1,
        SchemaVersion::V1_2,
        SchemaVersion::V2_0,
        SchemaVersion::V2_1,
        SchemaVersion::V2_2,
        SchemaVersion::V3_0,
        SchemaVersion::V3_1,
        SchemaVersion::V3_2,
        SchemaVersion::V4_0,
    ];

    pub const LATEST: SchemaVersion = SchemaVersion::V4_0;

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V1_0 => "1.0",
            SchemaVersion::V1_1 => "1.1",
            SchemaVersion::V1_2 => "1.2",
            SchemaVersion::V2_0 => "2.0",
            SchemaVersion::V2_1 => "2.1",
            SchemaVersion::V2_2 => "2.2",
            SchemaVersion::V3_0 => "3.0",
            SchemaVersion::V3_1 => "3.1",
            SchemaVersion::V3_2 => "3.2",
            SchemaVersion::V4_0 => "4.0",
        }
    }

    pub fn major(&self) -> u8 {
        match self {
            SchemaVersion::V1_0 | SchemaVersion::V1_1 | SchemaVersion::V1_2 => 1,
            SchemaVersion::V2_0 | SchemaVersion::V2_1 | SchemaVersion::V2_2 => 2,
            SchemaVersion::V3_0 | SchemaVersion::V3_1 | SchemaVersion::V3_2 => 3,
            SchemaVersion::V4_0 => 4,
        }
    }

    pub fn minor(&self) -> u8 {
        match self {
            SchemaVersion::V1_0
            | SchemaVersion::V2_0
            | SchemaVersion::V3_0
            | SchemaVersion::V4_0 => 0,
            SchemaVersion::V1_1 | SchemaVersion::V2_1 | SchemaVersion::V3_1 => 1,
            SchemaVersion::V1_2 | SchemaVersion::V2_2 | SchemaVersion::V3_2 => 2,
        }
    }

    fn from_parts(major: u8, minor: u8) -> Option<SchemaVersion> {
        SchemaVersion::ALL
            .into_iter()
            .find(|v| v.major() == major && v.minor() == minor)
    }

    /// Flat (shared) block shape.
    pub fn is_flat(&self) -> bool {
        self.major() < 2
    }

    /// Carries `guideline_title`.
    pub fn has_title(&self) -> bool {
        *self != SchemaVersion::V1_0 && *self != SchemaVersion::V2_0
    }

    /// Carries `source_metadata`.
    pub fn has_source_metadata(&self) -> bool {
        !matches!(
            self,
            SchemaVersion::V1_0 | SchemaVersion::V1_1 | SchemaVersion::V2_0 | SchemaVersion::V2_1
        )
    }

    /// Per-context `verified_date` and `search_ids`.
    pub fn has_context_provenance(&self) -> bool {
        self.major() >= 3
    }

    pub fn has_target_revision(&self) -> bool {
        self.major() >= 4
    }

    /// The next version on the path from `self` toward `target`, or `None`
    /// when `self` is already at or beyond `target`.
    ///
    /// Cross-family edges: `1.x -> 2.x` (same minor), `2.x -> 3.0`,
    /// `3.x -> 4.0`. Within a family the path walks one minor at a time.
    pub fn next_toward(&self, target: SchemaVersion) -> Option<SchemaVersion> {
        if *self >= target {
            return None;
        }
        if self.major() < target.major() {
            return match self.major() {
                1 => SchemaVersion::from_parts(2, self.minor()),
                2 => Some(SchemaVersion::V3_0),
                _ => Some(SchemaVersion::V4_0),
            };
        }
        SchemaVersion::from_parts(self.major(), self.minor() + 1)
    }

    /// The first per-context version reachable from a flat one.
    pub fn per_context_counterpart(&self) -> SchemaVersion {
        if self.is_flat() {
            SchemaVersion::from_parts(2, self.minor()).unwrap_or(SchemaVersion::V2_0)
        } else {
            *self
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SchemaVersion::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| format!("unknown schema version: {}", s))
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Declared version of a record, or a structural guess when the tag is absent.
///
/// Paired `all_rust` / `safe_rust` objects imply a per-context version
/// (3.0 when either carries provenance fields, 2.0 otherwise); flat
/// applicability fields imply 1.0. A declared but unknown tag is an error.
pub fn detect_version(record: &serde_json::Value) -> Result<SchemaVersion, String> {
    if let Some(tag) = record.get("schema_version") {
        return match tag.as_str() {
            Some(s) => s.parse(),
            None => Err(format!("schema_version must be a string, got {}", tag)),
        };
    }

    let all = record.get("all_rust").filter(|v| v.is_object());
    let safe = record.get("safe_rust").filter(|v| v.is_object());
    if let (Some(all), Some(safe)) = (all, safe) {
        let has_provenance = [all, safe]
            .iter()
            .any(|b| b.get("verified_date").is_some() || b.get("search_ids").is_some());
        return Ok(if has_provenance {
            SchemaVersion::V3_0
        } else {
            SchemaVersion::V2_0
        });
    }

    let flat_markers = ["applicability", "accepted_matches"];
    if flat_markers.iter().any(|k| record.get(*k).is_some()) {
        return Ok(SchemaVersion::V1_0);
    }

    Err("cannot infer schema version: no version tag and no structural markers".to_string())
}

pub fn applicability_v1_to_v2(value: ApplicabilityV1) -> Applicability {
    match value {
        ApplicabilityV1::Direct | ApplicabilityV1::Unmapped => Applicability::Yes,
        ApplicabilityV1::Partial => Applicability::Partial,
        ApplicabilityV1::NotApplicable | ApplicabilityV1::RustPrevents => Applicability::No,
    }
}

pub fn applicability_v2_to_v1(value: Applicability) -> ApplicabilityV1 {
    match value {
        Applicability::Yes => ApplicabilityV1::Direct,
        Applicability::Partial => ApplicabilityV1::Partial,
        Applicability::No => ApplicabilityV1::NotApplicable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lattice_is_totally_ordered_in_declaration_order() {
        let mut sorted = SchemaVersion::ALL;
        sorted.sort();
        assert_eq!(sorted, SchemaVersion::ALL);
        assert!(SchemaVersion::V1_2 < SchemaVersion::V2_0);
        assert!(SchemaVersion::V3_2 < SchemaVersion::V4_0);
    }

    #[test]
    fn next_toward_walks_minor_then_crosses_family() {
        assert_eq!(
            SchemaVersion::V1_0.next_toward(SchemaVersion::V1_2),
            Some(SchemaVersion::V1_1)
        );
        assert_eq!(
            SchemaVersion::V1_1.next_toward(SchemaVersion::V2_0),
            Some(SchemaVersion::V2_1)
        );
        assert_eq!(
            SchemaVersion::V2_2.next_toward(SchemaVersion::V4_0),
            Some(SchemaVersion::V3_0)
        );
        assert_eq!(
            SchemaVersion::V3_1.next_toward(SchemaVersion::V4_0),
            Some(SchemaVersion::V4_0)
        );
        assert_eq!(SchemaVersion::V4_0.next_toward(SchemaVersion::V4_0), None);
        assert_eq!(SchemaVersion::V3_0.next_toward(SchemaVersion::V2_0), None);
    }

    #[test]
    fn every_path_is_forward_only() {
        for from in SchemaVersion::ALL {
            for to in SchemaVersion::ALL {
                let mut v = from;
                while let Some(next) = v.next_toward(to) {
                    assert!(next > v, "{} -> {} went backwards", v, next);
                    v = next;
                }
                assert!(v >= from);
                if from < to {
                    assert!(v >= to, "{} never reached {}", from, to);
                }
            }
        }
    }

    #[test]
    fn detects_declared_and_structural_versions() {
        assert_eq!(
            detect_version(&json!({"schema_version": "2.1"})),
            Ok(SchemaVersion::V2_1)
        );
        assert_eq!(
            detect_version(&json!({"all_rust": {}, "safe_rust": {}})),
            Ok(SchemaVersion::V2_0)
        );
        assert_eq!(
            detect_version(&json!({"all_rust": {"verified_date": "2025-01-02"}, "safe_rust": {}})),
            Ok(SchemaVersion::V3_0)
        );
        assert_eq!(
            detect_version(&json!({"applicability": "direct"})),
            Ok(SchemaVersion::V1_0)
        );
        assert!(detect_version(&json!({"schema_version": "9.9"})).is_err());
        assert!(detect_version(&json!({"guideline_id": "Rule 1.1"})).is_err());
    }

    #[test]
    fn rust_prevents_is_lost_on_round_trip() {
        let there = applicability_v1_to_v2(ApplicabilityV1::RustPrevents);
        assert_eq!(there, Applicability::No);
        assert_eq!(applicability_v2_to_v1(there), ApplicabilityV1::NotApplicable);
        assert_eq!(
            applicability_v2_to_v1(applicability_v1_to_v2(ApplicabilityV1::Direct)),
            ApplicabilityV1::Direct
        );
    }
}
