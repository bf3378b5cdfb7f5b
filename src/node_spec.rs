//! Node-spec decoding (`#PBS -l nodes=...`)
//!
//! The scheduler records resource requests like `2:ppn=20:haswell`. The fields
//! after the node count come in any order, so decoding scans every part for
//! the core count and the hardware tag.

use crate::error::{Result, StatError};
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Maximum number of `:`-separated fields a node spec may carry
const MAX_PARTS: usize = 3;

/// Hardware tag spelled as the scheduler records it (sic)
const IVYBRIDGE_TAG: &str = "ivybrdige";
const HASWELL_TAG: &str = "haswell";

/// Hardware class a job asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Machine {
    Ivybridge,
    Haswell,
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Machine::Ivybridge => f.write_str("ivybridge"),
            Machine::Haswell => f.write_str("haswell"),
        }
    }
}

/// Quantities derived from a raw node spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeSpec {
    pub cores_per_node: u32,
    pub machine: Option<Machine>,
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            cores_per_node: 1,
            machine: None,
        }
    }
}

impl NodeSpec {
    /// Decode a raw node spec
    ///
    /// Absent specs and specs without a `:` yield the defaults (1 core, no
    /// machine), the latter with a warning. Specs with more than three fields fail with `MalformedSpec`.
    ///
    /// # Example
    /// ```
    /// use modstat::node_spec::{Machine, NodeSpec};
    ///
    /// let spec = NodeSpec::decode(Some("1:haswell:ppn=24")).unwrap();
    /// assert_eq!(spec.cores_per_node, 24);
    /// assert_eq!(spec.machine, Some(Machine::Haswell));
    /// ```
    pub fn decode(raw: Option<&str>) -> Result<Self> {
        let raw = match raw {
            Some(raw) => raw,
            None => return Ok(Self::default()),
        };

        let parts: Vec<&str> = raw.split(':').collect();
        match parts.len() {
            1 => {
                warn!(nodes = raw, "node spec has a single field");
                Ok(Self::default())
            }
            2..=MAX_PARTS => Ok(Self::scan_parts(raw, &parts)),
            n => {
                warn!(nodes = raw, parts = n, "node spec has too many fields");
                Err(StatError::MalformedSpec {
                    spec: raw.to_string(),
                    parts: n,
                })
            }
        }
    }

    fn scan_parts(raw: &str, parts: &[&str]) -> Self {
        let mut spec = Self::default();
        for part in parts {
            match *part {
                HASWELL_TAG => spec.machine = Some(Machine::Haswell),
                IVYBRIDGE_TAG => spec.machine = Some(Machine::Ivybridge),
                p if p.starts_with("ppn") => {
                    // ppn=20: the count starts after the separator
                    let count: String = p.chars().skip(4).collect();
                    match count.parse::<u32>() {
                        Ok(cores) => spec.cores_per_node = cores,
                        Err(_) => warn!(nodes = raw, part = p, "unparsable ppn field"),
                    }
                }
                _ => {}
            }
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_spec_defaults() {
        assert_eq!(NodeSpec::decode(None).unwrap(), NodeSpec::default());
    }

    #[test]
    fn test_spec_without_separator_defaults() {
        let spec = NodeSpec::decode(Some("4")).unwrap();
        assert_eq!(spec.cores_per_node, 1);
        assert_eq!(spec.machine, None);
    }

    #[test]
    fn test_two_fields() {
        let spec = NodeSpec::decode(Some("1:ppn=20")).unwrap();
        assert_eq!(spec.cores_per_node, 20);
        assert_eq!(spec.machine, None);
    }

    #[test]
    fn test_three_fields_any_order() {
        let a = NodeSpec::decode(Some("2:ppn=24:haswell")).unwrap();
        let b = NodeSpec::decode(Some("haswell:2:ppn=24")).unwrap();
        let c = NodeSpec::decode(Some("ppn=24:haswell:2")).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.cores_per_node, 24);
        assert_eq!(a.machine, Some(Machine::Haswell));
    }

    #[test]
    fn test_ivybridge_matches_recorded_spelling() {
        let spec = NodeSpec::decode(Some("1:ppn=20:ivybrdige")).unwrap();
        assert_eq!(spec.machine, Some(Machine::Ivybridge));
    }

    #[test]
    fn test_corrected_spelling_is_not_a_tag() {
        let spec = NodeSpec::decode(Some("1:ppn=20:ivybridge")).unwrap();
        assert_eq!(spec.machine, None);
        assert_eq!(spec.cores_per_node, 20);
    }

    #[test]
    fn test_four_fields_malformed() {
        let err = NodeSpec::decode(Some("1:ppn=20:haswell:extra")).unwrap_err();
        assert!(matches!(err, StatError::MalformedSpec { parts: 4, .. }));
    }

    #[test]
    fn test_unparsable_ppn_keeps_default() {
        let spec = NodeSpec::decode(Some("1:ppn=lots")).unwrap();
        assert_eq!(spec.cores_per_node, 1);
    }

    #[test]
    fn test_short_ppn_keeps_default() {
        let spec = NodeSpec::decode(Some("1:ppn")).unwrap();
        assert_eq!(spec.cores_per_node, 1);
    }

    #[test]
    fn test_machine_display() {
        assert_eq!(Machine::Ivybridge.to_string(), "ivybridge");
        assert_eq!(Machine::Haswell.to_string(), "haswell");
    }
}
