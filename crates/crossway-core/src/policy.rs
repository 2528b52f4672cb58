//! Adaptive signal timing policy
//!
//! All values are non-negative simulated seconds (or counts). A policy is
//! always replaced as a whole; readers hold an `Arc<Policy>` snapshot.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub min_green: u32,
    #[serde(default)]
    pub max_green: u32,
    #[serde(default)]
    pub quota: u32,
    #[serde(default)]
    pub yellow: u32,
    #[serde(default)]
    pub clearance: u32,
    #[serde(default)]
    pub queue_threshold: u32,
    #[serde(default)]
    pub max_extensions: u32,
}

impl Policy {
    /// Hybrid fixed/actuated timing used when no policy file is configured
    pub fn hybrid() -> Self {
        Policy {
            min_green: 5,
            max_green: 20,
            quota: 4,
            yellow: 2,
            clearance: 1,
            queue_threshold: 3,
            max_extensions: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_field_names() {
        let json = r#"{"min_green":5,"max_green":20,"quota":4,"yellow":2,"clearance":1,"queue_threshold":3,"max_extensions":5}"#;
        let policy: Policy = serde_json::from_str(json).unwrap();
        assert_eq!(policy, Policy::hybrid());
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let policy: Policy = serde_json::from_str(r#"{"min_green":7}"#).unwrap();
        assert_eq!(policy.min_green, 7);
        assert_eq!(policy.max_extensions, 0);
    }
}
