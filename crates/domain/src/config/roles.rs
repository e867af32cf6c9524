use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A role's chain accepts either a flat list of model ids or a structured
/// record with a `chain` field; this normalizes both on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleChain {
    Flat(Vec<String>),
    Structured { chain: Vec<String> },
}

impl RoleChain {
    pub fn models(&self) -> &[String] {
        match self {
            RoleChain::Flat(v) => v,
            RoleChain::Structured { chain } => chain,
        }
    }
}

pub type RolesConfig = HashMap<String, RoleChain>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_list_normalizes() {
        let yaml = "[m1, m2]";
        let chain: RoleChain = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(chain.models(), &["m1".to_string(), "m2".to_string()]);
    }

    #[test]
    fn structured_record_normalizes() {
        let yaml = "chain: [m1, m2]";
        let chain: RoleChain = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(chain.models(), &["m1".to_string(), "m2".to_string()]);
    }
}
