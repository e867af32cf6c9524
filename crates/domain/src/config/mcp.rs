//! Config surface for the tool-invocation transport that fronts the fabric.
//!
//! The transport itself (the MCP-style JSON-RPC server) is out of scope
//! here; only the enable/disable flags and semantic-verb synonym table it
//! reads from the config file are modeled, since those are config-store
//! concerns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpConfig {
    /// Tool name → enabled. A tool absent from this map is enabled by
    /// default (matching `is_mcp_tool_enabled(name, default=True)`).
    #[serde(default)]
    pub tools: HashMap<String, bool>,
}

impl McpConfig {
    pub fn is_tool_enabled(&self, name: &str) -> bool {
        self.tools.get(name).copied().unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tool_defaults_enabled() {
        let cfg = McpConfig::default();
        assert!(cfg.is_tool_enabled("compare_models"));
    }

    #[test]
    fn explicit_disable_respected() {
        let mut cfg = McpConfig::default();
        cfg.tools.insert("compare_models".into(), false);
        assert!(!cfg.is_tool_enabled("compare_models"));
    }
}
