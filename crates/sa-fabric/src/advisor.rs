//! Optional external hooks that may reorder a role's chain before the
//! fabric walks it.
//!
//! Narrowed from `crates/mcp-client`'s tool-call contract
//! (`McpServer::call_tool(name, arguments) -> Result<ToolCallResult>`) down
//! to the single `chain_reorder` capability this router needs: an advisor is
//! anything exposing `connected`/`capabilities`/`call_tool`, consulted in
//! insertion order, first well-formed non-empty response wins.

use async_trait::async_trait;
use sa_domain::Result;
use serde_json::{json, Value};

#[async_trait]
pub trait Advisor: Send + Sync {
    fn connected(&self) -> bool;
    fn capabilities(&self) -> &[String];
    async fn call_tool(&self, name: &str, args: Value) -> Result<Value>;
}

#[derive(Default)]
pub struct AdvisorRegistry {
    advisors: Vec<Box<dyn Advisor>>,
}

impl AdvisorRegistry {
    pub fn new() -> Self {
        Self { advisors: Vec::new() }
    }

    pub fn register(&mut self, advisor: Box<dyn Advisor>) {
        self.advisors.push(advisor);
    }

    pub fn is_empty(&self) -> bool {
        self.advisors.is_empty()
    }

    /// Consults every connected advisor whose capabilities include
    /// `chain_reorder`, in insertion order. Accepts the first well-formed
    /// non-empty `{chain: [...]}` response; falls back to `chain` unchanged
    /// on any error, malformed response, or if no advisor reorders it.
    pub async fn reorder(&self, role: &str, chain: Vec<String>) -> Vec<String> {
        for advisor in &self.advisors {
            if !advisor.connected() || !advisor.capabilities().iter().any(|c| c == "chain_reorder") {
                continue;
            }
            let args = json!({ "role": role, "chain": chain });
            let result = match advisor.call_tool("chain_reorder", args).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(role, error = %e, "advisor chain_reorder call failed, keeping original chain");
                    continue;
                }
            };
            if let Some(reordered) = result.get("chain").and_then(|c| c.as_array()) {
                let reordered: Vec<String> = reordered
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                if !reordered.is_empty() {
                    return reordered;
                }
            }
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubAdvisor {
        connected: bool,
        capabilities: Vec<String>,
        response: Result<Value>,
    }

    #[async_trait]
    impl Advisor for StubAdvisor {
        fn connected(&self) -> bool {
            self.connected
        }

        fn capabilities(&self) -> &[String] {
            &self.capabilities
        }

        async fn call_tool(&self, _name: &str, _args: Value) -> Result<Value> {
            match &self.response {
                Ok(v) => Ok(v.clone()),
                Err(e) => Err(sa_domain::Error::Other(e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn keeps_original_chain_when_no_advisors() {
        let registry = AdvisorRegistry::new();
        let chain = vec!["m1".to_string(), "m2".to_string()];
        assert_eq!(registry.reorder("coding", chain.clone()).await, chain);
    }

    #[tokio::test]
    async fn skips_disconnected_and_non_reordering_advisors() {
        let mut registry = AdvisorRegistry::new();
        registry.register(Box::new(StubAdvisor {
            connected: false,
            capabilities: vec!["chain_reorder".into()],
            response: Ok(json!({"chain": ["m2", "m1"]})),
        }));
        registry.register(Box::new(StubAdvisor {
            connected: true,
            capabilities: vec!["other".into()],
            response: Ok(json!({"chain": ["m2", "m1"]})),
        }));
        let chain = vec!["m1".to_string(), "m2".to_string()];
        assert_eq!(registry.reorder("coding", chain.clone()).await, chain);
    }

    #[tokio::test]
    async fn accepts_first_well_formed_response() {
        let mut registry = AdvisorRegistry::new();
        registry.register(Box::new(StubAdvisor {
            connected: true,
            capabilities: vec!["chain_reorder".into()],
            response: Ok(json!({"chain": ["m2", "m1"]})),
        }));
        let chain = vec!["m1".to_string(), "m2".to_string()];
        let reordered = registry.reorder("coding", chain).await;
        assert_eq!(reordered, vec!["m2".to_string(), "m1".to_string()]);
    }

    #[tokio::test]
    async fn falls_back_on_error() {
        let mut registry = AdvisorRegistry::new();
        registry.register(Box::new(StubAdvisor {
            connected: true,
            capabilities: vec!["chain_reorder".into()],
            response: Err(sa_domain::Error::Other("down".into())),
        }));
        let chain = vec!["m1".to_string(), "m2".to_string()];
        assert_eq!(registry.reorder("coding", chain.clone()).await, chain);
    }
}
