use serde::{Deserialize, Serialize};

/// Ambient execution-tuning knobs carried over from the original
/// distillation's `execution` config section even though no tool in the
/// current tool surface consumes `max_review_iterations` yet — it costs
/// nothing to keep and a future review-loop tool can read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "d_3")]
    pub max_review_iterations: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_review_iterations: 3,
        }
    }
}

fn d_3() -> u32 {
    3
}
