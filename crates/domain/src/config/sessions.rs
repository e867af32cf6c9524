use serde::{Deserialize, Serialize};

/// Controls multi-turn session behavior: condensation trigger and
/// auto-gisting. Narrower than a full multi-channel identity model since
/// the fabric's sessions are keyed purely by UUID, not by inbound channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// `pressure >= threshold` triggers condensation.
    #[serde(default = "d_08")]
    pub condensation_threshold: f64,
    /// Inject the gist-marker instruction on the final user turn and extract
    /// `---GIST---` summaries from assistant responses.
    #[serde(default = "d_true")]
    pub auto_gist: bool,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            condensation_threshold: 0.8,
            auto_gist: true,
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_08() -> f64 {
    0.8
}
