//! Multi-turn session state for AuraRouter: history, shared gist context,
//! pressure-triggered condensation, and persistence.

pub mod gisting;
pub mod manager;
pub mod store;

pub use gisting::{
    build_condensation_prompt, build_fallback_gist_prompt, extract_gist, inject_gist_instruction,
    GIST_INSTRUCTION, GIST_MARKER,
};
pub use manager::{GenerateFn, SessionManager};
pub use store::{SessionStore, SessionSummary};
