pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod trace;

pub use error::{Error, Result};
pub use message::{Message, Role};
pub use session::{Gist, Session, SessionMetadata, TokenStats};
pub use trace::TraceEvent;
