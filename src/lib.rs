pub mod capture;
pub mod compose;
pub mod config;
pub mod error;
pub mod events;
pub mod logger;
pub mod peer;
pub mod replay;
pub mod session;
pub mod signaling;
pub mod utils;

pub use config::Config;
pub use error::CallError;
pub use events::{AppEvent, EventEmitter};
pub use session::{CallHandle, CallSession, Session};
