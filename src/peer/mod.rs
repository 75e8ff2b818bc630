pub mod connection;
pub mod coordinator;
pub mod ice;
pub mod state;
pub mod transport;
pub mod types;

pub use connection::RtcTransport;
pub use coordinator::NegotiationCoordinator;
pub use ice::CandidateQueue;
pub use state::{Handled, IgnoreReason, NegotiationState, Phase, Role, GRACE_PERIOD};
pub use transport::{MediaState, PeerTransport, TransportEvent};
pub use types::{IceCandidate, SdpKind, ServerConfig, SessionDescription};
