//! # Session layer for MCP servers
//!
//! Three pieces live here:
//!
//! - [`SessionStore`], the storage trait for per-client state (lifecycle
//!   flags, negotiated version, subscriptions, requested log level, and the
//!   FIFO queue of outbound frames), with [`InMemorySessionStore`] as the
//!   bundled backend. The store also maintains the global reverse index
//!   `uri -> subscriber session ids` as a pure projection of the per-session
//!   subscription sets.
//! - [`SessionManager`], the behavior on top of the store: session creation,
//!   wake channels transports listen on, broadcast and targeted notification
//!   fan-out, and the TTL garbage collector.
//! - [`Transport`], the narrow contract the server's run loop consumes:
//!   `receive` inbound frames, `send` outbound ones, open/close/list
//!   sessions. The stdio and HTTP+SSE adapters implement it.

pub mod in_memory;
pub mod manager;
pub mod traits;
pub mod transport;

pub use in_memory::InMemorySessionStore;
pub use manager::SessionManager;
pub use traits::{Session, SessionStore, SessionStoreError};
pub use transport::Transport;

/// Boxed store trait object, the form servers and transports pass around.
pub type BoxedSessionStore = dyn SessionStore;
