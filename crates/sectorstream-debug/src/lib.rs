//! Debug tools for sectorstream - TCP debug server for inspecting a running loader
//!
//! Start the debug server from inside a tokio runtime:
//! ```ignore
//! let handler = Arc::new(Mutex::new(loader));
//! let _server = DebugServer::start(handler, DEFAULT_PORT);
//! ```
//!
//! Each request is one line of JSON, e.g. `{"cmd":"GetSectorInfo","params":{"name":"hall"}}`,
//! answered by one line of JSON.

pub mod protocol;
pub mod server;

pub use protocol::*;
pub use server::{DebugError, DebugHandler, DebugServer};

/// Default debug server port
pub const DEFAULT_PORT: u16 = 9743;
