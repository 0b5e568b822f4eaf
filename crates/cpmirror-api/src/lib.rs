// cpmirror-api: Async Rust client for the Check Point Management web API

pub mod client;
pub mod command;
pub mod error;
pub mod session;
pub mod transport;

pub use client::{ApiCall, ManagementClient, SESSION_HEADER};
pub use command::{ApiCommand, PolicyAction};
pub use error::Error;
pub use session::LoginInfo;
pub use transport::{TlsMode, TransportConfig};
