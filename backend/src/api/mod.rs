//! HTTP API module.
//!
//! The server, its request/response types, the HTML report page and the
//! run log stream.

pub mod html;
pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AppState};
pub use types::*;
