//! Wire types for remote script debugging.
//!
//! This crate contains the serde-serializable shapes exchanged with a
//! debuggable server:
//!
//! - [`target`]: the JSON document served by the discovery endpoint and the
//!   policy used to pick one debuggable target out of it
//! - [`inspector`]: Inspector Protocol frames sent over the WebSocket once the
//!   upgrade completes, and the closed set of events the client reacts to
//!
//! Types here are pure data. Connection management lives in `ytdebug-runtime`.

pub mod inspector;
pub mod target;

pub use inspector::*;
pub use target::*;
