//! Event types broadcast by the speech engines.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them to a UI layer verbatim (JSON over a socket, a webview bridge,
//! or a log line).

pub mod events;
