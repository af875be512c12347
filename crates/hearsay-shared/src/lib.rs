//! Shared wire protocol and core types for Hearsay.
//!
//! Everything the server, client and store agree on lives here: id
//! newtypes, the JSON socket event enums, and the handful of protocol
//! constants (deletion sentinel included).

pub mod constants;
pub mod protocol;
pub mod types;
