//! Core definitions (error type, result alias, interrupt flag), relied upon by
//! all concord-* crates.

pub mod abort;
pub mod error;
pub mod result;

pub use abort::AbortFlag;
pub use result::Result;
