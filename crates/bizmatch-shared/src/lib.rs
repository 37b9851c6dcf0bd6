//! # bizmatch-shared
//!
//! Types shared by the store and the client: identifiers, stored enums,
//! constants, error types, and the pure connection / visibility policy.

pub mod constants;
pub mod error;
pub mod format;
pub mod policy;
pub mod types;
pub mod visibility;

pub use error::{PolicyError, SelfAction, ValidationError};
pub use policy::{BlockFact, ConnectionFact, Pair, PairState};
pub use types::*;
