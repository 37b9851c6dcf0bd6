//! Domain operations exposed to the UI layer.
//!
//! Each sub-module groups related commands by domain. Every command takes
//! the shared [`AppState`](crate::state::AppState), consults the policy in
//! `bizmatch-shared` before writing, and returns
//! [`Result`](crate::error::Result).

pub mod connections;
pub mod favorites;
pub mod messaging;
pub mod notifications;
pub mod opportunities;
pub mod profile;
pub mod requirements;
pub mod settings;
