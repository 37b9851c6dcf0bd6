//! Client side of the B2B matchmaking app.
//!
//! Commands in [`commands`] enforce the connection, visibility and blocking
//! policy from `bizmatch-shared` before they touch a [`Backend`]. Every
//! backend call goes through [`RetryingBackend`], which retries transient
//! failures and turns an expired session into a sign-out.

pub mod backend;
pub mod commands;
pub mod config;
pub mod error;
pub mod inflight;
pub mod live;
pub mod local;
pub mod retry;
pub mod scope;
pub mod session;
pub mod state;

use tracing_subscriber::{fmt, EnvFilter};

pub use backend::{Backend, ChangeEvent, ChangeFilter, ChangeKind, Subscription, Table};
pub use config::ClientConfig;
pub use error::{BackendError, ClientError, Result};
pub use live::{ListState, LiveList};
pub use local::{LocalBackend, LocalServer};
pub use retry::{RetryPolicy, RetryingBackend};
pub use session::{SessionContext, SessionState};
pub use state::AppState;

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
/// Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bizmatch_client=debug,bizmatch_store=info,warn"));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("BizMatch client starting");
    }
}
