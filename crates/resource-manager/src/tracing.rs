//! # Observability & Tracing
//!
//! Every action invocation runs inside an `action` span carrying the manager
//! name, the entity type and the action, so one request reads as one block of
//! log lines:
//!
//! ```text
//! INFO action{manager=ProductManager entity=Product action=create}: Completed state=Committed written=true
//! WARN action{manager=ProductManager entity=Product action=read}: Denied error=Not authorized to read Product: guests may only list
//! ```
//!
//! Stage transitions log at `debug`, individual backend calls of the
//! in-memory backend at `debug`/`trace`.
//!
//! ```bash
//! RUST_LOG=info cargo run -p manager-sample
//! RUST_LOG=resource_manager=debug cargo run -p manager-sample
//! ```

/// Installs a compact `tracing-subscriber` filtered by `RUST_LOG`.
///
/// Call once at startup; a second call panics because a global subscriber is
/// already set. Use [`try_setup_tracing`] where that can happen (tests).
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}

/// Like [`setup_tracing`], but a no-op when a subscriber is already installed.
pub fn try_setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
