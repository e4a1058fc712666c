//! Tracing bootstrap for host applications.

/// Install a default env-filtered fmt subscriber unless the host application
/// already set one up.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
