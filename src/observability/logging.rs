//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at `log_level` and
/// `tower_http` at `info`. Calling this twice is harmless.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(log_level)))
        .unwrap_or_else(|_| EnvFilter::new(default_directives("info")));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn default_directives(log_level: &str) -> String {
    format!("serve_engine={log_level},tower_http=info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives("debug"), "serve_engine=debug,tower_http=info");
        assert!(EnvFilter::try_new(default_directives("warn")).is_ok());
    }
}
