//! Logging setup for sfu-link binaries.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the default filter directive used when `RUST_LOG` is not set.
///
/// Both the binary itself and the library crates it is built from log at
/// `default_log_level`; everything else stays at `warn`.
pub fn default_directive(binary_name: &str, crates: &[&str], default_log_level: &str) -> String {
    let mut targets = vec![binary_name.replace('-', "_")];
    for krate in crates {
        let target = krate.replace('-', "_");
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    let mut directive = String::from("warn");
    for target in targets {
        directive.push_str(&format!(",{}={}", target, default_log_level));
    }
    directive
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "sfu-link-client")
/// * `crates` - Library crates whose logs should follow the default level
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use sfu_link_shared::logger::setup_logger;
///
/// setup_logger("sfu-link-client", &["sfu-link-client"], "info");
/// ```
pub fn setup_logger(binary_name: &str, crates: &[&str], default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(binary_name, crates, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
