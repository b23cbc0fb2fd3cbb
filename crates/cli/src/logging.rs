use std::io;

use anyhow::Result;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

/// Install the stderr subscriber. `RUST_LOG` refines the directive; calling
/// this more than once keeps the first subscriber.
pub fn init_tracing(filter: Option<&str>) -> Result<()> {
    let directive: Directive = filter.unwrap_or(DEFAULT_FILTER).parse()?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_repeatable() {
        init_tracing(Some("debug")).unwrap();
        init_tracing(None).unwrap();
    }

    #[test]
    fn rejects_malformed_directive() {
        assert!(init_tracing(Some("hwt_core=loud")).is_err());
    }
}
