//! Tracing subscriber setup for the command line tool

use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter directives for a verbosity level. `RUST_LOG` wins when set.
pub fn filter_directives(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "trainkit=info,warn",
        1 => "trainkit=debug,info",
        2 => "trainkit=trace,debug",
        _ => "trace",
    }
}

pub fn init_logging(verbosity: u8, quiet: bool, json_output: bool) -> Result<()> {
    let env_filter = if quiet {
        EnvFilter::new(filter_directives(verbosity, quiet))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter_directives(verbosity, quiet)))
    };

    if json_output {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(io::stderr)
            .with_filter(env_filter);

        tracing_subscriber::registry()
            .with(json_layer)
            .try_init()
            .context("Failed to install JSON log subscriber")?;
    } else if io::stderr().is_terminal() {
        let fmt_layer = fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_ansi(true)
            .with_writer(io::stderr)
            .with_filter(env_filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .context("Failed to install log subscriber")?;
    } else {
        // Plain output for pipes and files
        let fmt_layer = fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .without_time()
            .with_writer(io::stderr)
            .with_filter(env_filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .context("Failed to install log subscriber")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, false, "trainkit=info,warn")]
    #[test_case(1, false, "trainkit=debug,info")]
    #[test_case(5, false, "trace")]
    #[test_case(2, true, "error")]
    fn test_filter_directives(verbosity: u8, quiet: bool, expected: &str) {
        assert_eq!(filter_directives(verbosity, quiet), expected);
    }
}
