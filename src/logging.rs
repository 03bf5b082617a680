//! Logging setup for xload.
//!
//! Uses the `tracing` ecosystem. The CLI's `-v`/`-q` flags pick a level;
//! an explicit `RUST_LOG` always wins so operators can scope filtering to
//! individual modules.

use tracing_subscriber::EnvFilter;

/// Verbosity selected by the CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Errors only.
    Quiet,
    /// Errors, warnings, and progress info.
    Normal,
    /// Everything down to debug.
    Verbose,
}

impl LogLevel {
    /// Select a level from the two CLI flags; verbose wins over quiet.
    #[must_use]
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Self::Verbose,
            (false, true) => Self::Quiet,
            (false, false) => Self::Normal,
        }
    }

    const fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "xload=error",
            Self::Normal => "xload=info",
            Self::Verbose => "xload=debug",
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Safe to call once; later calls are ignored.
pub fn init(level: LogLevel) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level.directive())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::LogLevel;

    #[test]
    fn verbose_wins_over_quiet() {
        assert_eq!(LogLevel::from_flags(true, true), LogLevel::Verbose);
        assert_eq!(LogLevel::from_flags(false, true), LogLevel::Quiet);
        assert_eq!(LogLevel::from_flags(false, false), LogLevel::Normal);
    }
}
