//! Structured logging setup, shared by the server binary and the CLI
//! utilities. Re-exports the `slog` macros so callers don't need a direct
//! dependency on `slog` themselves.

pub use slog::{debug, error, info, o, trace, warn, Logger};

use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

/// Builds the root logger. `verbose` maps to `trace` level, otherwise the
/// server logs at `info`.
pub fn init(verbose: bool) -> Logger {
    let mut builder = TerminalLoggerBuilder::new();
    builder.destination(Destination::Stderr);
    builder.level(if verbose { Severity::Trace } else { Severity::Info });

    builder.build().expect("failed building logger")
}
