//! Optional execution tracing.
//!
//! Build with `--features profiling` and pass `--trace <path>` to the runner
//! to get a Chrome trace of every tick, openable in `chrome://tracing` or
//! <https://ui.perfetto.dev>.

pub mod profiler;
