//! Chrome trace recording of scheduler activity.
//!
//! Every span belongs to a [`Scope`] that becomes the event category, so a
//! trace viewer can filter ticks, phases, stages, barriers and systems
//! independently. Without the `profiling` feature every call is a no-op and
//! [`SpanGuard`] is a zero-sized type.

use std::path::Path;

/// Scheduler level a span belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One scheduler tick.
    Tick,
    /// One phase of a tick.
    Phase,
    /// A batch of systems run together.
    Stage,
    /// A single system.
    System,
    /// Command playback at a barrier.
    Barrier,
}

impl Scope {
    /// Category string written to the trace.
    pub fn category(self) -> &'static str {
        match self {
            Scope::Tick => "tick",
            Scope::Phase => "phase",
            Scope::Stage => "stage",
            Scope::System => "system",
            Scope::Barrier => "barrier",
        }
    }
}

#[cfg(feature = "profiling")]
mod recorder {
    use std::fs::File;
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::OnceLock;
    use std::time::Instant;

    use parking_lot::Mutex;
    use serde::Serialize;

    use super::Scope;

    #[derive(Debug, Serialize)]
    struct Span {
        name: &'static str,
        cat: &'static str,
        ph: &'static str,
        ts: u64,
        dur: u64,
        pid: u32,
        tid: u64,
        #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "as_map")]
        args: Vec<(&'static str, u64)>,
    }

    fn as_map<S: serde::Serializer>(args: &[(&'static str, u64)], s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(args.iter().copied())
    }

    #[derive(Serialize)]
    struct Trace<'a> {
        #[serde(rename = "traceEvents")]
        events: &'a [Span],
        #[serde(rename = "displayTimeUnit")]
        unit: &'static str,
    }

    struct Recorder {
        origin: Instant,
        path: PathBuf,
        recording: AtomicBool,
        spans: Mutex<Vec<Span>>,
    }

    static RECORDER: OnceLock<Recorder> = OnceLock::new();
    static NEXT_THREAD: AtomicU64 = AtomicU64::new(1);

    thread_local! {
        static THREAD: u64 = NEXT_THREAD.fetch_add(1, Ordering::Relaxed);
    }

    fn recorder() -> Option<&'static Recorder> {
        RECORDER.get().filter(|r| r.recording.load(Ordering::Acquire))
    }

    fn micros(recorder: &Recorder) -> u64 {
        recorder.origin.elapsed().as_micros() as u64
    }

    pub fn init(path: &Path) {
        let fresh = Recorder {
            origin: Instant::now(),
            path: path.to_path_buf(),
            recording: AtomicBool::new(true),
            spans: Mutex::new(Vec::new()),
        };
        if RECORDER.set(fresh).is_err() {
            log::warn!("profiler already initialised; keeping the first output path");
        }
    }

    pub fn shutdown() {
        let Some(recorder) = RECORDER.get() else { return };
        recorder.recording.store(false, Ordering::Release);
        let spans = std::mem::take(&mut *recorder.spans.lock());
        match write(&recorder.path, &spans) {
            Ok(()) => log::info!("wrote {} spans to {}", spans.len(), recorder.path.display()),
            Err(e) => log::error!("could not write trace {}: {e}", recorder.path.display()),
        }
    }

    fn write(path: &Path, spans: &[Span]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut out, &Trace { events: spans, unit: "ms" })?;
        out.flush()
    }

    /// Open span; records a complete event when dropped.
    pub struct SpanGuard {
        open: Option<(&'static Recorder, u64)>,
        scope: Scope,
        name: &'static str,
        args: Vec<(&'static str, u64)>,
    }

    pub fn span(scope: Scope, name: &'static str) -> SpanGuard {
        let open = recorder().map(|r| (r, micros(r)));
        SpanGuard { open, scope, name, args: Vec::new() }
    }

    impl SpanGuard {
        /// Attaches a numeric argument to the span.
        pub fn arg(mut self, key: &'static str, value: u64) -> Self {
            if self.open.is_some() {
                self.args.push((key, value));
            }
            self
        }
    }

    impl Drop for SpanGuard {
        fn drop(&mut self) {
            let Some((recorder, start)) = self.open else { return };
            if !recorder.recording.load(Ordering::Acquire) {
                return;
            }
            let span = Span {
                name: self.name,
                cat: self.scope.category(),
                ph: "X",
                ts: start,
                dur: micros(recorder).saturating_sub(start),
                pid: 1,
                tid: THREAD.with(|t| *t),
                args: std::mem::take(&mut self.args),
            };
            recorder.spans.lock().push(span);
        }
    }
}

#[cfg(not(feature = "profiling"))]
mod recorder {
    use std::path::Path;

    use super::Scope;

    #[inline]
    pub fn init(_path: &Path) {}

    #[inline]
    pub fn shutdown() {}

    /// No-op span.
    pub struct SpanGuard;

    #[inline]
    pub fn span(_scope: Scope, _name: &'static str) -> SpanGuard {
        SpanGuard
    }

    impl SpanGuard {
        /// Ignored.
        #[inline]
        pub fn arg(self, _key: &'static str, _value: u64) -> Self {
            self
        }
    }
}

pub use recorder::SpanGuard;

/// Starts recording; spans are written to `path` by [`shutdown`].
pub fn init(path: impl AsRef<Path>) {
    recorder::init(path.as_ref());
}

/// Stops recording and writes the trace file.
pub fn shutdown() {
    recorder::shutdown();
}

/// Opens a span named `name` in `scope`.
#[inline]
pub fn span(scope: Scope, name: &'static str) -> SpanGuard {
    recorder::span(scope, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_distinct() {
        let scopes = [Scope::Tick, Scope::Phase, Scope::Stage, Scope::System, Scope::Barrier];
        let mut names: Vec<_> = scopes.iter().map(|s| s.category()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), scopes.len());
    }

    #[test]
    fn spans_are_inert_before_init() {
        let guard = span(Scope::System, "idle").arg("rows", 3);
        drop(guard);
    }
}
