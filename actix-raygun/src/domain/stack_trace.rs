//! Stack trace capture for crash reports.
//!
//! Frames are ordered most recent first. Frames belonging to the stack walker
//! itself are never recorded. Callers drop their own frames with
//! [`StackTrace::trim_through_module`] or [`StackTrace::skip_frames`], and
//! panic traces lose the unwinding machinery with
//! [`StackTrace::trim_runtime_frames`], so a trace starts where the failure
//! happened.

use std::fmt;

/// Symbol prefixes of frames the panic runtime pushes between a `panic!` call
/// site and the installed panic hook.
const PANIC_RUNTIME_PREFIXES: &[&str] = &[
    "std::panicking::",
    "core::panicking::",
    "std::panic::panic_any",
    "std::rt::",
    "std::sys::backtrace::__rust_end_short_backtrace",
    "std::sys_common::backtrace::__rust_end_short_backtrace",
    "rust_begin_unwind",
    "__rustc::rust_begin_unwind",
];

/// Symbol prefixes of frames that catch an unwind. Nothing below the first of
/// these belongs to the panic runtime.
const UNWIND_CATCH_PREFIXES: &[&str] = &[
    "std::panicking::try",
    "std::panicking::catch_unwind",
    "std::panic::catch_unwind",
    "__rust_try",
];

/// One resolved frame of a [`StackTrace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Source line, when debug information is available.
    pub line_number: Option<u32>,
    /// Module path owning the function, e.g. `my_app::handlers`.
    pub class_name: String,
    /// Source file, when debug information is available.
    pub file_name: Option<String>,
    /// Function name without its module path.
    pub method_name: String,
}

impl StackFrame {
    /// Split a demangled symbol into module path and function name.
    ///
    /// # Examples
    /// ```
    /// use actix_raygun::domain::StackFrame;
    ///
    /// let frame = StackFrame::from_symbol("my_app::handlers::index", None, Some(12));
    /// assert_eq!(frame.class_name, "my_app::handlers");
    /// assert_eq!(frame.method_name, "index");
    /// ```
    pub fn from_symbol(symbol: &str, file_name: Option<String>, line_number: Option<u32>) -> Self {
        let (class_name, method_name) = symbol.rsplit_once("::").unwrap_or(("", symbol));
        Self {
            line_number,
            class_name: class_name.to_owned(),
            file_name,
            method_name: method_name.to_owned(),
        }
    }

    fn symbol(&self) -> String {
        if self.class_name.is_empty() {
            self.method_name.clone()
        } else {
            format!("{}::{}", self.class_name, self.method_name)
        }
    }

    fn symbol_starts_with(&self, prefixes: &[&str]) -> bool {
        let symbol = self.symbol();
        prefixes.iter().any(|prefix| symbol.starts_with(prefix))
    }

    /// Frames of the panic machinery, including the boxed hook shim whose
    /// symbol names the hook's `PanicHookInfo` argument.
    fn is_panic_runtime_frame(&self) -> bool {
        self.symbol_starts_with(PANIC_RUNTIME_PREFIXES)
            || self.class_name.contains("PanicHookInfo")
            || self.class_name.contains("PanicInfo")
    }

    fn is_unwind_catch_frame(&self) -> bool {
        self.symbol_starts_with(UNWIND_CATCH_PREFIXES)
    }

    fn belongs_to(&self, module_prefix: &str) -> bool {
        self.symbol().trim_start_matches('<').starts_with(module_prefix)
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())?;
        match (&self.file_name, self.line_number) {
            (Some(file), Some(line)) => write!(f, " ({file}:{line})"),
            (Some(file), None) => write!(f, " ({file})"),
            _ => Ok(()),
        }
    }
}

/// Ordered list of frames attached to an error report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace {
    frames: Vec<StackFrame>,
}

impl StackTrace {
    /// Build a trace from frames ordered most recent first.
    pub fn new(frames: Vec<StackFrame>) -> Self {
        Self { frames }
    }

    /// Walk the current thread's stack.
    ///
    /// The first recorded frame is this function; callers remove it along with
    /// their own frames using [`StackTrace::skip_frames`].
    #[inline(never)]
    pub fn capture() -> Self {
        let mut frames = Vec::new();
        backtrace::trace(|frame| {
            backtrace::resolve_frame(frame, |symbol| {
                let Some(name) = symbol.name() else {
                    return;
                };
                let file_name = symbol
                    .filename()
                    .map(|path| path.display().to_string());
                frames.push(StackFrame::from_symbol(
                    &format!("{name:#}"),
                    file_name,
                    symbol.lineno(),
                ));
            });
            true
        });
        let walker_frames = frames
            .iter()
            .position(|frame: &StackFrame| {
                frame.method_name == "capture" && frame.class_name.ends_with("StackTrace")
            })
            .unwrap_or_else(|| {
                frames
                    .iter()
                    .take_while(|frame| {
                        frame.class_name.starts_with("backtrace::")
                            || frame.method_name.starts_with("_Unwind")
                    })
                    .count()
            });
        frames.drain(..walker_frames);
        Self { frames }
    }

    /// Drop the `count` most recent frames.
    ///
    /// # Examples
    /// ```
    /// use actix_raygun::domain::{StackFrame, StackTrace};
    ///
    /// let trace = StackTrace::new(vec![
    ///     StackFrame::from_symbol("app::capture", None, None),
    ///     StackFrame::from_symbol("app::hook", None, None),
    ///     StackFrame::from_symbol("app::handler", None, None),
    /// ]);
    /// let trimmed = trace.skip_frames(2);
    /// assert_eq!(trimmed.frames()[0].method_name, "handler");
    /// ```
    #[must_use]
    pub fn skip_frames(mut self, count: usize) -> Self {
        let available = self.frames.len();
        self.frames.drain(..count.min(available));
        self
    }

    /// Drop everything above the panic site.
    ///
    /// Frames up to and including the last panic runtime frame are removed.
    /// The search stops at the first frame that catches the unwind, so
    /// runtime frames further down the stack are kept.
    ///
    /// # Examples
    /// ```
    /// use actix_raygun::domain::{StackFrame, StackTrace};
    ///
    /// let trace = StackTrace::new(vec![
    ///     StackFrame::from_symbol("std::panicking::rust_panic_with_hook", None, None),
    ///     StackFrame::from_symbol("core::panicking::panic_fmt", None, None),
    ///     StackFrame::from_symbol("app::handler", None, None),
    ///     StackFrame::from_symbol("std::panicking::catch_unwind", None, None),
    /// ]);
    /// let trimmed = trace.trim_runtime_frames();
    /// assert_eq!(trimmed.frames()[0].method_name, "handler");
    /// assert_eq!(trimmed.len(), 2);
    /// ```
    #[must_use]
    pub fn trim_runtime_frames(mut self) -> Self {
        let catch = self
            .frames
            .iter()
            .position(StackFrame::is_unwind_catch_frame)
            .unwrap_or(self.frames.len());
        if let Some(last_runtime) = self
            .frames
            .iter()
            .take(catch)
            .rposition(StackFrame::is_panic_runtime_frame)
        {
            self.frames.drain(..=last_runtime);
        }
        self
    }

    /// Drop frames up to and including the last one inside `module_prefix`.
    ///
    /// Used to remove the reporter's own frames from traces captured at
    /// report time, whatever chain of closures and futures led there.
    ///
    /// # Examples
    /// ```
    /// use actix_raygun::domain::{StackFrame, StackTrace};
    ///
    /// let trace = StackTrace::new(vec![
    ///     StackFrame::from_symbol("reporter::send::{{closure}}", None, None),
    ///     StackFrame::from_symbol("<reporter::Layer<S> as Service>::call", None, None),
    ///     StackFrame::from_symbol("app::handler", None, None),
    /// ]);
    /// let trimmed = trace.trim_through_module("reporter::");
    /// assert_eq!(trimmed.frames()[0].method_name, "handler");
    /// ```
    #[must_use]
    pub fn trim_through_module(mut self, module_prefix: &str) -> Self {
        if let Some(last_own) = self
            .frames
            .iter()
            .rposition(|frame| frame.belongs_to(module_prefix))
        {
            self.frames.drain(..=last_own);
        }
        self
    }

    /// Frames ordered most recent first.
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Number of recorded frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame was recorded.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            writeln!(f, "  at {frame}")?;
        }
        Ok(())
    }
}
