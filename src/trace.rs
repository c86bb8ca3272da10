//! Conditional tracing macros.
//!
//! With the `tracing` feature the macros forward to `tracing`; without it
//! they expand to no-ops so call sites need no `cfg` attributes.

/// Info-level span around an estimation stage.
#[cfg(feature = "tracing")]
macro_rules! trace_span {
    ($name:expr $(, $($field:tt)*)?) => {
        tracing::info_span!($name $(, $($field)*)?)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_span {
    ($name:expr $(, $($field:tt)*)?) => {
        $crate::trace::NoopSpan
    };
}

/// Info-level event carrying measurements (sizes, iterations, correlation).
#[cfg(feature = "tracing")]
macro_rules! trace_event {
    ($name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        tracing::info!(name: $name, $($key = $value),+)
    };
    ($name:expr) => {
        tracing::info!(name: $name)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_event {
    ($name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        let _ = ($($value,)+);
    };
    ($name:expr) => {};
}

/// Non-fatal warning, e.g. a transform that could not be inverted.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($msg:literal, $($key:ident = $value:expr),+ $(,)?) => {
        tracing::warn!($($key = $value),+, $msg)
    };
    ($msg:literal) => {
        tracing::warn!($msg)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($msg:literal, $($key:ident = $value:expr),+ $(,)?) => {
        let _ = ($($value,)+);
    };
    ($msg:literal) => {};
}

pub(crate) use trace_event;
pub(crate) use trace_span;
pub(crate) use trace_warn;

/// Stand-in for `tracing::Span` when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub struct NoopSpan;

#[cfg(not(feature = "tracing"))]
impl NoopSpan {
    #[inline]
    pub fn entered(self) -> Self {
        self
    }
}
