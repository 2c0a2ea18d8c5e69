//! Logging macros, each compiled out unless its feature is enabled.

/// `tracing::trace!` under the `verbose` feature.
macro_rules! verbose {
    ($($tt:tt)*) => {
        #[cfg(feature = "verbose")]
        tracing::trace!($($tt)*)
    };
}

/// Enter a trace span until the end of the enclosing block, under the `verbose` feature.
///
/// Only for synchronous code, the guard must not be held across an `.await`.
macro_rules! span {
    ($($tt:tt)*) => {
        #[cfg(feature = "verbose")]
        let s = tracing::trace_span!($($tt)*);
        #[cfg(feature = "verbose")]
        let _s = s.enter();
    };
}

/// `log::warn!` under the `log` feature.
macro_rules! warning {
    ($($tt:tt)*) => {
        #[cfg(feature = "log")]
        log::warn!($($tt)*)
    };
}

pub(crate) use verbose;
pub(crate) use span;
pub(crate) use warning;
