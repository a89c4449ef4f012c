//! Logging macros that forward to `tracing` when it is available.
//!
//! With the `tracing` feature disabled (and outside of tests) they expand to
//! nothing, so call sites never pay for formatting.

#[cfg(any(test, feature = "tracing"))]
macro_rules! debug {
    ($($tt:tt)*) => { ::tracing::debug!($($tt)*) };
}

#[cfg(not(any(test, feature = "tracing")))]
macro_rules! debug {
    ($($tt:tt)*) => {};
}

#[cfg(any(test, feature = "tracing"))]
macro_rules! trace {
    ($($tt:tt)*) => { ::tracing::trace!($($tt)*) };
}

#[cfg(not(any(test, feature = "tracing")))]
macro_rules! trace {
    ($($tt:tt)*) => {};
}

pub(crate) use {debug, trace};
