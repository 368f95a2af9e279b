/// Stream sample rate (samples per second per channel).
pub type SampleRate = u32;

/// Number of channels in a stream.
pub type ChannelCount = u16;

/// Stream bit rate in bits per second.
pub type BitRate = u32;

/// Compile time check that an error type is usable across threads, can be
/// cloned and plays well with `?` and error reporting crates.
macro_rules! assert_error_traits {
    ($to_test:path) => {
        const _: () = { $crate::common::use_required_traits::<$to_test>() };
    };
}
pub(crate) use assert_error_traits;

#[allow(dead_code)]
pub(crate) const fn use_required_traits<
    T: Send + Sync + 'static + std::error::Error + std::fmt::Debug + std::fmt::Display + Clone,
>() {
}

// Logging goes through `tracing` when the feature is enabled. Without it the
// arguments are still type checked so both configurations see the same code.
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::debug!($($arg)*);
        #[cfg(not(feature = "tracing"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}
pub(crate) use log_debug;

macro_rules! log_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::trace!($($arg)*);
        #[cfg(not(feature = "tracing"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}
pub(crate) use log_trace;

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::warn!($($arg)*);
        #[cfg(not(feature = "tracing"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}
pub(crate) use log_warn;
