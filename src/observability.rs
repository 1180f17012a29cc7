//! Structured diagnostics for the encode and decode pipelines.
//!
//! The `log_metric!` macro renders key/value pairs as a single JSON-like line on
//! the `log` facade at debug level. The `#[cfg(debug_assertions)]` guard compiles
//! the formatting out of release builds entirely.

/// Logs a structured key-value metric line, only in debug builds.
///
/// # Example
/// ```
/// use chromapack::log_metric;
/// let frame = 4;
/// log_metric!("event" = "frame_written", "frame" = &frame);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+

            log::debug!(target: "chromapack::metrics", "CHROMA_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}
