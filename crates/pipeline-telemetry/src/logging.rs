//! Log macros with the standard field set.
//!
//! Every keyed line carries `subsystem` and `key`; chunk lines add
//! `ordinal` / `total`, artifact lines add `artifact`.

/// Log a line about one chunk of a keyed file.
///
/// ```rust,ignore
/// log_chunk_event!(debug, "ap-02", "Chunk appended", key, 2, 4, buffered = 128);
/// ```
#[macro_export]
macro_rules! log_chunk_event {
    ($level:ident, $subsystem:expr, $msg:expr, $key:expr, $ordinal:expr, $total:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            key = %$key,
            ordinal = $ordinal,
            total = $total,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a line about a finished artifact.
#[macro_export]
macro_rules! log_artifact_event {
    ($level:ident, $subsystem:expr, $msg:expr, $key:expr, $name:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            key = %$key,
            artifact = %$name,
            $($($field)*,)?
            $msg
        )
    };
}
