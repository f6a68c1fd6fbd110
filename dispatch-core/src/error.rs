//! Typed error hierarchy for the dispatch engine.
//!
//! All fallible operations return `Result<T, DispatchError>`.
//! No panics on invalid input — every error is typed and recoverable.

use thiserror::Error;

/// The canonical error type for the dispatch engine.
#[derive(Debug, Error)]
pub enum DispatchError {
    // ── Classifier errors ────────────────────────────────────────
    /// The decoded payload was not a mapping.
    #[error("malformed payload: expected a mapping, got {found}")]
    MalformedPayload { found: &'static str },

    /// The payload's field set matched neither the task nor the
    /// service message schema.
    #[error("unknown payload shape: fields {fields:?}")]
    UnknownPayloadShape { fields: Vec<String> },

    // ── Registration errors ──────────────────────────────────────
    /// Pool capacity was not supplied explicitly at construction.
    #[error("pool capacity must be supplied explicitly (use 0 for unbounded)")]
    MissingPoolCapacity,

    // ── Routing errors ────────────────────────────────────────────
    /// `find_handler` found no match at the root router.
    #[error("no handler matched task {uuid} (type_event={type_event})")]
    HandlerNotFound { uuid: String, type_event: String },

    // ── Task execution errors ─────────────────────────────────────
    /// The user `handle` body returned an error.
    #[error("handler for task {uuid} failed: {source}")]
    HandlerFailure {
        uuid: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The task pipeline was cooperatively cancelled (a `CLOSING`
    /// message or close-timer expiry). Not logged as an error
    /// condition — this is a normal terminal state.
    #[error("task {uuid} was cancelled")]
    Cancelled { uuid: String },

    // ── Broker-frame errors ───────────────────────────────────────
    /// The broker-frame channel was closed before a frame could be
    /// acknowledged or declined.
    #[error("broker channel closed")]
    ChannelClosed,
}
