//! `RenderingError`: the single error type the renderer raises. Unlike
//! [`eryn_compiler::CompilationError`], a rendering error carries no
//! line/column (OSH no longer has source positions); it carries the origin
//! label and, where meaningful, the offending expression bytes.

/// The closed set of rendering failure reasons.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Reason {
    /// The host evaluator returned an error for a `t`/`v`/`?`/`@`/`~`/`%`
    /// expression.
    #[error("evaluator error: {0}")]
    Evaluator(String),
    /// A `t` template evaluated to a value stringification has no rule for
    /// (the bridge reported all of `is_string`/`is_buffer`/`is_object`/
    /// `is_array`/`is_number`/`is_boolean`/`is_nullish` as false).
    #[error("Unsupported template return type")]
    UnsupportedReturnType,
    /// `render`/`render_string` was asked to render an origin absent from
    /// the cache while `throw_on_missing_entry` is set.
    #[error("Item does not exist in cache")]
    MissingCacheEntry,
    /// A `content` sentinel appeared in a component invoked without a body
    /// while `throw_on_empty_content` is set.
    #[error("No content")]
    NoContent,
    /// The bytecode violated an invariant a correct compiler never
    /// produces (e.g. a marker byte that isn't a valid OSH op, or a jump
    /// offset landing out of bounds): this should never occur outside a
    /// hand-crafted or corrupted `.osh` file.
    #[error("PANIC: {0}")]
    Panic(String),
    /// The low-level OSH/BDP832 codec rejected a read.
    #[error("{0}")]
    Codec(#[from] eryn_core::CoreError),
}

/// Raised by the renderer; carries the origin label and, for evaluator
/// failures, the expression bytes that were being evaluated.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{origin}: {reason}{}", token.as_ref().map(|t| format!(" (in `{t}`)")).unwrap_or_default())]
pub struct RenderingError {
    /// Origin label of the bytecode being rendered.
    pub origin: String,
    /// The structured reason.
    pub reason: Reason,
    /// A one-sentence human-readable fix suggestion.
    pub hint: &'static str,
    /// The expression snippet being evaluated when the error occurred, if
    /// any (lossily decoded, since OSH values are opaque bytes).
    pub token: Option<String>,
}

impl RenderingError {
    /// Builds a `RenderingError` with no associated expression token.
    pub fn new(origin: impl Into<String>, reason: Reason, hint: &'static str) -> Self {
        Self { origin: origin.into(), reason, hint, token: None }
    }

    /// Builds a `RenderingError` carrying the expression bytes being
    /// evaluated when it occurred.
    pub fn with_token(origin: impl Into<String>, reason: Reason, hint: &'static str, token: &[u8]) -> Self {
        Self { origin: origin.into(), reason, hint, token: Some(String::from_utf8_lossy(token).into_owned()) }
    }
}

/// Result alias for renderer operations.
pub type RenderResult<T> = Result<T, RenderingError>;
