//! `CompilationError`: the single error type the compiler raises. Messages
//! come from a closed set; each variant below maps to exactly one of those
//! messages plus a human hint.

use eryn_core::Chunk;

/// Which nested construct a "kind"-parameterised error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// `[|? … |] … [| end |]`
    Conditional,
    /// `[|:? … |]`
    ElseConditional,
    /// `[|: |]`
    Else,
    /// `[|@ … |] … [| end |]` or `[|~ … |] … [| end |]`
    Loop,
    /// `[|% … |] … [| end |]`
    Component,
}

impl core::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Conditional => "conditional",
            Self::ElseConditional => "else-conditional",
            Self::Else => "else",
            Self::Loop => "loop",
            Self::Component => "component",
        };
        f.write_str(s)
    }
}

/// The closed set of compiler error reasons.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Reason {
    /// Input ended while scanning for a closing delimiter.
    #[error("Unexpected EOF")]
    UnexpectedEof,
    /// A `templateEnd`/`commentEnd` was found where it was not expected.
    #[error("Unexpected template end")]
    UnexpectedTemplateEnd,
    /// A loop or component separator was missing or malformed.
    #[error("Unexpected separator")]
    UnexpectedSeparator,
    /// An else/else-conditional/body-end template carried unexpected extra content.
    #[error("Expected template body end")]
    ExpectedTemplateBodyEnd,
    /// A construct appeared where the template stack's top frame forbids it
    /// (e.g. `else` without a preceding `conditional`).
    #[error("Unexpected {0} template")]
    UnexpectedKindTemplate(TemplateKind),
    /// A body-end token appeared with an empty template stack.
    #[error("Unexpected template body end")]
    UnexpectedTemplateBodyEnd,
    /// End of input reached with an unclosed construct on the template stack.
    #[error("Expected end for {0} template")]
    ExpectedEndForKindTemplate(TemplateKind),
    /// A resolved component path exceeded `CompilerOptions::path_max_length`.
    #[error("Path is too long")]
    PathTooLong,
    /// The compile hook returned something other than bytes, a string, or
    /// nullish.
    #[error("Hook returned invalid value")]
    HookReturnedInvalidValue,
    /// The low-level OSH/BDP832 codec rejected a write, e.g. a name or value
    /// too long to fit its length field.
    #[error("{0}")]
    Codec(#[from] eryn_core::CoreError),
}

/// Raised only by the compiler; carries enough context to render a
/// `path:line:column` message with a source snippet and a one-sentence hint.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{path}:{}:{}: {reason} ({hint})", chunk.line, chunk.column)]
pub struct CompilationError {
    /// Origin label of the source being compiled (file path or alias).
    pub path: String,
    /// The structured reason.
    pub reason: Reason,
    /// A one-sentence human-readable fix suggestion.
    pub hint: &'static str,
    /// Line/column/snippet/caret extracted around the error byte index.
    pub chunk: Chunk,
}

impl CompilationError {
    /// Builds a `CompilationError` from a reason, a source buffer, and the
    /// byte index the error occurred at.
    pub fn at(path: impl Into<String>, source: &[u8], index: usize, reason: Reason, hint: &'static str) -> Self {
        Self { path: path.into(), reason, hint, chunk: Chunk::extract(source, index, 160) }
    }
}

/// Result alias for compiler operations.
pub type CompileResult<T> = Result<T, CompilationError>;
