//! Parse/evaluation failures. `eryn_render::Bridge`'s methods all return
//! `Result<_, String>`, so [`EvalError`] is only ever seen by callers of
//! this crate directly; the `Display` text is what the renderer folds
//! into `eryn_render::Reason::Evaluator`.

#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    #[error("unexpected end of expression")]
    UnexpectedEof,
    #[error("unexpected character '{0}' at byte {1}")]
    UnexpectedChar(char, usize),
    #[error("expected '{0}'")]
    Expected(&'static str),
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("trailing input after expression: '{0}'")]
    TrailingInput(String),
    #[error("'strict' mode only supports literals and dotted-accessor chains rooted at context/local/shared; consider 'normal' mode")]
    TooComplexForStrict,
    #[error("cannot access field '{0}' of a non-object, non-array value")]
    FieldAccessOnScalar(String),
    #[error("comparison is only defined between two numbers or two strings")]
    Incomparable,
}

pub type EvalResult<T> = Result<T, EvalError>;
