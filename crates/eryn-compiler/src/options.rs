//! Delimiter configuration and compiler-affecting flags (`Options.templates`
//! and the subset of `Options` the compiler consults). The renderer-only
//! flags (`cloneIterators`, `cloneBackups`, `cloneLocalInLoops`,
//! `logRenderTime`) live alongside the renderer in `eryn-render`; a host
//! embedding both crates combines them into one user-facing `Options`
//! struct (see `eryn-cli` for an example).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Reason;

/// A hook filtering every emitted expression/plaintext chunk before it is
/// written into the bytecode. Receives the chunk bytes and an origin tag
/// (the construct name, e.g. `"plaintext"`, `"t"`, `"v"`), and returns a
/// replacement (or `None` to keep the input unchanged). Any other outcome is
/// reported as [`Reason::HookReturnedInvalidValue`].
pub type CompileHook = std::rc::Rc<dyn Fn(&[u8], &str) -> Result<Option<Vec<u8>>, Reason>>;

/// Byte-string delimiters recognised by the compiler, plus the escape byte.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TemplateDelimiters {
    /// Escape byte placed immediately before a delimiter to treat it as literal.
    pub escape: u8,
    /// Opens a template (`[|` by default).
    pub start: Vec<u8>,
    /// Closes a template (`|]` by default).
    pub end: Vec<u8>,
    /// Marks the end of a construct's body (`end` by default).
    pub body_end: Vec<u8>,
    /// Marks a void template, whose result is discarded (`#` by default).
    pub void_start: Vec<u8>,
    /// Opens a comment, immediately after `start` (`//` by default).
    pub comment_start: Vec<u8>,
    /// Closes a comment (`//|]` by default).
    pub comment_end: Vec<u8>,
    /// Marks a conditional (`?` by default).
    pub conditional_start: Vec<u8>,
    /// Marks an else branch (`:` by default).
    pub else_start: Vec<u8>,
    /// Marks an else-if branch (`:?` by default).
    pub else_conditional_start: Vec<u8>,
    /// Marks a loop (`@` by default).
    pub loop_start: Vec<u8>,
    /// Separates a loop's iterator name from its iterable expression (`:` by default).
    pub loop_separator: Vec<u8>,
    /// Trailing token selecting reverse iteration order (`~` by default).
    pub loop_reverse: Vec<u8>,
    /// Marks a component invocation (`%` by default).
    pub component_start: Vec<u8>,
    /// Separates a component's path from its context expression (`:` by default).
    pub component_separator: Vec<u8>,
    /// Trailing token marking a component invocation self-closing (`/` by default).
    pub component_self: Vec<u8>,
}

impl Default for TemplateDelimiters {
    fn default() -> Self {
        Self {
            escape: b'\\',
            start: b"[|".to_vec(),
            end: b"|]".to_vec(),
            body_end: b"end".to_vec(),
            void_start: b"#".to_vec(),
            comment_start: b"//".to_vec(),
            comment_end: b"//|]".to_vec(),
            conditional_start: b"?".to_vec(),
            else_start: b":".to_vec(),
            else_conditional_start: b":?".to_vec(),
            loop_start: b"@".to_vec(),
            loop_separator: b":".to_vec(),
            loop_reverse: b"~".to_vec(),
            component_start: b"%".to_vec(),
            component_separator: b":".to_vec(),
            component_self: b"/".to_vec(),
        }
    }
}

/// Compiler-facing subset of engine `Options`.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompilerOptions {
    /// Delimiter configuration.
    pub templates: TemplateDelimiters,
    /// Skip all-whitespace plaintext segments instead of emitting them.
    pub ignore_blank_plaintext: bool,
    /// Abort a whole directory compile on the first file error, instead of
    /// logging and skipping it.
    pub throw_on_compile_dir_error: bool,
    /// Base directory component paths are resolved against.
    pub working_dir: std::path::PathBuf,
    /// Write the compiled OSH bytes to `<origin>.osh` next to the source.
    pub debug_dump_osh: bool,
    /// Maximum byte length of a resolved component path; longer paths are a
    /// compile error ("Path is too long").
    pub path_max_length: usize,
    /// Filters every emitted plaintext/expression chunk. Not serializable;
    /// absent (`None`) when `Options` is loaded from a config file.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub compile_hook: Option<CompileHook>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            templates: TemplateDelimiters::default(),
            ignore_blank_plaintext: false,
            throw_on_compile_dir_error: false,
            working_dir: std::path::PathBuf::from("."),
            debug_dump_osh: false,
            path_max_length: 4096,
            compile_hook: None,
        }
    }
}

impl core::fmt::Debug for CompilerOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompilerOptions")
            .field("templates", &self.templates)
            .field("ignore_blank_plaintext", &self.ignore_blank_plaintext)
            .field("throw_on_compile_dir_error", &self.throw_on_compile_dir_error)
            .field("working_dir", &self.working_dir)
            .field("debug_dump_osh", &self.debug_dump_osh)
            .field("path_max_length", &self.path_max_length)
            .field("compile_hook", &self.compile_hook.is_some())
            .finish()
    }
}
