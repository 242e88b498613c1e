//! Renderer-only flags. Paired with `eryn_compiler::CompilerOptions` by a
//! host embedding both crates (see `eryn-cli`) into one user-facing
//! `Options` struct.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Flags that affect rendering only (compiler-affecting flags live in
/// `eryn_compiler::CompilerOptions`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RenderOptions {
    /// Recompile the source on every render instead of trusting the cache.
    pub bypass_cache: bool,
    /// A `content` sentinel in a childless component invocation is an
    /// error instead of a silent no-op.
    pub throw_on_empty_content: bool,
    /// Rendering an origin absent from the cache is an error instead of
    /// triggering an implicit compile.
    pub throw_on_missing_entry: bool,
    /// Clone the element value on each loop iterator assignment.
    pub clone_iterators: bool,
    /// Deep-copy `context`/`local` whenever they are backed up.
    pub clone_backups: bool,
    /// Back up and restore `local` around every loop iteration, not just
    /// around the loop as a whole (needed when the loop body itself
    /// mutates `local` in an inner scope).
    pub clone_local_in_loops: bool,
    /// Emit a `tracing::info!` event with the elapsed wall time of each
    /// top-level render call.
    pub log_render_time: bool,
}
