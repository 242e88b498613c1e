//! Stack-based OSH renderer: decodes the bytecode [`eryn_compiler`] emits
//! against a host-supplied [`Bridge`], and the `Engine` that ties
//! compilation, caching, and rendering together for an embedder.

pub mod bridge;
pub mod cache;
pub mod engine;
pub mod error;
pub mod options;
pub mod renderer;

pub use bridge::{Bridge, LoopIterable, RenderValue};
pub use cache::Cache;
pub use engine::Engine;
pub use error::{Reason, RenderResult, RenderingError};
pub use options::RenderOptions;
pub use renderer::{render, ComponentSource};
