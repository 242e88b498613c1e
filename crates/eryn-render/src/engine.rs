//! [`Engine`]: the embedding-facing handle that owns both option sets and
//! the cache, and exposes `compile`/`compile_string`/`compile_dir`/
//! `render`/`render_string` as a single call each. `eryn-cli` is the
//! reference embedder; see its `main.rs` for a worked example.

use std::fs;
use std::path::Path;

use eryn_compiler::{compile, compile_dir, compile_string, CompilerOptions, DirCompileReport};

use crate::bridge::Bridge;
use crate::cache::Cache;
use crate::error::{Reason, RenderResult, RenderingError};
use crate::options::RenderOptions;
use crate::renderer::{render, ComponentSource};

/// Owns the compiled-template cache and both option sets, and resolves
/// component invocations by compiling from disk on first use. A host that
/// only ever renders a fixed, pre-compiled set of templates can skip this
/// and call [`crate::renderer::render`] directly with its own
/// [`ComponentSource`]; `Engine` is for the common case of rendering a
/// template tree straight off the filesystem.
pub struct Engine {
    /// Compiler-affecting flags (delimiters, working directory, ...).
    pub compiler_options: CompilerOptions,
    /// Renderer-affecting flags.
    pub render_options: RenderOptions,
    cache: Cache,
}

impl Engine {
    /// Builds an engine with the given option sets and an empty cache.
    #[must_use]
    pub fn new(compiler_options: CompilerOptions, render_options: RenderOptions) -> Self {
        Self { compiler_options, render_options, cache: Cache::new() }
    }

    /// The cache backing this engine's component resolution and
    /// `render`-by-origin lookups.
    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Compiles `source` bytes under `origin` and inserts the result into
    /// the cache, returning the OSH bytes produced.
    pub fn compile(&mut self, source: &[u8], origin: impl Into<String>) -> RenderResult<Vec<u8>> {
        let origin = origin.into();
        let osh = compile(source, origin.clone(), &self.compiler_options).map_err(compile_err)?;
        self.cache.insert(origin, osh.clone());
        Ok(osh)
    }

    /// Compiles `source` text under `origin` and inserts the result into
    /// the cache, returning the OSH bytes produced.
    pub fn compile_string(&mut self, source: &str, origin: impl Into<String>) -> RenderResult<Vec<u8>> {
        let origin = origin.into();
        let osh = compile_string(source, origin.clone(), &self.compiler_options).map_err(compile_err)?;
        self.cache.insert(origin, osh.clone());
        Ok(osh)
    }

    /// Recursively compiles every non-excluded file under `root`, keyed by
    /// its path relative to `root`, and inserts every successful result
    /// into the cache.
    pub fn compile_dir(&mut self, root: &Path, filters: &[&str]) -> RenderResult<DirCompileReport> {
        let report = compile_dir(root, filters, &self.compiler_options).map_err(compile_err)?;
        for entry in &report.compiled {
            self.cache.insert(entry.relative_path.to_string_lossy().into_owned(), entry.osh.clone());
        }
        Ok(report)
    }

    /// Renders the OSH cached for `origin` against `bridge`, resolving any
    /// components it invokes by reading and compiling their source off
    /// disk (relative to [`CompilerOptions::working_dir`]) on first use.
    pub fn render<B: Bridge>(&mut self, origin: &str, bridge: &mut B) -> RenderResult<Vec<u8>> {
        let osh = self.resolve(origin)?;
        let render_options = self.render_options.clone();
        let mut resolver = EngineComponentSource { engine: self };
        render(&osh, origin, bridge, &mut resolver, &render_options)
    }

    /// Compiles `source` under `origin` and immediately renders it; the
    /// combined equivalent of `compile_string` followed by `render`.
    pub fn render_string<B: Bridge>(&mut self, source: &str, origin: impl Into<String>, bridge: &mut B) -> RenderResult<Vec<u8>> {
        let origin = origin.into();
        let osh = self.compile_string(source, origin.clone())?;
        let render_options = self.render_options.clone();
        let mut resolver = EngineComponentSource { engine: self };
        render(&osh, &origin, bridge, &mut resolver, &render_options)
    }

    fn resolve(&mut self, origin: &str) -> RenderResult<Vec<u8>> {
        if !self.render_options.bypass_cache {
            if let Some(osh) = self.cache.get(origin) {
                return Ok(osh.to_vec());
            }
        }
        self.compile_from_disk(origin)
    }

    fn compile_from_disk(&mut self, origin: &str) -> RenderResult<Vec<u8>> {
        if self.render_options.throw_on_missing_entry {
            return Err(RenderingError::new(origin, Reason::MissingCacheEntry, "compile this origin before rendering it, or clear throw_on_missing_entry"));
        }
        let origin_path = Path::new(origin);
        let path = if origin_path.is_absolute() { origin_path.to_path_buf() } else { self.compiler_options.working_dir.join(origin_path) };
        let source = fs::read(&path).map_err(|e| {
            RenderingError::new(
                origin,
                Reason::Panic(format!("could not read component source at {}: {e}", path.display())),
                "check the component path resolves under working_dir",
            )
        })?;
        self.compile(&source, origin.to_string())
    }
}

/// Adapts [`Engine`]'s cache-or-compile-from-disk policy to the
/// [`ComponentSource`] trait the decode loop consults for `%` markers.
struct EngineComponentSource<'a> {
    engine: &'a mut Engine,
}

impl ComponentSource for EngineComponentSource<'_> {
    fn osh_for(&mut self, abs_path: &str) -> RenderResult<Vec<u8>> {
        self.engine.resolve(abs_path)
    }
}

fn compile_err(e: eryn_compiler::CompilationError) -> RenderingError {
    RenderingError::new(e.path.clone(), Reason::Evaluator(e.to_string()), "fix the template source reported in this compile error")
}
