//! Directory compilation: recursively compiles every non-excluded file
//! under a root into OSH bytes, honouring an ordered list of glob filters.
//!
//! This is a thin layer above [`crate::compile`]: it never touches the
//! compiler's internal state machine, only decides which files to hand to
//! it, walking the tree with a file/dir filter predicate pair and honouring
//! `CompilerOptions::throw_on_compile_dir_error`.

use std::path::{Path, PathBuf};

use globset::Glob;
use walkdir::WalkDir;

use crate::error::{CompilationError, CompileResult, Reason};
use crate::options::CompilerOptions;

/// One entry in an ordered filter list: an inclusion or exclusion glob
/// matched against a path relative to the compilation root.
enum Filter {
    Include(globset::GlobMatcher),
    Exclude(globset::GlobMatcher),
}

/// A single compiled file, keyed by its path relative to the root.
pub struct CompiledEntry {
    /// Path relative to the directory root, the key a [`Cache`] would use.
    pub relative_path: PathBuf,
    /// The compiled OSH bytes.
    pub osh: Vec<u8>,
}

/// A file that failed to compile during a directory walk, kept only when
/// [`CompilerOptions::throw_on_compile_dir_error`] is `false`.
pub struct SkippedEntry {
    /// Path relative to the directory root.
    pub relative_path: PathBuf,
    /// Why compilation failed.
    pub error: CompilationError,
}

/// Outcome of [`compile_dir`]: every file that compiled, plus every file
/// that was skipped after a compile error (empty unless
/// `throw_on_compile_dir_error` is `false`, in which case errors abort
/// immediately instead of being collected here).
#[derive(Default)]
pub struct DirCompileReport {
    /// Successfully compiled files.
    pub compiled: Vec<CompiledEntry>,
    /// Files skipped after a non-fatal compile error.
    pub skipped: Vec<SkippedEntry>,
}

/// Parses `patterns` into an ordered filter list. A pattern prefixed with
/// `!` or `^` is an exclusion; anything else is an inclusion.
fn parse_filters(patterns: &[&str]) -> CompileResult<(Vec<Filter>, bool)> {
    let mut filters = Vec::with_capacity(patterns.len());
    let mut has_inclusion = false;

    for pattern in patterns {
        let (negated, glob_src) = match pattern.strip_prefix('!').or_else(|| pattern.strip_prefix('^')) {
            Some(rest) => (true, rest),
            None => (false, *pattern),
        };

        let glob = Glob::new(glob_src).map_err(|_| {
            CompilationError::at("<dir-filter>", glob_src.as_bytes(), 0, Reason::UnexpectedSeparator, "fix the glob pattern syntax")
        })?;

        if negated {
            filters.push(Filter::Exclude(glob.compile_matcher()));
        } else {
            has_inclusion = true;
            filters.push(Filter::Include(glob.compile_matcher()));
        }
    }

    Ok((filters, has_inclusion))
}

/// Whether `relative` should be compiled: excluded if any exclusion filter
/// matches it, else included if either no inclusion filters were given or
/// at least one of them matches.
fn is_included(filters: &[Filter], has_inclusion: bool, relative: &Path) -> bool {
    for filter in filters {
        if let Filter::Exclude(glob) = filter {
            if glob.is_match(relative) {
                return false;
            }
        }
    }

    if !has_inclusion {
        return true;
    }

    filters.iter().any(|f| matches!(f, Filter::Include(glob) if glob.is_match(relative)))
}

/// Recursively compiles every file under `root` not excluded by `filters`,
/// resolving component/relative paths against `root`.
///
/// A path longer than [`CompilerOptions::path_max_length`] is a compile
/// error for that entry ("Path is too long"). Per-entry failures abort the
/// whole walk when `throw_on_compile_dir_error` is set; otherwise they are
/// collected into the report's `skipped` list and the walk continues.
pub fn compile_dir(root: &Path, filters: &[&str], options: &CompilerOptions) -> CompileResult<DirCompileReport> {
    let (filters, has_inclusion) = parse_filters(filters)?;
    let mut report = DirCompileReport::default();

    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());

        if !is_included(&filters, has_inclusion, relative) {
            tracing::debug!(path = %relative.display(), "ignoring");
            continue;
        }

        let absolute = entry.path();
        if absolute.as_os_str().len() > options.path_max_length {
            let error = CompilationError::at(
                absolute.display().to_string(),
                &[],
                0,
                Reason::PathTooLong,
                "shorten the path or raise `path_max_length`",
            );
            if options.throw_on_compile_dir_error {
                return Err(error);
            }
            report.skipped.push(SkippedEntry { relative_path: relative.to_path_buf(), error });
            continue;
        }

        let source = match std::fs::read(absolute) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(path = %absolute.display(), error = %err, "failed to read file");
                continue;
            }
        };

        match crate::compile(&source, absolute.display().to_string(), options) {
            Ok(osh) => report.compiled.push(CompiledEntry { relative_path: relative.to_path_buf(), osh }),
            Err(error) => {
                if options.throw_on_compile_dir_error {
                    return Err(error);
                }
                tracing::error!(%error, "compile error, skipping");
                report.skipped.push(SkippedEntry { relative_path: relative.to_path_buf(), error });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_included_files_and_skips_excluded_ones() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.eryn"), b"Hello [|name|]!").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"ignored kind").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/c.eryn"), b"nested").unwrap();

        let options = CompilerOptions::default();
        let report = compile_dir(dir.path(), &["*.eryn"], &options).unwrap();

        let mut names: Vec<_> =
            report.compiled.iter().map(|e| e.relative_path.to_string_lossy().replace('\\', "/")).collect();
        names.sort();
        assert_eq!(names, vec!["a.eryn", "sub/c.eryn"]);
    }

    #[test]
    fn exclusion_filter_wins_over_inclusion() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.eryn"), b"keep").unwrap();
        std::fs::write(dir.path().join("skip.eryn"), b"skip").unwrap();

        let options = CompilerOptions::default();
        let report = compile_dir(dir.path(), &["*.eryn", "!skip.eryn"], &options).unwrap();

        let names: Vec<_> = report.compiled.iter().map(|e| e.relative_path.to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["keep.eryn"]);
    }

    #[test]
    fn compile_error_is_skipped_by_default_and_fatal_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.eryn"), b"[|? cond").unwrap();

        let options = CompilerOptions::default();
        let report = compile_dir(dir.path(), &["*.eryn"], &options).unwrap();
        assert_eq!(report.compiled.len(), 0);
        assert_eq!(report.skipped.len(), 1);

        let mut strict = CompilerOptions::default();
        strict.throw_on_compile_dir_error = true;
        assert!(compile_dir(dir.path(), &["*.eryn"], &strict).is_err());
    }
}
