//! The compiler state machine: turns template source bytes into OSH bytes,
//! resolving every jump offset along the way so rendering never has to look
//! ahead or backtrack through source-level syntax.

use eryn_core::{Buffer, OSH_FORMAT};

use crate::error::{CompilationError, CompileResult, Reason, TemplateKind};
use crate::localize::localize_iterators;
use crate::options::CompilerOptions;

/// Single-byte OSH pair-name markers. The concrete byte values are an
/// implementation choice; only the marker *set* and its structure are load
/// bearing (see the OSH format table this mirrors).
pub struct Marker;

impl Marker {
    /// Plaintext, emitted verbatim.
    pub const PLAINTEXT: u8 = b'p';
    /// Normal template: evaluated and stringified into the output.
    pub const NORMAL: u8 = b't';
    /// Void template: evaluated, result discarded.
    pub const VOID: u8 = b'v';
    /// Conditional start (`[|? … |]`).
    pub const CONDITIONAL: u8 = b'?';
    /// Else-conditional start (`[|:? … |]`).
    pub const ELSE_CONDITIONAL: u8 = b'e';
    /// Else start (`[|: |]`).
    pub const ELSE: u8 = b'E';
    /// Forward loop start (`[|@ … |]`).
    pub const LOOP_FORWARD: u8 = b'@';
    /// Reverse loop start (`[|@ … ~ |]`).
    pub const LOOP_REVERSE: u8 = b'~';
    /// Component start (`[|% … |]`).
    pub const COMPONENT: u8 = b'%';
    /// Closes a conditional/else-conditional/else chain.
    pub const CONDITIONAL_END: u8 = b'C';
    /// Closes a loop body.
    pub const LOOP_END: u8 = b'L';
    /// Closes a component body.
    pub const COMPONENT_END: u8 = b'M';
}

/// An entry on the compiler's template stack, recording where a still-open
/// construct's pair and body begin so its body-end handler can patch the
/// jump-offset slots reserved at push time.
#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: TemplateKind,
    /// Offset of this frame's own OSH pair (its marker byte).
    output_index: usize,
    /// Offset of the first byte of this frame's body, i.e. immediately past
    /// its reserved jump-offset slots.
    output_body_index: usize,
    /// Source byte index the construct started at, for error reporting.
    input_index: usize,
}

/// Compiles `source` into OSH bytes, using `origin` as the label carried by
/// any [`CompilationError`].
///
/// When [`CompilerOptions::debug_dump_osh`] is set, the finished bytes are
/// also written to `<origin>.osh` under `working_dir` as a debug-only side
/// channel; the returned bytes are unaffected either way.
pub fn compile(source: &[u8], origin: impl Into<String>, options: &CompilerOptions) -> CompileResult<Vec<u8>> {
    let origin = origin.into();
    let osh = Compiler::new(source, origin.clone(), options).run()?;
    if options.debug_dump_osh {
        let path = options.working_dir.join(format!("{origin}.osh"));
        if let Err(err) = std::fs::write(&path, &osh) {
            tracing::warn!(path = %path.display(), error = %err, "failed to write debug OSH dump");
        }
    }
    Ok(osh)
}

/// Convenience wrapper over [`compile`] for UTF-8 source text.
pub fn compile_string(source: &str, origin: impl Into<String>, options: &CompilerOptions) -> CompileResult<Vec<u8>> {
    compile(source.as_bytes(), origin, options)
}

struct Compiler<'a> {
    source: &'a [u8],
    origin: String,
    options: &'a CompilerOptions,
    output: Buffer,
    stack: Vec<Frame>,
    iterators: Vec<Vec<u8>>,
}

impl<'a> Compiler<'a> {
    fn new(source: &'a [u8], origin: String, options: &'a CompilerOptions) -> Self {
        Self { source, origin, options, output: Buffer::new(), stack: Vec::new(), iterators: Vec::new() }
    }

    fn error_at(&self, index: usize, reason: Reason, hint: &'static str) -> CompilationError {
        CompilationError::at(self.origin.clone(), self.source, index, reason, hint)
    }

    fn wrap_core<T>(&self, at: usize, r: Result<T, eryn_core::CoreError>) -> CompileResult<T> {
        r.map_err(|e| self.error_at(at, Reason::from(e), "the produced pair exceeds OSH's length limits"))
    }

    fn apply_hook(&self, at: usize, content: &[u8], tag: &str) -> CompileResult<Vec<u8>> {
        if let Some(hook) = &self.options.compile_hook {
            if let Some(replacement) = hook(content, tag).map_err(|r| self.error_at(at, r, "the compile hook rejected this chunk"))? {
                return Ok(replacement);
            }
        }
        Ok(content.to_vec())
    }

    fn starts_with(&self, pos: usize, pat: &[u8]) -> bool {
        !pat.is_empty() && self.source.get(pos..).is_some_and(|s| s.starts_with(pat))
    }

    /// Scans for `pat`, honoring escape bytes. Always returns the escapes it
    /// walked past, even when `pat` is never found (the caller still owes
    /// those bytes a strip, e.g. trailing plaintext with an escaped
    /// delimiter that never closes).
    fn find_escaped(&self, from: usize, pat: &[u8]) -> (Option<usize>, Vec<usize>) {
        find_with_escape(self.source, from, pat, self.options.templates.escape)
    }

    fn find_template_end(&self, cursor: usize) -> CompileResult<(usize, Vec<usize>)> {
        let (found, escapes) = self.find_escaped(cursor, &self.options.templates.end);
        match found {
            Some(pos) => Ok((pos, escapes)),
            None => Err(self.error_at(cursor, Reason::UnexpectedEof, "add the closing delimiter for this template")),
        }
    }

    fn run(mut self) -> CompileResult<Vec<u8>> {
        let mut cursor = 0usize;
        loop {
            let (found, escapes) = self.find_escaped(cursor, &self.options.templates.start);
            match found {
                Some(pos) => {
                    self.emit_plaintext(cursor, pos, &escapes)?;
                    cursor = pos + self.options.templates.start.len();
                }
                None => {
                    self.emit_plaintext(cursor, self.source.len(), &escapes)?;
                    break;
                }
            }
            cursor = skip_ws(self.source, cursor);
            cursor = self.dispatch(cursor)?;
        }

        if let Some(frame) = self.stack.last() {
            return Err(self.error_at(
                frame.input_index,
                Reason::ExpectedEndForKindTemplate(frame.kind),
                "close this construct with a matching `end` template",
            ));
        }

        Ok(self.output.into_vec())
    }

    fn emit_plaintext(&mut self, from: usize, end: usize, escapes: &[usize]) -> CompileResult<()> {
        let stripped = strip_escapes(self.source, from, end, escapes);
        if stripped.is_empty() {
            return Ok(());
        }
        if self.options.ignore_blank_plaintext && is_blank(&stripped) {
            return Ok(());
        }
        let content = self.apply_hook(from, &stripped, "plaintext")?;
        if content.is_empty() {
            return Ok(());
        }
        let r = self.output.write_pair(&[Marker::PLAINTEXT], &content);
        self.wrap_core(from, r)?;
        Ok(())
    }

    fn dispatch(&mut self, cursor: usize) -> CompileResult<usize> {
        let t = self.options.templates.clone();
        if self.starts_with(cursor, &t.comment_start) {
            return self.compile_comment(cursor + t.comment_start.len());
        }
        if self.starts_with(cursor, &t.conditional_start) {
            return self.compile_conditional(cursor + t.conditional_start.len());
        }
        if self.starts_with(cursor, &t.else_conditional_start) {
            return self.compile_else_conditional(cursor + t.else_conditional_start.len());
        }
        if self.starts_with(cursor, &t.else_start) {
            return self.compile_else(cursor + t.else_start.len());
        }
        if self.starts_with(cursor, &t.loop_start) {
            return self.compile_loop(cursor + t.loop_start.len());
        }
        if self.starts_with(cursor, &t.component_start) {
            return self.compile_component(cursor + t.component_start.len());
        }
        if self.starts_with(cursor, &t.void_start) {
            return self.compile_void(cursor + t.void_start.len());
        }
        if self.starts_with(cursor, &t.body_end) {
            let (end, escapes) = self.find_template_end(cursor)?;
            let raw = strip_escapes(self.source, cursor, end, &escapes);
            if trim(&raw) == t.body_end.as_slice() {
                return self.compile_body_end(cursor, end);
            }
            return self.compile_normal_with_end(cursor, end, escapes);
        }
        self.compile_normal(cursor)
    }

    fn compile_comment(&self, cursor: usize) -> CompileResult<usize> {
        let comment_end = self.options.templates.comment_end.clone();
        let (found, escapes) = self.find_escaped(cursor, &comment_end);
        let end = found.ok_or_else(|| self.error_at(cursor, Reason::UnexpectedEof, "close this comment with the configured comment-end delimiter"))?;
        if self.options.compile_hook.is_some() {
            let raw = strip_escapes(self.source, cursor, end, &escapes);
            self.apply_hook(cursor, &raw, "comment")?;
        }
        Ok(end + comment_end.len())
    }

    fn compile_normal(&mut self, cursor: usize) -> CompileResult<usize> {
        let (end, escapes) = self.find_template_end(cursor)?;
        self.compile_normal_with_end(cursor, end, escapes)
    }

    fn compile_normal_with_end(&mut self, cursor: usize, end: usize, escapes: Vec<usize>) -> CompileResult<usize> {
        let next_cursor = end + self.options.templates.end.len();
        let raw = strip_escapes(self.source, cursor, end, &escapes);
        let trimmed = trim(&raw);
        if trimmed.is_empty() {
            return Ok(next_cursor);
        }
        if trimmed == b"content" {
            let r = self.output.write_pair(&[Marker::NORMAL], b"");
            self.wrap_core(cursor, r)?;
            return Ok(next_cursor);
        }
        let rewritten = localize_iterators(trimmed, &self.iterator_refs());
        let content = self.apply_hook(cursor, &rewritten, "t")?;
        let r = self.output.write_pair(&[Marker::NORMAL], &content);
        self.wrap_core(cursor, r)?;
        Ok(next_cursor)
    }

    fn compile_void(&mut self, cursor: usize) -> CompileResult<usize> {
        let (end, escapes) = self.find_template_end(cursor)?;
        let next_cursor = end + self.options.templates.end.len();
        let raw = strip_escapes(self.source, cursor, end, &escapes);
        let trimmed = trim(&raw);
        if trimmed.is_empty() {
            return Err(self.error_at(cursor, Reason::UnexpectedTemplateEnd, "give the void template a non-empty expression"));
        }
        let rewritten = localize_iterators(trimmed, &self.iterator_refs());
        let content = self.apply_hook(cursor, &rewritten, "v")?;
        let r = self.output.write_pair(&[Marker::VOID], &content);
        self.wrap_core(cursor, r)?;
        Ok(next_cursor)
    }

    fn compile_conditional(&mut self, cursor: usize) -> CompileResult<usize> {
        let (end, escapes) = self.find_template_end(cursor)?;
        let next_cursor = end + self.options.templates.end.len();
        let raw = strip_escapes(self.source, cursor, end, &escapes);
        let trimmed = trim(&raw);
        if trimmed.is_empty() {
            return Err(self.error_at(cursor, Reason::UnexpectedTemplateEnd, "give the conditional a boolean expression"));
        }
        let rewritten = localize_iterators(trimmed, &self.iterator_refs());
        let content = self.apply_hook(cursor, &rewritten, "?")?;
        let r = self.output.write_pair_with_reserved_slots(&[Marker::CONDITIONAL], &content, 2);
        let (pair_at, body_at) = self.wrap_core(cursor, r)?;
        self.stack.push(Frame { kind: TemplateKind::Conditional, output_index: pair_at, output_body_index: body_at, input_index: cursor });
        Ok(next_cursor)
    }

    fn compile_else_conditional(&mut self, cursor: usize) -> CompileResult<usize> {
        match self.stack.last().map(|f| f.kind) {
            Some(TemplateKind::Conditional | TemplateKind::ElseConditional) => {}
            _ => {
                return Err(self.error_at(
                    cursor,
                    Reason::UnexpectedKindTemplate(TemplateKind::ElseConditional),
                    "an else-if must directly follow a conditional or another else-if",
                ))
            }
        }
        let (end, escapes) = self.find_template_end(cursor)?;
        let next_cursor = end + self.options.templates.end.len();
        let raw = strip_escapes(self.source, cursor, end, &escapes);
        let trimmed = trim(&raw);
        if trimmed.is_empty() {
            return Err(self.error_at(cursor, Reason::UnexpectedTemplateEnd, "give the else-if a boolean expression"));
        }
        let rewritten = localize_iterators(trimmed, &self.iterator_refs());
        let content = self.apply_hook(cursor, &rewritten, "e")?;
        let r = self.output.write_pair_with_reserved_slots(&[Marker::ELSE_CONDITIONAL], &content, 2);
        let (pair_at, body_at) = self.wrap_core(cursor, r)?;
        self.stack.push(Frame { kind: TemplateKind::ElseConditional, output_index: pair_at, output_body_index: body_at, input_index: cursor });
        Ok(next_cursor)
    }

    fn compile_else(&mut self, cursor: usize) -> CompileResult<usize> {
        match self.stack.last().map(|f| f.kind) {
            Some(TemplateKind::Conditional | TemplateKind::ElseConditional) => {}
            _ => {
                return Err(self.error_at(
                    cursor,
                    Reason::UnexpectedKindTemplate(TemplateKind::Else),
                    "an else must directly follow a conditional or else-if",
                ))
            }
        }
        let (end, escapes) = self.find_template_end(cursor)?;
        let next_cursor = end + self.options.templates.end.len();
        let raw = strip_escapes(self.source, cursor, end, &escapes);
        if !trim(&raw).is_empty() {
            return Err(self.error_at(cursor, Reason::ExpectedTemplateBodyEnd, "an else template takes no expression"));
        }
        let r = self.output.write_pair(&[Marker::ELSE], b"");
        let pair_at = self.wrap_core(cursor, r)?;
        self.stack.push(Frame { kind: TemplateKind::Else, output_index: pair_at, output_body_index: self.output.len(), input_index: cursor });
        Ok(next_cursor)
    }

    fn compile_loop(&mut self, cursor: usize) -> CompileResult<usize> {
        let (end, escapes) = self.find_template_end(cursor)?;
        let next_cursor = end + self.options.templates.end.len();
        let raw = strip_escapes(self.source, cursor, end, &escapes);

        let sep = self.options.templates.loop_separator.clone();
        let sep_pos = find(&raw, &sep, 0)
            .ok_or_else(|| self.error_at(cursor, Reason::UnexpectedSeparator, "separate the iterator name from the iterable with the loop separator"))?;
        let iterator = trim(&raw[..sep_pos]).to_vec();
        let mut iterable = trim(&raw[sep_pos + sep.len()..]);
        if iterator.is_empty() || iterable.is_empty() {
            return Err(self.error_at(cursor, Reason::UnexpectedSeparator, "both the iterator name and the iterable expression are required"));
        }

        let reverse_marker = self.options.templates.loop_reverse.clone();
        let mut reverse = false;
        if !reverse_marker.is_empty() && iterable.ends_with(reverse_marker.as_slice()) {
            let candidate = trim(&iterable[..iterable.len() - reverse_marker.len()]);
            if !candidate.is_empty() {
                iterable = candidate;
                reverse = true;
            }
        }

        let rewritten_iterable = localize_iterators(iterable, &self.iterator_refs());
        let iterable_expr = self.apply_hook(cursor, &rewritten_iterable, "@")?;

        let marker = if reverse { Marker::LOOP_REVERSE } else { Marker::LOOP_FORWARD };
        let packed = {
            let r = eryn_core::bdp::pack_values(&[&iterator, &iterable_expr]);
            self.wrap_core(cursor, r)?
        };
        let r = self.output.write_pair_with_reserved_slots(&[marker], &packed, 1);
        let (pair_at, body_at) = self.wrap_core(cursor, r)?;

        self.stack.push(Frame { kind: TemplateKind::Loop, output_index: pair_at, output_body_index: body_at, input_index: cursor });
        self.iterators.push(iterator);
        Ok(next_cursor)
    }

    fn compile_component(&mut self, cursor: usize) -> CompileResult<usize> {
        let (end, escapes) = self.find_template_end(cursor)?;
        let next_cursor = end + self.options.templates.end.len();
        let raw = strip_escapes(self.source, cursor, end, &escapes);

        let self_marker = self.options.templates.component_self.clone();
        let mut body = trim(&raw);
        let mut self_closing = false;
        if !self_marker.is_empty() && body.ends_with(self_marker.as_slice()) {
            let candidate = trim(&body[..body.len() - self_marker.len()]);
            self_closing = true;
            body = candidate;
        }

        let sep = self.options.templates.component_separator.clone();
        let (path_raw, context_raw) = match find(body, &sep, 0) {
            Some(pos) => (trim(&body[..pos]), Some(trim(&body[pos + sep.len()..]))),
            None => (body, None),
        };
        if path_raw.is_empty() {
            return Err(self.error_at(cursor, Reason::UnexpectedTemplateEnd, "give the component a path"));
        }

        let path_str = core::str::from_utf8(path_raw).unwrap_or_default();
        let resolved = self.options.working_dir.join(path_str);
        let resolved_str = resolved.to_string_lossy().into_owned();
        if resolved_str.len() > self.options.path_max_length {
            return Err(self.error_at(cursor, Reason::PathTooLong, "shorten the component path or raise `path_max_length`"));
        }

        let context_expr: Vec<u8> = match context_raw {
            Some(c) if !c.is_empty() => {
                let rewritten = localize_iterators(c, &self.iterator_refs());
                self.apply_hook(cursor, &rewritten, "%")?
            }
            _ => Vec::new(),
        };

        let packed = {
            let r = eryn_core::bdp::pack_values(&[resolved_str.as_bytes(), &context_expr]);
            self.wrap_core(cursor, r)?
        };
        let r = self.output.write_pair_with_reserved_slots(&[Marker::COMPONENT], &packed, 1);
        let (pair_at, body_at) = self.wrap_core(cursor, r)?;

        if self_closing {
            let r = self.output.write_pair(&[Marker::COMPONENT_END], b"");
            let m_at = self.wrap_core(cursor, r)?;
            let content_len = (m_at - body_at) as u32;
            self.output.write_length_at(body_at - OSH_FORMAT, content_len, OSH_FORMAT);
        } else {
            self.stack.push(Frame { kind: TemplateKind::Component, output_index: pair_at, output_body_index: body_at, input_index: cursor });
        }
        Ok(next_cursor)
    }

    fn compile_body_end(&mut self, cursor: usize, end: usize) -> CompileResult<usize> {
        let next_cursor = end + self.options.templates.end.len();
        let kind = match self.stack.last() {
            Some(f) => f.kind,
            None => {
                return Err(self.error_at(
                    cursor,
                    Reason::UnexpectedTemplateBodyEnd,
                    "remove this stray `end` template, or open a construct for it to close",
                ))
            }
        };
        match kind {
            TemplateKind::Conditional | TemplateKind::ElseConditional | TemplateKind::Else => self.compile_conditional_chain_end(cursor)?,
            TemplateKind::Loop => self.compile_loop_end(cursor)?,
            TemplateKind::Component => self.compile_component_end(cursor)?,
        }
        Ok(next_cursor)
    }

    fn compile_conditional_chain_end(&mut self, cursor: usize) -> CompileResult<()> {
        let mut chain = Vec::new();
        loop {
            let frame = self.stack.pop().expect("caller confirmed a conditional-family frame is on top");
            let is_start = frame.kind == TemplateKind::Conditional;
            chain.push(frame);
            if is_start {
                break;
            }
        }
        chain.reverse();

        let r = self.output.write_pair(&[Marker::CONDITIONAL_END], b"");
        let c_at = self.wrap_core(cursor, r)?;
        let size_after_c = self.output.len();

        for idx in 0..chain.len() {
            if chain[idx].kind == TemplateKind::Else {
                continue;
            }
            let next_pos = chain.get(idx + 1).map(|f| f.output_index).unwrap_or(c_at);
            let end_off = (next_pos - chain[idx].output_body_index) as u32;
            let true_end_off = (size_after_c - chain[idx].output_body_index) as u32;
            self.output.write_length_at(chain[idx].output_body_index - 2 * OSH_FORMAT, end_off, OSH_FORMAT);
            self.output.write_length_at(chain[idx].output_body_index - OSH_FORMAT, true_end_off, OSH_FORMAT);
        }
        Ok(())
    }

    fn compile_loop_end(&mut self, cursor: usize) -> CompileResult<()> {
        let frame = self.stack.pop().expect("caller confirmed a loop frame is on top");
        let r = self.output.write_pair_with_reserved_slots(&[Marker::LOOP_END], b"", 1);
        let (_l_at, l_body_at) = self.wrap_core(cursor, r)?;
        let size_after_l = self.output.len();

        let forward_skip = (size_after_l - frame.output_body_index) as u32;
        self.output.write_length_at(frame.output_body_index - OSH_FORMAT, forward_skip, OSH_FORMAT);

        let back_off = (l_body_at - frame.output_body_index) as u32;
        self.output.write_length_at(l_body_at - OSH_FORMAT, back_off, OSH_FORMAT);

        self.iterators.pop();
        Ok(())
    }

    fn compile_component_end(&mut self, cursor: usize) -> CompileResult<()> {
        let frame = self.stack.pop().expect("caller confirmed a component frame is on top");
        let r = self.output.write_pair(&[Marker::COMPONENT_END], b"");
        let m_at = self.wrap_core(cursor, r)?;
        let content_len = (m_at - frame.output_body_index) as u32;
        self.output.write_length_at(frame.output_body_index - OSH_FORMAT, content_len, OSH_FORMAT);
        Ok(())
    }

    fn iterator_refs(&self) -> Vec<&[u8]> {
        self.iterators.iter().map(Vec::as_slice).collect()
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..].windows(needle.len()).position(|w| w == needle).map(|i| i + from)
}

fn is_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn skip_ws(s: &[u8], mut i: usize) -> usize {
    while i < s.len() && is_ws(s[i]) {
        i += 1;
    }
    i
}

fn trim(s: &[u8]) -> &[u8] {
    let mut start = 0;
    let mut end = s.len();
    while start < end && is_ws(s[start]) {
        start += 1;
    }
    while end > start && is_ws(s[end - 1]) {
        end -= 1;
    }
    &s[start..end]
}

fn is_blank(s: &[u8]) -> bool {
    s.iter().copied().all(is_ws)
}

/// Scans forward from `from` for `pat`, skipping every occurrence
/// immediately preceded by `escape` within the scanned window. Returns the
/// match position (`None` if `pat` never recurs unescaped before EOF) and,
/// regardless, every escape byte walked past along the way.
fn find_with_escape(source: &[u8], from: usize, pat: &[u8], escape: u8) -> (Option<usize>, Vec<usize>) {
    let mut escapes = Vec::new();
    if pat.is_empty() || from > source.len() {
        return (None, escapes);
    }
    let mut i = from;
    loop {
        if i + pat.len() > source.len() {
            return (None, escapes);
        }
        if &source[i..i + pat.len()] == pat {
            if i > from && source[i - 1] == escape {
                escapes.push(i - 1);
                i += 1;
                continue;
            }
            return (Some(i), escapes);
        }
        i += 1;
    }
}

/// Rebuilds `source[start..end]` with every byte in `escapes` dropped.
fn strip_escapes(source: &[u8], start: usize, end: usize, escapes: &[usize]) -> Vec<u8> {
    let mut out = Vec::with_capacity(end.saturating_sub(start));
    let mut seg_start = start;
    for &e in escapes {
        out.extend_from_slice(&source[seg_start..e]);
        seg_start = e + 1;
    }
    out.extend_from_slice(&source[seg_start..end]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use eryn_core::ConstBuffer;
    use pretty_assertions::assert_eq;

    fn opts() -> CompilerOptions {
        CompilerOptions::default()
    }

    fn pairs(osh: &[u8]) -> Vec<(u8, Vec<u8>)> {
        let view = ConstBuffer::new(osh);
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < view.end() {
            let (name, value, next) = view.read_pair(offset).unwrap();
            out.push((name[0], value.to_vec()));
            offset = next;
        }
        out
    }

    #[test]
    fn plaintext_with_no_delimiters_round_trips() {
        let osh = compile_string("hello world", "t", &opts()).unwrap();
        assert_eq!(pairs(&osh), vec![(Marker::PLAINTEXT, b"hello world".to_vec())]);
    }

    #[test]
    fn comment_emits_nothing() {
        let osh = compile_string("A[|// nope //|]B", "t", &opts()).unwrap();
        assert_eq!(pairs(&osh), vec![(Marker::PLAINTEXT, b"A".to_vec()), (Marker::PLAINTEXT, b"B".to_vec())]);
    }

    #[test]
    fn escape_preserves_literal_delimiter() {
        let osh = compile_string(r"A\[|B|]C", "t", &opts()).unwrap();
        assert_eq!(pairs(&osh), vec![(Marker::PLAINTEXT, b"A[|B|]C".to_vec())]);
    }

    #[test]
    fn content_sentinel_is_an_empty_normal_value() {
        let osh = compile_string("[|content|]", "t", &opts()).unwrap();
        assert_eq!(pairs(&osh), vec![(Marker::NORMAL, Vec::new())]);
    }

    #[test]
    fn conditional_without_else_lands_end_off_at_c() {
        let osh = compile_string("[|? x |]Y[| end |]", "t", &opts()).unwrap();
        let view = ConstBuffer::new(&osh);
        let (name, value, next) = view.read_pair(0).unwrap();
        assert_eq!(name, &[Marker::CONDITIONAL]);
        // `value` already includes the two reserved offset slots.
        let body_at = 1 + 1 + 4 + value.len();
        let end_off = view.read_u32_le(body_at - 2 * OSH_FORMAT, OSH_FORMAT).unwrap() as usize;
        let true_end_off = view.read_u32_le(body_at - OSH_FORMAT, OSH_FORMAT).unwrap() as usize;
        assert_eq!(body_at + end_off, osh.len() - 6, "false jump must land exactly at the terminal C pair");
        assert_eq!(body_at + true_end_off, osh.len(), "true-exit jump must land exactly past the terminal C pair");
        assert_eq!(next, body_at);
    }

    #[test]
    fn unclosed_conditional_is_a_compile_error() {
        let err = compile_string("[|? x |]Y", "t", &opts()).unwrap_err();
        assert!(matches!(err.reason, Reason::ExpectedEndForKindTemplate(TemplateKind::Conditional)));
    }

    #[test]
    fn stray_body_end_is_a_compile_error() {
        let err = compile_string("[| end |]", "t", &opts()).unwrap_err();
        assert!(matches!(err.reason, Reason::UnexpectedTemplateBodyEnd));
    }

    #[test]
    fn loop_missing_iterator_is_a_compile_error() {
        let err = compile_string("[|@ : expr |]x[| end |]", "t", &opts()).unwrap_err();
        assert!(matches!(err.reason, Reason::UnexpectedSeparator));
    }

    #[test]
    fn else_with_extra_content_is_a_compile_error() {
        let err = compile_string("[|? x |]Y[|: extra |]Z[| end |]", "t", &opts()).unwrap_err();
        assert!(matches!(err.reason, Reason::ExpectedTemplateBodyEnd));
    }

    #[test]
    fn loop_back_off_lands_just_past_loop_start_slots() {
        let osh = compile_string("[|@ i : items |]<[|i|]>[| end |]", "t", &opts()).unwrap();
        let view = ConstBuffer::new(&osh);
        let (name, value, _) = view.read_pair(0).unwrap();
        assert_eq!(name, &[Marker::LOOP_FORWARD]);
        // `value` already includes the one reserved offset slot.
        let body_at = 1 + 1 + 4 + value.len();
        // Locate the trailing `L` pair: it is the last pair in the stream.
        let mut offset = body_at;
        let mut last_l_body_at = None;
        while offset < view.end() {
            let (name, _, next) = view.read_pair(offset).unwrap();
            if name == [Marker::LOOP_END] {
                last_l_body_at = Some(next);
            }
            offset = next;
        }
        let l_body_at = last_l_body_at.unwrap();
        let back_off = view.read_u32_le(l_body_at - OSH_FORMAT, OSH_FORMAT).unwrap() as usize;
        assert_eq!(l_body_at - back_off, body_at);
    }
}
