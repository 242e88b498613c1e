//! The stack-based OSH decoder: walks a compiled bytecode image linearly,
//! consulting a [`Bridge`] for every expression, and produces an output
//! byte stream. Three runtime stacks track open conditionals, loops, and
//! components; component recursion reuses the Rust call stack itself
//! rather than a hand-rolled backup stack, so `content` scoping falls out
//! of ordinary function-call semantics (see [`render`]).

use eryn_compiler::Marker;
use eryn_core::{bdp, ConstBuffer, OSH_FORMAT};

use crate::bridge::{Bridge, RenderValue};
use crate::error::{Reason, RenderResult, RenderingError};
use crate::options::RenderOptions;

/// Resolves a component's absolute path into OSH bytes, compiling and
/// caching it on demand if the embedder allows it. `eryn-render` only
/// depends on this trait, not on any concrete cache or compiler, so a bare
/// renderer embedding (fixed set of pre-compiled components, no filesystem
/// access) can implement it trivially; [`crate::Engine`] is the full
/// compile-on-demand implementation.
pub trait ComponentSource {
    /// Returns the OSH bytes for the component at `abs_path`.
    fn osh_for(&mut self, abs_path: &str) -> RenderResult<Vec<u8>>;
}

/// Renders `osh` (the bytecode for `origin`) against `bridge`, resolving
/// any component invocations it contains through `source`.
///
/// This is the crate's single entry point for decoding OSH; `origin` is
/// only used to label errors. When [`RenderOptions::log_render_time`] is
/// set, a `tracing::info!` event reports the elapsed wall time of this
/// call; nested component sub-renders are not separately timed.
pub fn render<B: Bridge, S: ComponentSource>(
    osh: &[u8],
    origin: &str,
    bridge: &mut B,
    source: &mut S,
    options: &RenderOptions,
) -> RenderResult<Vec<u8>> {
    let start = options.log_render_time.then(std::time::Instant::now);
    tracing::debug!(origin, bytes = osh.len(), "render: enter");
    let result = render_into(osh, origin, b"", bridge, source, options);
    tracing::debug!(origin, ok = result.is_ok(), "render: exit");
    if let Some(start) = start {
        tracing::info!(origin, elapsed = ?start.elapsed(), "render complete");
    }
    result
}

/// A loop frame on the renderer's loop stack: the evaluated iterable plus
/// enough bookkeeping to step forward or backward through it and re-assign
/// `local[iterator]` at each position.
struct LoopFrame<V, Bk> {
    iterator: Vec<u8>,
    iterable: V,
    keys: Vec<String>,
    is_array: bool,
    index: usize,
    step: i8,
    length: usize,
    per_iteration_backup: Option<Bk>,
}

impl<V, Bk> LoopFrame<V, Bk> {
    /// Whether there is another element to step to after the current one.
    fn has_next(&self) -> bool {
        if self.step > 0 {
            self.index + 1 < self.length
        } else {
            self.index > 0
        }
    }
}

/// A conditional frame: whether the branch that pushed it was taken, and
/// where to jump to skip the remainder of the if/elif/else chain when it
/// was.
struct CondFrame {
    last_true: bool,
    true_end_index: usize,
}

/// A component frame. `Done` components (self-closing, or invoked with no
/// body) have already been fully rendered inline at `%`; `M` just pops
/// them. `Pending` components are still accumulating their invocation-site
/// body into `output`, to be sliced out as `content` when `M` arrives.
enum ComponentFrame {
    Done,
    Pending { abs_path: Vec<u8>, context_expr: Vec<u8>, start_index: usize },
}

/// Splits a pair's value into its content bytes and its trailing
/// fixed-size jump-offset slots (`slots * OSH_FORMAT` bytes at the end).
fn split_slots(value: &[u8], slots: usize) -> (&[u8], &[u8]) {
    let at = value.len() - slots * OSH_FORMAT;
    (&value[..at], &value[at..])
}

/// Reads the `idx`-th little-endian `u32` slot out of a slot-bytes slice
/// produced by [`split_slots`].
fn slot_u32(slots: &[u8], idx: usize) -> usize {
    let b = &slots[idx * OSH_FORMAT..idx * OSH_FORMAT + OSH_FORMAT];
    u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize
}

fn panic_err(origin: &str, message: impl Into<String>) -> RenderingError {
    RenderingError::new(origin, Reason::Panic(message.into()), "this indicates a corrupt or hand-crafted .osh image")
}

fn eval_err(origin: &str, expr: &[u8], message: String) -> RenderingError {
    RenderingError::with_token(origin, Reason::Evaluator(message), "check the expression against the host's evaluator", expr)
}

/// Appends `value`'s stringified bytes to `output`.
fn stringify<V: RenderValue>(origin: &str, expr: &[u8], value: &V, output: &mut Vec<u8>) -> RenderResult<()> {
    if value.is_nullish() {
    } else if value.is_string() || value.is_buffer() {
        output.extend_from_slice(value.as_bytes());
    } else if value.is_number() {
        output.extend_from_slice(value.as_number_string().as_bytes());
    } else if value.is_boolean() {
        output.extend_from_slice(if value.as_bool() { b"true" } else { b"false" });
    } else if value.is_object() || value.is_array() {
        output.extend_from_slice(&value.to_json_bytes());
    } else {
        return Err(RenderingError::with_token(origin, Reason::UnsupportedReturnType, "return a string, buffer, number, boolean, object, or array", expr));
    }
    Ok(())
}

fn assign_iterator<B: Bridge>(
    bridge: &mut B,
    clone: bool,
    frame: &LoopFrame<B::Value, B::Backup>,
) {
    if frame.is_array {
        bridge.eval_iterator_array_assignment(clone, &frame.iterator, &frame.iterable, frame.index);
    } else {
        bridge.eval_iterator_object_assignment(clone, &frame.iterator, &frame.iterable, &frame.keys, frame.index);
    }
}

/// Renders `osh` into a fresh output buffer, with `content` available to
/// any `content` sentinel it contains. Called once per top-level
/// [`render`] and once per component recursion — fresh loop/conditional/
/// component stacks each time, so `content` is always scoped to the
/// innermost enclosing component.
fn render_into<B: Bridge, S: ComponentSource>(
    osh: &[u8],
    origin: &str,
    content: &[u8],
    bridge: &mut B,
    source: &mut S,
    options: &RenderOptions,
) -> RenderResult<Vec<u8>> {
    let view = ConstBuffer::new(osh);
    let mut output = Vec::new();
    let mut cursor = 0usize;

    let mut loop_stack: Vec<LoopFrame<B::Value, B::Backup>> = Vec::new();
    let mut cond_stack: Vec<CondFrame> = Vec::new();
    let mut component_stack: Vec<ComponentFrame> = Vec::new();

    while cursor < view.end() {
        let (name, value, next) =
            view.read_pair(cursor).map_err(|e| panic_err(origin, format!("malformed OSH pair at offset {cursor}: {e}")))?;
        let marker = name.first().copied().unwrap_or(0);

        match marker {
            Marker::PLAINTEXT => {
                output.extend_from_slice(value);
                cursor = next;
            }

            Marker::NORMAL => {
                if value.is_empty() {
                    // The `content` sentinel: re-emit the innermost enclosing
                    // component's invocation-site body, verbatim.
                    if content.is_empty() {
                        if options.throw_on_empty_content {
                            return Err(RenderingError::new(origin, Reason::NoContent, "pass a body to this component invocation"));
                        }
                    } else {
                        output.extend_from_slice(content);
                    }
                } else {
                    tracing::trace!(origin, "render: t");
                    match bridge.eval_template(value) {
                        Ok(Some(v)) => stringify(origin, value, &v, &mut output)?,
                        Ok(None) => {}
                        Err(e) => return Err(eval_err(origin, value, e)),
                    }
                }
                cursor = next;
            }

            Marker::VOID => {
                tracing::trace!(origin, "render: v");
                bridge.eval_void_template(value).map_err(|e| eval_err(origin, value, e))?;
                cursor = next;
            }

            Marker::CONDITIONAL | Marker::ELSE_CONDITIONAL => {
                let (expr, slots) = split_slots(value, 2);
                let end_off = slot_u32(slots, 0);
                let true_end_off = slot_u32(slots, 1);

                if marker == Marker::ELSE_CONDITIONAL {
                    let top = cond_stack.pop().ok_or_else(|| panic_err(origin, "conditional stack underflow at else-if"))?;
                    if top.last_true {
                        cursor = top.true_end_index;
                        continue;
                    }
                }

                let truth = bridge.eval_conditional_template(expr).map_err(|e| eval_err(origin, expr, e))?;
                tracing::debug!(origin, truth, "render: conditional push");
                cond_stack.push(CondFrame { last_true: truth, true_end_index: next + true_end_off });
                cursor = if truth { next } else { next + end_off };
            }

            Marker::ELSE => {
                let top = cond_stack.last().ok_or_else(|| panic_err(origin, "conditional stack underflow at else"))?;
                if top.last_true {
                    cursor = top.true_end_index;
                    cond_stack.pop();
                } else {
                    cursor = next;
                }
            }

            Marker::LOOP_FORWARD | Marker::LOOP_REVERSE => {
                let (packed, slots) = split_slots(value, 1);
                let forward_skip = slot_u32(slots, 0);
                let parts = bdp::unpack_values(packed, 2).map_err(|e| panic_err(origin, e.to_string()))?;
                let (iterator, iterable_expr) = (parts[0], parts[1]);

                let loop_iterable = bridge.init_loop_iterable(iterable_expr).map_err(|e| eval_err(origin, iterable_expr, e))?;
                if loop_iterable.length == 0 {
                    cursor = next + forward_skip;
                    continue;
                }

                let reverse = marker == Marker::LOOP_REVERSE;
                let index = if reverse { loop_iterable.length - 1 } else { 0 };
                let per_iteration_backup = options.clone_local_in_loops.then(|| bridge.backup_local(options.clone_backups));

                let frame = LoopFrame {
                    iterator: iterator.to_vec(),
                    iterable: loop_iterable.iterable,
                    keys: loop_iterable.keys,
                    is_array: loop_iterable.is_array,
                    index,
                    step: if reverse { -1 } else { 1 },
                    length: loop_iterable.length,
                    per_iteration_backup,
                };
                assign_iterator(bridge, options.clone_iterators, &frame);
                loop_stack.push(frame);
                cursor = next;
            }

            Marker::LOOP_END => {
                let (_, slots) = split_slots(value, 1);
                let back_off = slot_u32(slots, 0);
                let frame = loop_stack.last_mut().ok_or_else(|| panic_err(origin, "loop stack underflow"))?;

                if frame.has_next() {
                    if let Some(backup) = frame.per_iteration_backup.take() {
                        bridge.restore_local(backup);
                        frame.per_iteration_backup = Some(bridge.backup_local(options.clone_backups));
                    }
                    frame.index = (frame.index as isize + frame.step as isize) as usize;
                    assign_iterator(bridge, options.clone_iterators, frame);
                    cursor = next - back_off;
                } else {
                    let frame = loop_stack.pop().expect("checked non-empty above");
                    if let Some(backup) = frame.per_iteration_backup {
                        bridge.restore_local(backup);
                    }
                    bridge.unassign(&frame.iterator);
                    cursor = next;
                }
            }

            Marker::COMPONENT => {
                let (packed, slots) = split_slots(value, 1);
                let content_len = slot_u32(slots, 0);
                let parts = bdp::unpack_values(packed, 2).map_err(|e| panic_err(origin, e.to_string()))?;
                let (abs_path, context_expr) = (parts[0].to_vec(), parts[1].to_vec());

                if content_len == 0 {
                    let rendered = render_component(origin, &abs_path, &context_expr, b"", bridge, source, options)?;
                    output.extend_from_slice(&rendered);
                    component_stack.push(ComponentFrame::Done);
                } else {
                    component_stack.push(ComponentFrame::Pending { abs_path, context_expr, start_index: output.len() });
                }
                cursor = next;
            }

            Marker::COMPONENT_END => {
                match component_stack.pop().ok_or_else(|| panic_err(origin, "component stack underflow"))? {
                    ComponentFrame::Done => {}
                    ComponentFrame::Pending { abs_path, context_expr, start_index } => {
                        let invocation_content = output.split_off(start_index);
                        let rendered = render_component(origin, &abs_path, &context_expr, &invocation_content, bridge, source, options)?;
                        output.extend_from_slice(&rendered);
                    }
                }
                cursor = next;
            }

            Marker::CONDITIONAL_END => {
                cond_stack.pop().ok_or_else(|| panic_err(origin, "conditional stack underflow at chain end"))?;
                cursor = next;
            }

            other => return Err(panic_err(origin, format!("unknown OSH marker {other:#04x}"))),
        }
    }

    Ok(output)
}

/// Resolves and recursively renders a component invocation: backs up the
/// caller's `context`/`local`, initializes fresh ones scoped to the
/// component, renders its bytecode with `invocation_content` as `content`,
/// then restores the caller's backups.
#[allow(clippy::too_many_arguments)]
fn render_component<B: Bridge, S: ComponentSource>(
    origin: &str,
    abs_path: &[u8],
    context_expr: &[u8],
    invocation_content: &[u8],
    bridge: &mut B,
    source: &mut S,
    options: &RenderOptions,
) -> RenderResult<Vec<u8>> {
    let path_str = core::str::from_utf8(abs_path).map_err(|_| panic_err(origin, "component path is not valid UTF-8"))?;
    tracing::debug!(origin, component = path_str, "render: component enter");

    let osh = source.osh_for(path_str)?;

    let context_backup = bridge.backup_context(options.clone_backups);
    let local_backup = bridge.backup_local(options.clone_backups);
    bridge.init_context(context_expr).map_err(|e| eval_err(origin, context_expr, e))?;
    bridge.init_local();

    let rendered = render_into(&osh, path_str, invocation_content, bridge, source, options);

    bridge.restore_context(context_backup);
    bridge.restore_local(local_backup);

    tracing::debug!(origin, component = path_str, ok = rendered.is_ok(), "render: component exit");
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::LoopIterable;
    use eryn_compiler::{compile_string, CompilerOptions};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// A minimal `RenderValue`/`Bridge` pair over `serde_json::Value`,
    /// enough to exercise the decode loop's branches without pulling in a
    /// full expression language (see `eryn-eval` for that).
    #[derive(Clone, Debug, PartialEq)]
    struct V(serde_json::Value);

    impl RenderValue for V {
        fn is_string(&self) -> bool { self.0.is_string() }
        fn is_buffer(&self) -> bool { false }
        fn is_object(&self) -> bool { self.0.is_object() }
        fn is_array(&self) -> bool { self.0.is_array() }
        fn is_number(&self) -> bool { self.0.is_number() }
        fn is_boolean(&self) -> bool { self.0.is_boolean() }
        fn is_nullish(&self) -> bool { self.0.is_null() }
        fn as_bytes(&self) -> &[u8] { self.0.as_str().unwrap_or_default().as_bytes() }
        fn as_number_string(&self) -> String { self.0.to_string() }
        fn as_bool(&self) -> bool { self.0.as_bool().unwrap_or(false) }
        fn to_json_bytes(&self) -> Vec<u8> { serde_json::to_vec(&self.0).unwrap() }
    }

    /// A toy bridge whose "expressions" are just dotted paths into a JSON
    /// `local`/`context` object (`x`, `ctx.name`, literal JSON arrays), just
    /// enough to drive the renderer's own scenario tests.
    struct TestBridge {
        context: serde_json::Value,
        local: serde_json::Value,
    }

    impl TestBridge {
        fn new(context: serde_json::Value) -> Self {
            Self { context, local: serde_json::json!({}) }
        }

        fn lookup(&self, expr: &str) -> serde_json::Value {
            let expr = expr.trim();
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(expr) {
                if !matches!(v, serde_json::Value::String(_)) || expr.starts_with('"') {
                    return v;
                }
            }
            if let Some(rest) = expr.strip_prefix("ctx") {
                let mut cur = self.context.clone();
                for part in rest.trim_start_matches('.').split('.').filter(|s| !s.is_empty()) {
                    cur = cur.get(part).cloned().unwrap_or(serde_json::Value::Null);
                }
                return cur;
            }
            if let Some(v) = self.local.get(expr) {
                return v.clone();
            }
            self.context.get(expr).cloned().unwrap_or(serde_json::Value::Null)
        }
    }

    impl Bridge for TestBridge {
        type Value = V;
        type Backup = (serde_json::Value, serde_json::Value);

        fn eval_template(&mut self, expr: &[u8]) -> Result<Option<V>, String> {
            let s = core::str::from_utf8(expr).unwrap();
            Ok(Some(V(self.lookup(s))))
        }
        fn eval_void_template(&mut self, _expr: &[u8]) -> Result<(), String> { Ok(()) }
        fn eval_conditional_template(&mut self, expr: &[u8]) -> Result<bool, String> {
            let s = core::str::from_utf8(expr).unwrap().trim();
            if let Some(rest) = s.strip_prefix("x > ") {
                let n: i64 = rest.trim().parse().unwrap();
                return Ok(self.lookup("x").as_i64().unwrap_or(0) > n);
            }
            Ok(self.lookup(s).as_bool().unwrap_or(!self.lookup(s).is_null()))
        }
        fn init_loop_iterable(&mut self, expr: &[u8]) -> Result<LoopIterable<V>, String> {
            let s = core::str::from_utf8(expr).unwrap();
            let v = self.lookup(s);
            let arr = v.as_array().cloned().unwrap_or_default();
            let length = arr.len();
            Ok(LoopIterable { iterable: V(serde_json::Value::Array(arr)), keys: Vec::new(), is_array: true, length })
        }
        fn eval_iterator_array_assignment(&mut self, _clone: bool, iterator: &[u8], iterable: &V, index: usize) {
            let key = format!("__local__{}", core::str::from_utf8(iterator).unwrap());
            let elem = iterable.0.as_array().unwrap()[index].clone();
            self.local[key] = elem;
        }
        fn eval_iterator_object_assignment(&mut self, _clone: bool, _iterator: &[u8], _iterable: &V, _keys: &[String], _index: usize) {}
        fn unassign(&mut self, iterator: &[u8]) {
            let key = format!("__local__{}", core::str::from_utf8(iterator).unwrap());
            if let serde_json::Value::Object(map) = &mut self.local {
                map.remove(&key);
            }
        }
        fn copy_value(&self, _clone: bool, value: &V) -> V { value.clone() }
        fn backup_context(&mut self, _clone: bool) -> Self::Backup { (self.context.clone(), self.local.clone()) }
        fn backup_local(&mut self, _clone: bool) -> Self::Backup { (self.context.clone(), self.local.clone()) }
        fn init_context(&mut self, expr: &[u8]) -> Result<(), String> {
            let s = core::str::from_utf8(expr).unwrap().trim();
            self.context = if s.is_empty() { serde_json::json!({}) } else { serde_json::from_str(s).map_err(|e| e.to_string())? };
            Ok(())
        }
        fn init_local(&mut self) { self.local = serde_json::json!({}); }
        fn restore_context(&mut self, backup: Self::Backup) { self.context = backup.0; }
        fn restore_local(&mut self, backup: Self::Backup) { self.local = backup.1; }
    }

    struct NoComponents;
    impl ComponentSource for NoComponents {
        fn osh_for(&mut self, abs_path: &str) -> RenderResult<Vec<u8>> {
            Err(RenderingError::new(abs_path, Reason::MissingCacheEntry, "no components registered in this test"))
        }
    }

    struct MapComponents(HashMap<String, Vec<u8>>);
    impl ComponentSource for MapComponents {
        fn osh_for(&mut self, abs_path: &str) -> RenderResult<Vec<u8>> {
            self.0.get(abs_path).cloned().ok_or_else(|| RenderingError::new(abs_path, Reason::MissingCacheEntry, "compile this component first"))
        }
    }

    fn render_str(source_text: &str, context: serde_json::Value) -> String {
        let osh = compile_string(source_text, "t", &CompilerOptions::default()).unwrap();
        let mut bridge = TestBridge::new(context);
        let out = render(&osh, "t", &mut bridge, &mut NoComponents, &RenderOptions::default()).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn scenario_a_normal_template() {
        assert_eq!(render_str("Hello [|ctx.name|]!", serde_json::json!({"name": "World"})), "Hello World!");
    }

    #[test]
    fn scenario_b_conditional_true_and_false() {
        let src = "[|? x > 1 |]big[|: |]small[| end |]";
        assert_eq!(render_str(src, serde_json::json!({"x": 3})), "big");
        assert_eq!(render_str(src, serde_json::json!({"x": 0})), "small");
    }

    #[test]
    fn scenario_c_forward_and_reverse_loop() {
        let forward = "[|@ i : [10,20,30] |]<[|i|]>[| end |]";
        assert_eq!(render_str(forward, serde_json::json!({})), "<10><20><30>");
        let reverse = "[|@ i : [10,20,30] ~ |]<[|i|]>[| end |]";
        assert_eq!(render_str(reverse, serde_json::json!({})), "<30><20><10>");
    }

    #[test]
    fn scenario_d_escaped_delimiter_renders_literal() {
        assert_eq!(render_str(r"A\[|B|]C", serde_json::json!({})), "A[|B|]C");
    }

    #[test]
    fn plaintext_round_trips_with_no_delimiters() {
        assert_eq!(render_str("hello, world", serde_json::json!({})), "hello, world");
    }

    #[test]
    fn component_invocation_substitutes_context_and_content() {
        let card_src = "[name:[|ctx.name|]][|content|]";
        let card_osh = compile_string(card_src, "card.eryn", &CompilerOptions::default()).unwrap();

        let caller_opts = CompilerOptions::default();
        let caller_osh = compile_string("[|% /card.eryn : {\"name\":\"Z\"} |]hi[| end |]", "t", &caller_opts).unwrap();

        let mut components = HashMap::new();
        let resolved_path = caller_opts.working_dir.join("/card.eryn").to_string_lossy().into_owned();
        components.insert(resolved_path, card_osh);

        let mut bridge = TestBridge::new(serde_json::json!({}));
        let out = render(&caller_osh, "t", &mut bridge, &mut MapComponents(components), &RenderOptions::default()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[name:Z]hi");
    }

    #[test]
    fn missing_component_is_a_rendering_error() {
        let osh = compile_string("[|% /nope.eryn |][| end |]", "t", &CompilerOptions::default()).unwrap();
        let mut bridge = TestBridge::new(serde_json::json!({}));
        let err = render(&osh, "t", &mut bridge, &mut NoComponents, &RenderOptions::default()).unwrap_err();
        assert!(matches!(err.reason, Reason::MissingCacheEntry));
    }

    #[test]
    fn empty_content_in_childless_component_is_skipped_unless_configured() {
        let card_src = "[|content|]";
        let card_osh = compile_string(card_src, "card.eryn", &CompilerOptions::default()).unwrap();
        let caller_opts = CompilerOptions::default();
        let caller_osh = compile_string("[|% /card.eryn / |]", "t", &caller_opts).unwrap();
        let resolved_path = caller_opts.working_dir.join("/card.eryn").to_string_lossy().into_owned();

        let mut components = HashMap::new();
        components.insert(resolved_path.clone(), card_osh.clone());
        let mut bridge = TestBridge::new(serde_json::json!({}));
        let out = render(&caller_osh, "t", &mut bridge, &mut MapComponents(components), &RenderOptions::default()).unwrap();
        assert_eq!(out, Vec::<u8>::new());

        let mut components = HashMap::new();
        components.insert(resolved_path, card_osh);
        let mut bridge = TestBridge::new(serde_json::json!({}));
        let strict = RenderOptions { throw_on_empty_content: true, ..Default::default() };
        let err = render(&caller_osh, "t", &mut bridge, &mut MapComponents(components), &strict).unwrap_err();
        assert!(matches!(err.reason, Reason::NoContent));
    }
}
