//! Property-based checks for the seven universal invariants.

use proptest::prelude::*;

use eryn_compiler::{compile_string, localize::localize_iterators, CompilerOptions};
use eryn_core::bdp::bytes_to_length;
use eryn_core::buffer::ConstBuffer;
use eryn_core::OSH_FORMAT;
use eryn_eval::{EvalState, Evaluator, Value};
use eryn_render::{render, ComponentSource, RenderOptions, RenderResult};

struct NoComponents;
impl ComponentSource for NoComponents {
    fn osh_for(&mut self, abs_path: &str) -> RenderResult<Vec<u8>> {
        Err(eryn_render::RenderingError::new(abs_path, eryn_render::Reason::MissingCacheEntry, "no components in this test"))
    }
}

fn render_plain(osh: &[u8]) -> Vec<u8> {
    let mut bridge = EvalState::new(Evaluator::normal(), Value::object(), Value::object());
    render(osh, "prop", &mut bridge, &mut NoComponents, &RenderOptions::default()).expect("render")
}

/// No `[`, `|`, `\` bytes: none of the default delimiters or escape byte
/// can occur, so the source round-trips through compile+render unchanged.
fn plaintext_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-zA-Z0-9 .,!\n]{0,64}").unwrap()
}

proptest! {
    /// 1. Round-trip on plaintext: no delimiters in the source means
    /// `render(compile(s)) == s`.
    #[test]
    fn plaintext_round_trips(s in plaintext_strategy()) {
        let osh = compile_string(&s, "prop", &CompilerOptions::default()).expect("compile");
        let out = render_plain(&osh);
        prop_assert_eq!(out, s.into_bytes());
    }

    /// 2. Escape ~= literal: an escaped delimiter renders as the bare
    /// delimiter, with the escape byte itself gone.
    #[test]
    fn escaped_delimiter_renders_as_literal(prefix in plaintext_strategy(), suffix in plaintext_strategy()) {
        let source = format!(r"{prefix}\[|{suffix}");
        let osh = compile_string(&source, "prop", &CompilerOptions::default()).expect("compile");
        let out = render_plain(&osh);
        let expected = format!("{prefix}[|{suffix}");
        prop_assert_eq!(out, expected.into_bytes());
    }

    /// 7. Loop termination: a forward loop over an N-element array array
    /// runs its body exactly N times.
    #[test]
    fn loop_runs_exactly_length_times(n in 0usize..12) {
        let items: Vec<String> = (0..n).map(|i| i.to_string()).collect();
        let iterable = format!("[{}]", items.join(","));
        let source = format!("[|@ i : {iterable} |]x[| end |]");
        let osh = compile_string(&source, "prop", &CompilerOptions::default()).expect("compile");
        let out = render_plain(&osh);
        prop_assert_eq!(out, "x".repeat(n).into_bytes());
    }

    /// 5. Idempotent localization: running the rewrite twice is a no-op
    /// beyond the first pass.
    #[test]
    fn localization_is_idempotent(ident in "[a-z][a-z0-9]{0,6}", noise in "[a-zA-Z0-9_. (){}+*/-]{0,24}") {
        let expr = format!("{ident} + {noise}");
        let once = localize_iterators(expr.as_bytes(), &[ident.as_bytes()]);
        let twice = localize_iterators(&once, &[ident.as_bytes()]);
        prop_assert_eq!(once, twice);
    }

    /// 6. Quote-respecting localization: an identifier inside a plain
    /// string literal is left untouched; the same identifier inside a
    /// template literal's `${...}` placeholder is rewritten.
    #[test]
    fn localization_respects_quotes(ident in "[a-z][a-z0-9]{0,6}") {
        let quoted = format!("'{ident}'");
        let out = localize_iterators(quoted.as_bytes(), &[ident.as_bytes()]);
        prop_assert_eq!(out, quoted.into_bytes());

        let templated = format!("`${{{ident}}}`");
        let out = localize_iterators(templated.as_bytes(), &[ident.as_bytes()]);
        let expected = format!("`${{__local__{ident}}}`");
        prop_assert_eq!(out, expected.into_bytes());
    }
}

/// 3/4. Nesting balance and jump-offset soundness, checked on a handful of
/// concrete well-nested conditional/loop templates by decoding the OSH
/// directly: every jump slot must land exactly where the matching
/// `C`/`L` pair sits in the byte stream.
#[test]
fn conditional_jump_offsets_land_on_matching_pairs() {
    let source = "[|? x |]a[|: |]b[| end |]tail";
    let osh = compile_string(source, "prop", &CompilerOptions::default()).expect("compile");
    let buf = ConstBuffer::new(&osh);

    let (name, value, body_at) = buf.read_pair(0).expect("first pair");
    assert_eq!(name[0], eryn_compiler::Marker::CONDITIONAL);
    let slot_start = value.len() - 2 * OSH_FORMAT;
    let end_off = bytes_to_length(&value[slot_start..slot_start + OSH_FORMAT], OSH_FORMAT);
    let true_end_off = bytes_to_length(&value[slot_start + OSH_FORMAT..slot_start + 2 * OSH_FORMAT], OSH_FORMAT);

    let (landed_name, _, _) = buf.read_pair(body_at + end_off).expect("landed pair at end_off");
    assert_eq!(landed_name[0], eryn_compiler::Marker::ELSE);

    let (after_chain_name, after_chain_value, _) = buf.read_pair(body_at + true_end_off).expect("landed pair at true_end_off");
    assert_eq!(after_chain_name[0], eryn_compiler::Marker::PLAINTEXT);
    assert_eq!(after_chain_value, b"tail");
}

#[test]
fn loop_back_offset_lands_past_loop_start_slots() {
    let source = "[|@ i : [1,2] |]x[| end |]";
    let osh = compile_string(source, "prop", &CompilerOptions::default()).expect("compile");
    let buf = ConstBuffer::new(&osh);

    let (name, _value, body_at) = buf.read_pair(0).expect("loop-start pair");
    assert_eq!(name[0], eryn_compiler::Marker::LOOP_FORWARD);

    let mut offset = body_at;
    let mut loop_end_body_at = None;
    while offset < buf.end() {
        let (name, _, next) = buf.read_pair(offset).expect("pair");
        if name[0] == eryn_compiler::Marker::LOOP_END {
            loop_end_body_at = Some(next);
        }
        offset = next;
    }
    let loop_end_body_at = loop_end_body_at.expect("a loop-end pair exists");
    let back_off = bytes_to_length(
        &buf.as_slice()[loop_end_body_at - OSH_FORMAT..loop_end_body_at],
        OSH_FORMAT,
    );
    assert_eq!(loop_end_body_at - back_off, body_at);
}
