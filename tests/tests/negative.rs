//! Malformed sources that must be rejected with the documented reason.

use eryn_compiler::{compile_string, CompilerOptions, Reason};

fn reason_of(source: &str) -> Reason {
    compile_string(source, "negative", &CompilerOptions::default()).expect_err("expected a compile error").reason
}

#[test]
fn unterminated_conditional_is_unexpected_eof() {
    assert!(matches!(reason_of("[|? cond"), Reason::UnexpectedEof));
}

#[test]
fn body_end_with_empty_template_stack_is_rejected() {
    assert!(matches!(reason_of("[| end |]"), Reason::UnexpectedTemplateBodyEnd));
}

#[test]
fn loop_missing_iterator_is_unexpected_separator() {
    assert!(matches!(reason_of("[|@ : expr |]x[| end |]"), Reason::UnexpectedSeparator));
}

#[test]
fn else_with_extra_content_expects_template_body_end() {
    let source = "[|? x |]Y[|: extra |]Z[| end |]";
    assert!(matches!(reason_of(source), Reason::ExpectedTemplateBodyEnd));
}
