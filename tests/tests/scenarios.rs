//! End-to-end concrete rendering scenarios A-F, exercised through
//! `eryn-compiler` + `eryn-render` + `eryn-eval` via `Engine`.

use pretty_assertions::assert_eq;

use eryn_compiler::CompilerOptions;
use eryn_eval::{EvalState, Evaluator, Value};
use eryn_render::{Engine, RenderOptions};

fn render_str(source: &str, context: Value) -> String {
    let mut engine = Engine::new(CompilerOptions::default(), RenderOptions::default());
    engine.compile_string(source, "scenario").expect("compile");
    let mut bridge = EvalState::new(Evaluator::normal(), context, Value::object());
    let bytes = engine.render("scenario", &mut bridge).expect("render");
    String::from_utf8(bytes).expect("utf8 output")
}

fn obj(pairs: &[(&str, Value)]) -> Value {
    let mut map = indexmap::IndexMap::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    Value::Object(map)
}

#[test]
fn scenario_a_dotted_plaintext_substitution() {
    let out = render_str("Hello [|context.name|]!", obj(&[("name", Value::Str("World".to_string()))]));
    assert_eq!(out, "Hello World!");
}

#[test]
fn scenario_b_conditional_with_else() {
    let source = "[|? context.x > 1 |]big[|: |]small[| end |]";
    assert_eq!(render_str(source, obj(&[("x", Value::I64(3))])), "big");
    assert_eq!(render_str(source, obj(&[("x", Value::I64(0))])), "small");
}

#[test]
fn scenario_c_forward_and_reverse_loop() {
    let forward = "[|@ i : [10,20,30] |]<[|i|]>[| end |]";
    assert_eq!(render_str(forward, Value::object()), "<10><20><30>");

    let reverse = "[|@ i : [10,20,30] ~ |]<[|i|]>[| end |]";
    assert_eq!(render_str(reverse, Value::object()), "<30><20><10>");
}

#[test]
fn scenario_d_escaped_delimiter_renders_literal() {
    let out = render_str(r"A\[|B|]C", Value::object());
    assert_eq!(out, "A[|B|]C");
}

#[test]
fn scenario_e_component_invocation_substitutes_context_and_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("card"), "[name:[|context.name|]][|content|]").expect("write component");

    let compiler_options = CompilerOptions { working_dir: dir.path().to_path_buf(), ..CompilerOptions::default() };
    let mut engine = Engine::new(compiler_options, RenderOptions::default());

    engine.compile_string("[|% card : {name:\"Z\"} |]hi[| end |]", "caller").expect("compile caller");
    let mut bridge = EvalState::new(Evaluator::normal(), Value::object(), Value::object());
    let bytes = engine.render("caller", &mut bridge).expect("render");
    assert_eq!(String::from_utf8(bytes).unwrap(), "[name:Z]hi");
}

#[test]
fn scenario_f_nested_loop_shadows_outer_iterator() {
    let source = "[|@ x : [[1,2],[3]] |][|@ x : x |][|x|] [| end |][| end |]";
    assert_eq!(render_str(source, Value::object()), "1 2 3 ");
}
