//! End-to-end scenarios: compile template modules and execute them
//! against JSON data or serializable records.

use hop::{Compiler, Error, Program, Value};
use serde::Serialize;
use serde_json::json;

fn compile(modules: &[(&str, &str)]) -> Result<Program, Error> {
    let mut compiler = Compiler::new();
    for (name, source) in modules {
        compiler.add_module(*name, *source);
    }
    compiler.compile()
}

fn run(program: &Program, module: &str, function: &str, data: &Value) -> Result<String, Error> {
    let mut out = Vec::new();
    program.execute_value(&mut out, module, function, data)?;
    Ok(String::from_utf8(out).expect("output is valid UTF-8"))
}

/// Compile a single `main` module and execute its `main` function.
fn render_main(source: &str, data: &Value) -> Result<String, Error> {
    let program = compile(&[("main", source)])?;
    run(&program, "main", "main", data)
}

#[test]
fn for_each_over_records() {
    let output = render_main(
        r#"<function name="main" params-as="items"><for each="items" as="i"><div inner-text="i.title"></div></for></function>"#,
        &json!([{"title": "foo"}, {"title": "bar"}]),
    )
    .unwrap();
    assert_eq!(output, "<div>foo</div><div>bar</div>");
}

#[test]
fn for_without_binding_repeats_children() {
    let output = render_main(
        r#"<function name="main" params-as="items"><for each="items"><li>x</li></for></function>"#,
        &json!([1, 2, 3]),
    )
    .unwrap();
    assert_eq!(output, "<li>x</li><li>x</li><li>x</li>");
}

#[test]
fn cross_module_render() {
    let program = compile(&[
        (
            "card",
            r#"<function name="card" params-as="x"><p inner-text="x.t"></p></function>"#,
        ),
        (
            "main",
            r#"<import from="card" function="card"/><function name="main" params-as="d"><render function="card" params="d.c"/></function>"#,
        ),
    ])
    .unwrap();
    let output = run(&program, "main", "main", &json!({"c": {"t": "hi"}})).unwrap();
    assert_eq!(output, "<p>hi</p>");
}

#[test]
fn typing_failure_points_at_attribute_value() {
    let err = compile(&[(
        "main",
        r#"<function name="main" params-as="x"><div inner-text="x.n"></div><if true="x.n"><p></p></if></function>"#,
    )])
    .unwrap_err();
    assert_eq!(err.kind(), "type error");
    let span = err.span().expect("type errors carry spans");
    // The span covers the x.n inside true="x.n".
    assert_eq!(span.start.line, 1);
    assert_eq!(span.end.column - span.start.column, 3);
    assert!(
        err.to_string().contains("condition must be boolean"),
        "{err}"
    );
}

#[test]
fn rawtext_script_passes_through() {
    let output = render_main(
        r#"<function name="main"><script>let a = "<div>"</script></function>"#,
        &json!(null),
    )
    .unwrap();
    assert_eq!(output, r#"<script>let a = "<div>"</script>"#);
}

#[test]
fn function_cycle_is_a_compile_error() {
    let err = compile(&[(
        "main",
        r#"<function name="a"><render function="b"/></function><function name="b"><render function="a"/></function>"#,
    )])
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "cycle error: cycle detected among functions: a, b"
    );
}

#[test]
fn union_accepts_number_inner_text() {
    let output = render_main(
        r#"<function name="main" params-as="x"><div inner-text="x"></div></function>"#,
        &json!(7),
    )
    .unwrap();
    assert_eq!(output, "<div>7</div>");
}

#[test]
fn union_rejects_boolean_inner_text_at_compile_time() {
    // x is pinned boolean by the condition, so the text binding fails.
    let err = compile(&[(
        "main",
        r#"<function name="main" params-as="x"><if true="x"><p></p></if><div inner-text="x"></div></function>"#,
    )])
    .unwrap_err();
    assert_eq!(err.kind(), "type error");
    assert!(
        err.to_string().contains("invalid type for inner-text binding"),
        "{err}"
    );
}

#[test]
fn render_binds_children() {
    let program = compile(&[(
        "main",
        r#"<function name="wrap"><div class="box"><children></children></div></function><function name="main" params-as="d"><render function="wrap"><b inner-text="d.x"></b></render></function>"#,
    )])
    .unwrap();
    let output = run(&program, "main", "main", &json!({"x": "inside"})).unwrap();
    assert_eq!(output, r#"<div class="box"><b>inside</b></div>"#);
}

#[test]
fn children_can_be_spliced_twice() {
    let program = compile(&[(
        "main",
        r#"<function name="twice"><children></children><children></children></function><function name="main"><render function="twice"><i>x</i></render></function>"#,
    )])
    .unwrap();
    let output = run(&program, "main", "main", &json!(null)).unwrap();
    assert_eq!(output, "<i>x</i><i>x</i>");
}

#[test]
fn children_without_binding_is_empty() {
    let output = render_main(
        r#"<function name="main"><div><children></children></div></function>"#,
        &json!(null),
    )
    .unwrap();
    assert_eq!(output, "<div></div>");
}

#[test]
fn fragment_splices_without_wrapper() {
    let output = render_main(
        r#"<function name="main" params-as="d"><fragment><em inner-text="d.a"></em><em inner-text="d.b"></em></fragment></function>"#,
        &json!({"a": "1", "b": "2"}),
    )
    .unwrap();
    assert_eq!(output, "<em>1</em><em>2</em>");
}

#[test]
fn fragment_inner_text_makes_a_bare_text_node() {
    let output = render_main(
        r#"<function name="main" params-as="d"><fragment inner-text="d.msg"></fragment></function>"#,
        &json!({"msg": "plain"}),
    )
    .unwrap();
    assert_eq!(output, "plain");
}

#[test]
fn if_true_renders_children() {
    let source = r#"<function name="main" params-as="d"><if true="d.on"><span>yes</span></if></function>"#;
    assert_eq!(
        render_main(source, &json!({"on": true})).unwrap(),
        "<span>yes</span>"
    );
    assert_eq!(render_main(source, &json!({"on": false})).unwrap(), "");
}

#[test]
fn dynamic_attributes() {
    let output = render_main(
        r#"<function name="main" params-as="d"><a attr-href="d.url" attr-tabindex="d.order">go</a></function>"#,
        &json!({"url": "/home", "order": 3}),
    )
    .unwrap();
    assert_eq!(output, r#"<a href="/home" tabindex="3">go</a>"#);
}

#[test]
fn static_attributes_pass_through() {
    let output = render_main(
        r#"<function name="main"><input type="text" disabled></function>"#,
        &json!(null),
    )
    .unwrap();
    assert_eq!(output, r#"<input type="text" disabled>"#);
}

#[test]
fn inner_text_replaces_children() {
    let output = render_main(
        r#"<function name="main" params-as="d"><div inner-text="d.t"><span>never shown</span></div></function>"#,
        &json!({"t": "shown"}),
    )
    .unwrap();
    assert_eq!(output, "<div>shown</div>");
}

#[test]
fn number_formatting() {
    let output = render_main(
        r#"<function name="main" params-as="d"><i inner-text="d.int"></i><i inner-text="d.whole"></i><i inner-text="d.frac"></i></function>"#,
        &json!({"int": 42, "whole": 2.0, "frac": 2.5}),
    )
    .unwrap();
    assert_eq!(output, "<i>42</i><i>2</i><i>2.5</i>");
}

#[test]
fn nested_for_loops() {
    let output = render_main(
        r#"<function name="main" params-as="rows"><for each="rows" as="row"><tr><for each="row.cells" as="c"><td inner-text="c"></td></for></tr></for></function>"#,
        &json!([{"cells": ["a", "b"]}, {"cells": ["c"]}]),
    )
    .unwrap();
    assert_eq!(
        output,
        "<tr><td>a</td><td>b</td></tr><tr><td>c</td></tr>"
    );
}

#[test]
fn array_indexing() {
    let output = render_main(
        r#"<function name="main" params-as="d"><b inner-text="d.xs[1]"></b></function>"#,
        &json!({"xs": ["zero", "one"]}),
    )
    .unwrap();
    assert_eq!(output, "<b>one</b>");
}

#[derive(Serialize)]
struct Article {
    title: String,
    #[serde(rename = "readingTime")]
    reading_time: u32,
}

#[derive(Serialize)]
struct Page {
    articles: Vec<Article>,
}

#[test]
fn native_records_use_serde_field_names() {
    let program = compile(&[(
        "main",
        r#"<function name="main" params-as="page"><for each="page.articles" as="a"><h2 inner-text="a.title"></h2><small inner-text="a.readingTime"></small></for></function>"#,
    )])
    .unwrap();

    let page = Page {
        articles: vec![
            Article {
                title: "Hello".to_string(),
                reading_time: 4,
            },
            Article {
                title: "World".to_string(),
                reading_time: 7,
            },
        ],
    };

    let mut out = Vec::new();
    program.execute(&mut out, "main", "main", &page).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "<h2>Hello</h2><small>4</small><h2>World</h2><small>7</small>"
    );
}

#[test]
fn runtime_index_out_of_bounds() {
    let err = render_main(
        r#"<function name="main" params-as="d"><b inner-text="d.xs[5]"></b></function>"#,
        &json!({"xs": [1, 2]}),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "runtime error: array index out of bounds: 5");
}

#[test]
fn runtime_key_not_found() {
    let err = render_main(
        r#"<function name="main" params-as="d"><b inner-text="d.title"></b></function>"#,
        &json!({}),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "runtime error: key not found: title");
}

#[test]
fn runtime_condition_must_be_boolean() {
    let err = render_main(
        r#"<function name="main" params-as="d"><if true="d.flag"><p></p></if></function>"#,
        &json!({"flag": 1}),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "runtime error: cannot use '1' of type number as condition in if"
    );
}

#[test]
fn runtime_for_over_non_array() {
    let err = render_main(
        r#"<function name="main" params-as="d"><for each="d.items" as="i"><p></p></for></function>"#,
        &json!({"items": "nope"}),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "runtime error: cannot iterate over '\"nope\"' of type string"
    );
}

#[test]
fn runtime_inner_text_rejects_objects() {
    let err = render_main(
        r#"<function name="main" params-as="d"><b inner-text="d.x"></b></function>"#,
        &json!({"x": {"nested": true}}),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "runtime error: cannot assign '{\"nested\":true}' of type object as inner text"
    );
}

#[test]
fn executing_unknown_module_or_function() {
    let program = compile(&[("main", r#"<function name="main"></function>"#)]).unwrap();

    let err = run(&program, "other", "main", &json!(null)).unwrap_err();
    assert_eq!(err.to_string(), "runtime error: no module with name other");

    let err = run(&program, "main", "missing", &json!(null)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "runtime error: no function with name missing in module main"
    );
}

#[test]
fn scope_does_not_leak_across_iterations() {
    // Each iteration binds its own scope; a later sibling lookup of the
    // loop variable must still fail to compile.
    let err = compile(&[(
        "main",
        r#"<function name="main" params-as="items"><for each="items" as="i"></for><div inner-text="i"></div></function>"#,
    )])
    .unwrap_err();
    assert_eq!(err.kind(), "type error");
    assert!(err.to_string().contains("undefined variable 'i'"), "{err}");
}

#[test]
fn whitespace_text_nodes_are_preserved() {
    let output = render_main(
        "<function name=\"main\">\n  <p>x</p>\n</function>",
        &json!(null),
    )
    .unwrap();
    assert_eq!(output, "\n  <p>x</p>\n");
}

#[test]
fn program_is_reusable_across_executions() {
    let program = compile(&[(
        "main",
        r#"<function name="main" params-as="d"><b inner-text="d.n"></b></function>"#,
    )])
    .unwrap();
    assert_eq!(run(&program, "main", "main", &json!({"n": 1})).unwrap(), "<b>1</b>");
    assert_eq!(run(&program, "main", "main", &json!({"n": 2})).unwrap(), "<b>2</b>");
}

#[test]
fn render_without_params_requires_void_function() {
    let err = compile(&[(
        "main",
        r#"<function name="card" params-as="x"><p inner-text="x.t"></p></function><function name="main"><render function="card"/></function>"#,
    )])
    .unwrap_err();
    assert_eq!(err.kind(), "type error");
    assert!(
        err.to_string()
            .contains("missing attribute params in render call for card"),
        "{err}"
    );
}

#[test]
fn render_params_must_match_inferred_type() {
    let err = compile(&[(
        "main",
        r#"<function name="flag" params-as="x"><if true="x"><p></p></if></function><function name="main" params-as="d"><div inner-text="d.name"></div><render function="flag" params="d.name"/></function>"#,
    )])
    .unwrap_err();
    assert_eq!(err.kind(), "type error");
    assert!(
        err.to_string()
            .contains("invalid parameter type for function 'flag'"),
        "{err}"
    );
}
