//! Template inheritance, includes and imports across a loader.

use serde_json::json;
use templar::{Environment, ErrorKind, MapLoader, Source};

const LAYOUT: &str = "<title>{% block title %}Site{% endblock %}</title>\
                      <main>{% block body %}{% endblock %}</main>";

fn env_with(templates: &[(&str, &str)]) -> Environment {
    let mut env = Environment::new();
    env.set_loader(templates.iter().copied().collect::<MapLoader>());
    env
}

fn render(env: &Environment, name: &str, ctx: serde_json::Value) -> String {
    env.get_template(name).unwrap().render(ctx).unwrap()
}

#[test]
fn test_child_overrides_blocks() {
    let env = env_with(&[
        ("layout.html", LAYOUT),
        (
            "page.html",
            "{% extends 'layout.html' %}{% block body %}Hello {{ user }}{% endblock %}",
        ),
    ]);
    assert_eq!(
        render(&env, "page.html", json!({"user": "ann"})),
        "<title>Site</title><main>Hello ann</main>"
    );
}

#[test]
fn test_super_and_multilevel_inheritance() {
    let env = env_with(&[
        ("layout.html", LAYOUT),
        (
            "section.html",
            "{% extends 'layout.html' %}{% block title %}Docs - {{ super() }}{% endblock %}",
        ),
        (
            "page.html",
            "{% extends 'section.html' %}{% block title %}Intro | {{ super() }}{% endblock %}\
             {% block body %}text{% endblock %}",
        ),
    ]);
    assert_eq!(
        render(&env, "page.html", json!({})),
        "<title>Intro | Docs - Site</title><main>text</main>"
    );
}

#[test]
fn test_self_renders_blocks_again() {
    let env = env_with(&[(
        "page.html",
        "{% block title %}T{% endblock %}|{{ self.title() }}",
    )]);
    assert_eq!(render(&env, "page.html", json!({})), "T|T");
}

#[test]
fn test_scoped_blocks_see_loop_variables() {
    let env = env_with(&[
        (
            "list.html",
            "{% for item in items %}{% block item scoped %}{{ item }}{% endblock %}{% endfor %}",
        ),
        (
            "fancy.html",
            "{% extends 'list.html' %}{% block item %}[{{ item }}]{% endblock %}",
        ),
    ]);
    assert_eq!(render(&env, "fancy.html", json!({"items": [1, 2]})), "[1][2]");
}

#[test]
fn test_unscoped_blocks_do_not_see_loop_variables() {
    let env = env_with(&[(
        "list.html",
        "{% for item in [1, 2] %}{% block item %}[{{ item }}]{% endblock %}{% endfor %}",
    )]);
    assert_eq!(render(&env, "list.html", json!({})), "[][]");
}

#[test]
fn test_required_blocks() {
    let env = env_with(&[
        ("base.html", "{% block body required %}{% endblock %}"),
        ("child.html", "{% extends 'base.html' %}{% block body %}ok{% endblock %}"),
    ]);
    assert_eq!(render(&env, "child.html", json!({})), "ok");
    let err = env.get_template("base.html").unwrap().render(()).unwrap_err();
    assert!(err.message().contains("Required block 'body'"), "{}", err.message());
}

#[test]
fn test_required_block_must_be_empty() {
    let err = Environment::new()
        .template_from_str("{% block body required %}text{% endblock %}")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
}

#[test]
fn test_top_level_set_is_visible_to_blocks() {
    let env = env_with(&[
        ("layout.html", LAYOUT),
        (
            "page.html",
            "{% extends 'layout.html' %}{% set who = 'ann' %}{% block body %}{{ who }}{% endblock %}",
        ),
    ]);
    assert_eq!(render(&env, "page.html", json!({})), "<title>Site</title><main>ann</main>");
}

#[test]
fn test_dynamic_extends() {
    let env = env_with(&[
        ("a.html", "A{% block b %}{% endblock %}"),
        ("b.html", "B{% block b %}{% endblock %}"),
        ("child.html", "{% extends parent %}{% block b %}!{% endblock %}"),
    ]);
    assert_eq!(render(&env, "child.html", json!({"parent": "a.html"})), "A!");
    assert_eq!(render(&env, "child.html", json!({"parent": "b.html"})), "B!");
}

#[test]
fn test_extends_placement_errors() {
    let env = Environment::new();
    let err = env
        .template_from_str("{% extends 'a' %}{% extends 'b' %}")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AssertionError);

    let err = env
        .template_from_str("{% if true %}{% extends 'a' %}{% endif %}")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxError);

    let err = env
        .template_from_str("{% block a %}{% endblock %}{% block a %}{% endblock %}")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AssertionError);
    assert!(err.message().contains("defined twice"));
}

#[test]
fn test_endblock_name_must_match() {
    let err = Environment::new()
        .template_from_str("{% block a %}{% endblock b %}")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
    assert_eq!(
        Environment::new()
            .template_from_str("{% block a %}x{% endblock a %}")
            .unwrap()
            .render(())
            .unwrap(),
        "x"
    );
}

#[test]
fn test_include_with_and_without_context() {
    let env = env_with(&[
        ("header.html", "[{{ title|default('none') }}]"),
        ("with.html", "{% include 'header.html' %}"),
        ("without.html", "{% include 'header.html' without context %}"),
    ]);
    assert_eq!(render(&env, "with.html", json!({"title": "T"})), "[T]");
    assert_eq!(render(&env, "without.html", json!({"title": "T"})), "[none]");
}

#[test]
fn test_include_sees_loop_variables() {
    let env = env_with(&[
        ("item.html", "<{{ item }}>"),
        ("list.html", "{% for item in [1, 2] %}{% include 'item.html' %}{% endfor %}"),
    ]);
    assert_eq!(render(&env, "list.html", json!({})), "<1><2>");
}

#[test]
fn test_include_missing_templates() {
    let env = env_with(&[
        ("fallback.html", "fallback"),
        ("ignore.html", "a{% include 'nope.html' ignore missing %}b"),
        ("choice.html", "{% include ['nope.html', 'fallback.html'] %}"),
        ("broken.html", "{% include 'nope.html' %}"),
    ]);
    assert_eq!(render(&env, "ignore.html", json!({})), "ab");
    assert_eq!(render(&env, "choice.html", json!({})), "fallback");
    let err = env.get_template("broken.html").unwrap().render(()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
    assert!(err.message().contains("nope.html"));
}

#[test]
fn test_import_and_from_import() {
    let env = env_with(&[
        (
            "forms.html",
            "{% macro input(name, type='text') %}<input type=\"{{ type }}\" name=\"{{ name }}\">{% endmacro %}\
             {% set version = 2 %}",
        ),
        ("module.html", "{% import 'forms.html' as forms %}{{ forms.input('q') }}|{{ forms.version }}"),
        ("names.html", "{% from 'forms.html' import input as field, version %}{{ field('p', type='password') }}|{{ version }}"),
    ]);
    assert_eq!(
        render(&env, "module.html", json!({})),
        "<input type=\"text\" name=\"q\">|2"
    );
    assert_eq!(
        render(&env, "names.html", json!({})),
        "<input type=\"password\" name=\"p\">|2"
    );
}

#[test]
fn test_import_is_without_context_by_default() {
    let env = env_with(&[
        ("helpers.html", "{% macro who() %}{{ user|default('nobody') }}{% endmacro %}"),
        ("plain.html", "{% import 'helpers.html' as h %}{{ h.who() }}"),
        ("ctx.html", "{% import 'helpers.html' as h with context %}{{ h.who() }}"),
    ]);
    assert_eq!(render(&env, "plain.html", json!({"user": "ann"})), "nobody");
    assert_eq!(render(&env, "ctx.html", json!({"user": "ann"})), "ann");
}

#[test]
fn test_missing_template() {
    let env = env_with(&[]);
    let err = env.get_template("nope.html").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
}

#[test]
fn test_closure_loader_and_syntax_error_location() {
    let mut env = Environment::new();
    env.set_loader(|name: &str| {
        (name == "bad.html").then(|| Source::new("line\n{% for %}").with_filename("templates/bad.html"))
    });
    let err = env.get_template("bad.html").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
    assert_eq!(err.name(), Some("bad.html"));
    assert_eq!(err.line(), Some(2));
}

#[test]
fn test_most_derived_block_wins_across_three_levels() {
    let env = env_with(&[
        ("grandparent.html", "<{% block body %}grandparent{% endblock %}>"),
        ("parent.html", "{% extends 'grandparent.html' %}"),
        ("child.html", "{% extends 'parent.html' %}{% block body %}child{% endblock %}"),
    ]);
    assert_eq!(render(&env, "child.html", json!({})), "<child>");
    assert_eq!(render(&env, "parent.html", json!({})), "<grandparent>");
}
