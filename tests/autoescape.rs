//! Autoescaping: the environment default, `{% autoescape %}` scopes, volatile scopes and
//! per-template selection.

use rstest::rstest;
use serde_json::json;
use templar::{Environment, SettingsLoader};

fn env_with_autoescape(on: bool) -> Environment {
    let mut env = Environment::new();
    env.set_autoescape(on);
    env
}

fn words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

#[test]
fn test_scoped_setting() {
    let source = "
            {{ \"<HelloWorld>\" }}
            {% autoescape false %}
                {{ \"<HelloWorld>\" }}
            {% endautoescape %}
            {{ \"<HelloWorld>\" }}
        ";
    let out = env_with_autoescape(true).template_from_str(source).unwrap().render(()).unwrap();
    assert_eq!(words(&out), ["&lt;HelloWorld&gt;", "<HelloWorld>", "&lt;HelloWorld&gt;"]);

    let source = source.replace("autoescape false", "autoescape true");
    let out = env_with_autoescape(false).template_from_str(&source).unwrap().render(()).unwrap();
    assert_eq!(words(&out), ["<HelloWorld>", "&lt;HelloWorld&gt;", "<HelloWorld>"]);
}

#[test]
fn test_nonvolatile() {
    let env = env_with_autoescape(true);
    let out = env
        .template_from_str("{{ {\"foo\": \"<test>\"}|xmlattr|escape }}")
        .unwrap()
        .render(())
        .unwrap();
    assert_eq!(out, " foo=\"&lt;test&gt;\"");

    let out = env
        .template_from_str(
            "{% autoescape false %}{{ {\"foo\": \"<test>\"}|xmlattr|escape }}{% endautoescape %}",
        )
        .unwrap()
        .render(())
        .unwrap();
    assert_eq!(out, " foo=&#34;&amp;lt;test&amp;gt;&#34;");
}

#[rstest]
#[case(false, " foo=&#34;&amp;lt;test&amp;gt;&#34;")]
#[case(true, " foo=\"&lt;test&gt;\"")]
fn test_volatile(#[case] flag: bool, #[case] expected: &str) {
    let tmpl_env = env_with_autoescape(true);
    let tmpl = tmpl_env
        .template_from_str(
            "{% autoescape foo %}{{ {\"foo\": \"<test>\"}|xmlattr|escape }}{% endautoescape %}",
        )
        .unwrap();
    assert_eq!(tmpl.render(json!({ "foo": flag })).unwrap(), expected);
}

#[test]
fn test_scoping() {
    let out = Environment::new()
        .template_from_str(
            "{% autoescape true %}{% set x = \"<x>\" %}{{ x }}{% endautoescape %}{{ x }}{{ \"<y>\" }}",
        )
        .unwrap()
        .render(json!({"x": 1}))
        .unwrap();
    assert_eq!(out, "&lt;x&gt;1<y>");
}

#[rstest]
#[case(true, "[&lt;a&gt;]")]
#[case(false, "[<a>]")]
fn test_volatile_macro_scoping(#[case] flag: bool, #[case] expected: &str) {
    let env = Environment::new();
    let tmpl = env
        .template_from_str(
            "{% autoescape val %}{% macro foo(x) %}[{{ x }}]{% endmacro %}{{ foo('<a>') }}{% endautoescape %}",
        )
        .unwrap();
    assert_eq!(tmpl.render(json!({ "val": flag })).unwrap(), expected);
}

#[test]
fn test_autoescape_macros() {
    let out = env_with_autoescape(false)
        .template_from_str(
            "{% macro m() %}<html>{% endmacro %}{% autoescape true %}{{ m() }}{% endautoescape %}",
        )
        .unwrap()
        .render(())
        .unwrap();
    assert_eq!(out, "<html>");
}

#[test]
fn test_macro_output_follows_the_call_site() {
    let env = env_with_autoescape(false);
    let out = env
        .template_from_str(
            "{% autoescape true %}{% macro m(x) %}<{{ x }}>{% endmacro %}{% endautoescape %}\
             {{ m('&') }}|{% autoescape true %}{{ m('&') }}{% endautoescape %}",
        )
        .unwrap()
        .render(())
        .unwrap();
    assert_eq!(out, "<&amp;>|<&amp;>");

    let out = env_with_autoescape(true)
        .template_from_str("{% macro m() %}<b>{% endmacro %}{{ m() }}|{% autoescape false %}{{ m() }}{% endautoescape %}")
        .unwrap()
        .render(())
        .unwrap();
    assert_eq!(out, "<b>|<b>");
}

#[test]
fn test_safe_values_are_not_escaped_twice() {
    let out = env_with_autoescape(true)
        .template_from_str("{{ '<b>'|safe }}{{ '<b>'|e }}{{ '<b>'|e|e }}")
        .unwrap()
        .render(())
        .unwrap();
    assert_eq!(out, "<b>&lt;b&gt;&lt;b&gt;");
}

#[test]
fn test_selection_by_template_name() {
    let settings = SettingsLoader::new()
        .with_toml("[autoescape]\nenabled_extensions = ['html', '.XML']")
        .build()
        .unwrap();
    let env = Environment::from_settings(&settings).unwrap();
    assert!(env.autoescape_for("index.html"));
    assert!(env.autoescape_for("feed.xml"));
    assert!(!env.autoescape_for("notes.txt"));
    assert!(!env.autoescape_for(templar::environment::STRING_TEMPLATE_NAME));

    env.add_template("page.html", "{{ body }}").unwrap();
    env.add_template("page.txt", "{{ body }}").unwrap();
    let ctx = json!({"body": "<p>"});
    assert_eq!(env.get_template("page.html").unwrap().render(&ctx).unwrap(), "&lt;p&gt;");
    assert_eq!(env.get_template("page.txt").unwrap().render(&ctx).unwrap(), "<p>");
}

#[test]
fn test_selection_callback() {
    let mut env = Environment::new();
    env.set_autoescape_callback(|name| name.is_some_and(|n| n.starts_with("safe/")));
    env.add_template("safe/a", "{{ v }}").unwrap();
    env.add_template("raw/a", "{{ v }}").unwrap();
    let ctx = json!({"v": "&"});
    assert_eq!(env.get_template("safe/a").unwrap().render(&ctx).unwrap(), "&amp;");
    assert_eq!(env.get_template("raw/a").unwrap().render(&ctx).unwrap(), "&");
}
