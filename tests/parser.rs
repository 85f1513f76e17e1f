//! Parser structure checks through the fluent tree assertions.

use templar::testing::assert_template;
use templar::{Environment, ErrorKind};

fn parse(source: &str) -> templar::parsing::SyntaxTree {
    Environment::new().parse(source, Some("test.html")).unwrap()
}

#[test]
fn test_output_merges_data_and_expressions() {
    let tree = parse("Hello {{ name }}, {{ greeting|upper }}!");
    assert_template(&tree).stmt_count(1).stmt(0, |s| {
        s.assert_output()
            .node_count(5)
            .data(0, "Hello ")
            .expr(1, "name")
            .data(2, ", ")
            .expr(3, "filter")
            .data(4, "!");
    });
}

#[test]
fn test_elif_chains_nest_in_else_bodies() {
    let tree = parse("{% if a %}x{% elif b %}y{% else %}z{% endif %}");
    assert_template(&tree).stmt(0, |s| {
        s.assert_if().body_count(1).else_count(1).else_body(0, |elif| {
            elif.assert_if().body_count(1).else_count(1).else_body(0, |z| {
                z.assert_output().data(0, "z");
            });
        });
    });
}

#[test]
fn test_for_loop_with_filter_and_else() {
    let tree = parse("{% for k, v in items if v %}\n{{ k }}\n{% else %}none{% endfor %}");
    assert_template(&tree).stmt(0, |s| {
        s.line(1)
            .assert_for()
            .targets(&["k", "v"])
            .body_count(1)
            .body(0, |b| {
                b.line(1).assert_output().node_count(3).expr(1, "name");
            })
            .else_count(1);
    });
}

#[test]
fn test_statement_kinds() {
    let tree = parse(
        "{% set x = 1 %}{% set ns.a = 2 %}{% set y %}b{% endset %}\
         {% macro m(a, b=1) %}{{ a }}{% endmacro %}\
         {% call m(1) %}c{% endcall %}\
         {% filter upper %}f{% endfilter %}\
         {% with z = 3 %}{{ z }}{% endwith %}\
         {% autoescape true %}e{% endautoescape %}\
         {% include 'a.html' ignore missing %}\
         {% import 'b.html' as b %}{% from 'c.html' import d as e %}",
    );
    let kinds = [
        "set", "set", "set block", "macro", "call", "filter", "with", "autoescape", "include",
        "import", "from",
    ];
    assert_template(&tree).stmt_count(kinds.len());
    for (index, kind) in kinds.iter().enumerate() {
        assert_template(&tree).stmt(index, |s| {
            s.is(kind);
        });
    }
    assert_template(&tree)
        .stmt(0, |s| {
            s.assigns(&["x"]);
        })
        .stmt(2, |s| {
            s.assigns(&["y"]).assert_scope().body_count(1);
        })
        .stmt(3, |s| {
            s.assert_scope().body_count(1);
        });
}

#[test]
fn test_blocks_are_recorded_with_modifiers() {
    let tree = parse(
        "{% block head %}h{% endblock %}\
         {% for i in x %}{% block row scoped %}{{ i }}{% endblock row %}{% endfor %}\
         {% block foot required %}  {% endblock %}",
    );
    assert_template(&tree)
        .block_names(&["head", "row", "foot"])
        .block("head", |b| {
            b.scoped(false).required(false).body_count(1);
        })
        .block("row", |b| {
            b.scoped(true).body(0, |s| {
                s.assert_output().expr(0, "name");
            });
        })
        .block("foot", |b| {
            b.required(true);
        });
}

#[test]
fn test_line_numbers_follow_the_source() {
    let tree = parse("a\nb\n{% set x = 1 %}\n\n{% if x %}{% endif %}");
    assert_template(&tree)
        .stmt(0, |s| {
            s.is("output").line(1);
        })
        .stmt(1, |s| {
            s.is("set").line(3);
        })
        .stmt(3, |s| {
            s.is("if").line(5);
        });
}

#[test]
fn test_unknown_tag_mentions_expected_end() {
    let err = Environment::new()
        .parse("{% for x in y %}{% bogus %}{% endfor %}", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
    assert!(err.message().contains("'bogus'"), "{}", err.message());
    assert!(err.message().contains("'endfor'"), "{}", err.message());
}

#[test]
fn test_break_outside_loop_without_extension_is_unknown() {
    let err = Environment::new().parse("{% break %}", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
}

#[test]
fn test_errors_carry_name_and_line() {
    let err = Environment::new()
        .parse("ok\n\n{{ 1 + }}", Some("broken.html"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
    assert_eq!(err.name(), Some("broken.html"));
    assert_eq!(err.line(), Some(3));
}
