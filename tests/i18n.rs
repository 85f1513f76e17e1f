//! `{% trans %}` blocks and the gettext callables, old-style and newstyle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use templar::ext::i18n::{install_gettext_callables, I18nExtension, Translations};
use templar::{Environment, ErrorKind, State, Value};

const TEMPLATES: &[(&str, &str)] = &[
    (
        "default.html",
        "<title>{{ page_title|default(_(\"missing\")) }}</title>{% block body %}{% endblock %}",
    ),
    (
        "child.html",
        "{% extends \"default.html\" %}{% block body %}{% trans %}watch out{% endtrans %}{% endblock %}",
    ),
    (
        "plural.html",
        "{% trans user_count %}One user online{% pluralize %}{{ user_count }} users online{% endtrans %}",
    ),
    (
        "plural2.html",
        "{% trans user_count=get_user_count() %}{{ user_count }}s{% pluralize %}{{ user_count }}p{% endtrans %}",
    ),
    ("stringformat.html", "{{ _(\"User: %(num)s\")|format(num=user_count) }}"),
];

const NEWSTYLE_TEMPLATES: &[(&str, &str)] = &[
    (
        "default.html",
        "<title>{{ page_title|default(_(\"missing\")) }}</title>{% block body %}{% endblock %}",
    ),
    (
        "child.html",
        "{% extends \"default.html\" %}{% block body %}{% trans %}watch out{% endtrans %}{% endblock %}",
    ),
    (
        "plural.html",
        "{% trans user_count %}One user online{% pluralize %}{{ user_count }} users online{% endtrans %}",
    ),
    ("stringformat.html", "{{ _(\"User: %(num)s\", num=user_count) }}"),
    ("ngettext.html", "{{ ngettext(\"%(num)s apple\", \"%(num)s apples\", apples) }}"),
    (
        "ngettext_long.html",
        "{% trans num=apples %}{{ num }} apple{% pluralize %}{{ num }} apples{% endtrans %}",
    ),
    ("pgettext.html", "{{ pgettext(\"fruit\", \"Apple\") }}"),
    (
        "npgettext.html",
        "{{ npgettext(\"fruit\", \"%(num)s apple\", \"%(num)s apples\", apples) }}",
    ),
    ("pgettext_block", "{% trans 'fruit' num=apples %}Apple{% endtrans %}"),
    (
        "npgettext_block",
        "{% trans 'fruit' num=apples %}{{ num }} apple{% pluralize %}{{ num }} apples{% endtrans %}",
    ),
    ("transvars1.html", "{% trans %}User: {{ num }}{% endtrans %}"),
    ("transvars2.html", "{% trans num=count %}User: {{ num }}{% endtrans %}"),
    ("transvars3.html", "{% trans count=num %}User: {{ count }}{% endtrans %}"),
    ("novars.html", "{% trans %}%(hello)s{% endtrans %}"),
    ("vars.html", "{% trans %}{{ foo }}%(foo)s{% endtrans %}"),
    ("explicitvars.html", "{% trans foo=\"42\" %}%(foo)s{% endtrans %}"),
];

/// The German catalog. `None` context entries are the unqualified translations.
fn german(message: &str, context: Option<&str>) -> Option<&'static str> {
    let translated = match (message, context) {
        ("missing", _) => "fehlend",
        ("watch out", _) => "pass auf",
        ("One user online", _) => "Ein Benutzer online",
        ("%(user_count)s users online", _) => "%(user_count)s Benutzer online",
        ("User: %(num)s", _) => "Benutzer: %(num)s",
        ("User: %(count)s", _) => "Benutzer: %(count)s",
        ("Apple", Some("fruit")) => "Apple",
        ("Apple", _) => "Apfel",
        ("%(num)s apple", Some("fruit")) => "%(num)s Apple",
        ("%(num)s apple", _) => "%(num)s Apfel",
        ("%(num)s apples", Some("fruit")) => "%(num)s Apples",
        ("%(num)s apples", _) => "%(num)s Äpfel",
        _ => return None,
    };
    Some(translated)
}

fn lookup(state: &State<'_>, message: &str, context: Option<&str>) -> String {
    let language = state.lookup("LANGUAGE");
    match language.as_str() {
        Some("de") => german(message, context).unwrap_or(message).to_string(),
        _ => message.to_string(),
    }
}

fn catalog() -> Translations {
    Translations::new(
        |state, message| Ok(lookup(state, message, None)),
        |state, singular, plural, n| Ok(lookup(state, if n == 1 { singular } else { plural }, None)),
    )
    .with_context(
        |state, context, message| Ok(lookup(state, message, Some(context))),
        |state, context, singular, plural, n| {
            Ok(lookup(state, if n == 1 { singular } else { plural }, Some(context)))
        },
    )
}

fn i18n_env(newstyle: bool, templates: &[(&str, &str)]) -> Environment {
    let mut env = Environment::new();
    env.add_extension(I18nExtension::new);
    install_gettext_callables(&mut env, catalog(), Some(newstyle));
    for (name, source) in templates {
        env.add_template(name, source).unwrap();
    }
    env
}

fn old_style() -> Environment {
    i18n_env(false, TEMPLATES)
}

fn newstyle() -> Environment {
    i18n_env(true, NEWSTYLE_TEMPLATES)
}

fn trimmed_env() -> Environment {
    let mut env = i18n_env(false, &[]);
    env.policies_mut().i18n_trimmed = true;
    env
}

fn render(env: &Environment, name: &str, ctx: serde_json::Value) -> String {
    env.get_template(name).unwrap().render(ctx).unwrap()
}

fn render_str(env: &Environment, source: &str) -> String {
    env.template_from_str(source).unwrap().render(()).unwrap()
}

mod old_style {
    use super::*;

    #[test]
    fn test_trans() {
        let out = render(&old_style(), "child.html", json!({"LANGUAGE": "de"}));
        assert_eq!(out, "<title>fehlend</title>pass auf");
    }

    #[test]
    fn test_trans_plural() {
        let env = old_style();
        let one = render(&env, "plural.html", json!({"LANGUAGE": "de", "user_count": 1}));
        let two = render(&env, "plural.html", json!({"LANGUAGE": "de", "user_count": 2}));
        assert_eq!(one, "Ein Benutzer online");
        assert_eq!(two, "2 Benutzer online");
    }

    #[test]
    fn test_trans_plural_with_functions() {
        let mut env = old_style();
        let called = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&called);
        env.add_global(
            "get_user_count",
            Value::from_function("get_user_count", move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from(1))
            }),
        );
        let out = render(&env, "plural2.html", json!({"LANGUAGE": "de"}));
        assert_eq!(out, "1s");
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_complex_plural() {
        let env = old_style();
        let out = render_str(
            &env,
            "{% trans foo=42, count=2 %}{{ count }} item{% pluralize count %}{{ count }} items{% endtrans %}",
        );
        assert_eq!(out, "2 items");

        let err = env
            .template_from_str("{% trans foo %}...{% pluralize bar %}...{% endtrans %}")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AssertionError);
    }

    #[test]
    fn test_trans_stringformatting() {
        let out = render(
            &old_style(),
            "stringformat.html",
            json!({"LANGUAGE": "de", "user_count": 5}),
        );
        assert_eq!(out, "Benutzer: 5");
    }

    #[test]
    fn test_trimmed() {
        let out = render_str(&old_style(), "{%- trans trimmed %}  hello\n  world  {% endtrans -%}");
        assert_eq!(out, "hello world");
    }

    #[test]
    fn test_trimmed_policy() {
        let source = "{%- trans %}  hello\n  world  {% endtrans -%}";
        assert_eq!(render_str(&old_style(), source), "  hello\n  world  ");
        assert_eq!(render_str(&trimmed_env(), source), "hello world");
    }

    #[test]
    fn test_trimmed_policy_override() {
        let out = render_str(
            &trimmed_env(),
            "{%- trans notrimmed %}  hello\n  world  {% endtrans -%}",
        );
        assert_eq!(out, "  hello\n  world  ");
    }

    #[test]
    fn test_trimmed_vars() {
        let out = render_str(
            &old_style(),
            "{%- trans trimmed x=\"world\" %}  hello\n  {{ x }} {% endtrans -%}",
        );
        assert_eq!(out, "hello world");
    }

    #[test]
    fn test_trimmed_as_variable_name_does_not_trim() {
        let out = render_str(
            &old_style(),
            "{%- trans trimmed = 'world' %}  hello\n  {{ trimmed }}  {% endtrans -%}",
        );
        assert_eq!(out, "  hello\n  world  ");
    }

    #[test]
    fn test_nested_trans_error() {
        let err = old_style()
            .template_from_str("{% trans %}foo{% trans %}{% endtrans %}")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
        assert!(err.message().contains("trans blocks can't be nested"), "{}", err.message());
    }

    #[test]
    fn test_trans_block_error() {
        let err = old_style()
            .template_from_str("{% trans %}foo{% wibble bar %}{% endwibble %}{% endtrans %}")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
        assert!(err.message().contains("saw `wibble`"), "{}", err.message());
    }

    #[test]
    fn test_trans_error_is_tagged_with_line() {
        let err = old_style()
            .template_from_str("line one\n{% trans %}{{ user.name }}{% endtrans %}")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
        assert_eq!(err.line(), Some(2));
    }
}

mod newstyle {
    use super::*;

    #[test]
    fn test_trans() {
        let out = render(&newstyle(), "child.html", json!({"LANGUAGE": "de"}));
        assert_eq!(out, "<title>fehlend</title>pass auf");
    }

    #[test]
    fn test_trans_plural() {
        let env = newstyle();
        let one = render(&env, "plural.html", json!({"LANGUAGE": "de", "user_count": 1}));
        let two = render(&env, "plural.html", json!({"LANGUAGE": "de", "user_count": 2}));
        assert_eq!(one, "Ein Benutzer online");
        assert_eq!(two, "2 Benutzer online");
    }

    #[test]
    fn test_complex_plural() {
        let out = render_str(
            &newstyle(),
            "{% trans foo=42, count=2 %}{{ count }} item{% pluralize count %}{{ count }} items{% endtrans %}",
        );
        assert_eq!(out, "2 items");
    }

    #[test]
    fn test_trans_stringformatting() {
        let out = render(
            &newstyle(),
            "stringformat.html",
            json!({"LANGUAGE": "de", "user_count": 5}),
        );
        assert_eq!(out, "Benutzer: 5");
    }

    #[test]
    fn test_newstyle_plural() {
        let env = newstyle();
        assert_eq!(render(&env, "ngettext.html", json!({"LANGUAGE": "de", "apples": 1})), "1 Apfel");
        assert_eq!(render(&env, "ngettext.html", json!({"LANGUAGE": "de", "apples": 5})), "5 Äpfel");
    }

    #[test]
    fn test_autoescape_support() {
        let mut env = Environment::new();
        env.add_extension(I18nExtension::new);
        install_gettext_callables(
            &mut env,
            Translations::new(
                |_, _| Ok("<strong>Wert: %(name)s</strong>".to_string()),
                |_, singular, _, _| Ok(singular.to_string()),
            ),
            Some(true),
        );
        let tmpl = env
            .template_from_str(
                "{% autoescape ae %}{{ gettext(\"foo\", name=\"<test>\") }}{% endautoescape %}",
            )
            .unwrap();
        assert_eq!(
            tmpl.render(json!({"ae": true})).unwrap(),
            "<strong>Wert: &lt;test&gt;</strong>"
        );
        assert_eq!(
            tmpl.render(json!({"ae": false})).unwrap(),
            "<strong>Wert: <test></strong>"
        );
    }

    #[test]
    fn test_num_used_twice() {
        let out = render(&newstyle(), "ngettext_long.html", json!({"apples": 5, "LANGUAGE": "de"}));
        assert_eq!(out, "5 Äpfel");
    }

    #[test]
    fn test_trans_vars() {
        let env = newstyle();
        assert_eq!(render(&env, "transvars1.html", json!({"num": 1, "LANGUAGE": "de"})), "Benutzer: 1");
        assert_eq!(render(&env, "transvars2.html", json!({"count": 23, "LANGUAGE": "de"})), "Benutzer: 23");
        assert_eq!(render(&env, "transvars3.html", json!({"num": 42, "LANGUAGE": "de"})), "Benutzer: 42");
    }

    #[test]
    fn test_novars_vars_escaping() {
        let env = newstyle();
        assert_eq!(render(&env, "novars.html", json!({})), "%(hello)s");
        assert_eq!(render(&env, "vars.html", json!({"foo": "42"})), "42%(foo)s");
        assert_eq!(render(&env, "explicitvars.html", json!({})), "%(foo)s");
    }

    #[test]
    fn test_context() {
        assert_eq!(render(&newstyle(), "pgettext.html", json!({"LANGUAGE": "de"})), "Apple");
    }

    #[test]
    fn test_context_plural() {
        let env = newstyle();
        assert_eq!(render(&env, "npgettext.html", json!({"LANGUAGE": "de", "apples": 1})), "1 Apple");
        assert_eq!(render(&env, "npgettext.html", json!({"LANGUAGE": "de", "apples": 5})), "5 Apples");
    }

    #[test]
    fn test_context_block() {
        assert_eq!(render(&newstyle(), "pgettext_block", json!({"LANGUAGE": "de"})), "Apple");
    }

    #[test]
    fn test_context_plural_block() {
        let env = newstyle();
        assert_eq!(render(&env, "npgettext_block", json!({"LANGUAGE": "de", "apples": 1})), "1 Apple");
        assert_eq!(render(&env, "npgettext_block", json!({"LANGUAGE": "de", "apples": 5})), "5 Apples");
    }

    #[test]
    fn test_untranslated_language_passes_through() {
        let out = render(&newstyle(), "ngettext.html", json!({"LANGUAGE": "en", "apples": 3}));
        assert_eq!(out, "3 apples");
    }
}
