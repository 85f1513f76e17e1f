//! Property-based checks: the tokenizer is total, rendering is deterministic, and escaping
//! never double-escapes.

use proptest::prelude::*;
use serde_json::json;
use templar::lexing::{tokenize, SyntaxConfig, WhitespaceConfig};
use templar::runtime::escape;
use templar::Environment;

fn fragment_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ,.!?\n]{1,12}",
        Just("{{ a }}".to_string()),
        Just("{{ b|upper }}".to_string()),
        Just("{{ a ~ b }}".to_string()),
        Just("{% if a %}A{% else %}B{% endif %}".to_string()),
        Just("{% for i in items %}{{ loop.index }}:{{ i }} {% endfor %}".to_string()),
        Just("{% set c = a ~ '!' %}{{ c }}".to_string()),
        Just("{# note #}".to_string()),
        Just("  {%- if true -%}  x  {%- endif -%}  ".to_string()),
    ]
}

fn template_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(fragment_strategy(), 0..8).prop_map(|parts| parts.concat())
}

fn text_strategy() -> impl Strategy<Value = String> {
    "[a-z<>&\"' ]{0,24}"
}

proptest! {
    #[test]
    fn test_tokenize_never_panics(input in "\\PC{0,64}") {
        let _ = tokenize(&input, &SyntaxConfig::default(), &WhitespaceConfig::default());
    }

    #[test]
    fn test_token_lines_never_decrease(input in template_strategy()) {
        let tokens = tokenize(&input, &SyntaxConfig::default(), &WhitespaceConfig::default()).unwrap();
        for pair in tokens.windows(2) {
            prop_assert!(pair[0].line <= pair[1].line);
        }
    }

    #[test]
    fn test_plain_text_renders_unchanged(text in "[a-zA-Z0-9 ,.!?]{0,40}") {
        let env = Environment::new();
        let out = env.template_from_str(&text).unwrap().render(()).unwrap();
        prop_assert_eq!(out, text);
    }

    #[test]
    fn test_rendering_is_deterministic(source in template_strategy(), a in text_strategy()) {
        let ctx = json!({"a": a, "b": "bee", "items": [1, 2, 3]});
        let env = Environment::new();
        let first = env.template_from_str(&source).unwrap();
        let second = env.template_from_str(&source).unwrap();
        let out = first.render(&ctx).unwrap();
        prop_assert_eq!(&out, &first.render(&ctx).unwrap());
        prop_assert_eq!(&out, &second.render(&ctx).unwrap());
    }

    #[test]
    fn test_escaping_is_idempotent_in_templates(text in text_strategy()) {
        let mut env = Environment::new();
        env.set_autoescape(true);
        let once = env.template_from_str("{{ s }}").unwrap().render(json!({"s": &text})).unwrap();
        let twice = env.template_from_str("{{ s|e|e }}").unwrap().render(json!({"s": &text})).unwrap();
        prop_assert_eq!(&once, &escape(&text));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_escape_output_has_no_markup(text in text_strategy()) {
        let escaped = escape(&text);
        prop_assert!(!escaped.contains(['<', '>', '"', '\'']));
        prop_assert_eq!(escaped.matches('&').count(), escaped.matches(';').count());
    }
}
