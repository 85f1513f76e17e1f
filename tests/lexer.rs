//! Tokenizer output for representative templates, checked with snapshots.

use templar::lexing::{tokenize, SyntaxConfig, Token, WhitespaceConfig};
use templar::{Environment, ErrorKind};

/// One token per line: `<line> <kind>`.
fn render_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| format!("{} {:?}", t.line, t.kind))
        .collect::<Vec<_>>()
        .join("\n")
}

fn lex(source: &str) -> String {
    let tokens = tokenize(source, &SyntaxConfig::default(), &WhitespaceConfig::default()).unwrap();
    render_tokens(&tokens)
}

#[test]
fn test_variable_in_data() {
    insta::assert_snapshot!("variable_in_data", lex("Hello {{ name }}!"));
}

#[test]
fn test_loop_over_lines() {
    insta::assert_snapshot!(
        "loop_over_lines",
        lex("{% for x in items %}\n{{ x|upper }}\n{% endfor %}")
    );
}

#[test]
fn test_literals() {
    insta::assert_snapshot!(
        "literals",
        lex(r#"{{ 'a\'b' "c" 1_000 2.5e1 [1, 2] }}"#)
    );
}

#[test]
fn test_whitespace_control_and_comments() {
    insta::assert_snapshot!(
        "whitespace_control_and_comments",
        lex("a  {%- if x -%}  b{# note #}\n{{ y }}")
    );
}

#[test]
fn test_environment_tokenize_runs_extensions() {
    let env = Environment::new();
    let tokens = env.tokenize("{{ a }}", None).unwrap();
    insta::assert_snapshot!("environment_tokenize", render_tokens(&tokens));
}

#[test]
fn test_lexing_errors() {
    let cases = [
        ("{{ 'open }}", "unterminated string"),
        ("{{ (1 }}", "unexpected"),
        ("{{ 1 ? 2 }}", "unexpected char"),
        ("{% raw %}never closed", "missing end of raw directive"),
    ];
    for (source, needle) in cases {
        let err = tokenize(source, &SyntaxConfig::default(), &WhitespaceConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError, "{}", source);
        assert!(err.message().contains(needle), "{}: {}", source, err.message());
    }
}
