//! `{% break %}` and `{% continue %}` inside for loops.

use super::registry::{EnvId, Extension};
use crate::error::Result;
use crate::parsing::{Parser, Stmt, StmtKind};

pub const IDENTIFIER: &str = "templar::ext::loopcontrols";

#[derive(Debug)]
pub struct LoopControlsExtension {
    env: EnvId,
}

impl LoopControlsExtension {
    pub fn new(env: EnvId) -> Self {
        LoopControlsExtension { env }
    }
}

impl Extension for LoopControlsExtension {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn tags(&self) -> &[&str] {
        &["break", "continue"]
    }

    fn environment(&self) -> EnvId {
        self.env
    }

    fn parse(&self, parser: &mut Parser<'_>) -> Result<Vec<Stmt>> {
        let token = parser.stream().next_token()?;
        let tag = if token.kind.is_name("break") {
            "break"
        } else {
            "continue"
        };
        // Macro and call bodies are barriers: the loop around the definition does not count.
        if !parser.in_loop() {
            return Err(parser.fail_assertion(format!("'{}' outside of a loop", tag), token.line));
        }
        let kind = match tag {
            "break" => StmtKind::Break,
            _ => StmtKind::Continue,
        };
        Ok(vec![Stmt::new(kind, token.line)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn env() -> Environment {
        let mut env = Environment::new();
        env.add_extension(LoopControlsExtension::new);
        env
    }

    #[test]
    fn test_break_leaves_the_innermost_loop() {
        let out = env()
            .template_from_str(
                "{% for a in [1, 2] %}{% for b in [1, 2, 3] %}{% if b == 2 %}{% break %}{% endif %}\
                 {{ a }}{{ b }};{% endfor %}{% endfor %}",
            )
            .unwrap()
            .render(json!({}))
            .unwrap();
        assert_eq!(out, "11;21;");
    }

    #[test]
    fn test_outside_loop_is_rejected() {
        let err = env().template_from_str("{% continue %}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AssertionError);
        assert_eq!(err.tag(), Some("continue"));
    }

    #[test]
    fn test_macro_body_is_not_inside_the_loop() {
        let err = env()
            .template_from_str("{% for x in y %}{% macro m() %}{% break %}{% endmacro %}{% endfor %}")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AssertionError);
    }
}
