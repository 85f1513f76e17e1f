//! `{% do expr %}`: evaluate an expression for its side effects and discard the result.

use super::registry::{EnvId, Extension};
use crate::error::Result;
use crate::parsing::{Parser, Stmt, StmtKind};

pub const IDENTIFIER: &str = "templar::ext::do";

#[derive(Debug)]
pub struct DoExtension {
    env: EnvId,
}

impl DoExtension {
    pub fn new(env: EnvId) -> Self {
        DoExtension { env }
    }
}

impl Extension for DoExtension {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn tags(&self) -> &[&str] {
        &["do"]
    }

    fn environment(&self) -> EnvId {
        self.env
    }

    fn parse(&self, parser: &mut Parser<'_>) -> Result<Vec<Stmt>> {
        let line = parser.stream().next_token()?.line;
        let expr = parser.parse_tuple(false, true, &[], false)?;
        Ok(vec![Stmt::new(StmtKind::ExprStmt(expr), line)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use serde_json::json;

    #[test]
    fn test_do_mutates_lists() {
        let mut env = Environment::new();
        env.add_extension(DoExtension::new);
        let out = env
            .template_from_str(
                "{% set items = [] %}{% for c in 'foo' %}{% do items.append(loop.index0 ~ c) %}\
                 {% endfor %}{{ items|join(', ') }}",
            )
            .unwrap()
            .render(json!({}))
            .unwrap();
        assert_eq!(out, "0f, 1o, 2o");
    }
}
