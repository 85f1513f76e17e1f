//! `{% debug %}` dumps the visible variables and the registered filter and test names.
//!
//!     The tag compiles to a call back into the extension, so the dump reflects the state at
//!     the point where the tag appears, including loop variables and other locals.

use super::registry::{EnvId, Extension};
use crate::error::{Error, Result};
use crate::parsing::{CallArgs, Expr, ExprKind, Parser, Stmt, StmtKind};
use crate::runtime::{Args, State, Value};

pub const IDENTIFIER: &str = "templar::ext::debug";

#[derive(Debug)]
pub struct DebugExtension {
    env: EnvId,
}

impl DebugExtension {
    pub fn new(env: EnvId) -> Self {
        DebugExtension { env }
    }
}

impl Extension for DebugExtension {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn tags(&self) -> &[&str] {
        &["debug"]
    }

    fn environment(&self) -> EnvId {
        self.env
    }

    fn parse(&self, parser: &mut Parser<'_>) -> Result<Vec<Stmt>> {
        let line = parser.stream().next_token()?.line;
        let context = Expr::new(ExprKind::ContextReference { with_locals: true }, line);
        let call = Expr::new(
            ExprKind::ExtensionCall {
                extension: IDENTIFIER.to_string(),
                method: "render".to_string(),
                args: CallArgs::positional(vec![context]),
            },
            line,
        );
        Ok(vec![Stmt::new(StmtKind::Output(vec![call]), line)])
    }

    fn call_method(&self, state: &mut State<'_>, method: &str, args: Args) -> Result<Value> {
        if method != "render" {
            return Err(Error::runtime(format!(
                "extension '{}' has no method '{}'",
                IDENTIFIER, method
            )));
        }
        let context = args.positional.into_iter().next().unwrap_or(Value::None);
        let env = state.env();
        Ok(Value::from(format!(
            "{{'context': {},\n 'filters': {},\n 'tests': {}}}",
            context.repr(),
            name_list(env.filter_names()),
            name_list(env.test_names()),
        )))
    }
}

fn name_list(mut names: Vec<String>) -> String {
    names.sort();
    let quoted: Vec<String> = names.into_iter().map(|n| format!("'{}'", n)).collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use serde_json::json;

    #[test]
    fn test_dump_lists_locals_and_names() {
        let mut env = Environment::new();
        env.add_extension(DebugExtension::new);
        let out = env
            .template_from_str("{% for item in [1] %}{% debug %}{% endfor %}")
            .unwrap()
            .render(json!({"user": "ann"}))
            .unwrap();
        assert!(out.starts_with("{'context': {"));
        assert!(out.contains("'user': 'ann'"));
        assert!(out.contains("'item': 1"));
        assert!(out.contains("'abs'"));
        assert!(out.contains("'!='"));
    }

    #[test]
    fn test_name_list_is_sorted() {
        assert_eq!(
            name_list(vec!["upper".into(), "abs".into()]),
            "['abs', 'upper']"
        );
    }
}
