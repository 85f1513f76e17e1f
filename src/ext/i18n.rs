//! Internationalization
//!
//!     [I18nExtension] adds the `{% trans %}` tag. The body of a trans block is turned into
//!     a single message string at parse time: literal text is kept (with `%` doubled), and
//!     every `{{ name }}` becomes a `%(name)s` placeholder. The block compiles to a call of
//!     `gettext`, `ngettext`, `pgettext` or `npgettext`, looked up by name while rendering,
//!     so the translation lookup itself stays outside of the engine.
//!
//!         {% trans 'fruit' count=apples|length %}
//!             One apple
//!         {% pluralize %}
//!             {{ count }} apples
//!         {% endtrans %}
//!
//!     The optional leading string is a message context. `trimmed` collapses whitespace
//!     runs in the message (`notrimmed` overrides the `i18n_trimmed` policy). Names bound in
//!     the tag are available as placeholders; the first of them, or the one named after
//!     `pluralize`, selects the plural form. A count given as a call expression is evaluated
//!     once and bound to a hidden variable.
//!
//! Old and New Style Callables
//!
//!     With old-style callables the template does the formatting: the translated string is
//!     `%`-formatted with the variables right in the compiled code. New-style callables
//!     (the `newstyle_gettext` policy) receive the variables as keyword arguments and
//!     format themselves, escaping them when autoescaping is active, so plain `{{
//!     gettext('Hello %(name)s', name=user) }}` works the same as a trans block.
//!     [install_gettext_callables] installs either flavour around host functions.

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use super::registry::{EnvId, Extension};
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::lexing::TokenKind;
use crate::parsing::{CallArgs, Expr, ExprKind, Parser, Stmt, StmtKind, Target};
use crate::runtime::markup::percent_format;
use crate::runtime::ops::{kwargs_to_map, BinOp};
use crate::runtime::{Args, State, Value};

pub const IDENTIFIER: &str = "templar::ext::i18n";

/// Hidden variable holding a plural count computed by a call.
const PLURAL_ALIAS: &str = "_trans";

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\n\s*").unwrap());

#[derive(Debug)]
pub struct I18nExtension {
    env: EnvId,
}

impl I18nExtension {
    pub fn new(env: EnvId) -> Self {
        I18nExtension { env }
    }
}

impl Extension for I18nExtension {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn tags(&self) -> &[&str] {
        &["trans"]
    }

    fn environment(&self) -> EnvId {
        self.env
    }

    fn parse(&self, parser: &mut Parser<'_>) -> Result<Vec<Stmt>> {
        parse_trans(parser)
    }
}

fn parse_trans(parser: &mut Parser<'_>) -> Result<Vec<Stmt>> {
    let line = parser.stream().next_token()?.line;
    let context = match parser.stream().current().kind.clone() {
        TokenKind::Str(value) => {
            parser.stream().next_token()?;
            Some(value)
        }
        _ => None,
    };

    let mut variables: IndexMap<String, Expr> = IndexMap::new();
    let mut plural_expr: Option<Expr> = None;
    let mut plural_assignment: Option<Stmt> = None;
    let mut num_called_num = false;
    let mut trimmed: Option<bool> = None;

    while parser.stream().current().kind != TokenKind::BlockEnd {
        if !variables.is_empty() {
            parser.stream().expect(&TokenKind::Comma)?;
        }
        if parser.stream().skip_if(&TokenKind::Colon)? {
            break;
        }
        let (name, name_line) = parser.stream().expect_any_name()?;
        if variables.contains_key(&name) {
            return Err(parser.fail_assertion(
                format!("translatable variable '{}' defined twice.", name),
                name_line,
            ));
        }
        let value = if parser.stream().skip_if(&TokenKind::Assign)? {
            parser.parse_expression(true)?
        } else if trimmed.is_none() && (name == "trimmed" || name == "notrimmed") {
            trimmed = Some(name == "trimmed");
            continue;
        } else {
            Expr::name(name.as_str(), name_line)
        };

        let value = if plural_expr.is_none() {
            num_called_num = name == "num";
            if matches!(value.kind, ExprKind::Call { .. }) {
                let alias = Expr::name(PLURAL_ALIAS, name_line);
                plural_assignment = Some(Stmt::new(
                    StmtKind::Assign {
                        target: Target::Name(PLURAL_ALIAS.to_string()),
                        value,
                    },
                    name_line,
                ));
                plural_expr = Some(alias.clone());
                alias
            } else {
                plural_expr = Some(value.clone());
                value
            }
        } else {
            value
        };
        variables.insert(name, value);
    }
    parser.stream().expect(&TokenKind::BlockEnd)?;

    let mut referenced: Vec<String> = Vec::new();
    let (singular_names, mut singular) = parse_block(parser, true)?;
    if let Some(first) = singular_names.first() {
        if plural_expr.is_none() {
            plural_expr = Some(Expr::name(first.as_str(), line));
            num_called_num = first == "num";
        }
    }
    referenced.extend(singular_names);

    let mut plural = None;
    let have_plural = parser.stream().current().kind.is_name("pluralize");
    if have_plural {
        parser.stream().next_token()?;
        if parser.stream().current().kind != TokenKind::BlockEnd {
            let (name, name_line) = parser.stream().expect_any_name()?;
            let Some(count) = variables.get(&name) else {
                return Err(parser.fail_assertion(
                    format!("unknown variable '{}' for pluralization", name),
                    name_line,
                ));
            };
            plural_expr = Some(count.clone());
            num_called_num = name == "num";
        }
        parser.stream().expect(&TokenKind::BlockEnd)?;
        let (plural_names, text) = parse_block(parser, false)?;
        referenced.extend(plural_names);
        plural = Some(text);
    }
    // endtrans
    parser.stream().next_token()?;

    for name in &referenced {
        if !variables.contains_key(name) {
            variables.insert(name.clone(), Expr::name(name.as_str(), line));
        }
    }
    if !have_plural {
        plural_expr = None;
    } else if plural_expr.is_none() {
        return Err(parser.fail("pluralize without variables", line));
    }

    if trimmed.unwrap_or(parser.policies().i18n_trimmed) {
        singular = trim_whitespace(&singular);
        plural = plural.map(|text| trim_whitespace(&text));
    }

    let message = Message {
        singular,
        plural,
        context,
        variables,
        plural_expr,
        vars_referenced: !referenced.is_empty(),
        num_called_num: num_called_num && have_plural,
    };
    let output = message.into_output(parser.policies().newstyle_gettext, line);
    Ok(plural_assignment.into_iter().chain([output]).collect())
}

/// Read a trans body up to `endtrans` (or `pluralize`), leaving the stream on that name.
fn parse_block(parser: &mut Parser<'_>, allow_pluralize: bool) -> Result<(Vec<String>, String)> {
    let mut referenced = Vec::new();
    let mut buf = String::new();
    loop {
        let token = parser.stream().current().clone();
        match token.kind {
            TokenKind::Data(text) => {
                buf.push_str(&text.replace('%', "%%"));
                parser.stream().next_token()?;
            }
            TokenKind::VariableBegin => {
                parser.stream().next_token()?;
                let (name, _) = parser.stream().expect_any_name()?;
                buf.push_str(&format!("%({})s", name));
                referenced.push(name);
                parser.stream().expect(&TokenKind::VariableEnd)?;
            }
            TokenKind::BlockBegin => {
                parser.stream().next_token()?;
                let current = parser.stream().current().clone();
                let block_name = match &current.kind {
                    TokenKind::Name(name) => name.as_str(),
                    _ => "",
                };
                match block_name {
                    "endtrans" => break,
                    "pluralize" if allow_pluralize => break,
                    "pluralize" => {
                        return Err(parser.fail(
                            "a translatable section can have only one pluralize section",
                            current.line,
                        ))
                    }
                    "trans" => {
                        return Err(parser.fail(
                            "trans blocks can't be nested; did you mean `endtrans`?",
                            current.line,
                        ))
                    }
                    other => {
                        return Err(parser.fail(
                            format!(
                                "control structures in translatable sections are not allowed; saw `{}`",
                                other
                            ),
                            current.line,
                        ))
                    }
                }
            }
            TokenKind::Eof => return Err(parser.fail("unclosed translation block", token.line)),
            other => {
                return Err(parser.fail(
                    format!("unexpected {} in translatable section", other),
                    token.line,
                ))
            }
        }
    }
    Ok((referenced, buf))
}

fn trim_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

/// A parsed trans block on its way to becoming an output node.
struct Message {
    singular: String,
    plural: Option<String>,
    context: Option<String>,
    variables: IndexMap<String, Expr>,
    plural_expr: Option<Expr>,
    vars_referenced: bool,
    num_called_num: bool,
}

impl Message {
    fn into_output(self, newstyle: bool, line: usize) -> Stmt {
        let Message {
            mut singular,
            mut plural,
            context,
            variables,
            plural_expr,
            vars_referenced,
            num_called_num,
        } = self;
        // Without placeholders the old-style string is never %-formatted.
        if !vars_referenced && !newstyle {
            singular = singular.replace("%%", "%");
            plural = plural.map(|text| text.replace("%%", "%"));
        }

        let mut func = "gettext".to_string();
        let mut args = vec![Expr::constant(singular, line)];
        if let Some(context) = context {
            args.insert(0, Expr::constant(context, line));
            func = format!("p{}", func);
        }
        if let Some(count) = plural_expr {
            func = format!("n{}", func);
            args.push(Expr::constant(plural.unwrap_or_default(), line));
            args.push(count);
        }

        let mut call_args = CallArgs::positional(args);
        if newstyle {
            call_args.kwargs = variables
                .iter()
                .filter(|(key, _)| !(num_called_num && key.as_str() == "num"))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
        }
        let call = Expr::new(
            ExprKind::Call {
                callee: Expr::name(func, line).boxed(),
                args: call_args,
            },
            line,
        );

        let node = if newstyle {
            call
        } else {
            let marked = Expr::new(ExprKind::MarkSafeIfAutoescape(call.boxed()), line);
            if variables.is_empty() {
                marked
            } else {
                let pairs = variables
                    .into_iter()
                    .map(|(key, value)| (Expr::constant(key, line), value))
                    .collect();
                Expr::new(
                    ExprKind::Binary {
                        op: BinOp::Mod,
                        left: marked.boxed(),
                        right: Expr::new(ExprKind::Dict(pairs), line).boxed(),
                    },
                    line,
                )
            }
        };
        Stmt::new(StmtKind::Output(vec![node]), line)
    }
}

pub type GettextFn = dyn Fn(&State<'_>, &str) -> Result<String> + Send + Sync;
pub type NgettextFn = dyn Fn(&State<'_>, &str, &str, i64) -> Result<String> + Send + Sync;
pub type PgettextFn = dyn Fn(&State<'_>, &str, &str) -> Result<String> + Send + Sync;
pub type NpgettextFn = dyn Fn(&State<'_>, &str, &str, &str, i64) -> Result<String> + Send + Sync;

/// Host translation lookups. The render state is passed along so lookups can depend on
/// template variables (a `LANGUAGE` variable, say).
#[derive(Clone)]
pub struct Translations {
    gettext: Arc<GettextFn>,
    ngettext: Arc<NgettextFn>,
    pgettext: Option<Arc<PgettextFn>>,
    npgettext: Option<Arc<NpgettextFn>>,
}

impl Translations {
    pub fn new<G, N>(gettext: G, ngettext: N) -> Self
    where
        G: Fn(&State<'_>, &str) -> Result<String> + Send + Sync + 'static,
        N: Fn(&State<'_>, &str, &str, i64) -> Result<String> + Send + Sync + 'static,
    {
        Translations {
            gettext: Arc::new(gettext),
            ngettext: Arc::new(ngettext),
            pgettext: None,
            npgettext: None,
        }
    }

    /// Add the context-qualified lookups.
    pub fn with_context<P, NP>(mut self, pgettext: P, npgettext: NP) -> Self
    where
        P: Fn(&State<'_>, &str, &str) -> Result<String> + Send + Sync + 'static,
        NP: Fn(&State<'_>, &str, &str, &str, i64) -> Result<String> + Send + Sync + 'static,
    {
        self.pgettext = Some(Arc::new(pgettext));
        self.npgettext = Some(Arc::new(npgettext));
        self
    }

    /// Lookups that return the message unchanged.
    pub fn null() -> Self {
        Translations::new(
            |_, message| Ok(message.to_string()),
            |_, singular, plural, n| Ok(if n == 1 { singular } else { plural }.to_string()),
        )
        .with_context(
            |_, _, message| Ok(message.to_string()),
            |_, _, singular, plural, n| Ok(if n == 1 { singular } else { plural }.to_string()),
        )
    }
}

/// Install `translations` as the `gettext` family of globals, plus `_` as an alias for
/// whatever `gettext` resolves to. `newstyle` overrides the environment's
/// `newstyle_gettext` policy when given.
pub fn install_gettext_callables(env: &mut Environment, translations: Translations, newstyle: Option<bool>) {
    if let Some(newstyle) = newstyle {
        env.policies_mut().newstyle_gettext = newstyle;
    }
    let newstyle = env.policies().newstyle_gettext;
    let Translations {
        gettext,
        ngettext,
        pgettext,
        npgettext,
    } = translations;

    env.add_global(
        "gettext",
        Value::from_function("gettext", move |state, args| {
            let Args { positional, kwargs } = args;
            let message = text_at(&positional, 0, "gettext")?;
            let translated = gettext(&*state, &message)?;
            finish(&*state, translated, kwargs, newstyle)
        }),
    );
    env.add_global(
        "ngettext",
        Value::from_function("ngettext", move |state, args| {
            let Args {
                positional,
                mut kwargs,
            } = args;
            let singular = text_at(&positional, 0, "ngettext")?;
            let plural = text_at(&positional, 1, "ngettext")?;
            let (count, n) = count_at(&positional, 2, "ngettext")?;
            kwargs.entry("num".to_string()).or_insert(count);
            let translated = ngettext(&*state, &singular, &plural, n)?;
            finish(&*state, translated, kwargs, newstyle)
        }),
    );
    if let Some(pgettext) = pgettext {
        env.add_global(
            "pgettext",
            Value::from_function("pgettext", move |state, args| {
                let Args {
                    positional,
                    mut kwargs,
                } = args;
                let context = text_at(&positional, 0, "pgettext")?;
                let message = text_at(&positional, 1, "pgettext")?;
                kwargs
                    .entry("context".to_string())
                    .or_insert_with(|| Value::from(context.as_str()));
                let translated = pgettext(&*state, &context, &message)?;
                finish(&*state, translated, kwargs, newstyle)
            }),
        );
    }
    if let Some(npgettext) = npgettext {
        env.add_global(
            "npgettext",
            Value::from_function("npgettext", move |state, args| {
                let Args {
                    positional,
                    mut kwargs,
                } = args;
                let context = text_at(&positional, 0, "npgettext")?;
                let singular = text_at(&positional, 1, "npgettext")?;
                let plural = text_at(&positional, 2, "npgettext")?;
                let (count, n) = count_at(&positional, 3, "npgettext")?;
                kwargs
                    .entry("context".to_string())
                    .or_insert_with(|| Value::from(context.as_str()));
                kwargs.entry("num".to_string()).or_insert(count);
                let translated = npgettext(&*state, &context, &singular, &plural, n)?;
                finish(&*state, translated, kwargs, newstyle)
            }),
        );
    }
    env.add_global(
        "_",
        Value::from_function("_", |state, args| {
            let gettext = state.lookup("gettext");
            gettext.call(state, args)
        }),
    );
}

/// [install_gettext_callables] with [Translations::null].
pub fn install_null_translations(env: &mut Environment, newstyle: Option<bool>) {
    install_gettext_callables(env, Translations::null(), newstyle);
}

fn text_at(args: &[Value], index: usize, callee: &str) -> Result<String> {
    match args.get(index) {
        Some(value) => value.to_output(),
        None => Err(Error::runtime(format!(
            "{}() is missing positional argument {}",
            callee,
            index + 1
        ))),
    }
}

fn count_at(args: &[Value], index: usize, callee: &str) -> Result<(Value, i64)> {
    let value = args.get(index).cloned().ok_or_else(|| {
        Error::runtime(format!("{}() is missing the plural count", callee))
    })?;
    let n = match &value {
        Value::Float(f) => *f as i64,
        other => other.as_i64().ok_or_else(|| {
            Error::runtime(format!(
                "{}() expects a number as plural count, not '{}'",
                callee,
                other.type_name()
            ))
        })?,
    };
    Ok((value, n))
}

/// Old style hands the translated string back untouched (keyword arguments are not
/// accepted). New style formats it with the variables, as markup when autoescaping.
fn finish(state: &State<'_>, translated: String, variables: IndexMap<String, Value>, newstyle: bool) -> Result<Value> {
    if !newstyle {
        if let Some(name) = variables.keys().find(|k| !matches!(k.as_str(), "num" | "context")) {
            return Err(Error::runtime(format!(
                "gettext callables take no keyword argument '{}'",
                name
            )));
        }
        return Ok(Value::from(translated));
    }
    let autoescape = state.autoescape();
    let text = percent_format(&translated, &kwargs_to_map(variables), autoescape)?;
    Ok(Value::from_output(text, autoescape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn env(newstyle: bool) -> Environment {
        let mut env = Environment::new();
        env.add_extension(I18nExtension::new);
        install_null_translations(&mut env, Some(newstyle));
        env
    }

    fn render(env: &Environment, source: &str, ctx: serde_json::Value) -> String {
        env.template_from_str(source).unwrap().render(ctx).unwrap()
    }

    #[test]
    fn test_placeholders_come_from_the_body() {
        let out = render(
            &env(false),
            "{% trans %}Hello {{ user }}!{% endtrans %}",
            json!({"user": "ann"}),
        );
        assert_eq!(out, "Hello ann!");
    }

    #[test]
    fn test_percent_signs_survive_both_styles() {
        for newstyle in [false, true] {
            let out = render(&env(newstyle), "{% trans %}100%{% endtrans %}", json!({}));
            assert_eq!(out, "100%");
        }
    }

    #[test]
    fn test_plural_selected_by_count() {
        let source = "{% trans count=n %}one{% pluralize %}{{ count }} many{% endtrans %}";
        let env = env(true);
        assert_eq!(render(&env, source, json!({"n": 1})), "one");
        assert_eq!(render(&env, source, json!({"n": 3})), "3 many");
    }

    #[test]
    fn test_trim_whitespace() {
        assert_eq!(trim_whitespace("  a\n   b \n\n c  "), "a b c");
    }

    #[test]
    fn test_duplicate_variable_is_an_assertion() {
        let err = env(false)
            .template_from_str("{% trans a=1, a=2 %}{% endtrans %}")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AssertionError);
        assert!(err.message().contains("defined twice"));
        assert_eq!(err.tag(), Some("trans"));
    }

    #[test]
    fn test_unclosed_block() {
        let err = env(false)
            .template_from_str("{% trans %}never closed")
            .unwrap_err();
        assert_eq!(err.message(), "unclosed translation block");
    }

    #[test]
    fn test_old_style_rejects_keyword_arguments() {
        let err = env(false)
            .template_from_str("{{ gettext('x', y=1) }}")
            .unwrap()
            .render(json!({}))
            .unwrap_err();
        assert!(err.message().contains("no keyword argument 'y'"));
    }
}
