//! Statement parser
//!
//!     [Parser] owns the token stream for one template and builds the statement layer of
//!     the tree. It keeps three stacks while descending:
//!
//!         - the tag stack: names of statements currently open, for error messages;
//!         - the end-token stack: terminator keywords each open body is waiting for;
//!         - the control stack: loops and scope barriers, so `break` and `continue` can be
//!           validated where they are written.
//!
//!     Named blocks are lifted into the tree's block table as they are parsed; the body
//!     keeps only a reference by name.
//!
//!     The methods extension parse hooks need are public: [Parser::stream],
//!     [Parser::parse_statements], [Parser::parse_expression], [Parser::parse_tuple],
//!     [Parser::parse_assign_target], [Parser::in_loop] and the `fail` helpers.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::ast::{BlockDef, Expr, ExprKind, ForLoop, MacroDef, Param, Stmt, StmtKind, SyntaxTree, Target};
use crate::environment::Policies;
use crate::error::{Error, Result};
use crate::ext::Registry;
use crate::lexing::{TokenKind, TokenStream};

/// Statements handled by the core grammar.
const STATEMENT_KEYWORDS: &[&str] = &[
    "for",
    "if",
    "block",
    "extends",
    "print",
    "macro",
    "include",
    "from",
    "import",
    "set",
    "with",
    "autoescape",
    "call",
    "filter",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Loop,
    Barrier,
}

pub struct Parser<'a> {
    stream: TokenStream<'a>,
    name: Option<String>,
    extensions: &'a Registry,
    policies: &'a Policies,
    tag_stack: Vec<String>,
    end_token_stack: Vec<Vec<String>>,
    control: Vec<Control>,
    blocks: IndexMap<String, BlockDef>,
    extends_seen: bool,
    content_seen: bool,
}

impl<'a> Parser<'a> {
    pub fn new(
        stream: TokenStream<'a>,
        name: Option<&str>,
        extensions: &'a Registry,
        policies: &'a Policies,
    ) -> Self {
        Parser {
            stream,
            name: name.map(str::to_string),
            extensions,
            policies,
            tag_stack: Vec::new(),
            end_token_stack: Vec::new(),
            control: Vec::new(),
            blocks: IndexMap::new(),
            extends_seen: false,
            content_seen: false,
        }
    }

    /// Parse the whole stream into a tree.
    pub fn parse(mut self) -> Result<SyntaxTree> {
        let body = self
            .subparse(None)
            .map_err(|err| err.with_location(self.name.as_deref(), self.stream.line()))?;
        Ok(SyntaxTree {
            body,
            blocks: self.blocks,
        })
    }

    pub fn stream(&mut self) -> &mut TokenStream<'a> {
        &mut self.stream
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn policies(&self) -> &Policies {
        self.policies
    }

    /// Whether `break`/`continue` written here would apply to a loop.
    pub fn in_loop(&self) -> bool {
        matches!(self.control.last(), Some(Control::Loop))
    }

    pub fn fail(&self, message: impl Into<String>, line: usize) -> Error {
        Error::syntax(message, line)
    }

    pub fn fail_assertion(&self, message: impl Into<String>, line: usize) -> Error {
        Error::assertion(message, line)
    }

    /// Parse a statement body after the tag's own arguments: optional colon, the closing
    /// delimiter, then statements until one of `end_tokens`. With `drop_needle` the
    /// terminator name is consumed too.
    pub fn parse_statements(&mut self, end_tokens: &[&str], drop_needle: bool) -> Result<Vec<Stmt>> {
        self.stream.skip_if(&TokenKind::Colon)?;
        self.stream.expect(&TokenKind::BlockEnd)?;
        let body = self.subparse(Some(end_tokens))?;
        if self.stream.eos() {
            return Err(self.fail_eof(end_tokens));
        }
        if drop_needle {
            self.stream.next_token()?;
        }
        Ok(body)
    }

    fn subparse(&mut self, end_tokens: Option<&[&str]>) -> Result<Vec<Stmt>> {
        let pushed = match end_tokens {
            Some(tokens) => {
                self.end_token_stack
                    .push(tokens.iter().map(|t| t.to_string()).collect());
                true
            }
            None => false,
        };
        let result = self.subparse_inner(end_tokens);
        if pushed {
            self.end_token_stack.pop();
        }
        result
    }

    fn subparse_inner(&mut self, end_tokens: Option<&[&str]>) -> Result<Vec<Stmt>> {
        let mut body = Vec::new();
        let mut buffer: Vec<Expr> = Vec::new();
        let mut buffer_line = self.stream.line();

        while !self.stream.eos() {
            let token = self.stream.current().clone();
            match token.kind {
                TokenKind::Data(text) => {
                    if buffer.is_empty() {
                        buffer_line = token.line;
                    }
                    if self.at_top_level() && !text.trim().is_empty() {
                        self.content_seen = true;
                    }
                    buffer.push(Expr::new(ExprKind::TemplateData(text), token.line));
                    self.stream.next_token()?;
                }
                TokenKind::VariableBegin => {
                    if buffer.is_empty() {
                        buffer_line = token.line;
                    }
                    if self.at_top_level() {
                        self.content_seen = true;
                    }
                    self.stream.next_token()?;
                    buffer.push(self.parse_tuple(false, true, &[], false)?);
                    self.stream.expect(&TokenKind::VariableEnd)?;
                }
                TokenKind::BlockBegin => {
                    flush(&mut body, &mut buffer, buffer_line);
                    self.stream.next_token()?;
                    if let Some(tokens) = end_tokens {
                        if tokens.iter().any(|t| self.stream.current().kind.is_name(t)) {
                            return Ok(body);
                        }
                    }
                    let top_level = self.at_top_level();
                    let statements = self.parse_statement()?;
                    if top_level
                        && statements
                            .iter()
                            .any(|s| !matches!(s.kind, StmtKind::Extends(_)))
                    {
                        self.content_seen = true;
                    }
                    body.extend(statements);
                    self.stream.expect(&TokenKind::BlockEnd)?;
                }
                other => {
                    return Err(self.fail(format!("unexpected {}", other), token.line));
                }
            }
        }
        flush(&mut body, &mut buffer, buffer_line);
        Ok(body)
    }

    fn at_top_level(&self) -> bool {
        self.end_token_stack.is_empty() && self.tag_stack.is_empty()
    }

    fn parse_statement(&mut self) -> Result<Vec<Stmt>> {
        let token = self.stream.current().clone();
        let TokenKind::Name(tag) = token.kind else {
            return Err(self.fail("tag name expected", token.line));
        };

        if STATEMENT_KEYWORDS.contains(&tag.as_str()) {
            self.tag_stack.push(tag.clone());
            let result = self.parse_core_statement(&tag);
            self.tag_stack.pop();
            return result;
        }

        if let Some(extension) = self.extensions.for_tag(&tag).cloned() {
            self.tag_stack.push(tag.clone());
            let result = extension
                .parse(self)
                .map_err(|err| err.with_location(None, token.line).with_tag(&tag));
            self.tag_stack.pop();
            return result;
        }

        Err(self.fail_unknown_tag(Some(&tag), token.line))
    }

    fn parse_core_statement(&mut self, tag: &str) -> Result<Vec<Stmt>> {
        let stmt = match tag {
            "for" => self.parse_for()?,
            "if" => self.parse_if()?,
            "block" => self.parse_block()?,
            "extends" => self.parse_extends()?,
            "print" => self.parse_print()?,
            "macro" => self.parse_macro()?,
            "include" => self.parse_include()?,
            "from" => self.parse_from()?,
            "import" => self.parse_import()?,
            "set" => self.parse_set()?,
            "with" => self.parse_with()?,
            "autoescape" => self.parse_autoescape()?,
            "call" => self.parse_call_block()?,
            _ => self.parse_filter_block()?,
        };
        Ok(vec![stmt])
    }

    fn fail_unknown_tag(&self, name: Option<&str>, line: usize) -> Error {
        let expected: HashSet<&str> = self
            .end_token_stack
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        let currently_looking = self.end_token_stack.last().map(|tokens| {
            tokens
                .iter()
                .map(|t| format!("'{}'", t))
                .collect::<Vec<_>>()
                .join(" or ")
        });

        let mut message = vec![match name {
            Some(name) => format!("Encountered unknown tag '{}'.", name),
            None => "Unexpected end of template.".to_string(),
        }];
        if let Some(looking) = currently_looking {
            if name.is_some_and(|n| expected.contains(n)) {
                message.push(format!(
                    "You probably made a nesting mistake. The parser is expecting this tag, but currently looking for {}.",
                    looking
                ));
            } else {
                message.push(format!(
                    "The parser was looking for the following tags: {}.",
                    looking
                ));
            }
        }
        if let Some(innermost) = self.tag_stack.last() {
            message.push(format!(
                "The innermost block that needs to be closed is '{}'.",
                innermost
            ));
        }
        self.fail(message.join(" "), line)
    }

    fn fail_eof(&self, end_tokens: &[&str]) -> Error {
        let looking = end_tokens
            .iter()
            .map(|t| format!("'{}'", t))
            .collect::<Vec<_>>()
            .join(" or ");
        let mut message = format!(
            "Unexpected end of template. The parser was looking for the following tags: {}.",
            looking
        );
        if let Some(innermost) = self.tag_stack.last() {
            message.push_str(&format!(
                " The innermost block that needs to be closed is '{}'.",
                innermost
            ));
        }
        self.fail(message, self.stream.line())
    }

    fn with_control<T>(
        &mut self,
        control: Control,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.control.push(control);
        let result = f(self);
        self.control.pop();
        result
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let line = self.stream.expect_name("for")?.line;
        let target = self.parse_assign_target(true, false, &["in"], false)?;
        self.stream.expect_name("in")?;
        let iter = self.parse_tuple(false, false, &["recursive"], false)?;
        let filter = if self.stream.skip_name("if")? {
            Some(self.parse_expression(true)?)
        } else {
            None
        };
        let recursive = self.stream.skip_name("recursive")?;
        let body = self.with_control(Control::Loop, |p| {
            p.parse_statements(&["endfor", "else"], false)
        })?;
        let closing = self.stream.next_token()?;
        let else_body = if closing.kind.is_name("endfor") {
            Vec::new()
        } else {
            self.parse_statements(&["endfor"], true)?
        };
        Ok(Stmt::new(
            StmtKind::For(Box::new(ForLoop {
                target,
                iter,
                filter,
                body,
                else_body,
                recursive,
            })),
            line,
        ))
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let line = self.stream.expect_name("if")?.line;
        self.parse_if_rest(line)
    }

    fn parse_if_rest(&mut self, line: usize) -> Result<Stmt> {
        let test = self.parse_tuple(false, false, &[], false)?;
        let body = self.parse_statements(&["elif", "else", "endif"], false)?;
        let token = self.stream.next_token()?;
        let else_body = if token.kind.is_name("elif") {
            vec![self.parse_if_rest(token.line)?]
        } else if token.kind.is_name("else") {
            self.parse_statements(&["endif"], true)?
        } else {
            Vec::new()
        };
        Ok(Stmt::new(
            StmtKind::If {
                test,
                body,
                else_body,
            },
            line,
        ))
    }

    fn parse_with(&mut self) -> Result<Stmt> {
        let line = self.stream.next_token()?.line;
        let mut assignments = Vec::new();
        while self.stream.current().kind != TokenKind::BlockEnd {
            if !assignments.is_empty() {
                self.stream.expect(&TokenKind::Comma)?;
            }
            let target = self.parse_assign_target(true, false, &[], false)?;
            self.stream.expect(&TokenKind::Assign)?;
            assignments.push((target, self.parse_expression(true)?));
        }
        let body = self.parse_statements(&["endwith"], true)?;
        Ok(Stmt::new(StmtKind::With { assignments, body }, line))
    }

    fn parse_autoescape(&mut self) -> Result<Stmt> {
        let line = self.stream.next_token()?.line;
        let value = self.parse_expression(true)?;
        let body = self.parse_statements(&["endautoescape"], true)?;
        Ok(Stmt::new(StmtKind::AutoEscape { value, body }, line))
    }

    fn parse_block(&mut self) -> Result<Stmt> {
        let line = self.stream.next_token()?.line;
        let (name, _) = self.stream.expect_any_name()?;
        let scoped = self.stream.skip_name("scoped")?;
        let required = self.stream.skip_name("required")?;
        if self.stream.current().kind == TokenKind::Sub {
            return Err(self.fail(
                "Block names may not contain hyphens, use an underscore instead.",
                self.stream.line(),
            ));
        }

        if self.blocks.contains_key(&name) {
            return Err(self.fail_assertion(format!("block '{}' defined twice", name), line));
        }
        // Claim the slot now so nested blocks follow their parent in definition order.
        self.blocks.insert(
            name.clone(),
            BlockDef {
                name: name.clone(),
                body: Vec::new(),
                scoped,
                required,
                line,
            },
        );

        let body = self.with_control(Control::Barrier, |p| {
            p.parse_statements(&["endblock"], true)
        })?;

        if required && !body.iter().all(is_whitespace_output) {
            return Err(self.fail(
                "Required blocks can only contain comments or whitespace",
                line,
            ));
        }

        if let TokenKind::Name(closing) = &self.stream.current().kind {
            if closing != &name {
                return Err(self.fail(
                    format!("mismatched block name: expected 'endblock {}', got 'endblock {}'", name, closing),
                    self.stream.line(),
                ));
            }
            self.stream.next_token()?;
        }

        if let Some(block) = self.blocks.get_mut(&name) {
            block.body = body;
        }
        Ok(Stmt::new(StmtKind::Block(name), line))
    }

    fn parse_extends(&mut self) -> Result<Stmt> {
        let line = self.stream.next_token()?.line;
        if self.tag_stack.len() > 1 || !self.end_token_stack.is_empty() {
            return Err(self.fail("extends may only appear at the top level of a template", line));
        }
        if self.extends_seen {
            return Err(self.fail_assertion("extended multiple times", line));
        }
        if self.content_seen {
            return Err(self.fail_assertion(
                "extends must come before any other output or statement",
                line,
            ));
        }
        self.extends_seen = true;
        let template = self.parse_expression(true)?;
        Ok(Stmt::new(StmtKind::Extends(template), line))
    }

    /// `with context` / `without context`, if present.
    fn parse_import_context(&mut self) -> Result<Option<bool>> {
        let current = &self.stream.current().kind;
        if (current.is_name("with") || current.is_name("without"))
            && self.stream.look()?.kind.is_name("context")
        {
            let with = self.stream.next_token()?.kind.is_name("with");
            self.stream.next_token()?;
            return Ok(Some(with));
        }
        Ok(None)
    }

    fn parse_include(&mut self) -> Result<Stmt> {
        let line = self.stream.next_token()?.line;
        let template = self.parse_expression(true)?;
        let ignore_missing = if self.stream.current().kind.is_name("ignore")
            && self.stream.look()?.kind.is_name("missing")
        {
            self.stream.next_token()?;
            self.stream.next_token()?;
            true
        } else {
            false
        };
        let with_context = self.parse_import_context()?.unwrap_or(true);
        Ok(Stmt::new(
            StmtKind::Include {
                template,
                with_context,
                ignore_missing,
            },
            line,
        ))
    }

    fn parse_import(&mut self) -> Result<Stmt> {
        let line = self.stream.next_token()?.line;
        let template = self.parse_expression(true)?;
        self.stream.expect_name("as")?;
        let (target, _) = self.stream.expect_any_name()?;
        let with_context = self.parse_import_context()?.unwrap_or(false);
        Ok(Stmt::new(
            StmtKind::Import {
                template,
                target,
                with_context,
            },
            line,
        ))
    }

    fn parse_from(&mut self) -> Result<Stmt> {
        let line = self.stream.next_token()?.line;
        let template = self.parse_expression(true)?;
        self.stream.expect_name("import")?;
        let mut names = Vec::new();
        let mut with_context;
        loop {
            if !names.is_empty() {
                self.stream.expect(&TokenKind::Comma)?;
            }
            if !matches!(self.stream.current().kind, TokenKind::Name(_)) {
                self.stream.expect_any_name()?;
                continue;
            }
            with_context = self.parse_import_context()?;
            if with_context.is_some() {
                break;
            }
            let (name, name_line) = self.stream.expect_any_name()?;
            if name.starts_with('_') {
                return Err(self.fail_assertion(
                    "names starting with an underline can not be imported",
                    name_line,
                ));
            }
            let alias = if self.stream.skip_name("as")? {
                Some(self.stream.expect_any_name()?.0)
            } else {
                None
            };
            names.push((name, alias));
            with_context = self.parse_import_context()?;
            if with_context.is_some() || self.stream.current().kind != TokenKind::Comma {
                break;
            }
        }
        Ok(Stmt::new(
            StmtKind::FromImport {
                template,
                names,
                with_context: with_context.unwrap_or(false),
            },
            line,
        ))
    }

    fn parse_signature(&mut self) -> Result<Vec<Param>> {
        let mut params: Vec<Param> = Vec::new();
        self.stream.expect(&TokenKind::LParen)?;
        while self.stream.current().kind != TokenKind::RParen {
            if !params.is_empty() {
                self.stream.expect(&TokenKind::Comma)?;
            }
            let (name, line) = self.stream.expect_any_name()?;
            let default = if self.stream.skip_if(&TokenKind::Assign)? {
                Some(self.parse_expression(true)?)
            } else if params.iter().any(|p| p.default.is_some()) {
                return Err(self.fail("non-default argument follows default argument", line));
            } else {
                None
            };
            params.push(Param { name, default });
        }
        self.stream.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_call_block(&mut self) -> Result<Stmt> {
        let line = self.stream.next_token()?.line;
        let params = if self.stream.current().kind == TokenKind::LParen {
            self.parse_signature()?
        } else {
            Vec::new()
        };
        let call = self.parse_expression(true)?;
        if !matches!(call.kind, ExprKind::Call { .. }) {
            return Err(self.fail("expected call", line));
        }
        let body = self.with_control(Control::Barrier, |p| {
            p.parse_statements(&["endcall"], true)
        })?;
        Ok(Stmt::new(
            StmtKind::CallBlock {
                call,
                caller: MacroDef {
                    name: "caller".to_string(),
                    params,
                    body,
                },
            },
            line,
        ))
    }

    fn parse_filter_block(&mut self) -> Result<Stmt> {
        let line = self.stream.next_token()?.line;
        let filter = self.parse_filter(None, true)?;
        let body = self.parse_statements(&["endfilter"], true)?;
        Ok(Stmt::new(StmtKind::FilterBlock { filter, body }, line))
    }

    fn parse_macro(&mut self) -> Result<Stmt> {
        let line = self.stream.next_token()?.line;
        let (name, _) = self.stream.expect_any_name()?;
        let params = self.parse_signature()?;
        let body = self.with_control(Control::Barrier, |p| {
            p.parse_statements(&["endmacro"], true)
        })?;
        Ok(Stmt::new(StmtKind::Macro(MacroDef { name, params, body }), line))
    }

    fn parse_print(&mut self) -> Result<Stmt> {
        let line = self.stream.next_token()?.line;
        let mut nodes = Vec::new();
        while self.stream.current().kind != TokenKind::BlockEnd {
            if !nodes.is_empty() {
                self.stream.expect(&TokenKind::Comma)?;
            }
            nodes.push(self.parse_expression(true)?);
        }
        Ok(Stmt::new(StmtKind::Output(nodes), line))
    }

    fn parse_set(&mut self) -> Result<Stmt> {
        let line = self.stream.next_token()?.line;
        let target = self.parse_assign_target(true, false, &[], true)?;
        if self.stream.skip_if(&TokenKind::Assign)? {
            let value = self.parse_tuple(false, true, &[], false)?;
            return Ok(Stmt::new(StmtKind::Assign { target, value }, line));
        }
        let filter = if self.stream.current().kind == TokenKind::Pipe {
            Some(self.parse_filter(None, false)?)
        } else {
            None
        };
        let body = self.parse_statements(&["endset"], true)?;
        Ok(Stmt::new(
            StmtKind::AssignBlock {
                target,
                filter,
                body,
            },
            line,
        ))
    }

    /// An assignment target: a name, a tuple of names, or with `with_namespace` a
    /// `ns.attr` reference.
    pub fn parse_assign_target(
        &mut self,
        with_tuple: bool,
        name_only: bool,
        extra_end_rules: &[&str],
        with_namespace: bool,
    ) -> Result<Target> {
        if with_namespace && self.stream.look()?.kind == TokenKind::Dot {
            let (name, _) = self.stream.expect_any_name()?;
            self.stream.next_token()?;
            let (attr, _) = self.stream.expect_any_name()?;
            return Ok(Target::Attr { name, attr });
        }
        if name_only {
            return Ok(Target::Name(self.stream.expect_any_name()?.0));
        }
        let expr = if with_tuple {
            self.parse_tuple(true, true, extra_end_rules, false)?
        } else {
            self.parse_primary()?
        };
        to_target(&expr).ok_or_else(|| {
            self.fail(
                format!("can't assign to '{}'", expr.kind.describe()),
                expr.line,
            )
        })
    }
}

fn to_target(expr: &Expr) -> Option<Target> {
    match &expr.kind {
        ExprKind::Name(name) => Some(Target::Name(name.clone())),
        ExprKind::Tuple(items) => items
            .iter()
            .map(to_target)
            .collect::<Option<Vec<_>>>()
            .map(Target::Tuple),
        _ => None,
    }
}

fn flush(body: &mut Vec<Stmt>, buffer: &mut Vec<Expr>, line: usize) {
    if !buffer.is_empty() {
        body.push(Stmt::new(StmtKind::Output(std::mem::take(buffer)), line));
    }
}

fn is_whitespace_output(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Output(nodes) => nodes
            .iter()
            .all(|n| matches!(&n.kind, ExprKind::TemplateData(text) if text.trim().is_empty())),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::error::ErrorKind;

    fn parse(source: &str) -> Result<SyntaxTree> {
        Environment::new().parse(source, Some("test.html"))
    }

    #[test]
    fn test_unknown_tag_names_the_open_block() {
        let err = parse("{% for x in y %}{% endif %}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
        assert!(err.message().contains("Encountered unknown tag 'endif'"));
        assert!(err.message().contains("'endfor' or 'else'"));
        assert!(err.message().contains("innermost block that needs to be closed is 'for'"));
    }

    #[test]
    fn test_unexpected_end() {
        let err = parse("{% if x %}never closed").unwrap_err();
        assert!(err.message().starts_with("Unexpected end of template."));
        assert!(err.message().contains("'elif' or 'else' or 'endif'"));
    }

    #[test]
    fn test_blocks_are_lifted() {
        let tree = parse("a{% block body %}b{% block inner %}c{% endblock %}{% endblock body %}").unwrap();
        assert_eq!(tree.blocks.keys().collect::<Vec<_>>(), vec!["body", "inner"]);
        assert!(matches!(tree.body[1].kind, StmtKind::Block(ref name) if name == "body"));
    }

    #[test]
    fn test_duplicate_block() {
        let err = parse("{% block a %}{% endblock %}{% block a %}{% endblock %}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AssertionError);
    }

    #[test]
    fn test_mismatched_endblock_name() {
        let err = parse("{% block a %}{% endblock b %}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
    }

    #[test]
    fn test_required_block_must_be_empty() {
        assert!(parse("{% block a required %} {# c #} {% endblock %}").is_ok());
        assert!(parse("{% block a required %}x{% endblock %}").is_err());
    }

    #[test]
    fn test_extends_placement() {
        assert!(parse("  {# comment #}\n{% extends 'base' %}").is_ok());
        assert_eq!(
            parse("text{% extends 'base' %}").unwrap_err().kind(),
            ErrorKind::AssertionError
        );
        assert_eq!(
            parse("{% extends 'a' %}{% extends 'b' %}").unwrap_err().kind(),
            ErrorKind::AssertionError
        );
        assert_eq!(
            parse("{% if x %}{% extends 'a' %}{% endif %}").unwrap_err().kind(),
            ErrorKind::SyntaxError
        );
    }

    #[test]
    fn test_from_import_rejects_private_names() {
        let err = parse("{% from 'm' import _private %}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AssertionError);
    }

    #[test]
    fn test_macro_signature() {
        let err = parse("{% macro m(a=1, b) %}{% endmacro %}").unwrap_err();
        assert!(err.message().contains("non-default argument"));
    }

    #[test]
    fn test_cannot_assign_to_literal() {
        let err = parse("{% set 1 = 2 %}").unwrap_err();
        assert_eq!(err.message(), "can't assign to 'const'");
    }

    #[test]
    fn test_error_carries_template_name() {
        let err = parse("\n\n{% for %}").unwrap_err();
        assert_eq!(err.name(), Some("test.html"));
        assert_eq!(err.line(), Some(3));
    }
}
