//! Expression grammar
//!
//!     Precedence climbing, loosest binding first:
//!
//!         conditional   `a if b else c`
//!         or, and, not
//!         comparisons   `== != < <= > >= in, not in` (chained)
//!         additive      `+ -`
//!         concat        `~`
//!         multiplicative `* / // %`
//!         power         `**`
//!         unary         `- +`
//!         postfix       `.attr [key] [a:b:c] (args)`, then `|filter` and `is test`
//!         primary       names, literals, `( )`, `[ ]`, `{ }`
//!
//!     Filters and tests attach to the whole unary expression on their left: `-x|abs` reads
//!     as `(-x)|abs`, while `x.y|f` filters the attribute.

use super::ast::{CallArgs, Expr, ExprKind, UnaryOp};
use super::parser::Parser;
use crate::error::Result;
use crate::lexing::TokenKind;
use crate::runtime::ops::{BinOp, CmpOp};
use crate::runtime::Value;

enum Subscript {
    Index(Expr),
    Slice {
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
}

impl Parser<'_> {
    pub fn parse_expression(&mut self, with_condexpr: bool) -> Result<Expr> {
        if with_condexpr {
            self.parse_condexpr()
        } else {
            self.parse_or()
        }
    }

    fn parse_condexpr(&mut self) -> Result<Expr> {
        let line = self.stream().line();
        let mut expr = self.parse_or()?;
        while self.stream().skip_name("if")? {
            let test = self.parse_or()?;
            let otherwise = if self.stream().skip_name("else")? {
                Some(self.parse_condexpr()?.boxed())
            } else {
                None
            };
            expr = Expr::new(
                ExprKind::Cond {
                    test: test.boxed(),
                    then: expr.boxed(),
                    otherwise,
                },
                line,
            );
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let line = self.stream().line();
        let mut left = self.parse_and()?;
        while self.stream().skip_name("or")? {
            let right = self.parse_and()?;
            left = Expr::new(ExprKind::Or(left.boxed(), right.boxed()), line);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let line = self.stream().line();
        let mut left = self.parse_not()?;
        while self.stream().skip_name("and")? {
            let right = self.parse_not()?;
            left = Expr::new(ExprKind::And(left.boxed(), right.boxed()), line);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.stream().current().kind.is_name("not") {
            let line = self.stream().next_token()?.line;
            let operand = self.parse_not()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: operand.boxed(),
                },
                line,
            ));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr> {
        let line = self.stream().line();
        let expr = self.parse_math1()?;
        let mut ops = Vec::new();
        loop {
            let op = match &self.stream().current().kind {
                TokenKind::Eq => Some(CmpOp::Eq),
                TokenKind::Ne => Some(CmpOp::Ne),
                TokenKind::Lt => Some(CmpOp::Lt),
                TokenKind::Lte => Some(CmpOp::Lte),
                TokenKind::Gt => Some(CmpOp::Gt),
                TokenKind::Gte => Some(CmpOp::Gte),
                _ => None,
            };
            if let Some(op) = op {
                self.stream().next_token()?;
                ops.push((op, self.parse_math1()?));
            } else if self.stream().skip_name("in")? {
                ops.push((CmpOp::In, self.parse_math1()?));
            } else if self.stream().current().kind.is_name("not")
                && self.stream().look()?.kind.is_name("in")
            {
                self.stream().next_token()?;
                self.stream().next_token()?;
                ops.push((CmpOp::NotIn, self.parse_math1()?));
            } else {
                break;
            }
        }
        if ops.is_empty() {
            return Ok(expr);
        }
        Ok(Expr::new(
            ExprKind::Compare {
                expr: expr.boxed(),
                ops,
            },
            line,
        ))
    }

    fn binary(op: BinOp, left: Expr, right: Expr, line: usize) -> Expr {
        Expr::new(
            ExprKind::Binary {
                op,
                left: left.boxed(),
                right: right.boxed(),
            },
            line,
        )
    }

    fn parse_math1(&mut self) -> Result<Expr> {
        let line = self.stream().line();
        let mut left = self.parse_concat()?;
        loop {
            let op = match self.stream().current().kind {
                TokenKind::Add => BinOp::Add,
                TokenKind::Sub => BinOp::Sub,
                _ => break,
            };
            self.stream().next_token()?;
            let right = self.parse_concat()?;
            left = Self::binary(op, left, right, line);
        }
        Ok(left)
    }

    fn parse_concat(&mut self) -> Result<Expr> {
        let line = self.stream().line();
        let mut args = vec![self.parse_math2()?];
        while self.stream().skip_if(&TokenKind::Tilde)? {
            args.push(self.parse_math2()?);
        }
        if args.len() == 1 {
            return Ok(args.remove(0));
        }
        Ok(Expr::new(ExprKind::Concat(args), line))
    }

    fn parse_math2(&mut self) -> Result<Expr> {
        let line = self.stream().line();
        let mut left = self.parse_pow()?;
        loop {
            let op = match self.stream().current().kind {
                TokenKind::Mul => BinOp::Mul,
                TokenKind::Div => BinOp::Div,
                TokenKind::FloorDiv => BinOp::FloorDiv,
                TokenKind::Mod => BinOp::Mod,
                _ => break,
            };
            self.stream().next_token()?;
            let right = self.parse_pow()?;
            left = Self::binary(op, left, right, line);
        }
        Ok(left)
    }

    fn parse_pow(&mut self) -> Result<Expr> {
        let line = self.stream().line();
        let mut left = self.parse_unary(true)?;
        while self.stream().skip_if(&TokenKind::Pow)? {
            let right = self.parse_unary(true)?;
            left = Self::binary(BinOp::Pow, left, right, line);
        }
        Ok(left)
    }

    fn parse_unary(&mut self, with_filter: bool) -> Result<Expr> {
        let line = self.stream().line();
        let op = match self.stream().current().kind {
            TokenKind::Sub => Some(UnaryOp::Neg),
            TokenKind::Add => Some(UnaryOp::Pos),
            _ => None,
        };
        let node = match op {
            Some(op) => {
                self.stream().next_token()?;
                let operand = self.parse_unary(false)?;
                Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: operand.boxed(),
                    },
                    line,
                )
            }
            None => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)?
            }
        };
        if with_filter {
            return self.parse_filter_expr(node);
        }
        Ok(node)
    }

    pub fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.stream().current().clone();
        let line = token.line;
        let node = match token.kind {
            TokenKind::Name(name) => {
                self.stream().next_token()?;
                match name.as_str() {
                    "true" | "True" => Expr::constant(true, line),
                    "false" | "False" => Expr::constant(false, line),
                    "none" | "None" => Expr::new(ExprKind::Const(Value::None), line),
                    _ => Expr::name(name, line),
                }
            }
            TokenKind::Str(text) => {
                self.stream().next_token()?;
                Expr::constant(text, line)
            }
            TokenKind::Int(n) => {
                self.stream().next_token()?;
                Expr::constant(n, line)
            }
            TokenKind::Float(f) => {
                self.stream().next_token()?;
                Expr::constant(f, line)
            }
            TokenKind::LParen => {
                self.stream().next_token()?;
                let node = self.parse_tuple(false, true, &[], true)?;
                self.stream().expect(&TokenKind::RParen)?;
                node
            }
            TokenKind::LBracket => self.parse_list()?,
            TokenKind::LBrace => self.parse_dict()?,
            other => return Err(self.fail(format!("unexpected {}", other), line)),
        };
        Ok(node)
    }

    /// A comma-separated expression list that becomes a tuple when a comma is present.
    ///
    /// `simplified` restricts items to primaries (assignment targets), `extra_end_rules`
    /// names keywords that end the tuple, `explicit_parentheses` allows the empty tuple.
    pub fn parse_tuple(
        &mut self,
        simplified: bool,
        with_condexpr: bool,
        extra_end_rules: &[&str],
        explicit_parentheses: bool,
    ) -> Result<Expr> {
        let line = self.stream().line();
        let mut args = Vec::new();
        let mut is_tuple = false;
        loop {
            if !args.is_empty() {
                self.stream().expect(&TokenKind::Comma)?;
            }
            if self.is_tuple_end(extra_end_rules) {
                break;
            }
            let item = if simplified {
                self.parse_primary()?
            } else {
                self.parse_expression(with_condexpr)?
            };
            args.push(item);
            if self.stream().current().kind == TokenKind::Comma {
                is_tuple = true;
            } else {
                break;
            }
        }
        if !is_tuple {
            if let Some(single) = args.pop() {
                return Ok(single);
            }
            if !explicit_parentheses {
                let current = self.stream().current().clone();
                return Err(self.fail(
                    format!("Expected an expression, got {}", current.kind),
                    current.line,
                ));
            }
        }
        Ok(Expr::new(ExprKind::Tuple(args), line))
    }

    fn is_tuple_end(&mut self, extra_end_rules: &[&str]) -> bool {
        let current = &self.stream().current().kind;
        matches!(
            current,
            TokenKind::VariableEnd | TokenKind::BlockEnd | TokenKind::RParen | TokenKind::Eof
        ) || extra_end_rules.iter().any(|rule| current.is_name(rule))
    }

    fn parse_list(&mut self) -> Result<Expr> {
        let line = self.stream().expect(&TokenKind::LBracket)?.line;
        let mut items = Vec::new();
        while self.stream().current().kind != TokenKind::RBracket {
            if !items.is_empty() {
                self.stream().expect(&TokenKind::Comma)?;
            }
            if self.stream().current().kind == TokenKind::RBracket {
                break;
            }
            items.push(self.parse_expression(true)?);
        }
        self.stream().expect(&TokenKind::RBracket)?;
        Ok(Expr::new(ExprKind::List(items), line))
    }

    fn parse_dict(&mut self) -> Result<Expr> {
        let line = self.stream().expect(&TokenKind::LBrace)?.line;
        let mut items = Vec::new();
        while self.stream().current().kind != TokenKind::RBrace {
            if !items.is_empty() {
                self.stream().expect(&TokenKind::Comma)?;
            }
            if self.stream().current().kind == TokenKind::RBrace {
                break;
            }
            let key = self.parse_expression(true)?;
            self.stream().expect(&TokenKind::Colon)?;
            let value = self.parse_expression(true)?;
            items.push((key, value));
        }
        self.stream().expect(&TokenKind::RBrace)?;
        Ok(Expr::new(ExprKind::Dict(items), line))
    }

    fn parse_postfix(&mut self, mut node: Expr) -> Result<Expr> {
        loop {
            match self.stream().current().kind {
                TokenKind::Dot | TokenKind::LBracket => node = self.parse_subscript(node)?,
                TokenKind::LParen => node = self.parse_call(node)?,
                _ => return Ok(node),
            }
        }
    }

    fn parse_filter_expr(&mut self, mut node: Expr) -> Result<Expr> {
        loop {
            let current = &self.stream().current().kind;
            if *current == TokenKind::Pipe {
                node = self.parse_filter(Some(node), false)?;
            } else if current.is_name("is") {
                node = self.parse_test(node)?;
            } else if *current == TokenKind::LParen {
                node = self.parse_call(node)?;
            } else {
                return Ok(node);
            }
        }
    }

    fn parse_subscript(&mut self, node: Expr) -> Result<Expr> {
        let token = self.stream().next_token()?;
        let line = token.line;
        if token.kind == TokenKind::Dot {
            let attr = self.stream().next_token()?;
            return match attr.kind {
                TokenKind::Name(name) => Ok(Expr::new(
                    ExprKind::GetAttr {
                        expr: node.boxed(),
                        attr: name,
                    },
                    line,
                )),
                TokenKind::Int(n) => Ok(Expr::new(
                    ExprKind::GetItem {
                        expr: node.boxed(),
                        index: Expr::constant(n, line).boxed(),
                    },
                    line,
                )),
                _ => Err(self.fail("expected name or number", attr.line)),
            };
        }

        let mut args = Vec::new();
        while self.stream().current().kind != TokenKind::RBracket {
            if !args.is_empty() {
                self.stream().expect(&TokenKind::Comma)?;
            }
            args.push(self.parse_subscribed()?);
        }
        self.stream().expect(&TokenKind::RBracket)?;

        let index = match args.len() {
            1 => match args.remove(0) {
                Subscript::Slice { start, stop, step } => {
                    return Ok(Expr::new(
                        ExprKind::Slice {
                            expr: node.boxed(),
                            start,
                            stop,
                            step,
                        },
                        line,
                    ));
                }
                Subscript::Index(index) => index,
            },
            _ => {
                let mut items = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        Subscript::Index(index) => items.push(index),
                        Subscript::Slice { .. } => {
                            return Err(self.fail("slices cannot be combined in a subscript", line))
                        }
                    }
                }
                Expr::new(ExprKind::Tuple(items), line)
            }
        };
        Ok(Expr::new(
            ExprKind::GetItem {
                expr: node.boxed(),
                index: index.boxed(),
            },
            line,
        ))
    }

    /// One item inside `[...]`: a plain expression or a `start:stop:step` slice.
    fn parse_subscribed(&mut self) -> Result<Subscript> {
        let start = if self.stream().skip_if(&TokenKind::Colon)? {
            None
        } else {
            let node = self.parse_expression(true)?;
            if !self.stream().skip_if(&TokenKind::Colon)? {
                return Ok(Subscript::Index(node));
            }
            Some(node.boxed())
        };

        let stop = if self.stream().current().kind == TokenKind::Colon || self.at_subscript_end() {
            None
        } else {
            Some(self.parse_expression(true)?.boxed())
        };

        let step = if self.stream().skip_if(&TokenKind::Colon)? && !self.at_subscript_end() {
            Some(self.parse_expression(true)?.boxed())
        } else {
            None
        };

        Ok(Subscript::Slice { start, stop, step })
    }

    fn at_subscript_end(&mut self) -> bool {
        matches!(
            self.stream().current().kind,
            TokenKind::RBracket | TokenKind::Comma
        )
    }

    pub fn parse_call_args(&mut self) -> Result<CallArgs> {
        let open = self.stream().expect(&TokenKind::LParen)?;
        let mut args = CallArgs::default();
        let mut require_comma = false;
        let invalid = |parser: &Self| {
            parser.fail("invalid syntax for function call expression", open.line)
        };

        while self.stream().current().kind != TokenKind::RParen {
            if require_comma {
                self.stream().expect(&TokenKind::Comma)?;
                if self.stream().current().kind == TokenKind::RParen {
                    break;
                }
            }
            match self.stream().current().kind {
                TokenKind::Mul => {
                    if args.dyn_args.is_some() || args.dyn_kwargs.is_some() {
                        return Err(invalid(self));
                    }
                    self.stream().next_token()?;
                    args.dyn_args = Some(self.parse_expression(true)?.boxed());
                }
                TokenKind::Pow => {
                    if args.dyn_kwargs.is_some() {
                        return Err(invalid(self));
                    }
                    self.stream().next_token()?;
                    args.dyn_kwargs = Some(self.parse_expression(true)?.boxed());
                }
                _ => {
                    let keyword = match &self.stream().current().kind {
                        TokenKind::Name(name) => Some(name.clone()),
                        _ => None,
                    };
                    let keyword = match keyword {
                        Some(name) if self.stream().look()?.kind == TokenKind::Assign => Some(name),
                        _ => None,
                    };
                    match keyword {
                        Some(key) => {
                            if args.dyn_kwargs.is_some() {
                                return Err(invalid(self));
                            }
                            self.stream().next_token()?;
                            self.stream().next_token()?;
                            let value = self.parse_expression(true)?;
                            args.kwargs.push((key, value));
                        }
                        None => {
                            if args.dyn_args.is_some()
                                || args.dyn_kwargs.is_some()
                                || !args.kwargs.is_empty()
                            {
                                return Err(invalid(self));
                            }
                            args.args.push(self.parse_expression(true)?);
                        }
                    }
                }
            }
            require_comma = true;
        }
        self.stream().expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_call(&mut self, callee: Expr) -> Result<Expr> {
        let line = self.stream().line();
        let args = self.parse_call_args()?;
        Ok(Expr::new(
            ExprKind::Call {
                callee: callee.boxed(),
                args,
            },
            line,
        ))
    }

    /// `|name(args)` chains. With `start_inline` the first filter has no leading pipe
    /// (`{% filter upper %}`); a missing `node` stands for captured block output.
    pub fn parse_filter(&mut self, mut node: Option<Expr>, mut start_inline: bool) -> Result<Expr> {
        while self.stream().current().kind == TokenKind::Pipe || start_inline {
            if !start_inline {
                self.stream().next_token()?;
            }
            let (name, line) = self.parse_dotted_name()?;
            let args = if self.stream().current().kind == TokenKind::LParen {
                self.parse_call_args()?
            } else {
                CallArgs::default()
            };
            node = Some(Expr::new(
                ExprKind::Filter {
                    input: node.map(Expr::boxed),
                    name,
                    args,
                },
                line,
            ));
            start_inline = false;
        }
        let line = self.stream().line();
        node.ok_or_else(|| self.fail("expected a filter", line))
    }

    fn parse_dotted_name(&mut self) -> Result<(String, usize)> {
        let (mut name, line) = self.stream().expect_any_name()?;
        while self.stream().skip_if(&TokenKind::Dot)? {
            name.push('.');
            name.push_str(&self.stream().expect_any_name()?.0);
        }
        Ok((name, line))
    }

    fn parse_test(&mut self, node: Expr) -> Result<Expr> {
        let line = self.stream().next_token()?.line;
        let negated = self.stream().skip_name("not")?;
        let (name, _) = self.parse_dotted_name()?;

        let current = self.stream().current().clone();
        let args = match &current.kind {
            TokenKind::LParen => self.parse_call_args()?,
            TokenKind::Name(_)
            | TokenKind::Str(_)
            | TokenKind::Int(_)
            | TokenKind::Float(_)
            | TokenKind::LBracket
            | TokenKind::LBrace
                if !["else", "or", "and"].iter().any(|k| current.kind.is_name(k)) =>
            {
                if current.kind.is_name("is") {
                    return Err(self.fail("You cannot chain multiple tests with is", current.line));
                }
                let arg = self.parse_primary()?;
                let arg = self.parse_postfix(arg)?;
                CallArgs::positional(vec![arg])
            }
            _ => CallArgs::default(),
        };

        let test = Expr::new(
            ExprKind::Test {
                expr: node.boxed(),
                name,
                args,
            },
            line,
        );
        if negated {
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: test.boxed(),
                },
                line,
            ));
        }
        Ok(test)
    }
}
