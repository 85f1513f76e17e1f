//! Lazy template tokenizer
//!
//!     The tokenizer is a small state machine over the source text. In data mode it looks for
//!     the nearest opening delimiter (or line prefix), cuts the literal text before it, applies
//!     whitespace control to that text and emits it. In tag mode it skips whitespace, checks
//!     for the closing delimiter (only when no bracket is open) and otherwise lexes one
//!     interior token with [RawToken].
//!
//!     Tokens are queued and handed out one at a time, so a consumer that stops early never
//!     pays for lexing the rest of the source. The first error ends the sequence.

use std::collections::VecDeque;

use logos::Logos;
use regex::Regex;

use super::syntax::{SyntaxConfig, WhitespaceConfig};
use super::token::{count_newlines, RawToken, Token, TokenKind};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Data,
    Variable,
    Block,
    LineStatement,
    Done,
}

/// What to strip from the start of the next data token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrimNext {
    Nothing,
    /// `-` on the closing delimiter: all leading whitespace.
    Whitespace,
    /// trim_blocks: a single leading newline.
    Newline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Block,
    Variable,
    Comment,
    LineStatement,
    LineComment,
}

/// A located opening marker in the data stream.
#[derive(Debug, Clone, Copy)]
struct Found {
    marker: Marker,
    /// Where the literal data ends.
    data_end: usize,
    /// Where the tag interior (after delimiter and modifier) begins.
    body_start: usize,
    /// `-` or `+` directly after the opening delimiter.
    modifier: Option<char>,
}

pub struct Tokenizer<'s> {
    source: &'s str,
    syntax: SyntaxConfig,
    whitespace: WhitespaceConfig,
    raw_begin: Option<Regex>,
    raw_end: Option<Regex>,
    pos: usize,
    line: usize,
    mode: Mode,
    trim_next: TrimNext,
    brackets: Vec<(char, usize)>,
    queue: VecDeque<Token>,
}

impl<'s> Tokenizer<'s> {
    pub fn new(source: &'s str, syntax: &SyntaxConfig, whitespace: &WhitespaceConfig) -> Self {
        let source = if whitespace.keep_trailing_newline {
            source
        } else {
            strip_trailing_newline(source)
        };
        let block_end = regex::escape(&syntax.block_end);
        let block_start = regex::escape(&syntax.block_start);
        let raw_begin = Regex::new(&format!(r"\A\s*raw\s*([-+]?){}", block_end)).ok();
        let raw_end = Regex::new(&format!(
            r"{}([-+]?)\s*endraw\s*([-+]?){}",
            block_start, block_end
        ))
        .ok();
        Tokenizer {
            source,
            syntax: syntax.clone(),
            whitespace: *whitespace,
            raw_begin,
            raw_end,
            pos: 0,
            line: 1,
            mode: Mode::Data,
            trim_next: TrimNext::Nothing,
            brackets: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    fn rest(&self) -> &'s str {
        &self.source[self.pos..]
    }

    fn advance(&mut self, len: usize) {
        let consumed = &self.source[self.pos..self.pos + len];
        self.line += count_newlines(consumed);
        self.pos += len;
    }

    fn push(&mut self, kind: TokenKind, line: usize) {
        self.queue.push_back(Token::new(kind, line));
    }

    fn step(&mut self) -> Result<()> {
        match self.mode {
            Mode::Data => self.scan_data(),
            Mode::Variable | Mode::Block | Mode::LineStatement => self.scan_tag(),
            Mode::Done => Ok(()),
        }
    }

    fn is_line_start(&self, at: usize) -> bool {
        at == 0 || matches!(self.source.as_bytes()[at - 1], b'\n' | b'\r')
    }

    fn find_marker(&self) -> Option<Found> {
        let rest = self.rest();
        let mut best: Option<(Found, usize)> = None;
        let mut consider = |found: Found, delim_len: usize| {
            let better = match &best {
                None => true,
                Some((current, current_len)) => {
                    found.data_end < current.data_end
                        || (found.data_end == current.data_end && delim_len > *current_len)
                }
            };
            if better {
                best = Some((found, delim_len));
            }
        };

        let delimiters = [
            (Marker::Block, &self.syntax.block_start),
            (Marker::Variable, &self.syntax.variable_start),
            (Marker::Comment, &self.syntax.comment_start),
        ];
        for (marker, delim) in delimiters {
            if let Some(offset) = rest.find(delim.as_str()) {
                let start = self.pos + offset;
                let after = start + delim.len();
                let modifier = self.source[after..]
                    .chars()
                    .next()
                    .filter(|c| *c == '-' || (*c == '+' && marker != Marker::Variable));
                consider(
                    Found {
                        marker,
                        data_end: start,
                        body_start: after + modifier.map_or(0, |_| 1),
                        modifier,
                    },
                    delim.len(),
                );
            }
        }

        if let Some(prefix) = &self.syntax.line_statement_prefix {
            if let Some((indent, start)) = self.find_line_prefix(prefix) {
                consider(
                    Found {
                        marker: Marker::LineStatement,
                        data_end: indent,
                        body_start: start + prefix.len(),
                        modifier: None,
                    },
                    prefix.len(),
                );
            }
        }

        if let Some(prefix) = &self.syntax.line_comment_prefix {
            if let Some(offset) = rest.find(prefix.as_str()) {
                let start = self.pos + offset;
                let line_begin = self.source[..start]
                    .rfind(['\n', '\r'])
                    .map_or(0, |i| i + 1)
                    .max(self.pos);
                let indent = self.source[line_begin..start]
                    .trim_end_matches([' ', '\t'])
                    .len()
                    + line_begin;
                consider(
                    Found {
                        marker: Marker::LineComment,
                        data_end: indent,
                        body_start: start + prefix.len(),
                        modifier: None,
                    },
                    prefix.len(),
                );
            }
        }

        best.map(|(found, _)| found)
    }

    /// First line (at or after the cursor) whose first non-blank text is `prefix`.
    /// Returns the indentation start and the prefix start.
    fn find_line_prefix(&self, prefix: &str) -> Option<(usize, usize)> {
        let mut at = self.pos;
        loop {
            if self.is_line_start(at) {
                let line = &self.source[at..];
                let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
                if line[indent..].starts_with(prefix) {
                    return Some((at, at + indent));
                }
            }
            let next = self.source[at..].find(['\n', '\r'])?;
            at += next + 1;
            if at < self.source.len()
                && self.source.as_bytes()[at - 1] == b'\r'
                && self.source.as_bytes()[at] == b'\n'
            {
                at += 1;
            }
            if at >= self.source.len() {
                return None;
            }
        }
    }

    fn scan_data(&mut self) -> Result<()> {
        if self.pos >= self.source.len() {
            self.mode = Mode::Done;
            return Ok(());
        }

        let found = self.find_marker();
        let data_end = found.map_or(self.source.len(), |f| f.data_end);
        let data_start = self.pos;
        let original = &self.source[data_start..data_end];
        let mut text = match self.trim_next {
            TrimNext::Whitespace => original.trim_start(),
            TrimNext::Newline => strip_leading_newline(original),
            TrimNext::Nothing => original,
        };
        self.trim_next = TrimNext::Nothing;
        // report the line of the first surviving character
        let line = self.line + count_newlines(&original[..original.len() - text.len()]);

        if let Some(found) = found {
            match found.modifier {
                Some('-') => text = text.trim_end(),
                Some('+') => {}
                _ => {
                    let strips_line = matches!(found.marker, Marker::Block | Marker::Comment)
                        && self.whitespace.lstrip_blocks;
                    if strips_line {
                        text = lstrip_last_line(text, self.is_line_start(data_start));
                    }
                }
            }
        }

        if !text.is_empty() {
            let normalized = normalize_newlines(text, self.whitespace.newline_sequence.as_str());
            self.push(TokenKind::Data(normalized), line);
        }
        self.advance(data_end - data_start);

        let Some(found) = found else {
            self.mode = Mode::Done;
            return Ok(());
        };

        match found.marker {
            Marker::Comment => self.skip_comment(found),
            Marker::LineComment => {
                let end = self.source[found.body_start..]
                    .find(['\n', '\r'])
                    .map_or(self.source.len(), |i| found.body_start + i);
                self.advance(end - self.pos);
                Ok(())
            }
            Marker::Variable => {
                self.push(TokenKind::VariableBegin, self.line);
                self.advance(found.body_start - self.pos);
                self.mode = Mode::Variable;
                Ok(())
            }
            Marker::LineStatement => {
                self.push(TokenKind::BlockBegin, self.line);
                self.advance(found.body_start - self.pos);
                self.mode = Mode::LineStatement;
                Ok(())
            }
            Marker::Block => {
                let body = &self.source[found.body_start..];
                if let Some(caps) = self.raw_begin.as_ref().and_then(|re| re.captures(body)) {
                    let tag_len = caps.get(0).map_or(0, |m| m.end());
                    let trim_inner = caps.get(1).map(|m| m.as_str()) == Some("-");
                    let line = self.line;
                    self.advance(found.body_start + tag_len - self.pos);
                    return self.scan_raw(line, trim_inner);
                }
                self.push(TokenKind::BlockBegin, self.line);
                self.advance(found.body_start - self.pos);
                self.mode = Mode::Block;
                Ok(())
            }
        }
    }

    fn skip_comment(&mut self, found: Found) -> Result<()> {
        let line = self.line;
        let end = &self.syntax.comment_end;
        let Some(offset) = self.source[found.body_start..].find(end.as_str()) else {
            self.mode = Mode::Done;
            return Err(Error::syntax("missing end of comment tag", line));
        };
        let close = found.body_start + offset;
        let trims = close > found.body_start && self.source.as_bytes()[close - 1] == b'-';
        let keeps = close > found.body_start && self.source.as_bytes()[close - 1] == b'+';
        self.advance(close + end.len() - self.pos);
        self.trim_next = if trims {
            TrimNext::Whitespace
        } else if self.whitespace.trim_blocks && !keeps {
            TrimNext::Newline
        } else {
            TrimNext::Nothing
        };
        Ok(())
    }

    fn scan_raw(&mut self, line: usize, trim_inner: bool) -> Result<()> {
        let Some(caps) = self.raw_end.as_ref().and_then(|re| re.captures(self.rest())) else {
            self.mode = Mode::Done;
            return Err(Error::syntax("missing end of raw directive", line));
        };
        let (start, end) = caps.get(0).map_or((0, 0), |m| (m.start(), m.end()));
        let mut text = &self.rest()[..start];
        if trim_inner {
            text = text.trim_start();
        }
        match caps.get(1).map(|m| m.as_str()) {
            Some("-") => text = text.trim_end(),
            Some("+") => {}
            _ => {
                if self.whitespace.lstrip_blocks {
                    text = lstrip_last_line(text, false);
                }
            }
        }
        if !text.is_empty() {
            let normalized = normalize_newlines(text, self.whitespace.newline_sequence.as_str());
            self.push(TokenKind::Data(normalized), line);
        }
        let close_modifier = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        self.advance(end);
        self.trim_next = match close_modifier {
            "-" => TrimNext::Whitespace,
            "+" => TrimNext::Nothing,
            _ if self.whitespace.trim_blocks => TrimNext::Newline,
            _ => TrimNext::Nothing,
        };
        Ok(())
    }

    /// Skip blanks inside a tag. Line statements stop at a newline when no bracket is open.
    fn skip_blanks(&mut self) {
        let line_mode = self.mode == Mode::LineStatement && self.brackets.is_empty();
        let rest = self.rest();
        let trimmed = if line_mode {
            rest.trim_start_matches([' ', '\t', '\x0c'])
        } else {
            rest.trim_start()
        };
        let skipped = rest.len() - trimmed.len();
        self.advance(skipped);
    }

    fn try_close(&mut self) -> bool {
        if !self.brackets.is_empty() {
            return false;
        }
        let rest = self.rest();
        match self.mode {
            Mode::LineStatement => {
                let newline = if rest.starts_with("\r\n") {
                    2
                } else if rest.starts_with(['\n', '\r']) {
                    1
                } else if rest.is_empty() {
                    0
                } else {
                    return false;
                };
                self.push(TokenKind::BlockEnd, self.line);
                self.advance(newline);
                self.mode = Mode::Data;
                true
            }
            Mode::Variable | Mode::Block => {
                let (end, kind) = if self.mode == Mode::Block {
                    (&self.syntax.block_end, TokenKind::BlockEnd)
                } else {
                    (&self.syntax.variable_end, TokenKind::VariableEnd)
                };
                let (modifier, len) = if rest.starts_with('-') && rest[1..].starts_with(end.as_str())
                {
                    (Some('-'), end.len() + 1)
                } else if rest.starts_with('+') && rest[1..].starts_with(end.as_str()) {
                    (Some('+'), end.len() + 1)
                } else if rest.starts_with(end.as_str()) {
                    (None, end.len())
                } else {
                    return false;
                };
                let is_block = self.mode == Mode::Block;
                self.push(kind, self.line);
                self.advance(len);
                self.trim_next = match modifier {
                    Some('-') => TrimNext::Whitespace,
                    None if is_block && self.whitespace.trim_blocks => TrimNext::Newline,
                    _ => TrimNext::Nothing,
                };
                self.mode = Mode::Data;
                true
            }
            Mode::Data | Mode::Done => false,
        }
    }

    fn scan_tag(&mut self) -> Result<()> {
        self.skip_blanks();
        if self.try_close() {
            return Ok(());
        }
        let rest = self.rest();
        if rest.is_empty() {
            let line = self.line;
            self.mode = Mode::Done;
            if let Some((open, open_line)) = self.brackets.last() {
                return Err(Error::syntax(
                    format!("unexpected end of template, '{}' opened on line {} was never closed", open, open_line),
                    line,
                ));
            }
            return Err(Error::syntax("unexpected end of template", line));
        }

        let line = self.line;
        let mut lexer = RawToken::lexer(rest);
        let raw = match lexer.next() {
            Some(Ok(raw)) => raw,
            _ => {
                self.mode = Mode::Done;
                let c = rest.chars().next().unwrap_or(' ');
                if c == '"' || c == '\'' {
                    return Err(Error::syntax("unterminated string", line));
                }
                return Err(Error::syntax(format!("unexpected char {:?}", c), line));
            }
        };
        let len = lexer.span().end;
        let text = &rest[..len];

        let kind = match raw {
            RawToken::Name => TokenKind::Name(text.to_string()),
            RawToken::Int => {
                let digits = text.replace('_', "");
                let value = digits
                    .parse::<i64>()
                    .map_err(|_| Error::syntax(format!("integer literal {} is out of range", text), line))?;
                TokenKind::Int(value)
            }
            RawToken::Float => {
                let digits = text.replace('_', "");
                let value = digits
                    .parse::<f64>()
                    .map_err(|_| Error::syntax(format!("invalid float literal {}", text), line))?;
                TokenKind::Float(value)
            }
            RawToken::Str => {
                let mut value = unescape(&text[1..text.len() - 1]);
                self.advance(len);
                self.merge_adjacent_strings(&mut value)?;
                self.push(TokenKind::Str(value), line);
                return Ok(());
            }
            RawToken::Colon if self.mode == Mode::LineStatement && self.brackets.is_empty() => {
                // a trailing colon on a line statement is decoration
                let after = rest[len..].trim_start_matches([' ', '\t']);
                if after.is_empty() || after.starts_with(['\n', '\r']) {
                    self.advance(len);
                    return Ok(());
                }
                TokenKind::Colon
            }
            other => {
                let kind = TokenKind::operator(other)
                    .ok_or_else(|| Error::syntax(format!("unexpected {:?}", text), line))?;
                self.track_brackets(&kind, line)?;
                kind
            }
        };
        self.advance(len);
        self.push(kind, line);
        Ok(())
    }

    fn merge_adjacent_strings(&mut self, value: &mut String) -> Result<()> {
        loop {
            let rest = self.rest();
            let trimmed = if self.mode == Mode::LineStatement && self.brackets.is_empty() {
                rest.trim_start_matches([' ', '\t'])
            } else {
                rest.trim_start()
            };
            if !trimmed.starts_with(['"', '\'']) {
                return Ok(());
            }
            let mut lexer = RawToken::lexer(trimmed);
            match lexer.next() {
                Some(Ok(RawToken::Str)) => {
                    let end = lexer.span().end;
                    value.push_str(&unescape(&trimmed[1..end - 1]));
                    let consumed = rest.len() - trimmed.len() + end;
                    self.advance(consumed);
                }
                _ => {
                    let skipped = rest.len() - trimmed.len();
                    self.advance(skipped);
                    return Err(Error::syntax("unterminated string", self.line));
                }
            }
        }
    }

    fn track_brackets(&mut self, kind: &TokenKind, line: usize) -> Result<()> {
        let (open, close) = match kind {
            TokenKind::LParen => return self.open_bracket('(', line),
            TokenKind::LBracket => return self.open_bracket('[', line),
            TokenKind::LBrace => return self.open_bracket('{', line),
            TokenKind::RParen => ('(', ')'),
            TokenKind::RBracket => ('[', ']'),
            TokenKind::RBrace => ('{', '}'),
            _ => return Ok(()),
        };
        match self.brackets.pop() {
            Some((top, _)) if top == open => Ok(()),
            Some((top, _)) => Err(Error::syntax(
                format!("unexpected '{}', expected '{}'", close, closing(top)),
                line,
            )),
            None => Err(Error::syntax(format!("unexpected '{}'", close), line)),
        }
    }

    fn open_bracket(&mut self, open: char, line: usize) -> Result<()> {
        self.brackets.push((open, line));
        Ok(())
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.queue.pop_front() {
                return Some(Ok(token));
            }
            if self.mode == Mode::Done {
                return None;
            }
            if let Err(err) = self.step() {
                self.mode = Mode::Done;
                self.queue.clear();
                return Some(Err(err));
            }
        }
    }
}

fn closing(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn strip_trailing_newline(source: &str) -> &str {
    source
        .strip_suffix("\r\n")
        .or_else(|| source.strip_suffix('\n'))
        .or_else(|| source.strip_suffix('\r'))
        .unwrap_or(source)
}

fn strip_leading_newline(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .or_else(|| text.strip_prefix('\r'))
        .unwrap_or(text)
}

/// Remove trailing spaces and tabs when they are all that is on the final line of `text`.
fn lstrip_last_line(text: &str, starts_line: bool) -> &str {
    let line_begin = match text.rfind(['\n', '\r']) {
        Some(i) => i + 1,
        None if starts_line => 0,
        None => return text,
    };
    if text[line_begin..].chars().all(|c| c == ' ' || c == '\t') {
        &text[..line_begin]
    } else {
        text
    }
}

fn normalize_newlines(text: &str, newline: &str) -> String {
    if !text.contains(['\n', '\r']) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str(newline);
            }
            '\n' => out.push_str(newline),
            other => out.push(other),
        }
    }
    out
}

/// Decode backslash escapes in a string literal body.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some(kind @ ('x' | 'u')) => {
                let width = if kind == 'x' { 2 } else { 4 };
                let digits: String = chars.clone().take(width).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == width => {
                        out.push(decoded);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    _ => {
                        out.push('\\');
                        out.push(kind);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexing::tokenize;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, &SyntaxConfig::default(), &WhitespaceConfig::default())
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_data_only() {
        assert_eq!(kinds("hello"), vec![TokenKind::Data("hello".into())]);
        assert!(kinds("").is_empty());
    }

    #[test]
    fn test_variable_tag() {
        assert_eq!(
            kinds("a{{ x }}b"),
            vec![
                TokenKind::Data("a".into()),
                TokenKind::VariableBegin,
                TokenKind::Name("x".into()),
                TokenKind::VariableEnd,
                TokenKind::Data("b".into()),
            ]
        );
    }

    #[test]
    fn test_nested_braces_do_not_close_tag() {
        let tokens = kinds("{{ {'a': {'b': 1}} }}");
        assert_eq!(tokens.last(), Some(&TokenKind::VariableEnd));
        assert_eq!(tokens.iter().filter(|k| **k == TokenKind::RBrace).count(), 2);
    }

    #[test]
    fn test_comments_are_dropped() {
        assert_eq!(
            kinds("a{# note #}b"),
            vec![TokenKind::Data("a".into()), TokenKind::Data("b".into())]
        );
    }

    #[test]
    fn test_minus_trims_neighbouring_data() {
        assert_eq!(
            kinds("a  {%- if x -%}\n  b"),
            vec![
                TokenKind::Data("a".into()),
                TokenKind::BlockBegin,
                TokenKind::Name("if".into()),
                TokenKind::Name("x".into()),
                TokenKind::BlockEnd,
                TokenKind::Data("b".into()),
            ]
        );
    }

    #[test]
    fn test_adjacent_strings_merge() {
        assert_eq!(
            kinds(r#"{{ "foo" 'bar' }}"#),
            vec![
                TokenKind::VariableBegin,
                TokenKind::Str("foobar".into()),
                TokenKind::VariableEnd,
            ]
        );
    }

    #[test]
    fn test_trailing_newline_removed_by_default() {
        assert_eq!(kinds("a\n"), vec![TokenKind::Data("a".into())]);
        let keep = WhitespaceConfig {
            keep_trailing_newline: true,
            ..WhitespaceConfig::default()
        };
        let tokens = tokenize("a\n", &SyntaxConfig::default(), &keep).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Data("a\n".into()));
    }

    #[test]
    fn test_raw_block() {
        assert_eq!(
            kinds("{% raw %}{{ x }}{% endraw %}"),
            vec![TokenKind::Data("{{ x }}".into())]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("{{ 'abc }}", &SyntaxConfig::default(), &WhitespaceConfig::default())
            .unwrap_err();
        assert_eq!(err.message(), "unterminated string");
    }

    #[test]
    fn test_unexpected_end() {
        let err = tokenize("a\n{{ x", &SyntaxConfig::default(), &WhitespaceConfig::default())
            .unwrap_err();
        assert_eq!(err.message(), "unexpected end of template");
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\nb"), "a\nb");
        assert_eq!(unescape(r"\u00e9"), "é");
        assert_eq!(unescape(r"\q"), "\\q");
    }

    #[test]
    fn test_lstrip_last_line() {
        assert_eq!(lstrip_last_line("a\n   ", false), "a\n");
        assert_eq!(lstrip_last_line("   ", true), "");
        assert_eq!(lstrip_last_line("   ", false), "   ");
        assert_eq!(lstrip_last_line("a\n x ", false), "a\n x ");
    }
}
