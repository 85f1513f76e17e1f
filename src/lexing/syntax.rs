//! Delimiter and whitespace configuration consumed by the tokenizer

use serde::Deserialize;

/// Delimiters and line prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyntaxConfig {
    pub block_start: String,
    pub block_end: String,
    pub variable_start: String,
    pub variable_end: String,
    pub comment_start: String,
    pub comment_end: String,
    /// When set, a line starting with this prefix (after indentation) is a statement.
    pub line_statement_prefix: Option<String>,
    /// When set, everything from this prefix to the end of the line is dropped.
    pub line_comment_prefix: Option<String>,
}

impl Default for SyntaxConfig {
    fn default() -> Self {
        SyntaxConfig {
            block_start: "{%".to_string(),
            block_end: "%}".to_string(),
            variable_start: "{{".to_string(),
            variable_end: "}}".to_string(),
            comment_start: "{#".to_string(),
            comment_end: "#}".to_string(),
            line_statement_prefix: None,
            line_comment_prefix: None,
        }
    }
}

impl SyntaxConfig {
    /// Reject configurations the tokenizer can't disambiguate.
    pub fn validate(&self) -> Result<(), String> {
        let delimiters = [
            ("block_start", &self.block_start),
            ("block_end", &self.block_end),
            ("variable_start", &self.variable_start),
            ("variable_end", &self.variable_end),
            ("comment_start", &self.comment_start),
            ("comment_end", &self.comment_end),
        ];
        for (key, value) in delimiters {
            if value.is_empty() {
                return Err(format!("delimiter {} must not be empty", key));
            }
        }
        let starts = [
            &self.block_start,
            &self.variable_start,
            &self.comment_start,
        ];
        for (i, a) in starts.iter().enumerate() {
            for b in starts.iter().skip(i + 1) {
                if a == b {
                    return Err(format!("start delimiter {:?} is used twice", a));
                }
            }
        }
        for prefix in [&self.line_statement_prefix, &self.line_comment_prefix]
            .into_iter()
            .flatten()
        {
            if prefix.is_empty() {
                return Err("line prefixes must not be empty".to_string());
            }
        }
        Ok(())
    }
}

/// The newline sequence data tokens are normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum NewlineSequence {
    #[default]
    #[serde(rename = "\n", alias = "lf")]
    Lf,
    #[serde(rename = "\r\n", alias = "crlf")]
    CrLf,
    #[serde(rename = "\r", alias = "cr")]
    Cr,
}

impl NewlineSequence {
    pub fn as_str(self) -> &'static str {
        match self {
            NewlineSequence::Lf => "\n",
            NewlineSequence::CrLf => "\r\n",
            NewlineSequence::Cr => "\r",
        }
    }
}

/// Whitespace handling around tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct WhitespaceConfig {
    /// Remove the first newline after a block tag.
    pub trim_blocks: bool,
    /// Strip spaces and tabs from the start of a line up to a block tag or comment.
    pub lstrip_blocks: bool,
    /// Keep the single trailing newline of the source.
    pub keep_trailing_newline: bool,
    pub newline_sequence: NewlineSequence,
}
