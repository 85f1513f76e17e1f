//! Escaping and printf-style formatting
//!
//!     [escape] is the single HTML escaping routine used by autoescaped output sites, the
//!     `escape` filter and safe-string formatting. [percent_format] implements the `%`
//!     operator on strings (`"%s and %(name)s"`), which translation blocks compile down to.
//!     When the format string is already safe, every interpolated argument is escaped so the
//!     result can stay safe.

use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;

use super::value::{StringKind, Value};
use crate::error::{Error, Result};

/// HTML-escape `&`, `<`, `>`, `"` and `'`.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Escape a value for output: safe strings pass through untouched.
pub fn escape_value(value: &Value) -> Result<String> {
    if let Value::String(s, StringKind::Safe) = value {
        return Ok(s.to_string());
    }
    Ok(escape(&value.to_output()?))
}

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%(?:\((?P<key>[^)]*)\))?(?P<flags>[-+ 0#]*)(?P<width>\d+)?(?:\.(?P<prec>\d+))?(?P<conv>[diouxXeEfFgGcrsa%])").unwrap()
});

/// Arguments on the right-hand side of `%`.
enum FormatArgs<'a> {
    Mapping(&'a Value),
    Positional(Vec<Value>),
}

/// Python-style `%` formatting.
///
/// `args` is a mapping (for `%(name)s` placeholders), a sequence of positional values,
/// or a single value. With `escape_args` every interpolated string is HTML-escaped unless
/// it is already safe.
pub fn percent_format(format: &str, args: &Value, escape_args: bool) -> Result<String> {
    let uses_keys = PLACEHOLDER
        .captures_iter(format)
        .any(|caps| caps.name("key").is_some());
    let args = match args {
        Value::Map(_) if uses_keys => FormatArgs::Mapping(args),
        Value::Seq(list) => FormatArgs::Positional(list.snapshot()),
        other => FormatArgs::Positional(vec![other.clone()]),
    };

    let mut out = String::with_capacity(format.len());
    let mut last = 0;
    let mut next_positional = 0;
    for caps in PLACEHOLDER.captures_iter(format) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        out.push_str(&format[last..whole.start]);
        last = whole.end;

        let conv = caps.name("conv").map_or("s", |m| m.as_str());
        if conv == "%" {
            out.push('%');
            continue;
        }
        let value = match (&args, caps.name("key")) {
            (FormatArgs::Mapping(map), Some(key)) => map
                .get_key(&Value::from(key.as_str()))
                .ok_or_else(|| {
                    Error::runtime(format!("format key '{}' is missing", key.as_str()))
                })?,
            (FormatArgs::Mapping(map), None) => (*map).clone(),
            (FormatArgs::Positional(_), Some(_)) => {
                return Err(Error::runtime("format requires a mapping"));
            }
            (FormatArgs::Positional(values), None) => {
                let value = values.get(next_positional).cloned().ok_or_else(|| {
                    Error::runtime("not enough arguments for format string")
                })?;
                next_positional += 1;
                value
            }
        };
        let spec = Spec {
            flags: caps.name("flags").map_or("", |m| m.as_str()),
            width: caps
                .name("width")
                .and_then(|m| m.as_str().parse::<usize>().ok()),
            precision: caps
                .name("prec")
                .and_then(|m| m.as_str().parse::<usize>().ok()),
        };
        let piece = convert(&value, conv, &spec)?;
        let piece = if escape_args && matches!(conv, "s" | "r" | "a") && !value.is_safe() {
            escape(&piece)
        } else {
            piece
        };
        out.push_str(&spec.pad(piece));
    }
    out.push_str(&format[last..]);

    if let FormatArgs::Positional(values) = &args {
        if next_positional < values.len() && next_positional > 0 {
            return Err(Error::runtime(
                "not all arguments converted during string formatting",
            ));
        }
    }
    Ok(out)
}

struct Spec<'a> {
    flags: &'a str,
    width: Option<usize>,
    precision: Option<usize>,
}

impl Spec<'_> {
    fn pad(&self, piece: String) -> String {
        let Some(width) = self.width else {
            return piece;
        };
        let len = piece.chars().count();
        if len >= width {
            return piece;
        }
        let fill = width - len;
        if self.flags.contains('-') {
            format!("{}{}", piece, " ".repeat(fill))
        } else if self.flags.contains('0') && piece.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '.') {
            match piece.strip_prefix('-') {
                Some(digits) => format!("-{}{}", "0".repeat(fill), digits),
                None => format!("{}{}", "0".repeat(fill), piece),
            }
        } else {
            format!("{}{}", " ".repeat(fill), piece)
        }
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.flags.contains('+') {
            "+"
        } else if self.flags.contains(' ') {
            " "
        } else {
            ""
        }
    }
}

fn convert(value: &Value, conv: &str, spec: &Spec<'_>) -> Result<String> {
    match conv {
        "s" => {
            let text = value.to_output()?;
            Ok(match spec.precision {
                Some(p) => text.chars().take(p).collect(),
                None => text,
            })
        }
        "r" | "a" => Ok(value.repr()),
        "d" | "i" | "u" => {
            let n = value.as_f64().ok_or_else(|| {
                Error::runtime(format!("%{} format: a number is required", conv))
            })?;
            let n = n.trunc() as i64;
            Ok(format!("{}{}", spec.sign(n < 0), n.unsigned_abs()))
        }
        "x" | "X" | "o" => {
            let n = value.as_i64().ok_or_else(|| {
                Error::runtime(format!("%{} format: an integer is required", conv))
            })?;
            let mut out = spec.sign(n < 0).to_string();
            let abs = n.unsigned_abs();
            let _ = match conv {
                "x" => write!(out, "{:x}", abs),
                "X" => write!(out, "{:X}", abs),
                _ => write!(out, "{:o}", abs),
            };
            Ok(out)
        }
        "f" | "F" | "e" | "E" | "g" | "G" => {
            let n = value.as_f64().ok_or_else(|| {
                Error::runtime(format!("%{} format: a number is required", conv))
            })?;
            let precision = spec.precision.unwrap_or(6);
            let body = match conv {
                "f" | "F" => format!("{:.*}", precision, n.abs()),
                "e" => python_exponent(format!("{:.*e}", precision, n.abs())),
                "E" => python_exponent(format!("{:.*e}", precision, n.abs())).to_uppercase(),
                _ => {
                    let text = Value::Float(n.abs()).to_string();
                    if conv == "G" {
                        text.to_uppercase()
                    } else {
                        text
                    }
                }
            };
            Ok(format!("{}{}", spec.sign(n < 0.0), body))
        }
        "c" => match value {
            Value::Int(n) => u32::try_from(*n)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .ok_or_else(|| Error::runtime("%c arg not in range")),
            Value::String(s, _) if s.chars().count() == 1 => Ok(s.to_string()),
            _ => Err(Error::runtime("%c requires an int or a single character")),
        },
        other => Err(Error::runtime(format!("unsupported format character '{}'", other))),
    }
}

/// Rust prints `1.5e3`; Python prints `1.5e+03`.
fn python_exponent(text: String) -> String {
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => text,
    }
}
