//! The undefined sentinel
//!
//!     A missing variable, attribute or item evaluates to an [Undefined] value rather than
//!     failing on the spot. The sentinel remembers why it exists (its hint) and the policy of
//!     the environment that produced it, so the error can be raised later, at the point of
//!     use, with a useful message.

use serde::Deserialize;

use crate::error::{Error, Result};

/// How eagerly undefined values turn into errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedPolicy {
    /// Chainable: attribute and item access return another undefined, printing renders empty.
    Lenient,
    /// Printing, iteration and truth tests are silent; attribute access and arithmetic raise.
    #[default]
    Default,
    /// Every use raises.
    Strict,
}

/// Why a value is undefined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndefinedHint {
    /// A variable lookup failed.
    Name(String),
    /// `obj.attr` or `obj[key]` found nothing. Holds the type description and the key.
    Attribute { owner: String, attr: String },
    /// A free-form explanation (missing macro argument, missing import).
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Undefined {
    pub hint: UndefinedHint,
    pub policy: UndefinedPolicy,
}

impl Undefined {
    pub fn new(hint: UndefinedHint, policy: UndefinedPolicy) -> Self {
        Undefined { hint, policy }
    }

    pub fn message(&self) -> String {
        match &self.hint {
            UndefinedHint::Name(name) => format!("'{}' is undefined", name),
            UndefinedHint::Attribute { owner, attr } => {
                format!("'{}' has no attribute '{}'", owner, attr)
            }
            UndefinedHint::Message(msg) => msg.clone(),
        }
    }

    pub fn error(&self) -> Error {
        Error::undefined(self.message())
    }

    /// Printing: empty unless strict.
    pub fn check_print(&self) -> Result<()> {
        match self.policy {
            UndefinedPolicy::Strict => Err(self.error()),
            _ => Ok(()),
        }
    }

    /// Iteration and truth tests behave like printing.
    pub fn check_iterate(&self) -> Result<()> {
        self.check_print()
    }

    /// Attribute or item access on the sentinel itself.
    pub fn check_attribute(&self) -> Result<()> {
        match self.policy {
            UndefinedPolicy::Lenient => Ok(()),
            _ => Err(self.error()),
        }
    }

    /// Operators and calls always raise.
    pub fn check_operate(&self) -> Result<()> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(policy: UndefinedPolicy) -> Undefined {
        Undefined::new(UndefinedHint::Name("missing".into()), policy)
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            missing(UndefinedPolicy::Default).message(),
            "'missing' is undefined"
        );
        let attr = Undefined::new(
            UndefinedHint::Attribute {
                owner: "dict object".into(),
                attr: "x".into(),
            },
            UndefinedPolicy::Default,
        );
        assert_eq!(attr.message(), "'dict object' has no attribute 'x'");
    }

    #[test]
    fn test_policies() {
        assert!(missing(UndefinedPolicy::Lenient).check_attribute().is_ok());
        assert!(missing(UndefinedPolicy::Default).check_attribute().is_err());
        assert!(missing(UndefinedPolicy::Default).check_print().is_ok());
        assert!(missing(UndefinedPolicy::Strict).check_print().is_err());
        assert!(missing(UndefinedPolicy::Lenient).check_operate().is_err());
    }
}
