//! Query AST and its canonical string form

use std::fmt;

/// A single `prop:value` test, optionally negated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub prop: String,
    pub value: String,
    pub negated: bool,
}

impl Condition {
    #[must_use]
    pub fn new(prop: impl Into<String>, value: impl Into<String>) -> Self {
        Self { prop: prop.into(), value: value.into(), negated: false }
    }

    #[must_use]
    pub fn negated(prop: impl Into<String>, value: impl Into<String>) -> Self {
        Self { prop: prop.into(), value: value.into(), negated: true }
    }
}

/// Parsed query expression
///
/// Implicit AND binds tighter than OR; a bare token compiles to
/// `Condition { prop: "text", .. }` at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Condition(Condition),
    And(Vec<Query>),
    Or(Vec<Query>),
}

impl Query {
    #[must_use]
    pub fn condition(prop: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Condition(Condition::new(prop, value))
    }
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value.eq_ignore_ascii_case("or")
        || value.starts_with('-')
        || value.chars().any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '"'))
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "-")?;
        }
        write!(f, "{}:", self.prop)?;
        if needs_quoting(&self.value) {
            write!(f, "\"{}\"", self.value)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Condition(c) => write!(f, "{c}"),
            Self::And(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    // OR binds looser, so OR children need grouping here
                    if matches!(part, Self::Or(_)) {
                        write!(f, "({part})")?;
                    } else {
                        write!(f, "{part}")?;
                    }
                }
                Ok(())
            }
            Self::Or(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    if matches!(part, Self::Or(_)) {
                        write!(f, "({part})")?;
                    } else {
                        write!(f, "{part}")?;
                    }
                }
                Ok(())
            }
        }
    }
}
