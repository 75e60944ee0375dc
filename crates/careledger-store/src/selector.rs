//! Declarative predicate queries.
//!
//! A [`Selector`] is evaluated by the ledger's external index against the
//! JSON documents it holds. It supports field equality, inclusive range
//! comparison and boolean composition, which is all the core needs. The
//! [`Selector::to_query`] form is the Mango-style JSON the index consumes.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value, json};

/// Predicate over the fields of a stored JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Matches every document.
    All,
    /// Top-level field equals the value.
    Eq { field: String, value: Value },
    /// Top-level field lies within the inclusive bounds.
    Range {
        field: String,
        gte: Option<Value>,
        lte: Option<Value>,
    },
    And(Vec<Selector>),
    Or(Vec<Selector>),
    Not(Box<Selector>),
}

impl Selector {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Selector::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Inclusive range on `field`. Either bound may be omitted.
    pub fn range(
        field: impl Into<String>,
        gte: Option<impl Into<Value>>,
        lte: Option<impl Into<Value>>,
    ) -> Self {
        Selector::Range {
            field: field.into(),
            gte: gte.map(Into::into),
            lte: lte.map(Into::into),
        }
    }

    /// Conjunction with another selector, flattening nested `And`s.
    pub fn and(self, other: Selector) -> Self {
        match (self, other) {
            (Selector::All, s) | (s, Selector::All) => s,
            (Selector::And(mut left), Selector::And(right)) => {
                left.extend(right);
                Selector::And(left)
            }
            (Selector::And(mut left), s) => {
                left.push(s);
                Selector::And(left)
            }
            (s, Selector::And(mut right)) => {
                right.insert(0, s);
                Selector::And(right)
            }
            (a, b) => Selector::And(vec![a, b]),
        }
    }

    pub fn or(self, other: Selector) -> Self {
        Selector::Or(vec![self, other])
    }

    pub fn negate(self) -> Self {
        Selector::Not(Box::new(self))
    }

    /// Evaluates the selector against a document.
    ///
    /// Missing fields never match `Eq` or `Range`; values of different JSON
    /// types are not comparable and never satisfy a range.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Selector::All => true,
            Selector::Eq { field, value } => doc.get(field) == Some(value),
            Selector::Range { field, gte, lte } => {
                let Some(actual) = doc.get(field) else {
                    return false;
                };
                let lower_ok = gte.as_ref().is_none_or(|bound| {
                    matches!(
                        compare(actual, bound),
                        Some(Ordering::Greater | Ordering::Equal)
                    )
                });
                let upper_ok = lte.as_ref().is_none_or(|bound| {
                    matches!(
                        compare(actual, bound),
                        Some(Ordering::Less | Ordering::Equal)
                    )
                });
                lower_ok && upper_ok
            }
            Selector::And(parts) => parts.iter().all(|s| s.matches(doc)),
            Selector::Or(parts) => parts.iter().any(|s| s.matches(doc)),
            Selector::Not(inner) => !inner.matches(doc),
        }
    }

    /// Renders the selector as a Mango query document.
    pub fn to_query(&self) -> Value {
        json!({ "selector": self.to_mango() })
    }

    fn to_mango(&self) -> Value {
        match self {
            Selector::All => json!({}),
            Selector::Eq { field, value } => single(field, value.clone()),
            Selector::Range { field, gte, lte } => {
                let mut ops = Map::new();
                if let Some(gte) = gte {
                    ops.insert("$gte".to_string(), gte.clone());
                }
                if let Some(lte) = lte {
                    ops.insert("$lte".to_string(), lte.clone());
                }
                single(field, Value::Object(ops))
            }
            Selector::And(parts) => {
                json!({ "$and": parts.iter().map(Selector::to_mango).collect::<Vec<_>>() })
            }
            Selector::Or(parts) => {
                json!({ "$or": parts.iter().map(Selector::to_mango).collect::<Vec<_>>() })
            }
            Selector::Not(inner) => json!({ "$not": inner.to_mango() }),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_query())
    }
}

fn single(field: &str, value: Value) -> Value {
    let mut object = Map::new();
    object.insert(field.to_string(), value);
    Value::Object(object)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
