//! Filter predicates
//!
//! A [`Predicate`] is a conjunction of comparisons between a document field
//! and a literal. An empty predicate matches every document. A comparison
//! whose field is missing, or whose field and literal have different JSON
//! types, does not match.

use partdb_core::{Document, FieldPath, Result};
use serde_json::Value;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// `field op literal`
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Field compared
    pub field: FieldPath,
    /// Operator
    pub op: CompareOp,
    /// Literal compared against
    pub value: Value,
}

impl Comparison {
    /// True if the document's field satisfies the comparison
    pub fn matches(&self, doc: &Document) -> bool {
        self.field
            .resolve(doc)
            .and_then(|actual| compare_values(actual, &self.value))
            .is_some_and(|ordering| self.op.accepts(ordering))
    }
}

/// Order two JSON values of the same type
///
/// Numbers compare numerically, strings lexically, booleans `false <
/// true`; `null` equals `null`. Any other pairing is unordered.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => {
            let fa = a.as_f64()?;
            let fb = b.as_f64()?;
            fa.partial_cmp(&fb)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Conjunction of comparisons
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: SmallVec<[Comparison; 4]>,
}

impl Predicate {
    /// Predicate matching every document
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a clause; `path` is a dotted or slash field path
    pub fn and(mut self, path: &str, op: CompareOp, value: impl Into<Value>) -> Result<Self> {
        self.clauses.push(Comparison {
            field: FieldPath::parse(path)?,
            op,
            value: value.into(),
        });
        Ok(self)
    }

    /// `path = value`
    pub fn eq(path: &str, value: impl Into<Value>) -> Result<Self> {
        Self::all().and(path, CompareOp::Eq, value)
    }

    /// Add an already-built clause
    pub fn push(&mut self, clause: Comparison) {
        self.clauses.push(clause);
    }

    /// Clauses in order
    pub fn clauses(&self) -> &[Comparison] {
        &self.clauses
    }

    /// True if there are no clauses
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// True if every clause matches
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|c| c.matches(doc))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "true");
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{} {} {}", clause.field, clause.op.symbol(), clause.value)?;
        }
        Ok(())
    }
}
