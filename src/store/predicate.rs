// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::record::{FieldValue, RemoteRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Field equals one element of a list value
    In,
    /// String prefix match
    BeginsWith,
    /// List field holds the value
    Contains,
}

/// A `field op value` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub field: String,
    pub op: Operator,
    pub value: FieldValue,
}

impl Comparison {
    /// A comparison against an absent field never matches.
    pub fn matches(&self, record: &RemoteRecord) -> bool {
        let Some(actual) = record.get(&self.field) else {
            return false;
        };

        match self.op {
            Operator::Eq => values_equal(actual, &self.value),
            Operator::Ne => !values_equal(actual, &self.value),
            Operator::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            Operator::Le => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            Operator::Ge => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::In => match &self.value {
                FieldValue::List(candidates) => {
                    candidates.iter().any(|candidate| values_equal(actual, candidate))
                }
                _ => false,
            },
            Operator::BeginsWith => match (actual, &self.value) {
                (FieldValue::String(actual), FieldValue::String(prefix)) => {
                    actual.starts_with(prefix.as_str())
                }
                _ => false,
            },
            Operator::Contains => match actual {
                FieldValue::List(items) => items.iter().any(|item| values_equal(item, &self.value)),
                _ => false,
            },
        }
    }
}

/// Conjunction of comparisons. An empty predicate matches every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    #[serde(default)]
    pub clauses: Vec<Comparison>,
}

impl Predicate {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn field(field: &str, op: Operator, value: impl Into<FieldValue>) -> Self {
        Self::all().and(field, op, value)
    }

    pub fn eq(field: &str, value: impl Into<FieldValue>) -> Self {
        Self::field(field, Operator::Eq, value)
    }

    pub fn and(mut self, field: &str, op: Operator, value: impl Into<FieldValue>) -> Self {
        self.clauses.push(Comparison {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn matches(&self, record: &RemoteRecord) -> bool {
        self.clauses.iter().all(|clause| clause.matches(record))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDescriptor {
    pub field: String,
    pub ascending: bool,
}

impl SortDescriptor {
    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ascending: true,
        }
    }

    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ascending: false,
        }
    }

    /// Stable ordering; records missing the field sort last either way.
    pub fn apply(&self, records: &mut [RemoteRecord]) {
        records.sort_by(|a, b| match (a.get(&self.field), b.get(&self.field)) {
            (Some(x), Some(y)) => {
                let ordering = compare(x, y).unwrap_or(Ordering::Equal);
                if self.ascending { ordering } else { ordering.reverse() }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }
}

fn values_equal(a: &FieldValue, b: &FieldValue) -> bool {
    match compare(a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

/// Ordering between scalar values of compatible kinds.
fn compare(a: &FieldValue, b: &FieldValue) -> Option<Ordering> {
    match (a, b) {
        (FieldValue::String(x), FieldValue::String(y)) => Some(x.cmp(y)),
        (FieldValue::Int(x), FieldValue::Int(y)) => Some(x.cmp(y)),
        (FieldValue::Double(x), FieldValue::Double(y)) => x.partial_cmp(y),
        (FieldValue::Int(x), FieldValue::Double(y)) => (*x as f64).partial_cmp(y),
        (FieldValue::Double(x), FieldValue::Int(y)) => x.partial_cmp(&(*y as f64)),
        (FieldValue::Date(x), FieldValue::Date(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
