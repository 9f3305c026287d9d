//! Request shapes understood by every backend: conjunctive equality filters,
//! a single ascending/descending order, and upsert conflict targets.

use serde_json::Value;

use crate::error::{RemoteRequestError, RemoteResult};

/// Conjunction of `field = value` predicates. There is deliberately no
/// disjunction, partial match or paging; substring search happens on the
/// client over an unfiltered list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push((field.into(), value.into()));
        self
    }

    pub fn predicates(&self) -> &[(String, Value)] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn validate(&self) -> RemoteResult<()> {
        self.predicates
            .iter()
            .try_for_each(|(field, _)| validate_field(field))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }
}

/// Unique-constraint columns an upsert uses to choose insert vs. update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictTarget {
    columns: Vec<String>,
}

impl ConflictTarget {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn validate(&self) -> RemoteResult<()> {
        if self.columns.is_empty() {
            return Err(RemoteRequestError::backend(
                "upsert requires at least one conflict column",
            ));
        }
        self.columns.iter().try_for_each(|c| validate_field(c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returning {
    Representation,
    Minimal,
}

/// Table and column names end up inside SQL text or URL paths.
pub fn validate_field(name: &str) -> RemoteResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(RemoteRequestError::backend(format!(
            "invalid identifier '{name}'"
        )))
    }
}
