//! Shared WHERE clause builder for SELECT, UPDATE, DELETE.

use super::dialect::{Dialect, Placeholders};
use super::Binding;
use crate::value::{Filter, FilterValue, Value};

/// Placeholder allocation and binding collection for a single statement.
///
/// UPDATE shares one instance between its SET list and its WHERE clause so
/// that SET bindings come first.
pub(crate) struct Params {
    placeholders: Placeholders,
    bindings: Vec<Binding>,
}

impl Params {
    pub(crate) fn new(dialect: &Dialect) -> Self {
        Self {
            placeholders: Placeholders::new(dialect.placeholders),
            bindings: Vec::new(),
        }
    }

    /// Bind `value` for `column` and return the placeholder text.
    pub(crate) fn push(&mut self, column: &str, value: Value) -> String {
        let (sql, name) = self.placeholders.next(column);
        self.bindings.push(Binding { name, value });
        sql
    }

    pub(crate) fn into_bindings(self) -> Vec<Binding> {
        self.bindings
    }
}

/// Condition rendered for an empty OR-group.
pub(crate) const EMPTY_GROUP: &str = "1=0";

/// WHERE clause rendered from a [`Filter`].
///
/// Each filter key becomes one condition and conditions are joined with AND
/// in key order. A `Null` entry is compared against a bound null with the
/// dialect's null test (`IS` by default). A list becomes a parenthesized
/// OR-group of its elements, recursively. An empty list is an OR over
/// nothing and renders [`EMPTY_GROUP`], which matches no row.
pub(crate) struct WhereBuilder {
    conditions: Vec<String>,
}

impl WhereBuilder {
    pub(crate) fn from_filter(dialect: &Dialect, filter: &Filter, params: &mut Params) -> Self {
        let conditions = filter
            .iter()
            .map(|(column, value)| column_condition(dialect, column, value, params))
            .collect();
        Self { conditions }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Build the WHERE clause string (without "WHERE" prefix).
    pub(crate) fn build_clause(&self) -> String {
        self.conditions.join(" AND ")
    }

    /// Append ` WHERE ...` to `sql` when there is at least one condition.
    pub(crate) fn append_to(&self, sql: &mut String) {
        if !self.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.build_clause());
        }
    }
}

fn column_condition(
    dialect: &Dialect,
    column: &str,
    value: &FilterValue,
    params: &mut Params,
) -> String {
    match value {
        FilterValue::Null => {
            let ph = params.push(column, Value::Null);
            format!(
                "{} {} {ph}",
                dialect.quote_ident(column),
                dialect.null_test
            )
        }
        FilterValue::Scalar(v) => {
            let ph = params.push(column, v.clone());
            format!("{}={ph}", dialect.quote_ident(column))
        }
        FilterValue::List(items) if items.is_empty() => EMPTY_GROUP.to_string(),
        FilterValue::List(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| column_condition(dialect, column, item, params))
                .collect();
            format!("({})", parts.join(" OR "))
        }
    }
}
