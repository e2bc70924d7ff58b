//! Decoded rows and execution results.

use quarry_core::{Parameter, Record};

/// One result row, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Parameter>,
}

impl Row {
    /// Creates a row from parallel column and value lists.
    #[must_use]
    pub fn new(columns: Vec<String>, values: Vec<Parameter>) -> Self {
        Self { columns, values }
    }

    /// Returns the value of a column by name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Parameter> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|index| self.values.get(index))
    }

    /// Returns the value at a position.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&Parameter> {
        self.values.get(index)
    }

    /// Returns an integer column, parsing text if needed.
    #[must_use]
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Parameter::Text(text) => text.trim().parse().ok(),
            other => other.as_i64(),
        }
    }

    /// Returns a text column.
    #[must_use]
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Parameter::as_str)
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn values(&self) -> &[Parameter] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Converts into an insertable record.
    #[must_use]
    pub fn into_record(self) -> Record {
        self.columns.into_iter().zip(self.values).collect()
    }
}

/// The outcome of running one statement.
///
/// `inserted_ids` is filled the same way on every dialect: from the
/// `returning` rows where the dialect has them, otherwise from the driver's
/// last insert id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Returned rows.
    pub rows: Vec<Row>,
    /// Rows written, or rows returned for queries.
    pub rows_affected: u64,
    /// Generated keys of an `insert_get_id`.
    pub inserted_ids: Vec<Parameter>,
}

impl QueryResult {
    /// Wraps fetched rows.
    #[must_use]
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows_affected: rows.len() as u64,
            rows,
            inserted_ids: Vec::new(),
        }
    }

    /// Collects the values of `columns` from every row, in row order.
    pub(crate) fn collect_ids(&mut self, columns: &[String]) {
        self.inserted_ids = self
            .rows
            .iter()
            .flat_map(|row| columns.iter().filter_map(|column| row.get(column).cloned()))
            .collect();
    }
}
