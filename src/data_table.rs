// Copyright (c) 2025  The step-outcomes developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Example data of data-driven tests.

use itertools::Itertools as _;
use linked_hash_map::LinkedHashMap;

use crate::TestResult;

/// Values of a single example, keyed by column name in column order.
pub type ExampleData = LinkedHashMap<String, String>;

/// Table of examples a data-driven test runs with.
///
/// ```rust
/// # use step_outcomes::{DataTable, TestResult};
/// let mut table = DataTable::new(["user", "role"], [["alice", "admin"], ["bob", "guest"]]);
///
/// table.update_current_row_result(TestResult::Success);
/// table.move_to_next_row();
/// table.update_current_row_result(TestResult::Failure);
///
/// assert_eq!(table.row(1).and_then(|r| r.result()), Some(TestResult::Failure));
/// assert_eq!(table.row(1).map(|r| r.to_string()).as_deref(), Some("{user=bob, role=guest}"));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DataTable {
    /// Column names.
    headers: Vec<String>,

    /// Example rows.
    rows: Vec<DataTableRow>,

    /// Whether the rows were known before the test started, rather than
    /// discovered while it ran.
    predefined: bool,

    /// Index of the row being executed.
    current_row: usize,
}

impl DataTable {
    /// Creates a predefined [`DataTable`] out of the given headers and rows.
    #[must_use]
    pub fn new<H, R, C>(headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let rows = rows
            .into_iter()
            .map(|row| {
                DataTableRow::new(headers.iter().cloned().zip(row.into_iter().map(Into::into)))
            })
            .collect();
        Self { headers, rows, predefined: true, current_row: 0 }
    }

    /// Creates an empty [`DataTable`], whose rows are added while the test
    /// runs.
    #[must_use]
    pub fn with_headers<H>(headers: H) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            predefined: false,
            current_row: 0,
        }
    }

    /// Returns the column names.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Returns all the rows.
    #[must_use]
    pub fn rows(&self) -> &[DataTableRow] {
        &self.rows
    }

    /// Returns the row at `index`.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&DataTableRow> {
        self.rows.get(index)
    }

    /// Indicates whether the rows were known before the test started.
    #[must_use]
    pub const fn is_predefined(&self) -> bool {
        self.predefined
    }

    /// Returns the index of the row being executed.
    #[must_use]
    pub const fn current_row(&self) -> usize {
        self.current_row
    }

    /// Appends a row discovered while the test runs.
    ///
    /// Columns missing from the headers are added to them.
    pub fn add_row(&mut self, data: ExampleData) {
        for column in data.keys() {
            if !self.headers.contains(column) {
                self.headers.push(column.clone());
            }
        }
        self.rows.push(DataTableRow { values: data, result: None });
    }

    /// Appends all rows of `other` to this table.
    pub fn append(&mut self, other: DataTable) {
        for column in other.headers {
            if !self.headers.contains(&column) {
                self.headers.push(column);
            }
        }
        self.rows.extend(other.rows);
    }

    /// Records the result of a step of the current row. The row keeps the
    /// most severe result recorded for it.
    pub fn update_current_row_result(&mut self, result: TestResult) {
        if let Some(row) = self.rows.get_mut(self.current_row) {
            row.update_result(result);
        }
    }

    /// Moves on to the next row.
    pub fn move_to_next_row(&mut self) {
        self.current_row += 1;
    }

    /// Positions this table at the given row.
    #[must_use]
    pub const fn starting_at_row(mut self, row: usize) -> Self {
        self.current_row = row;
        self
    }

    /// Merges row results recorded by another execution of the same
    /// examples. Each row keeps the most severe result, and rows only the
    /// `other` table has are appended.
    pub fn merge_results(&mut self, other: &Self) {
        for (row, theirs) in self.rows.iter_mut().zip(&other.rows) {
            if let Some(result) = theirs.result {
                row.update_result(result);
            }
        }
        let known = self.rows.len();
        self.rows.extend(other.rows.iter().skip(known).cloned());
    }
}

/// Single example of a [`DataTable`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DataTableRow {
    /// Values keyed by column name.
    values: ExampleData,

    /// Most severe result recorded for this row.
    result: Option<TestResult>,
}

impl DataTableRow {
    /// Creates a new [`DataTableRow`] out of `(column, value)` pairs.
    #[must_use]
    pub fn new<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            result: None,
        }
    }

    /// Returns the values of this row.
    #[must_use]
    pub const fn values(&self) -> &ExampleData {
        &self.values
    }

    /// Returns the most severe result recorded for this row.
    #[must_use]
    pub const fn result(&self) -> Option<TestResult> {
        self.result
    }

    fn update_result(&mut self, result: TestResult) {
        self.result = Some(self.result.map_or(result, |r| r.max(result)));
    }
}

impl std::fmt::Display for DataTableRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_example(&self.values))
    }
}

/// Formats example values as `{column=value, ...}`.
#[must_use]
pub fn format_example(data: &ExampleData) -> String {
    format!("{{{}}}", data.iter().map(|(k, v)| format!("{k}={v}")).join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(pairs: &[(&str, &str)]) -> ExampleData {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    #[test]
    fn rows_keep_worst_result() {
        let mut table = DataTable::new(["a"], [["1"]]);

        table.update_current_row_result(TestResult::Failure);
        table.update_current_row_result(TestResult::Success);

        assert_eq!(table.row(0).and_then(DataTableRow::result), Some(TestResult::Failure));
    }

    #[test]
    fn updates_past_last_row_are_ignored() {
        let mut table = DataTable::new(["a"], [["1"]]);
        table.move_to_next_row();

        table.update_current_row_result(TestResult::Error);

        assert_eq!(table.row(0).and_then(DataTableRow::result), None);
    }

    #[test]
    fn discovered_rows_extend_headers() {
        let mut table = DataTable::with_headers(["a"]);
        assert!(!table.is_predefined());

        table.add_row(example(&[("a", "1"), ("b", "2")]));

        assert_eq!(table.headers(), ["a", "b"]);
        assert_eq!(table.rows().len(), 1);
    }

    #[test]
    fn formats_in_column_order() {
        let data = example(&[("zeta", "1"), ("alpha", "2")]);

        assert_eq!(format_example(&data), "{zeta=1, alpha=2}");
        assert_eq!(format_example(&ExampleData::new()), "{}");
    }

    #[test]
    fn appending_merges_rows() {
        let mut table = DataTable::new(["a"], [["1"]]);

        table.append(DataTable::new(["a", "b"], [["2", "3"]]));

        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.headers(), ["a", "b"]);
    }
}
