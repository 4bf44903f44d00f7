//! Column-named numeric table passed between pipeline stages.
//!
//! A [`FeatureFrame`] is a row-major `Array2<f64>` with a timestamp per row
//! and a name per column. Every operation returns a new frame; nothing is
//! mutated in place once a stage has produced its output.

use crate::error::{Error, Result};
use crate::types::TimestampMs;
use ndarray::{concatenate, s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::ops::Range;

/// Column-named table of `f64` values indexed by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    index: Vec<TimestampMs>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureFrame {
    /// Create a frame, checking that index, columns and values agree in shape.
    pub fn new(index: Vec<TimestampMs>, columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        let (rows, cols) = values.dim();
        if rows != index.len() {
            return Err(Error::data(format!(
                "index has {} entries but values have {} rows",
                index.len(),
                rows
            )));
        }
        if cols != columns.len() {
            return Err(Error::data(format!(
                "{} column names for {} value columns",
                columns.len(),
                cols
            )));
        }
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(Error::data(format!("duplicate column: {}", name)));
            }
        }
        Ok(Self { index, columns, values })
    }

    /// Build a frame from named columns of equal length.
    pub fn from_columns(index: Vec<TimestampMs>, columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let rows = index.len();
        let mut names = Vec::with_capacity(columns.len());
        let mut values = Array2::zeros((rows, columns.len()));
        for (j, (name, data)) in columns.into_iter().enumerate() {
            if data.len() != rows {
                return Err(Error::data(format!(
                    "column {} has {} values, expected {}",
                    name,
                    data.len(),
                    rows
                )));
            }
            values.column_mut(j).assign(&Array1::from(data));
            names.push(name);
        }
        Self::new(index, names, values)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Row timestamps.
    pub fn index(&self) -> &[TimestampMs] {
        &self.index
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All values, rows x columns.
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Check if a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Position of a column.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::missing_column(name))
    }

    /// View of a single column.
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let j = self.column_index(name)?;
        Ok(self.values.column(j))
    }

    /// New frame holding only the named columns, in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let positions = names
            .iter()
            .map(|n| self.column_index(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let columns = names.iter().map(|n| n.as_ref().to_string()).collect();
        Self::new(
            self.index.clone(),
            columns,
            self.values.select(Axis(1), &positions),
        )
    }

    /// Separate a column from the rest: returns the remaining frame and the column.
    pub fn drop_column(&self, name: &str) -> Result<(Self, Array1<f64>)> {
        let j = self.column_index(name)?;
        let keep: Vec<usize> = (0..self.width()).filter(|&k| k != j).collect();
        let columns = keep.iter().map(|&k| self.columns[k].clone()).collect();
        let rest = Self::new(
            self.index.clone(),
            columns,
            self.values.select(Axis(1), &keep),
        )?;
        Ok((rest, self.values.column(j).to_owned()))
    }

    /// New frame with an extra column appended.
    pub fn with_column(&self, name: &str, data: Array1<f64>) -> Result<Self> {
        if self.has_column(name) {
            return Err(Error::data(format!("duplicate column: {}", name)));
        }
        if data.len() != self.len() {
            return Err(Error::data(format!(
                "column {} has {} values, expected {}",
                name,
                data.len(),
                self.len()
            )));
        }
        let values = concatenate(Axis(1), &[self.values.view(), data.view().insert_axis(Axis(1))])
            .map_err(|e| Error::data(e.to_string()))?;
        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        Self::new(self.index.clone(), columns, values)
    }

    /// Contiguous block of rows.
    pub fn slice_rows(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Self {
            index: self.index[start..end].to_vec(),
            columns: self.columns.clone(),
            values: self.values.slice(s![start..end, ..]).to_owned(),
        }
    }

    /// Split into rows `[0, at)` and `[at, len)`.
    pub fn split_at(&self, at: usize) -> (Self, Self) {
        (self.slice_rows(0..at), self.slice_rows(at..self.len()))
    }

    /// Keep only the rows whose positions are listed.
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            index: rows.iter().map(|&i| self.index[i]).collect(),
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }

    /// Count of non-finite entries (NaN or infinite).
    pub fn non_finite_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_finite()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> FeatureFrame {
        FeatureFrame::from_columns(
            vec![10, 20, 30, 40],
            vec![
                ("a".to_string(), vec![1.0, 2.0, 3.0, 4.0]),
                ("b".to_string(), vec![10.0, 20.0, 30.0, 40.0]),
                ("c".to_string(), vec![-1.0, -2.0, -3.0, -4.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let values = Array2::zeros((3, 2));
        let result = FeatureFrame::new(vec![1, 2], vec!["a".into(), "b".into()], values);
        assert!(matches!(result, Err(Error::Data(_))));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let values = Array2::zeros((1, 2));
        let result = FeatureFrame::new(vec![1], vec!["a".into(), "a".into()], values);
        assert!(result.is_err());
    }

    #[test]
    fn test_column_lookup() {
        let frame = sample_frame();
        assert_eq!(frame.column("b").unwrap()[2], 30.0);
        assert!(matches!(frame.column("zzz"), Err(Error::MissingColumn(name)) if name == "zzz"));
    }

    #[test]
    fn test_select_reorders() {
        let frame = sample_frame();
        let picked = frame.select(&["c", "a"]).unwrap();
        assert_eq!(picked.columns(), &["c".to_string(), "a".to_string()]);
        assert_eq!(picked.values()[[1, 0]], -2.0);
        assert_eq!(picked.values()[[1, 1]], 2.0);
    }

    #[test]
    fn test_drop_column() {
        let frame = sample_frame();
        let (rest, target) = frame.drop_column("b").unwrap();
        assert_eq!(rest.columns(), &["a".to_string(), "c".to_string()]);
        assert_eq!(target.to_vec(), vec![10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_with_column() {
        let frame = sample_frame();
        let extended = frame.with_column("d", Array1::from(vec![0.5; 4])).unwrap();
        assert_eq!(extended.width(), 4);
        assert_eq!(extended.column("d").unwrap()[3], 0.5);
        assert!(frame.with_column("a", Array1::zeros(4)).is_err());
        assert!(frame.with_column("e", Array1::zeros(3)).is_err());
    }

    #[test]
    fn test_split_at() {
        let frame = sample_frame();
        let (head, tail) = frame.split_at(3);
        assert_eq!(head.index(), &[10, 20, 30]);
        assert_eq!(tail.index(), &[40]);
        assert_eq!(tail.values()[[0, 0]], 4.0);
    }

    #[test]
    fn test_take_rows() {
        let frame = sample_frame();
        let picked = frame.take_rows(&[0, 3]);
        assert_eq!(picked.index(), &[10, 40]);
        assert_eq!(picked.column("c").unwrap().to_vec(), vec![-1.0, -4.0]);
    }
}
