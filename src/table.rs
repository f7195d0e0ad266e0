// src/table.rs

use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// One scalar value inside a [`Table`].
///
/// Cells are typed when a raw field is read: integer first, then
/// float, then text. An empty field is `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Classify one raw CSV field.
    pub fn parse(raw: &str) -> Cell {
        if raw.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Cell::Float(f);
        }
        Cell::Text(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(i) => write!(f, "{}", i),
            // keep a decimal point so a whole-number float reads back as a float
            Cell::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Cell {
        Cell::Int(v)
    }
}

impl From<u32> for Cell {
    fn from(v: u32) -> Cell {
        Cell::Int(i64::from(v))
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Cell {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Cell {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Cell {
        Cell::Text(v)
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Cell {
        v.map(Cell::Float).unwrap_or(Cell::Null)
    }
}

/// A small in-memory table: named columns plus rows of cells.
///
/// This is what moves between pipeline stages. Extractors build one
/// per (region, year) and write it to disk, the normalizer folds many
/// files into one, the loader binds each row into an INSERT.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Table
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Table {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Vec<Cell>] {
        &mut self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name` in the header, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, by name.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Append one row. The row must be exactly as wide as the header.
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            bail!(
                "row has {} cells but the table has {} columns",
                row.len(),
                self.columns.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    /// Move every row of `other` onto the end of this table. The two
    /// headers must already agree.
    pub fn append(&mut self, other: Table) -> Result<()> {
        if self.columns != other.columns {
            bail!(
                "cannot append table with columns {:?} onto {:?}",
                other.columns,
                self.columns
            );
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Project onto `columns`: named columns keep their values, names
    /// the table lacks are null-filled, columns not named are dropped.
    pub fn reindex(&self, columns: &[&str]) -> Table {
        let mapping: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                mapping
                    .iter()
                    .map(|source| match source {
                        Some(i) => row[*i].clone(),
                        None => Cell::Null,
                    })
                    .collect()
            })
            .collect();
        Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    /// Write the table as CSV with a leading unlabeled row-index
    /// column, the shape the rest of the pipeline reads back.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(String::new());
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;

        for (idx, row) in self.rows.iter().enumerate() {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(idx.to_string());
            record.extend(row.iter().map(|cell| cell.to_string()));
            writer.write_record(&record)?;
        }
        writer
            .flush()
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Read a CSV written by this pipeline. The first column is the
    /// row index and is dropped; every other field is classified into
    /// a [`Cell`].
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Table> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("opening {}", path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("reading header of {}", path.display()))?
            .clone();
        if headers.is_empty() {
            bail!("{} has no header row", path.display());
        }

        let mut table = Table::new(headers.iter().skip(1).map(|h| h.to_string()));
        for record in reader.records() {
            let record = record.with_context(|| format!("reading {}", path.display()))?;
            let row = record.iter().skip(1).map(Cell::parse).collect();
            table
                .push_row(row)
                .with_context(|| format!("reading {}", path.display()))?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_classifies_fields() {
        assert_eq!(Cell::parse(""), Cell::Null);
        assert_eq!(Cell::parse("4"), Cell::Int(4));
        assert_eq!(Cell::parse("4969168.544"), Cell::Float(4969168.544));
        assert_eq!(
            Cell::parse("2019-01-01T00:00:00.000+01:00"),
            Cell::Text("2019-01-01T00:00:00.000+01:00".to_string())
        );
    }

    #[test]
    fn whole_number_floats_survive_a_round_trip() {
        assert_eq!(Cell::Float(100.0).to_string(), "100.0");
        assert_eq!(Cell::parse("100.0"), Cell::Float(100.0));
        assert_eq!(Cell::Float(0.25).to_string(), "0.25");
    }

    #[test]
    fn csv_round_trip_drops_the_index_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.csv");

        let mut table = Table::new(["value", "percentage", "datetime", "COD-CCAA"]);
        table
            .push_row(vec![
                Cell::Float(490588.3),
                Cell::Float(1.0),
                Cell::from("2019-01-01T00:00:00.000+01:00"),
                Cell::Int(4),
            ])
            .unwrap();
        table
            .push_row(vec![
                Cell::Float(512101.25),
                Cell::Null,
                Cell::from("2019-02-01T00:00:00.000+01:00"),
                Cell::Int(4),
            ])
            .unwrap();
        table.write_csv(&path).unwrap();

        let read = Table::read_csv(&path).unwrap();
        assert_eq!(read, table);

        // the file itself carries the unlabeled index column
        let raw = std::fs::read_to_string(&path).unwrap();
        let mut lines = raw.lines();
        assert_eq!(
            lines.next().unwrap(),
            ",value,percentage,datetime,COD-CCAA"
        );
        assert!(lines.next().unwrap().starts_with("0,"));
        assert!(lines.next().unwrap().starts_with("1,"));
    }

    #[test]
    fn reindex_fills_missing_and_drops_extra_columns() {
        let mut table = Table::new(["value", "type", "COD-CCAA"]);
        table
            .push_row(vec![Cell::Float(1.5), Cell::from("Hidráulica"), Cell::Int(9)])
            .unwrap();

        let projected = table.reindex(&["value", "percentage", "COD-CCAA"]);
        assert_eq!(projected.columns(), &["value", "percentage", "COD-CCAA"][..]);
        assert_eq!(
            projected.rows()[0],
            vec![Cell::Float(1.5), Cell::Null, Cell::Int(9)]
        );
        assert!(projected.column_index("type").is_none());
    }

    #[test]
    fn push_row_rejects_wrong_width() {
        let mut table = Table::new(["a", "b"]);
        assert!(table.push_row(vec![Cell::Int(1)]).is_err());
        assert!(table.push_row(vec![Cell::Int(1), Cell::Int(2)]).is_ok());
    }

    #[test]
    fn append_requires_matching_headers() {
        let mut left = Table::new(["a"]);
        left.push_row(vec![Cell::Int(1)]).unwrap();
        let mut right = Table::new(["a"]);
        right.push_row(vec![Cell::Int(2)]).unwrap();
        left.append(right).unwrap();
        assert_eq!(left.num_rows(), 2);

        let other = Table::new(["b"]);
        assert!(left.append(other).is_err());
    }
}
