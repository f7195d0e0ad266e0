// src/normalize.rs

//! Folds a directory of extracted CSV files into one combined table
//! ready for loading.

use std::path::Path;

use anyhow::{bail, Context, Result};
use glob::glob;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::table::{Cell, Table};

/// Column order of the combined table. Files missing one of these
/// columns contribute nulls there; columns outside this set are
/// dropped.
pub const COMBINED_COLUMNS: [&str; 6] =
    ["provincia", "año", "value", "percentage", "datetime", "COD-CCAA"];

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}").expect("year pattern is valid"));
static STEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)(?:\d{4})?\.csv$").expect("stem pattern is valid"));

/// Derive `provincia` (file stem, trailing year stripped) and `año`
/// (first 4-digit run) from a file name. Either may come out `Null`.
fn fields_from_filename(name: &str) -> (Cell, Cell) {
    let provincia = STEM_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| Cell::from(m.as_str()))
        .unwrap_or(Cell::Null);
    let year = YEAR_RE
        .find(name)
        .map(|m| Cell::from(m.as_str()))
        .unwrap_or(Cell::Null);
    (provincia, year)
}

/// Read every `.csv` file under `dir`, derive the region and year
/// columns from each file name, project onto [`COMBINED_COLUMNS`] and
/// concatenate the lot.
///
/// A directory without a single CSV file is an error, never a silent
/// empty table.
pub fn consolidate(dir: impl AsRef<Path>) -> Result<Table> {
    let dir = dir.as_ref();
    let pattern = dir.join("*.csv");
    let pattern = pattern
        .to_str()
        .with_context(|| format!("non utf-8 path {}", dir.display()))?;

    let mut combined = Table::new(COMBINED_COLUMNS);
    let mut files = 0usize;
    for entry in glob(pattern).context("listing csv files")? {
        let path = entry.context("listing csv files")?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("unreadable file name under {}", dir.display()))?
            .to_string();

        let raw = Table::read_csv(&path)?;
        let (provincia, year) = fields_from_filename(&name);

        // name-derived columns go in front so they win over any
        // same-named column the file itself carries
        let mut columns: Vec<String> = vec!["provincia".to_string(), "año".to_string()];
        columns.extend(raw.columns().iter().cloned());
        let mut part = Table::new(columns);
        for row in raw.rows() {
            let mut cells = Vec::with_capacity(row.len() + 2);
            cells.push(provincia.clone());
            cells.push(year.clone());
            cells.extend(row.iter().cloned());
            part.push_row(cells)
                .with_context(|| format!("widening rows of {}", path.display()))?;
        }

        combined.append(part.reindex(&COMBINED_COLUMNS))?;
        files += 1;
    }

    if files == 0 {
        bail!("no csv files to combine in {}", dir.display());
    }
    info!(
        files,
        rows = combined.num_rows(),
        dir = %dir.display(),
        "combined extraction output"
    );
    Ok(combined)
}

/// Trim and upper-case every text value of `column` so region names
/// compare equal across sources. Applying it twice is the same as
/// applying it once.
pub fn standardize_region_names(mut table: Table, column: &str) -> Result<Table> {
    let idx = table
        .column_index(column)
        .with_context(|| format!("table has no column named {}", column))?;
    for row in table.rows_mut() {
        if let Cell::Text(value) = &mut row[idx] {
            *value = value.trim().to_uppercase();
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::redata::{DEMAND_COLUMNS, GENERATION_COLUMNS};
    use tempfile::tempdir;

    fn demand_file(dir: &Path, name: &str, rows: usize, code: u32) {
        let mut table = Table::new(DEMAND_COLUMNS);
        for n in 0..rows {
            table
                .push_row(vec![
                    Cell::Float(1000.0 + n as f64),
                    Cell::Float(0.5),
                    Cell::from(format!("2019-{:02}-01T00:00:00.000+01:00", n + 1)),
                    Cell::from(code),
                ])
                .unwrap();
        }
        table.write_csv(dir.join(name)).unwrap();
    }

    fn generation_file(dir: &Path, name: &str, code: u32) {
        let mut table = Table::new(GENERATION_COLUMNS);
        table
            .push_row(vec![
                Cell::Float(42.0),
                Cell::Float(0.1),
                Cell::from("2020-01-01T00:00:00.000+01:00"),
                Cell::from("Eólica"),
                Cell::from(code),
            ])
            .unwrap();
        table.write_csv(dir.join(name)).unwrap();
    }

    #[test]
    fn combines_row_counts_and_fixes_the_column_set() {
        let dir = tempdir().unwrap();
        demand_file(dir.path(), "Andalucía2019.csv", 2, 4);
        demand_file(dir.path(), "Ceuta2019.csv", 3, 8744);
        generation_file(dir.path(), "Cataluña2020.csv", 9);

        let combined = consolidate(dir.path()).unwrap();

        assert_eq!(combined.columns(), &COMBINED_COLUMNS[..]);
        assert_eq!(combined.num_rows(), 6);

        let provinces: Vec<String> = combined
            .column("provincia")
            .unwrap()
            .iter()
            .map(|cell| cell.to_string())
            .collect();
        assert_eq!(provinces.iter().filter(|p| *p == "Andalucía").count(), 2);
        assert_eq!(provinces.iter().filter(|p| *p == "Ceuta").count(), 3);
        assert_eq!(provinces.iter().filter(|p| *p == "Cataluña").count(), 1);

        // the generation file's extra `type` column is gone
        assert!(combined.column_index("type").is_none());

        let years = combined.column("año").unwrap();
        assert!(years.contains(&&Cell::from("2019")));
        assert!(years.contains(&&Cell::from("2020")));
    }

    #[test]
    fn files_missing_a_column_contribute_nulls() {
        let dir = tempdir().unwrap();
        let mut table = Table::new(["value", "datetime"]);
        table
            .push_row(vec![Cell::Float(7.0), Cell::from("2021-01-01T00:00")])
            .unwrap();
        table.write_csv(dir.path().join("Galicia2021.csv")).unwrap();

        let combined = consolidate(dir.path()).unwrap();
        assert_eq!(combined.num_rows(), 1);
        let row = &combined.rows()[0];
        assert_eq!(row[0], Cell::from("Galicia"));
        assert_eq!(row[1], Cell::from("2021"));
        assert_eq!(row[2], Cell::Float(7.0));
        assert!(row[3].is_null(), "percentage must be null-filled");
        assert!(row[5].is_null(), "COD-CCAA must be null-filled");
    }

    #[test]
    fn ignores_files_that_are_not_csv() {
        let dir = tempdir().unwrap();
        demand_file(dir.path(), "Melilla2019.csv", 1, 8745);
        std::fs::write(dir.path().join("notes.txt"), "not tabular").unwrap();

        let combined = consolidate(dir.path()).unwrap();
        assert_eq!(combined.num_rows(), 1);
    }

    #[test]
    fn an_empty_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let err = consolidate(dir.path()).unwrap_err();
        assert!(err.to_string().contains("no csv files"));
    }

    #[test]
    fn filename_without_a_year_yields_null_year() {
        let dir = tempdir().unwrap();
        let mut table = Table::new(["value"]);
        table.push_row(vec![Cell::Int(1)]).unwrap();
        table.write_csv(dir.path().join("resumen.csv")).unwrap();

        let combined = consolidate(dir.path()).unwrap();
        let row = &combined.rows()[0];
        assert_eq!(row[0], Cell::from("resumen"));
        assert!(row[1].is_null());
    }

    #[test]
    fn standardize_trims_and_upper_cases() {
        let mut table = Table::new(["provincia", "value"]);
        table
            .push_row(vec![Cell::from("  andalucía "), Cell::Int(1)])
            .unwrap();
        table
            .push_row(vec![Cell::from("Castilla y León"), Cell::Int(2)])
            .unwrap();
        table.push_row(vec![Cell::Null, Cell::Int(3)]).unwrap();

        let table = standardize_region_names(table, "provincia").unwrap();
        assert_eq!(table.rows()[0][0], Cell::from("ANDALUCÍA"));
        assert_eq!(table.rows()[1][0], Cell::from("CASTILLA Y LEÓN"));
        assert!(table.rows()[2][0].is_null());
        // the other column is untouched
        assert_eq!(table.rows()[0][1], Cell::Int(1));
    }

    #[test]
    fn standardize_is_idempotent() {
        let mut table = Table::new(["provincia"]);
        table.push_row(vec![Cell::from(" ceuta  ")]).unwrap();
        table.push_row(vec![Cell::from("MELILLA")]).unwrap();

        let once = standardize_region_names(table, "provincia").unwrap();
        let twice = standardize_region_names(once.clone(), "provincia").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn standardize_rejects_unknown_columns() {
        let table = Table::new(["value"]);
        assert!(standardize_region_names(table, "provincia").is_err());
    }
}
