// src/load.rs

//! Row-by-row insertion of a combined table into DuckDB.

use anyhow::{bail, Context, Result};
use duckdb::types::{Null, ToSqlOutput};
use duckdb::{params_from_iter, Connection, ToSql};
use tracing::{error, info};

use crate::table::{Cell, Table};

impl ToSql for Cell {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Cell::Null => ToSqlOutput::from(Null),
            Cell::Int(i) => ToSqlOutput::from(*i),
            Cell::Float(f) => ToSqlOutput::from(*f),
            Cell::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Insert every row of `table` into `destination`.
///
/// One INSERT is built from the table's column names (order
/// preserving), prepared once, and executed per row with positional
/// binds. There is no surrounding transaction: rows inserted before a
/// failure stay visible, and the destination table must already exist
/// with compatible columns.
pub fn insert_table(conn: &Connection, table: &Table, destination: &str) -> Result<()> {
    if table.columns().is_empty() {
        bail!("table headed for {} has no columns", destination);
    }

    let columns = table
        .columns()
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; table.columns().len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        destination, columns, placeholders
    );

    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("preparing insert into {}", destination))?;

    for (idx, row) in table.rows().iter().enumerate() {
        if row.len() != table.columns().len() {
            bail!(
                "row {} has {} cells, {} expects {}",
                idx,
                row.len(),
                destination,
                table.columns().len()
            );
        }
        if let Err(e) = stmt.execute(params_from_iter(row.iter())) {
            error!(destination, row = idx, error = %e, "insert failed");
            return Err(e).with_context(|| format!("inserting row {} into {}", idx, destination));
        }
    }

    info!(destination, rows = table.num_rows(), "loaded table");
    Ok(())
}
