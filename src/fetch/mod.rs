// src/fetch/mod.rs

//! Pulls per-region datasets from the REE REData API and writes one
//! CSV file per (region, year).

pub mod redata;

pub use redata::{extract_demand, extract_generation, DEMAND_ENDPOINT, GENERATION_ENDPOINT};

/// Outcome of one batch extraction: how many files landed and which
/// (region, year) pairs were skipped, with the reason. A skip never
/// aborts the batch; callers decide what a non-empty skip list means.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub saved: usize,
    pub skipped: Vec<Skipped>,
}

/// One (region, year) the batch gave up on.
#[derive(Debug)]
pub struct Skipped {
    pub region: String,
    pub year: i32,
    pub reason: String,
}

impl ExtractReport {
    pub(crate) fn skip(&mut self, region: &str, year: i32, reason: String) {
        self.skipped.push(Skipped {
            region: region.to_string(),
            year,
            reason,
        });
    }

    /// True when every (region, year) pair produced a file.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}
