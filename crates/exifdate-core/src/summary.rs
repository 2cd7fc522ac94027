use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reconcile::Outcome;

/// Outcome counts for one run. Owned by whoever drives the run and passed
/// down explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    counts: BTreeMap<Outcome, u64>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: Outcome) {
        *self.counts.entry(outcome).or_insert(0) += 1;
    }

    pub fn count(&self, outcome: Outcome) -> u64 {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Files left untouched because of an error.
    pub fn failures(&self) -> u64 {
        Outcome::ALL
            .iter()
            .filter(|o| o.is_failure())
            .map(|&o| self.count(o))
            .sum()
    }
}

fn report_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::AlreadySet => "Images previously set",
        Outcome::Set => "Images set",
        Outcome::ForcedOverwrite => "Images forced set",
        Outcome::ExcludedExtension => "Files excluded",
        Outcome::InvalidFilename => "Invalid filenames",
        Outcome::InvalidImage => "Invalid images",
        Outcome::ExtractionError => "Error in extract tag",
        Outcome::WriteError => "Error in setting date",
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Done processing images:")?;
        writeln!(f, "---------------------------------")?;
        for outcome in Outcome::ALL {
            writeln!(f, "{:<24}{}", format!("{}:", report_label(outcome)), self.count(outcome))?;
        }
        writeln!(f, "---------------------------------")?;
        write!(f, "{:<24}{}", "Total files:", self.total())
    }
}
