use std::{collections::BTreeMap, fmt::Display, path::PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("rejected: {0} does not look like an image")]
    Rejected(String),
    #[error("exhausted: {url} could not be fetched after {attempts} attempts")]
    Exhausted { url: String, attempts: u8 },
}

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("io: {0}")]
    IOError(#[from] std::io::Error),
    #[error("csv: {0}")]
    CsvError(#[from] csv::Error),
    #[error("missing_columns: {0:?}")]
    MissingColumns(Vec<String>),
    #[error("invalid_date: row {row} has {value:?}")]
    InvalidDate { row: usize, value: String },
}

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("ledger: {0}")]
    LedgerError(#[from] csv::Error),
    #[error("invalid_url: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    FullSize,
    Thumbnail,
}

impl Resolution {
    pub fn from_full_size(full_size: bool) -> Self {
        if full_size {
            Resolution::FullSize
        } else {
            Resolution::Thumbnail
        }
    }

    pub fn class_suffix(&self) -> &'static str {
        match self {
            Resolution::FullSize => "_full-size",
            Resolution::Thumbnail => "_thumb",
        }
    }

    /// CSS selector of the result elements carrying the image urls.
    pub fn selector(&self) -> &'static str {
        match self {
            Resolution::FullSize => "a.serp-item__link",
            Resolution::Thumbnail => "img.serp-item__thumb",
        }
    }

    pub fn attribute(&self) -> &'static str {
        match self {
            Resolution::FullSize => "href",
            Resolution::Thumbnail => "src",
        }
    }

    pub fn class_name(&self, query: &str) -> String {
        format!("{}{}", query, self.class_suffix())
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::FullSize => write!(f, "full-size"),
            Resolution::Thumbnail => write!(f, "thumbnail"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub date: NaiveDate,
    pub image_url: String,
    pub file_name: String,
}

#[derive(Debug, Clone)]
pub struct ClassDataset {
    pub class_name: String,
    pub dir: PathBuf,
    pub ledger_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SkipReason {
    MissingAttribute,
    MissingQueryParameter,
    NotAnImage,
    AlreadySeen,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingAttribute => write!(f, "missing attribute"),
            SkipReason::MissingQueryParameter => write!(f, "missing query parameter"),
            SkipReason::NotAnImage => write!(f, "not an image"),
            SkipReason::AlreadySeen => write!(f, "already seen"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Downloaded { image_url: String, file_name: String },
    Skipped(SkipReason),
    Failed { candidate: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestState {
    Loading,
    Scraping,
    Scrolling,
    Done(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    // the results page stopped yielding new downloads
    Exhausted,
    Terminated,
    PageError,
}

#[derive(Debug)]
pub struct HarvestSummary {
    pub class_name: String,
    pub resolution: Resolution,
    pub target: usize,
    pub downloaded: usize,
    pub passes: u32,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub failures: Vec<(String, String)>,
    pub stop_reason: Option<StopReason>,
}

impl HarvestSummary {
    pub fn new(class_name: &str, resolution: Resolution, target: usize) -> Self {
        HarvestSummary {
            class_name: class_name.into(),
            resolution,
            target,
            downloaded: 0,
            passes: 0,
            skipped: BTreeMap::new(),
            failures: vec![],
            stop_reason: None,
        }
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Downloaded { .. } => self.downloaded += 1,
            ItemOutcome::Skipped(reason) => *self.skipped.entry(reason).or_insert(0) += 1,
            ItemOutcome::Failed { candidate, reason } => self.failures.push((candidate, reason)),
        }
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn is_complete(&self) -> bool {
        self.downloaded >= self.target
    }
}

impl Display for HarvestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {}/{} downloaded in {} passes, {} skipped, {} failed, stopped: {:?}",
            self.class_name,
            self.resolution,
            self.downloaded,
            self.target,
            self.passes,
            self.skipped_total(),
            self.failures.len(),
            self.stop_reason
        )?;
        for (reason, count) in self.skipped.iter() {
            write!(f, "\n  skipped {}: {}", reason, count)?;
        }
        for (candidate, reason) in self.failures.iter() {
            write!(f, "\n  failed {}: {}", candidate, reason)?;
        }
        Ok(())
    }
}
