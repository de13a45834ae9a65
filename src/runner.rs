use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::Context;
use chrono::NaiveDate;
use signal_hook::consts::{SIGINT, SIGTERM};

use crate::{
    browser_controller::BrowserController,
    config::DatasetConfig,
    fetcher::{HttpImageClient, ImageFetcher},
    harvester::Harvester,
    splitter::{DatasetSplitter, SplitPaths},
    types::{HarvestSummary, Resolution},
    utils::search_url,
};

#[derive(Debug, Clone)]
pub struct HarvestJob {
    pub query: String,
    pub target: usize,
    pub resolution: Resolution,
}

impl HarvestJob {
    pub fn new(query: &str, target: usize, full_size: bool) -> Self {
        HarvestJob {
            query: query.into(),
            target,
            resolution: Resolution::from_full_size(full_size),
        }
    }
}

pub struct Runner {
    config: DatasetConfig,
    should_terminate: Arc<AtomicBool>,
}

impl Runner {
    pub fn new(config: DatasetConfig) -> anyhow::Result<Self> {
        let should_terminate = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGTERM, Arc::clone(&should_terminate))?;
        signal_hook::flag::register(SIGINT, Arc::clone(&should_terminate))?;

        Ok(Runner {
            config,
            should_terminate,
        })
    }

    pub fn terminating(&self) -> bool {
        self.should_terminate.load(Ordering::Relaxed)
    }

    /// One harvesting run. The browser is released when this returns, whatever
    /// the outcome.
    pub fn run_harvest(&self, job: &HarvestJob) -> anyhow::Result<HarvestSummary> {
        let url = search_url(&self.config.search_url, &job.query, &self.config.photo_type)?;
        info!(
            "initializing {} harvest of {} images for {} from {}",
            job.resolution, job.target, job.query, url
        );

        let client = HttpImageClient::new(self.config.request_timeout)?;
        let fetcher = ImageFetcher::new(client, &self.config);
        let harvester = Harvester::new(self.config.clone(), fetcher, self.should_terminate.clone());

        let browser = BrowserController::new(self.config.browser_timeout)?;
        let page = browser
            .browse(&url)
            .context(format!("could not open results for {}", job.query))?;
        let summary = harvester
            .harvest(&page, &job.query, job.target, job.resolution)
            .context(format!("harvest of {} failed", job.query))?;

        Ok(summary)
    }

    /// Runs every job in order. A failed job is logged and the next one starts.
    pub fn run_all(&self, jobs: &[HarvestJob]) -> Vec<HarvestSummary> {
        let mut summaries = vec![];
        for job in jobs.iter() {
            if self.terminating() {
                warn!("termination requested, skipping remaining jobs");
                break;
            }
            match self.run_harvest(job) {
                Ok(summary) => summaries.push(summary),
                Err(e) => error!("An error has occurred: {:#}", e),
            }
        }
        summaries
    }

    pub fn run_split(
        &self,
        ledger_path: &Path,
        start: Option<NaiveDate>,
    ) -> anyhow::Result<SplitPaths> {
        let splitter = DatasetSplitter::new(self.config.clone());
        let paths = splitter
            .run(ledger_path, start)
            .context(format!("could not split {:?}", ledger_path))?;
        Ok(paths)
    }
}
