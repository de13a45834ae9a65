use std::{
    collections::HashSet,
    fs,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::sleep,
    time::Duration,
};

use chrono::Local;

use crate::{
    config::DatasetConfig,
    fetcher::{ImageClient, ImageFetcher},
    ledger::Ledger,
    provisioner::provision,
    types::{
        ClassDataset, FetchError, HarvestError, HarvestState, HarvestSummary, ItemOutcome,
        LedgerRecord, Resolution, SkipReason, StopReason,
    },
    utils::{contains_marker, normalize_url, query_parameter},
};

/// A rendered search results page.
pub trait ResultsPage {
    fn url(&self) -> String;
    /// Blocks until an element matching `selector` is present or `timeout` elapses.
    fn wait_for(&self, selector: &str, timeout: Duration) -> anyhow::Result<()>;
    /// Value of `attribute` for every element currently matching `selector`.
    fn attribute_values(&self, selector: &str, attribute: &str)
        -> anyhow::Result<Vec<Option<String>>>;
    fn scroll_to_bottom(&self) -> anyhow::Result<()>;
}

pub struct Harvester<C: ImageClient> {
    config: DatasetConfig,
    fetcher: ImageFetcher<C>,
    should_terminate: Arc<AtomicBool>,
}

// per-run bookkeeping shared by every item of a pass
struct RunContext {
    dataset: ClassDataset,
    ledger: Ledger,
    page_url: String,
    resolution: Resolution,
    seen: HashSet<String>,
}

impl<C: ImageClient> Harvester<C> {
    pub fn new(
        config: DatasetConfig,
        fetcher: ImageFetcher<C>,
        should_terminate: Arc<AtomicBool>,
    ) -> Self {
        Harvester {
            config,
            fetcher,
            should_terminate,
        }
    }

    /// Downloads `target` images for `query` from `page` into the class
    /// directory of `resolution`.
    pub fn harvest<P: ResultsPage>(
        &self,
        page: &P,
        query: &str,
        target: usize,
        resolution: Resolution,
    ) -> Result<HarvestSummary, HarvestError> {
        let class_name = resolution.class_name(query);
        let dataset = provision(&self.config, &class_name, None);
        let ledger = Ledger::ensure(&dataset.ledger_path, &self.config.ledger_fields)?;
        Ok(self.harvest_into(page, dataset, ledger, target, resolution))
    }

    /// Harvests into an already provisioned dataset and opened ledger.
    pub fn harvest_into<P: ResultsPage>(
        &self,
        page: &P,
        dataset: ClassDataset,
        ledger: Ledger,
        target: usize,
        resolution: Resolution,
    ) -> HarvestSummary {
        let class_name = dataset.class_name.clone();

        info!(
            "harvesting {} {} images for {}, {} already in ledger",
            target,
            resolution,
            class_name,
            ledger.rows()
        );

        let mut ctx = RunContext {
            dataset,
            ledger,
            page_url: page.url(),
            resolution,
            seen: HashSet::new(),
        };
        let mut summary = HarvestSummary::new(&class_name, resolution, target);
        let mut empty_passes = 0;
        let mut state = HarvestState::Loading;

        loop {
            state = match state {
                HarvestState::Loading => {
                    if summary.is_complete() {
                        HarvestState::Done(StopReason::TargetReached)
                    } else {
                        if let Err(e) =
                            page.wait_for(resolution.selector(), self.config.render_timeout)
                        {
                            error!("error waiting for {}: {}", resolution.selector(), e);
                        }
                        HarvestState::Scraping
                    }
                }
                HarvestState::Scraping => {
                    summary.passes += 1;
                    let before = summary.downloaded;
                    match page.attribute_values(resolution.selector(), resolution.attribute()) {
                        Ok(values) => {
                            let stopped = self.scrape(values, &mut ctx, &mut summary);
                            if let Some(reason) = stopped {
                                HarvestState::Done(reason)
                            } else if summary.downloaded > before {
                                empty_passes = 0;
                                HarvestState::Scrolling
                            } else {
                                empty_passes += 1;
                                debug!("pass {} yielded no new images", summary.passes);
                                if empty_passes >= self.config.max_empty_passes {
                                    HarvestState::Done(StopReason::Exhausted)
                                } else {
                                    HarvestState::Scrolling
                                }
                            }
                        }
                        Err(e) => {
                            error!("could not read results for {}: {:#}", class_name, e);
                            empty_passes += 1;
                            if empty_passes >= self.config.max_empty_passes {
                                HarvestState::Done(StopReason::PageError)
                            } else {
                                HarvestState::Scrolling
                            }
                        }
                    }
                }
                HarvestState::Scrolling => match page.scroll_to_bottom() {
                    Ok(_) => {
                        sleep(self.config.scroll_pause);
                        if self.terminating() {
                            HarvestState::Done(StopReason::Terminated)
                        } else {
                            HarvestState::Loading
                        }
                    }
                    Err(e) => {
                        error!("could not scroll results for {}: {:#}", class_name, e);
                        HarvestState::Done(StopReason::PageError)
                    }
                },
                HarvestState::Done(reason) => {
                    summary.stop_reason = Some(reason);
                    break;
                }
            };
        }

        if summary.is_complete() {
            info!("harvest finished: {}", summary);
        } else {
            warn!("harvest incomplete: {}", summary);
        }
        summary
    }

    // returns the reason to stop, if any
    fn scrape(
        &self,
        values: Vec<Option<String>>,
        ctx: &mut RunContext,
        summary: &mut HarvestSummary,
    ) -> Option<StopReason> {
        for value in values {
            if summary.is_complete() {
                return Some(StopReason::TargetReached);
            }
            if self.terminating() {
                return Some(StopReason::Terminated);
            }
            let outcome = self.process(value, ctx);
            if let ItemOutcome::Downloaded { .. } = outcome {
                info!(
                    "downloaded image {} for class {}",
                    summary.downloaded + 1,
                    ctx.dataset.class_name
                );
            }
            summary.record(outcome);
        }
        if summary.is_complete() {
            return Some(StopReason::TargetReached);
        }
        None
    }

    fn process(&self, value: Option<String>, ctx: &mut RunContext) -> ItemOutcome {
        let url = match self.candidate(value, &ctx.page_url, ctx.resolution) {
            Ok(url) => url,
            Err(reason) => return ItemOutcome::Skipped(reason),
        };
        if !ctx.seen.insert(url.clone()) {
            return ItemOutcome::Skipped(SkipReason::AlreadySeen);
        }

        let file_name = self.config.image_file_name(ctx.ledger.rows());
        let dest = ctx.dataset.dir.join(&file_name);

        match self.fetcher.fetch(&url, &dest) {
            Ok(_) => {}
            Err(FetchError::Rejected(_)) => return ItemOutcome::Skipped(SkipReason::NotAnImage),
            Err(e) => {
                return ItemOutcome::Failed {
                    candidate: url,
                    reason: e.to_string(),
                }
            }
        }

        let record = LedgerRecord {
            date: Local::now().naive_local().date(),
            image_url: url.clone(),
            file_name: file_name.clone(),
        };
        if let Err(e) = ctx.ledger.append(&record) {
            // an image without a ledger row would break the dataset
            if let Err(rm) = fs::remove_file(&dest) {
                warn!("could not remove {:?}: {}", dest, rm);
            }
            return ItemOutcome::Failed {
                candidate: url,
                reason: format!("ledger: {}", e),
            };
        }

        ItemOutcome::Downloaded {
            image_url: url,
            file_name,
        }
    }

    /// Image url carried by an element attribute, resolved to an absolute url.
    pub fn candidate(
        &self,
        value: Option<String>,
        page_url: &str,
        resolution: Resolution,
    ) -> Result<String, SkipReason> {
        let value = value.ok_or(SkipReason::MissingAttribute)?;
        let url = match resolution {
            Resolution::Thumbnail => value,
            Resolution::FullSize => {
                let href = normalize_url(page_url, &value).ok_or(SkipReason::MissingAttribute)?;
                query_parameter(&href, &self.config.full_size_query_param)
                    .ok_or(SkipReason::MissingQueryParameter)?
            }
        };
        let url = normalize_url(page_url, &url).ok_or(SkipReason::NotAnImage)?;
        if !contains_marker(&url, &self.config.image_markers) {
            return Err(SkipReason::NotAnImage);
        }
        Ok(url)
    }

    pub fn fetcher(&self) -> &ImageFetcher<C> {
        &self.fetcher
    }

    fn terminating(&self) -> bool {
        self.should_terminate.load(Ordering::Relaxed)
    }
}
