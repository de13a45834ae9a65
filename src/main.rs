use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use harvester::{
    config::{DatasetConfig, DATE_FORMAT},
    logger,
    runner::{HarvestJob, Runner},
};
use log::{debug, error, info};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Image dataset harvester", long_about = None)]
struct Args {
    /// Root directory of the dataset
    #[arg(short = 'd', long, default_value = "dataset", global = true)]
    base_dir: PathBuf,
    /// File receiving the logs
    #[arg(short = 'l', long, default_value = "image_download.log", global = true)]
    log_file: PathBuf,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Downloads full-size then thumbnail images for every class
    Harvest {
        /// Search query of a class, repeat for several classes
        #[arg(short = 'c', long = "class", default_values_t = default_classes())]
        classes: Vec<String>,
        /// Full-size images to download per class
        #[arg(short = 'f', long, default_value_t = 20)]
        full_size_count: usize,
        /// Thumbnails to download per class
        #[arg(short = 't', long, default_value_t = 100)]
        thumb_count: usize,
    },
    /// Splits a ledger into a dates file and a fields file
    Split {
        /// Ledger to split
        #[arg(long)]
        ledger: PathBuf,
        /// First date of the synthetic daily series replacing the ledger dates
        #[arg(short = 's', long, value_parser = parse_date)]
        start_date: Option<NaiveDate>,
    },
}

fn default_classes() -> Vec<String> {
    vec!["tiger".into(), "leopard".into()]
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| format!("{}: {}", s, e))
}

fn jobs(classes: &[String], full_size_count: usize, thumb_count: usize) -> Vec<HarvestJob> {
    let full_size = classes
        .iter()
        .map(|c| HarvestJob::new(c, full_size_count, true));
    let thumbs = classes.iter().map(|c| HarvestJob::new(c, thumb_count, false));
    full_size.chain(thumbs).collect()
}

fn run(config: DatasetConfig, command: Option<Command>) -> anyhow::Result<()> {
    let runner = Runner::new(config).context("could not start runner")?;

    let command = command.unwrap_or(Command::Harvest {
        classes: default_classes(),
        full_size_count: 20,
        thumb_count: 100,
    });

    match command {
        Command::Harvest {
            classes,
            full_size_count,
            thumb_count,
        } => {
            let summaries = runner.run_all(&jobs(&classes, full_size_count, thumb_count));
            for summary in summaries.iter() {
                println!("{}", summary);
            }
        }
        Command::Split { ledger, start_date } => {
            let paths = runner.run_split(&ledger, start_date)?;
            println!(
                "{} rows written to {:?} and {:?}",
                paths.rows, paths.dates, paths.fields
            );
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let config = match DatasetConfig::default_builder()
        .base_dir(args.base_dir.clone())
        .log_file(args.log_file.clone())
        .build()
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            return;
        }
    };

    if let Err(e) = logger::init(&config.log_file) {
        eprintln!("could not initialize logging: {:#}", e);
    }
    debug!("Starting with {:#?}", args.clone());

    // errors are logged, the process still exits normally
    if let Err(e) = run(config, args.command) {
        error!("An error has occurred: {:#}", e);
        eprintln!("An error has occurred: {:#}", e);
    }
    info!("done");
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;
    use harvester::types::Resolution;

    #[test]
    fn verify_args() {
        Args::command().debug_assert();
    }

    #[test]
    fn full_size_jobs_come_first() {
        let jobs = jobs(&default_classes(), 20, 100);
        let plan = jobs
            .iter()
            .map(|j| (j.query.as_str(), j.target, j.resolution))
            .collect::<Vec<_>>();
        assert_eq!(
            plan,
            vec![
                ("tiger", 20, Resolution::FullSize),
                ("leopard", 20, Resolution::FullSize),
                ("tiger", 100, Resolution::Thumbnail),
                ("leopard", 100, Resolution::Thumbnail),
            ]
        );
    }

    #[test]
    fn split_takes_an_optional_start_date() {
        let args = Args::parse_from(["harvester", "split", "--ledger", "a.csv", "-s", "2023-06-01"]);
        match args.command {
            Some(Command::Split { ledger, start_date }) => {
                assert_eq!(ledger, PathBuf::from("a.csv"));
                assert_eq!(start_date, NaiveDate::from_ymd_opt(2023, 6, 1));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Args::try_parse_from(["harvester", "split", "--ledger", "a.csv", "-s", "June"]).is_err());
    }
}
