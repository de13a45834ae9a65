#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;

pub mod browser_controller;
pub mod config;
pub mod fetcher;
pub mod harvester;
pub mod ledger;
pub mod logger;
pub mod provisioner;
pub mod runner;
pub mod splitter;
pub mod types;
pub mod utils;
