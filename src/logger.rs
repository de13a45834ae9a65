use std::{fs::OpenOptions, io::Write, path::Path};

use anyhow::Context;
use chrono::Local;
use env_logger::{Builder, Env, Target};

/// Sends every log line to `log_file`, appending. `RUST_LOG` overrides the
/// default `info` level.
pub fn init(log_file: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .context(format!("could not open log file {:?}", log_file))?;

    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {}: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(file)))
        .try_init()?;

    info!("logging to {:?}", log_file);
    Ok(())
}
