use std::{
    fs::{self, OpenOptions},
    path::Path,
};

use crate::{config::DatasetConfig, types::ClassDataset};

/// Ensures `<base_dir>/<class_name>/` and its ledger exist. Failures are
/// logged and swallowed, the returned paths may not exist.
pub fn provision(
    config: &DatasetConfig,
    class_name: &str,
    ledger_name: Option<&str>,
) -> ClassDataset {
    let dir = config.class_dir(class_name);
    let ledger_path = dir.join(format!("{}.csv", ledger_name.unwrap_or(class_name)));

    if dir.is_dir() {
        info!("directory for {} already exists", class_name);
    } else {
        match fs::create_dir_all(&dir) {
            Ok(_) => info!("created directory {:?}", dir),
            Err(e) => error!("could not create directory for {}: {}", class_name, e),
        }
    }

    if ledger_path.exists() {
        info!("ledger for {} already exists", class_name);
    } else {
        match touch(&ledger_path) {
            Ok(_) => info!("created ledger {:?}", ledger_path),
            Err(e) => error!("could not create ledger for {}: {}", class_name, e),
        }
    }

    ClassDataset {
        class_name: class_name.into(),
        dir,
        ledger_path,
    }
}

fn touch(path: &Path) -> std::io::Result<()> {
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}
