use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use crate::types::LedgerRecord;

/// Writes `fields` as one csv row, creating the file if needed and appending
/// otherwise.
pub fn write_row<S: AsRef<[u8]>>(path: &Path, fields: &[S]) -> Result<(), csv::Error> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(fields)?;
    writer.flush()?;
    Ok(())
}

/// Append handle on a class ledger.
pub struct Ledger {
    path: PathBuf,
    writer: csv::Writer<Box<dyn Write>>,
    rows: usize,
}

impl Ledger {
    /// Opens the ledger for appending once per run. The header is written only
    /// when the file is empty, existing rows are counted. Repeated header
    /// lines are not rows.
    pub fn ensure<S: AsRef<str>>(path: &Path, header: &[S]) -> Result<Self, csv::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_empty = file.metadata()?.len() == 0;

        let rows = if is_empty {
            0
        } else {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .from_path(path)?;
            let mut count = 0;
            for record in reader.records() {
                let record = record?;
                if !record.iter().eq(header.iter().map(|h| h.as_ref())) {
                    count += 1;
                }
            }
            count
        };

        let mut writer = Self::csv_writer(Box::new(file));
        if is_empty {
            writer.write_record(header.iter().map(|h| h.as_ref()))?;
            writer.flush()?;
            debug!("wrote header to new ledger {:?}", path);
        }

        Ok(Ledger {
            path: path.to_path_buf(),
            writer,
            rows,
        })
    }

    /// Ledger appending to `writer`, which already holds `rows` data rows.
    pub fn from_writer<W: Write + 'static>(path: &Path, writer: W, rows: usize) -> Self {
        Ledger {
            path: path.to_path_buf(),
            writer: Self::csv_writer(Box::new(writer)),
            rows,
        }
    }

    fn csv_writer(writer: Box<dyn Write>) -> csv::Writer<Box<dyn Write>> {
        csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer)
    }

    pub fn append(&mut self, record: &LedgerRecord) -> Result<(), csv::Error> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Number of data rows, header excluded.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::LEDGER_FIELDS;
    use chrono::NaiveDate;
    use std::fs;

    fn record(day: u32, name: &str) -> LedgerRecord {
        LedgerRecord {
            date: NaiveDate::from_ymd_opt(2023, 1, day).unwrap(),
            image_url: format!("http://x/{}.jpg", name),
            file_name: format!("{}.jpg", name),
        }
    }

    #[test]
    fn write_row_creates_then_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.csv");

        write_row(&path, &LEDGER_FIELDS).unwrap();
        write_row(&path, &["2023-01-01", "http://x/a.jpg", "0000.jpg"]).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "date,image_url,file_name\n2023-01-01,http://x/a.jpg,0000.jpg\n"
        );
    }

    #[test]
    fn ensure_writes_header_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.csv");
        // the provisioner leaves an empty file behind
        fs::write(&path, "").unwrap();

        let mut ledger = Ledger::ensure(&path, &LEDGER_FIELDS).unwrap();
        assert_eq!(ledger.rows(), 0);
        ledger.append(&record(1, "0000")).unwrap();
        drop(ledger);

        let mut ledger = Ledger::ensure(&path, &LEDGER_FIELDS).unwrap();
        assert_eq!(ledger.rows(), 1);
        ledger.append(&record(2, "0001")).unwrap();
        assert_eq!(ledger.rows(), 2);
        assert_eq!(ledger.path(), path.as_path());

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "date,image_url,file_name\n\
             2023-01-01,http://x/0000.jpg,0000.jpg\n\
             2023-01-02,http://x/0001.jpg,0001.jpg\n"
        );
    }

    #[test]
    fn repeated_headers_are_not_counted() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.csv");
        fs::write(
            &path,
            "date,image_url,file_name\n\
             2023-01-01,http://x/0000.jpg,0000.jpg\n\
             date,image_url,file_name\n\
             2023-01-02,http://x/0001.jpg,0001.jpg\n",
        )
        .unwrap();

        let ledger = Ledger::ensure(&path, &LEDGER_FIELDS).unwrap();
        assert_eq!(ledger.rows(), 2);
    }

    #[test]
    fn appended_records_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.csv");
        let mut ledger = Ledger::ensure(&path, &LEDGER_FIELDS).unwrap();
        ledger.append(&record(3, "with,comma")).unwrap();
        drop(ledger);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let read: Vec<LedgerRecord> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(read, vec![record(3, "with,comma")]);
    }
}
