use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{Duration, NaiveDate};
use csv::StringRecord;

use crate::{
    config::{DatasetConfig, DATE_FORMAT},
    types::SplitError,
};

/// A csv file held in memory, header row apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl Table {
    pub fn read(path: &Path) -> Result<Self, SplitError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Table { headers, rows })
    }

    pub fn write(&self, path: &Path) -> Result<(), SplitError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in self.rows.iter() {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require<S: AsRef<str>>(&self, required: &[S]) -> Result<(), SplitError> {
        let missing = required
            .iter()
            .map(|c| c.as_ref())
            .filter(|c| self.column(c).is_none())
            .map(String::from)
            .collect::<Vec<String>>();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SplitError::MissingColumns(missing))
        }
    }

    /// New table holding only `columns`, in that order.
    pub fn select(&self, columns: &[usize]) -> Table {
        let pick = |record: &StringRecord| {
            columns
                .iter()
                .map(|&i| record.get(i).unwrap_or(""))
                .collect::<StringRecord>()
        };
        Table {
            headers: pick(&self.headers),
            rows: self.rows.iter().map(pick).collect(),
        }
    }

    fn set_column<I: IntoIterator<Item = String>>(&mut self, column: usize, values: I) {
        for (row, value) in self.rows.iter_mut().zip(values) {
            *row = row
                .iter()
                .enumerate()
                .map(|(i, field)| if i == column { value.as_str() } else { field })
                .collect();
        }
    }
}

/// Reads a ledger and checks that every `required` column is present.
pub fn load_ledger<S: AsRef<str>>(path: &Path, required: &[S]) -> Result<Table, SplitError> {
    let table = Table::read(path)?;
    table.require(required)?;
    Ok(table)
}

fn date_column(table: &Table, column: &str) -> Result<usize, SplitError> {
    table
        .column(column)
        .ok_or_else(|| SplitError::MissingColumns(vec![column.into()]))
}

pub fn parse_dates(table: &Table, column: &str) -> Result<Vec<NaiveDate>, SplitError> {
    let col = date_column(table, column)?;
    table
        .rows
        .iter()
        .enumerate()
        .map(|(row, record)| {
            let value = record.get(col).unwrap_or("");
            NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
                SplitError::InvalidDate {
                    row,
                    value: value.into(),
                }
            })
        })
        .collect()
}

/// Rewrites `column` so that row `i` holds `start + i` days.
pub fn rewrite_dates(table: &mut Table, column: &str, start: NaiveDate) -> Result<(), SplitError> {
    let col = date_column(table, column)?;
    let dates = (0..table.len())
        .map(|i| (start + Duration::days(i as i64)).format(DATE_FORMAT).to_string())
        .collect::<Vec<String>>();
    table.set_column(col, dates);
    Ok(())
}

/// Splits `table` into the `column` table and a table of every other column.
pub fn split(table: &Table, column: &str) -> Result<(Table, Table), SplitError> {
    let col = date_column(table, column)?;
    let rest = (0..table.headers.len())
        .filter(|&i| i != col)
        .collect::<Vec<usize>>();
    Ok((table.select(&[col]), table.select(&rest)))
}

#[derive(Debug)]
pub struct SplitPaths {
    pub dates: PathBuf,
    pub fields: PathBuf,
    pub rows: usize,
}

pub struct DatasetSplitter {
    config: DatasetConfig,
}

impl DatasetSplitter {
    pub fn new(config: DatasetConfig) -> Self {
        DatasetSplitter { config }
    }

    /// Splits the ledger at `ledger_path` into the dates and fields files,
    /// optionally replacing the dates with a daily series from `start`.
    pub fn run(&self, ledger_path: &Path, start: Option<NaiveDate>) -> Result<SplitPaths, SplitError> {
        let column = self.config.date_column.as_str();
        let mut table = load_ledger(ledger_path, &self.config.ledger_fields)?;

        match start {
            Some(start) => {
                debug!("rewriting {} dates starting from {}", table.len(), start);
                rewrite_dates(&mut table, column, start)?;
            }
            None => {
                // normalizes every date to the ledger format
                let dates = parse_dates(&table, column)?;
                let col = date_column(&table, column)?;
                table.set_column(col, dates.iter().map(|d| d.format(DATE_FORMAT).to_string()));
            }
        }

        let (dates, fields) = split(&table, column)?;

        let dir = self.config.split_dir();
        fs::create_dir_all(&dir)?;
        let paths = SplitPaths {
            dates: dir.join(&self.config.dates_file_name),
            fields: dir.join(&self.config.fields_file_name),
            rows: table.len(),
        };
        dates.write(&paths.dates)?;
        fields.write(&paths.fields)?;

        info!(
            "split {:?} into {:?} and {:?} ({} rows)",
            ledger_path, paths.dates, paths.fields, paths.rows
        );
        Ok(paths)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn table(rows: &[[&str; 3]]) -> Table {
        Table {
            headers: StringRecord::from(vec!["date", "image_url", "file_name"]),
            rows: rows.iter().map(|r| StringRecord::from(r.to_vec())).collect(),
        }
    }

    #[test]
    fn reports_every_missing_column() {
        let t = Table {
            headers: StringRecord::from(vec!["image_url"]),
            rows: vec![],
        };
        match t.require(&["date", "image_url", "file_name"]) {
            Err(SplitError::MissingColumns(missing)) => {
                assert_eq!(missing, vec!["date".to_string(), "file_name".to_string()])
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn synthetic_dates_increment_daily() {
        let mut t = table(&[["x", "a", "0"], ["x", "b", "1"], ["x", "c", "2"], ["x", "d", "3"]]);
        let start = NaiveDate::from_ymd_opt(2023, 12, 30).unwrap();

        rewrite_dates(&mut t, "date", start).unwrap();

        let dates = parse_dates(&t, "date").unwrap();
        for (i, d) in dates.iter().enumerate() {
            assert_eq!(*d, start + Duration::days(i as i64));
        }
        assert_eq!(&t.rows[3][0], "2024-01-02");
        assert_eq!(&t.rows[3][1], "d");
    }

    #[test]
    fn invalid_dates_name_the_row() {
        let t = table(&[["2023-01-01", "a", "0"], ["yesterday", "b", "1"]]);
        match parse_dates(&t, "date") {
            Err(SplitError::InvalidDate { row, value }) => {
                assert_eq!(row, 1);
                assert_eq!(value, "yesterday");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn split_keeps_order_and_row_count() {
        let t = table(&[
            ["2023-01-01", "http://x/a.jpg", "0000.jpg"],
            ["2023-01-02", "http://x/b.jpg", "0001.jpg"],
            ["2023-01-03", "http://x/c.jpg", "0002.jpg"],
        ]);

        let (dates, fields) = split(&t, "date").unwrap();

        assert_eq!(dates.len(), 3);
        assert_eq!(fields.len(), 3);
        assert_eq!(dates.headers, StringRecord::from(vec!["date"]));
        assert_eq!(fields.headers, StringRecord::from(vec!["image_url", "file_name"]));
        assert_eq!(&dates.rows[2][0], "2023-01-03");
        assert_eq!(fields.rows[1], StringRecord::from(vec!["http://x/b.jpg", "0001.jpg"]));
    }

    #[test]
    fn split_on_empty_table() {
        let (dates, fields) = split(&table(&[]), "date").unwrap();
        assert!(dates.is_empty());
        assert!(fields.is_empty());
    }
}
