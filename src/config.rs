use std::{path::PathBuf, time::Duration};

pub const LEDGER_FIELDS: [&str; 3] = ["date", "image_url", "file_name"];
pub const SEARCH_URL: &str = "https://yandex.ru/images/search";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct DatasetConfig {
    // root directory holding one folder per class
    #[builder(default = "self.default_base_dir()")]
    pub base_dir: PathBuf,
    // folder (under base_dir) receiving the split outputs
    #[builder(default = "String::from(\"csv_date_by_data\")")]
    pub split_dir_name: String,
    #[builder(default = "String::from(\"X.csv\")")]
    pub dates_file_name: String,
    #[builder(default = "String::from(\"Y.csv\")")]
    pub fields_file_name: String,
    // header of every class ledger
    #[builder(default = "self.default_ledger_fields()")]
    pub ledger_fields: Vec<String>,
    #[builder(default = "String::from(\"date\")")]
    pub date_column: String,
    #[builder(default = "SEARCH_URL.into()")]
    pub search_url: String,
    #[builder(default = "String::from(\"photo\")")]
    pub photo_type: String,
    // a candidate url must contain one of these to be fetched
    #[builder(default = "self.default_image_markers()")]
    pub image_markers: Vec<String>,
    // query parameter of a full-size result link carrying the real image url
    #[builder(default = "String::from(\"img_url\")")]
    pub full_size_query_param: String,
    #[builder(default = "4")]
    pub file_name_width: usize,
    #[builder(default = "String::from(\"jpg\")")]
    pub image_extension: String,
    #[builder(default = "2")]
    pub fetch_attempts: u8,
    // timeout of a single image request
    #[builder(default = "Duration::from_secs(30)")]
    pub request_timeout: Duration,
    // maximum wait for results to render after each scroll
    #[builder(default = "Duration::from_secs(10)")]
    pub render_timeout: Duration,
    #[builder(default = "Duration::from_secs(5)")]
    pub scroll_pause: Duration,
    // consecutive passes without a download before the run gives up
    #[builder(default = "5")]
    pub max_empty_passes: u32,
    // maximum time the browser will wait for an event before timing out
    #[builder(default = "Duration::from_secs(45)")]
    pub browser_timeout: Duration,
    #[builder(default = "PathBuf::from(\"image_download.log\")")]
    pub log_file: PathBuf,
}

impl DatasetConfig {
    pub fn default_builder() -> DatasetConfigBuilder {
        DatasetConfigBuilder::default()
    }

    pub fn class_dir(&self, class_name: &str) -> PathBuf {
        self.base_dir.join(class_name)
    }

    pub fn split_dir(&self) -> PathBuf {
        self.base_dir.join(&self.split_dir_name)
    }

    pub fn image_file_name(&self, sequence: usize) -> String {
        format!(
            "{:0width$}.{}",
            sequence,
            self.image_extension,
            width = self.file_name_width
        )
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            base_dir: PathBuf::from("dataset"),
            split_dir_name: "csv_date_by_data".into(),
            dates_file_name: "X.csv".into(),
            fields_file_name: "Y.csv".into(),
            ledger_fields: LEDGER_FIELDS.iter().map(|f| f.to_string()).collect(),
            date_column: "date".into(),
            search_url: SEARCH_URL.into(),
            photo_type: "photo".into(),
            image_markers: vec!["jpg".into(), "thumbs".into()],
            full_size_query_param: "img_url".into(),
            file_name_width: 4,
            image_extension: "jpg".into(),
            fetch_attempts: 2,
            request_timeout: Duration::from_secs(30),
            render_timeout: Duration::from_secs(10),
            scroll_pause: Duration::from_secs(5),
            max_empty_passes: 5,
            browser_timeout: Duration::from_secs(45),
            log_file: PathBuf::from("image_download.log"),
        }
    }
}

impl DatasetConfigBuilder {
    fn default_base_dir(&self) -> PathBuf {
        PathBuf::from("dataset")
    }
    fn default_ledger_fields(&self) -> Vec<String> {
        LEDGER_FIELDS.iter().map(|f| f.to_string()).collect()
    }
    fn default_image_markers(&self) -> Vec<String> {
        vec!["jpg".into(), "thumbs".into()]
    }
}
