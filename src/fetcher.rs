use std::{fs, path::Path, time::Duration};

use anyhow::Context;

use crate::{
    config::DatasetConfig,
    types::FetchError,
    utils::{contains_marker, trailing_segment},
};

/// Source of image bytes.
pub trait ImageClient {
    fn get_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

pub struct HttpImageClient {
    client: reqwest::blocking::Client,
}

impl HttpImageClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("could not build http client")?;
        Ok(HttpImageClient { client })
    }
}

impl ImageClient for HttpImageClient {
    fn get_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let res = self
            .client
            .get(url)
            .send()
            .context(format!("could not fetch {}", url))?
            .error_for_status()?;
        Ok(res.bytes()?.to_vec())
    }
}

pub struct ImageFetcher<C: ImageClient> {
    client: C,
    markers: Vec<String>,
    attempts: u8,
}

impl<C: ImageClient> ImageFetcher<C> {
    pub fn new(client: C, config: &DatasetConfig) -> Self {
        ImageFetcher {
            client,
            markers: config.image_markers.clone(),
            attempts: config.fetch_attempts,
        }
    }

    /// Whether the text after the last `.` of `url` carries an image marker.
    pub fn accepts(&self, url: &str) -> bool {
        contains_marker(trailing_segment(url), &self.markers)
    }

    /// Saves the image at `url` to `dest`, returning the number of bytes written.
    pub fn fetch(&self, url: &str, dest: &Path) -> Result<usize, FetchError> {
        if !self.accepts(url) {
            return Err(FetchError::Rejected(url.into()));
        }

        for attempt in 1..=self.attempts {
            let res = self
                .client
                .get_bytes(url)
                .and_then(|bytes| {
                    fs::write(dest, &bytes).context(format!("could not write {:?}", dest))?;
                    Ok(bytes.len())
                });
            match res {
                Ok(len) => {
                    debug!("saved {} bytes from {} to {:?}", len, url, dest);
                    return Ok(len);
                }
                Err(e) => {
                    warn!("attempt {} to download {} failed: {:#}", attempt, url, e);
                }
            }
        }

        error!("could not download image {}", url);
        Err(FetchError::Exhausted {
            url: url.into(),
            attempts: self.attempts,
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::anyhow;
    use std::cell::RefCell;

    struct ScriptedClient {
        // one entry per call, `None` fails
        responses: RefCell<Vec<Option<Vec<u8>>>>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Option<Vec<u8>>>) -> Self {
            ScriptedClient {
                responses: RefCell::new(responses),
                calls: RefCell::new(vec![]),
            }
        }
    }

    impl ImageClient for ScriptedClient {
        fn get_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>> {
            self.calls.borrow_mut().push(url.into());
            let mut responses = self.responses.borrow_mut();
            if responses.is_empty() {
                return Err(anyhow!("connection refused"));
            }
            responses.remove(0).ok_or_else(|| anyhow!("connection reset"))
        }
    }

    #[test]
    fn urls_without_marker_never_reach_the_client() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = ImageFetcher::new(ScriptedClient::new(vec![]), &DatasetConfig::default());

        for url in ["http://x/a.png", "http://x/jpg/a.gif", "http://x/thumbs/a.webp"] {
            let res = fetcher.fetch(url, &tmp.path().join("0000.jpg"));
            assert!(matches!(res, Err(FetchError::Rejected(_))), "{}", url);
        }
        assert!(fetcher.client().calls.borrow().is_empty());
    }

    #[test]
    fn always_failing_fetch_is_attempted_twice() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("0000.jpg");
        let fetcher = ImageFetcher::new(ScriptedClient::new(vec![]), &DatasetConfig::default());

        let res = fetcher.fetch("http://x/a.jpg", &dest);

        assert!(matches!(res, Err(FetchError::Exhausted { attempts: 2, .. })));
        assert_eq!(fetcher.client().calls.borrow().len(), 2);
        assert!(!dest.exists());
    }

    #[test]
    fn second_attempt_can_succeed() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("0000.jpg");
        let client = ScriptedClient::new(vec![None, Some(b"jpeg".to_vec())]);
        let fetcher = ImageFetcher::new(client, &DatasetConfig::default());

        assert_eq!(fetcher.fetch("http://x/a.jpg?w=100", &dest).unwrap(), 4);
        assert_eq!(fs::read(&dest).unwrap(), b"jpeg");
        assert_eq!(fetcher.client().calls.borrow().len(), 2);
    }

    #[test]
    fn success_returns_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("0000.jpg");
        let client = ScriptedClient::new(vec![Some(vec![1, 2, 3])]);
        let fetcher = ImageFetcher::new(client, &DatasetConfig::default());

        fetcher.fetch("https://im0-tub-ru.yandex.net/i.thumbs?id=1", &dest).unwrap();
        assert_eq!(fetcher.client().calls.borrow().len(), 1);
    }
}
