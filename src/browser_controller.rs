use anyhow::{anyhow, Context, Result};
use headless_chrome::Tab;
use headless_chrome::{browser::default_executable, Browser, LaunchOptions};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};

use crate::harvester::ResultsPage;

const SCROLL_JS: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// One headless Chrome process. The process is killed when the controller is
/// dropped.
pub struct BrowserController {
    browser: Browser,
}

impl BrowserController {
    pub fn new(timeout: Duration) -> Result<Self> {
        let is_docker = std::env::var("IN_DOCKER").is_ok();
        let path = default_executable().map_err(|e| anyhow!("no chrome binary found: {}", e))?;
        let options = LaunchOptions::default_builder()
            .path(Some(path))
            .headless(true)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(timeout)
            // warning only do this if in docker env
            .sandbox(!is_docker)
            .build()
            .map_err(|e| anyhow!("could not build launch options: {}", e))?;
        let browser = Browser::new(options).context("browser launching error")?;

        Ok(BrowserController { browser })
    }

    pub fn browse(&self, url: &str) -> Result<BrowserPage> {
        let tab = self.browser.new_tab().context("could not create new tab")?;

        let nv = match tab.navigate_to(url) {
            Ok(t) => t,
            Err(e) => {
                error!("could not navigate to {} with error {}", url, e);
                tab.navigate_to(url)?
            }
        };
        if let Err(e) = nv.wait_until_navigated() {
            // we wait one more timeout
            warn!("error waiting for navigation, retrying {}", e);
            nv.wait_until_navigated()?;
        }

        Ok(BrowserPage { tab })
    }

    pub fn kill(&self) -> bool {
        let pid = match self.browser.get_process_id() {
            Some(pid) => pid,
            None => return false,
        };
        let mut s = System::new();
        s.refresh_processes();
        if let Some(process) = s.process(Pid::from_u32(pid)) {
            debug!("killing process with id {}", pid);
            return process.kill();
        }
        false
    }
}

impl Drop for BrowserController {
    fn drop(&mut self) {
        debug!("killing browser process...");
        self.kill();
    }
}

pub struct BrowserPage {
    tab: Arc<Tab>,
}

impl ResultsPage for BrowserPage {
    fn url(&self) -> String {
        self.tab.get_url()
    }

    fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
    }

    fn attribute_values(&self, selector: &str, attribute: &str) -> Result<Vec<Option<String>>> {
        let elems = match self.tab.find_elements(selector) {
            Ok(elems) => elems,
            Err(e) => {
                warn!("no {} found on {}: {}", selector, self.tab.get_url(), e);
                return Ok(vec![]);
            }
        };

        let mut values = Vec::with_capacity(elems.len());
        for elem in elems.iter() {
            let attrs = match elem.get_attributes() {
                Ok(attrs) => attrs.unwrap_or_default(),
                Err(e) => {
                    // the node may have been detached by a scroll
                    warn!("could not get attributes for {}: {}", selector, e);
                    values.push(None);
                    continue;
                }
            };
            // attributes come flattened as [name, value, name, value, ...]
            let value = attrs
                .chunks(2)
                .find(|pair| pair[0] == attribute)
                .and_then(|pair| pair.get(1).cloned());
            values.push(value);
        }
        Ok(values)
    }

    fn scroll_to_bottom(&self) -> Result<()> {
        debug!("scrolling....");
        self.tab.evaluate(SCROLL_JS, false)?;
        Ok(())
    }
}
