use std::path::PathBuf;
use std::time::Duration;

use crate::parser::Strictness;

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_SEED_URL: &str = "https://mtbdatabase.com/bikes/";
pub const DEFAULT_SITE_URL: &str = "https://mtbdatabase.com";
pub const DEFAULT_URLS_FILE: &str = "ebike_urls.csv";
pub const DEFAULT_RECORDS_FILE: &str = "scraped.csv";
pub const DEFAULT_WORKERS: usize = 5;
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/90.0.4430.212 Safari/537.36";

/// Upper bounds for every blocking browser wait.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Consent overlay to become clickable.
    pub consent: Duration,
    /// Specification section on a detail page.
    pub landmark: Duration,
    /// Result links on a listing or riding-style index.
    pub results: Duration,
    /// Result links on one page of a riding style; a timeout ends that style.
    pub category_page: Duration,
    /// "Next page" control to become clickable.
    pub next_page: Duration,
    /// Fixed pause after clicking "next".
    pub settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            consent: Duration::from_secs(5),
            landmark: Duration::from_secs(10),
            results: Duration::from_secs(20),
            category_page: Duration::from_secs(10),
            next_page: Duration::from_secs(10),
            settle: Duration::from_secs(2),
        }
    }
}

/// Settings for one run. Built once in `main` and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    pub output: PathBuf,
    pub webdriver_url: String,
    pub headless: bool,
    pub workers: usize,
    pub strictness: Strictness,
    pub max_pages: Option<usize>,
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_URLS_FILE),
            output: PathBuf::from(DEFAULT_RECORDS_FILE),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            workers: DEFAULT_WORKERS,
            strictness: Strictness::Strict,
            max_pages: None,
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// Base config: WebDriver endpoint from the flag, then `WEBDRIVER_URL`,
    /// then the chromedriver default.
    pub fn load(webdriver: Option<String>, headless: bool) -> Self {
        let webdriver_url = webdriver
            .or_else(|| std::env::var("WEBDRIVER_URL").ok())
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string());
        Self {
            webdriver_url,
            headless,
            ..Default::default()
        }
    }
}
