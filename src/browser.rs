use std::future::Future;
use std::time::Duration;

use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::{Config, USER_AGENT};
use crate::error::ExtractionError;
use crate::parser::page::SPECIFICATIONS;
use crate::parser::{parse_detail_page, Strictness};
use crate::record::BikeRecord;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

const CONSENT_BUTTON: &str =
    r#"button.fc-button.fc-cta-consent.fc-primary-button[aria-label="Consent"]"#;

/// Open a fresh Chrome session on the configured WebDriver endpoint.
pub async fn connect(config: &Config) -> Result<Client, ExtractionError> {
    let mut args = vec![
        "--window-size=1920,1080".to_string(),
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        format!("--user-agent={}", USER_AGENT),
    ];
    if config.headless {
        args.insert(0, "--headless".to_string());
    }

    let mut caps = serde_json::Map::new();
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

    let mut builder = ClientBuilder::native();
    builder.capabilities(caps);
    let client = builder.connect(&config.webdriver_url).await?;
    debug!(webdriver = %config.webdriver_url, "webdriver session opened");
    Ok(client)
}

/// End the session. A failed close only leaks a browser, so it is logged.
pub async fn close(client: Client) {
    if let Err(e) = client.close().await {
        debug!(error = %e, "webdriver session close failed");
    }
}

/// Click the cookie consent button if it shows up in time.
pub async fn accept_consent(client: &Client, timeout: Duration) -> bool {
    let Some(button) = wait_clickable(client, Locator::Css(CONSENT_BUTTON), timeout).await else {
        debug!("no consent overlay");
        return false;
    };
    match button.click().await {
        Ok(()) => {
            info!("consent accepted");
            true
        }
        Err(e) => {
            debug!(error = %e, "consent overlay could not be dismissed");
            false
        }
    }
}

/// Wait until an element matching `css` is present.
pub async fn wait_present(client: &Client, css: &str, timeout: Duration) -> Result<Element, CmdError> {
    client.wait().at_most(timeout).for_element(Locator::Css(css)).await
}

/// Wait until the element is present, visible and enabled. Keeps polling
/// while it is present but hidden or disabled.
pub async fn wait_clickable(
    client: &Client,
    locator: Locator<'_>,
    timeout: Duration,
) -> Option<Element> {
    poll_until(timeout, POLL_INTERVAL, move || async move {
        let element = client.find(locator).await.ok()?;
        let displayed = element.is_displayed().await.unwrap_or(false);
        let enabled = element.is_enabled().await.unwrap_or(false);
        (displayed && enabled).then_some(element)
    })
    .await
}

/// Call `check` every `interval` until it yields a value. `None` once `timeout` passes.
pub async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let poll = async {
        loop {
            if let Some(value) = check().await {
                return value;
            }
            tokio::time::sleep(interval).await;
        }
    };
    tokio::time::timeout(timeout, poll).await.ok()
}

/// Scrape one detail page in its own browser session.
pub async fn fetch_detail(config: &Config, url: &str) -> Result<BikeRecord, ExtractionError> {
    let client = connect(config).await?;
    let result = extract_detail(&client, config, url).await;
    close(client).await;
    result
}

async fn extract_detail(
    client: &Client,
    config: &Config,
    url: &str,
) -> Result<BikeRecord, ExtractionError> {
    client.goto(url).await?;
    accept_consent(client, config.timeouts.consent).await;

    if let Err(e) = wait_present(client, SPECIFICATIONS, config.timeouts.landmark).await {
        match config.strictness {
            Strictness::Strict => {
                debug!(url, error = %e, "specification section never appeared");
                return Err(ExtractionError::landmark(SPECIFICATIONS, url));
            }
            Strictness::Lenient => warn!(url, "specification section never appeared"),
        }
    }

    let html = client.source().await?;
    parse_detail_page(&html, url, config.strictness)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn polling_continues_until_ready() {
        let mut calls = 0;
        let found = poll_until(Duration::from_secs(2), Duration::from_millis(5), || {
            calls += 1;
            let n = calls;
            async move { (n >= 4).then_some(n) }
        })
        .await;
        assert_eq!(found, Some(4));
    }

    #[tokio::test]
    async fn polling_gives_up_at_timeout() {
        let mut calls = 0;
        let found: Option<()> = poll_until(Duration::from_millis(40), Duration::from_millis(5), || {
            calls += 1;
            async { None }
        })
        .await;
        assert_eq!(found, None);
        assert!(calls > 1);
    }
}
