use std::collections::BTreeSet;
use std::future::Future;

use anyhow::{Context, Result};
use clap::ValueEnum;
use fantoccini::{Client, Locator};
use tracing::{info, warn};

use crate::browser;
use crate::config::Config;
use crate::parser::links::{
    collect_links, is_https, RESULT_LINKS, RESULT_LINKS_SEL, RIDING_STYLE_LINKS,
    RIDING_STYLE_LINKS_SEL,
};

/// Detail-page URLs discovered so far.
pub type UrlSet = BTreeSet<String>;

const PAGE_PARAM: &str = "prod_mtbdb%5Bpage%5D";
const NEXT_CSS: &str = "a.btn-pagination[data-value]";
const NEXT_XPATH: &str = "/html/body/div[1]/section[3]/div/div/div[3]/div[3]/div/a[8]";

/// How the "next page" control of the listing is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NextControl {
    /// Pagination button by CSS class
    Css,
    /// Fixed position in the page layout
    Xpath,
}

impl NextControl {
    fn locator(self) -> Locator<'static> {
        match self {
            NextControl::Css => Locator::Css(NEXT_CSS),
            NextControl::Xpath => Locator::XPath(NEXT_XPATH),
        }
    }
}

/// What to do after a listing page has been collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    /// The page added nothing new.
    Stall,
    PageLimit,
}

fn next_step(added: usize, page: usize, max_pages: Option<usize>) -> Step {
    if added == 0 {
        Step::Stall
    } else if max_pages.is_some_and(|max| page >= max) {
        Step::PageLimit
    } else {
        Step::Continue
    }
}

/// A listing that is read one page at a time.
trait ListingPages {
    /// Source of the current page, or `None` when its results never loaded.
    async fn current(&mut self) -> Result<Option<String>>;
    /// Move to the following page. `false` when there is none.
    async fn advance(&mut self) -> bool;
}

/// Collect result links page by page until the listing runs out.
async fn walk<P: ListingPages>(pages: &mut P, max_pages: Option<usize>) -> Result<UrlSet> {
    let mut urls = UrlSet::new();
    let mut page = 1usize;

    loop {
        let Some(html) = pages.current().await? else {
            info!(page, "results never loaded, stopping");
            break;
        };

        let added = absorb(&mut urls, collect_links(&html, &RESULT_LINKS_SEL));
        info!(page, added, total = urls.len(), "collected listing page");

        match next_step(added, page, max_pages) {
            Step::Continue => {}
            Step::Stall => {
                info!(page, "page added no new links, pagination finished");
                break;
            }
            Step::PageLimit => {
                info!(page, "page limit reached");
                break;
            }
        }

        if !pages.advance().await {
            info!(page, "no next page, pagination finished");
            break;
        }
        page += 1;
    }

    Ok(urls)
}

/// Whole listing in one tab, advanced by clicking the "next" control.
struct ClickThrough<'a> {
    client: &'a Client,
    config: &'a Config,
    next: NextControl,
    /// First result href of the last page read.
    first_result: Option<String>,
}

impl ClickThrough<'_> {
    async fn first_result_href(&self) -> Option<String> {
        let link = self.client.find(Locator::Css(RESULT_LINKS)).await.ok()?;
        link.attr("href").await.ok().flatten()
    }
}

impl ListingPages for ClickThrough<'_> {
    async fn current(&mut self) -> Result<Option<String>> {
        if let Err(e) =
            browser::wait_present(self.client, RESULT_LINKS, self.config.timeouts.results).await
        {
            warn!("results never loaded: {}", e);
            return Ok(None);
        }
        self.first_result = self.first_result_href().await;
        let html = self.client.source().await.context("Failed to read page source")?;
        Ok(Some(html))
    }

    async fn advance(&mut self) -> bool {
        let timeouts = &self.config.timeouts;
        let Some(button) =
            browser::wait_clickable(self.client, self.next.locator(), timeouts.next_page).await
        else {
            return false;
        };
        if let Err(e) = button.click().await {
            info!("next page control not clickable: {}", e);
            return false;
        }
        tokio::time::sleep(timeouts.settle).await;

        // A slow re-render still shows the old results; wait for them to change.
        let this = &*self;
        let previous = this.first_result.clone();
        let changed = browser::poll_until(timeouts.next_page, timeouts.settle, move || {
            let previous = previous.clone();
            async move {
                let first = this.first_result_href().await;
                (first.is_some() && first != previous).then_some(())
            }
        })
        .await;
        if changed.is_none() {
            warn!("listing did not change after clicking next");
        }
        true
    }
}

/// One riding style, paged by the page-number query parameter.
struct QueryPages<'a> {
    client: &'a Client,
    config: &'a Config,
    style_url: &'a str,
    page: usize,
}

impl ListingPages for QueryPages<'_> {
    async fn current(&mut self) -> Result<Option<String>> {
        let url = page_url(self.style_url, self.page);
        info!(page = self.page, "Loading {}", url);
        self.client
            .goto(&url)
            .await
            .with_context(|| format!("Failed to load {}", url))?;

        if browser::wait_present(self.client, RESULT_LINKS, self.config.timeouts.category_page)
            .await
            .is_err()
        {
            return Ok(None);
        }
        let html = self.client.source().await.context("Failed to read page source")?;
        Ok(Some(html))
    }

    async fn advance(&mut self) -> bool {
        self.page += 1;
        true
    }
}

/// Walk the whole listing by clicking "next" until it disappears.
pub async fn harvest(config: &Config, seed_url: &str, next: NextControl) -> Result<UrlSet> {
    let client = browser::connect(config).await?;
    let result = async {
        info!("Loading listing: {}", seed_url);
        client
            .goto(seed_url)
            .await
            .with_context(|| format!("Failed to load {}", seed_url))?;
        browser::accept_consent(&client, config.timeouts.consent).await;

        let mut pages = ClickThrough {
            client: &client,
            config,
            next,
            first_result: None,
        };
        walk(&mut pages, config.max_pages).await
    }
    .await;
    browser::close(client).await;
    result
}

/// Harvest every riding style, one page-number query at a time.
/// A failing style is logged and skipped.
pub async fn harvest_by_category(config: &Config, seed_url: &str) -> Result<UrlSet> {
    let styles = riding_styles(config, seed_url).await?;
    info!("Found {} riding styles", styles.len());
    Ok(collect_styles(&styles, |style| async move { harvest_style(config, &style).await }).await)
}

async fn collect_styles<F, Fut>(styles: &[String], mut harvest_style: F) -> UrlSet
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<UrlSet>>,
{
    let mut urls = UrlSet::new();
    for style in styles {
        info!("Harvesting riding style: {}", style);
        match harvest_style(style.clone()).await {
            Ok(found) => {
                let count = found.len();
                let added = absorb(&mut urls, found);
                info!(found = count, added, total = urls.len(), "riding style done");
            }
            Err(e) => warn!("Riding style {} failed, moving on: {:#}", style, e),
        }
    }
    urls
}

async fn riding_styles(config: &Config, seed_url: &str) -> Result<Vec<String>> {
    let client = browser::connect(config).await?;
    let result = async {
        client
            .goto(seed_url)
            .await
            .with_context(|| format!("Failed to load {}", seed_url))?;
        browser::accept_consent(&client, config.timeouts.consent).await;
        browser::wait_present(&client, RIDING_STYLE_LINKS, config.timeouts.results)
            .await
            .context("Riding style list never loaded")?;
        let html = client.source().await.context("Failed to read page source")?;
        Ok(collect_links(&html, &RIDING_STYLE_LINKS_SEL))
    }
    .await;
    browser::close(client).await;
    result
}

async fn harvest_style(config: &Config, style_url: &str) -> Result<UrlSet> {
    let client = browser::connect(config).await?;
    let mut pages = QueryPages {
        client: &client,
        config,
        style_url,
        page: 1,
    };
    let result = walk(&mut pages, config.max_pages).await;
    browser::close(client).await;
    result
}

/// Riding-style URL with the page-number query parameter appended.
pub fn page_url(style_url: &str, page: usize) -> String {
    let sep = if style_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", style_url, sep, PAGE_PARAM, page)
}

/// Insert links into the set; returns how many were new.
fn absorb(urls: &mut UrlSet, links: impl IntoIterator<Item = String>) -> usize {
    links.into_iter().filter(|link| urls.insert(link.clone())).count()
}

/// Plain HTTP fetch of one listing page, without a browser. Only sees links
/// present in the server-rendered HTML.
pub async fn fetch_listing_links(url: &str) -> Result<Vec<String>> {
    let client = reqwest::Client::builder()
        .user_agent(crate::config::USER_AGENT)
        .build()?;

    info!("Fetching listing: {}", url);
    let html = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?
        .error_for_status()?
        .text()
        .await
        .context("Failed to fetch listing page")?;

    let links = https_result_links(&html);
    info!("Links in results container: {}", links.len());
    Ok(links)
}

fn https_result_links(html: &str) -> Vec<String> {
    collect_links(html, &RESULT_LINKS_SEL)
        .into_iter()
        .filter(|l| is_https(l))
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(hrefs: &[&str]) -> String {
        let anchors: String = hrefs
            .iter()
            .map(|h| format!(r#"<a href="{}">bike</a>"#, h))
            .collect();
        format!(r#"<html><body><div id="bike_results_container">{}</div></body></html>"#, anchors)
    }

    /// Canned pages; past the last one the listing keeps repeating it.
    struct FakePages {
        pages: Vec<Option<String>>,
        at: usize,
        next_forever: bool,
        loads: usize,
    }

    impl FakePages {
        fn new(pages: Vec<Option<String>>, next_forever: bool) -> Self {
            Self {
                pages,
                at: 0,
                next_forever,
                loads: 0,
            }
        }
    }

    impl ListingPages for FakePages {
        async fn current(&mut self) -> Result<Option<String>> {
            self.loads += 1;
            let idx = self.at.min(self.pages.len() - 1);
            Ok(self.pages[idx].clone())
        }

        async fn advance(&mut self) -> bool {
            if self.next_forever || self.at + 1 < self.pages.len() {
                self.at += 1;
                true
            } else {
                false
            }
        }
    }

    #[test]
    fn step_decision() {
        assert_eq!(next_step(0, 1, None), Step::Stall);
        assert_eq!(next_step(0, 5, Some(5)), Step::Stall);
        assert_eq!(next_step(3, 5, Some(5)), Step::PageLimit);
        assert_eq!(next_step(3, 4, Some(5)), Step::Continue);
        assert_eq!(next_step(3, 400, None), Step::Continue);
    }

    #[tokio::test]
    async fn stops_when_next_is_missing() {
        let mut pages = FakePages::new(
            vec![
                Some(listing(&["https://x.example/bikes/1", "https://x.example/bikes/2"])),
                Some(listing(&["https://x.example/bikes/3"])),
            ],
            false,
        );
        let urls = walk(&mut pages, None).await.unwrap();
        assert_eq!(urls.len(), 3);
        assert_eq!(pages.loads, 2);
    }

    #[tokio::test]
    async fn next_clickable_forever_stops_on_stall() {
        let mut pages = FakePages::new(
            vec![
                Some(listing(&["https://x.example/bikes/1"])),
                Some(listing(&["https://x.example/bikes/2"])),
            ],
            true,
        );
        let urls = walk(&mut pages, None).await.unwrap();
        assert_eq!(urls.len(), 2);
        // the repeated last page is read once more, then the stall ends the walk
        assert_eq!(pages.loads, 3);
    }

    #[tokio::test]
    async fn results_timeout_stops() {
        let mut pages = FakePages::new(
            vec![Some(listing(&["https://x.example/bikes/1"])), None],
            true,
        );
        let urls = walk(&mut pages, None).await.unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(pages.loads, 2);
    }

    #[tokio::test]
    async fn page_limit_stops() {
        let pages_html = (1..=10)
            .map(|i| Some(listing(&[format!("https://x.example/bikes/{}", i).as_str()])))
            .collect();
        let mut pages = FakePages::new(pages_html, true);
        let urls = walk(&mut pages, Some(3)).await.unwrap();
        assert_eq!(urls.len(), 3);
        assert_eq!(pages.loads, 3);
    }

    #[tokio::test]
    async fn failing_style_is_skipped() {
        let styles = vec![
            "https://x.example/bikes/?style=trail".to_string(),
            "https://x.example/bikes/?style=enduro".to_string(),
            "https://x.example/bikes/?style=xc".to_string(),
        ];
        let urls = collect_styles(&styles, |style| async move {
            if style.ends_with("enduro") {
                anyhow::bail!("webdriver session failed");
            }
            Ok(UrlSet::from([
                format!("{}#a", style),
                "https://x.example/bikes/shared".to_string(),
            ]))
        })
        .await;
        assert_eq!(urls.len(), 3);
        assert!(urls.iter().all(|u| !u.contains("enduro")));
        assert!(urls.contains("https://x.example/bikes/?style=xc#a"));
    }

    #[test]
    fn plain_http_helper_keeps_https_only() {
        let html = listing(&[
            "https://x.example/bikes/1",
            "http://x.example/bikes/2",
            "/bikes/3",
        ]);
        assert_eq!(https_result_links(&html), vec!["https://x.example/bikes/1"]);
    }

    #[test]
    fn page_url_appends_to_existing_query() {
        let style = "https://mtbdatabase.com/bikes/?prod_mtbdb%5BrefinementList%5D%5Briding_style%5D%5B0%5D=Trail";
        assert_eq!(page_url(style, 3), format!("{}&prod_mtbdb%5Bpage%5D=3", style));
    }

    #[test]
    fn page_url_starts_query_when_missing() {
        assert_eq!(
            page_url("https://mtbdatabase.com/bikes/", 1),
            "https://mtbdatabase.com/bikes/?prod_mtbdb%5Bpage%5D=1"
        );
    }

    #[test]
    fn absorb_counts_only_new() {
        let mut urls = UrlSet::new();
        assert_eq!(absorb(&mut urls, vec!["a".to_string(), "b".to_string()]), 2);
        assert_eq!(absorb(&mut urls, vec!["b".to_string(), "c".to_string(), "c".to_string()]), 1);
        assert_eq!(absorb(&mut urls, Vec::<String>::new()), 0);
        assert_eq!(urls.len(), 3);
    }

    #[test]
    fn next_control_locators() {
        assert!(matches!(NextControl::Css.locator(), Locator::Css(NEXT_CSS)));
        assert!(matches!(NextControl::Xpath.locator(), Locator::XPath(NEXT_XPATH)));
    }
}
