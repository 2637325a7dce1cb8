use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::patterns::Pattern;
use super::spec_fields::parse_specification;
use crate::error::ExtractionError;
use crate::record::BikeRecord;

pub const TITLE: &str = "h1";
pub const PRICE: &str = "#final_price";
pub const YEAR: &str = "div.col-md-5.col-12 > b";
pub const SPECIFICATIONS: &str = "section.specifications";

static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(TITLE).unwrap());
static PRICE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(PRICE).unwrap());
static YEAR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(YEAR).unwrap());
static SPECS_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(SPECIFICATIONS).unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".list-group-item").unwrap());
static LABEL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".font-weight-bold").unwrap());
static VALUE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".text-muted").unwrap());

/// How a detail page with missing landmarks is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Any missing landmark drops the whole page.
    #[default]
    Strict,
    /// Keep whatever fields were found.
    Lenient,
}

/// Extract one record from a rendered detail page.
pub fn parse_detail_page(
    html: &str,
    url: &str,
    strictness: Strictness,
) -> Result<BikeRecord, ExtractionError> {
    let document = Html::parse_document(html);
    let mut record = BikeRecord::new(url);
    record.brand = brand_from_url(url);

    record.title = landmark_text(&document, &TITLE_SEL, TITLE, url, strictness)?;
    record.price = landmark_text(&document, &PRICE_SEL, PRICE, url, strictness)?;
    record.year = landmark_text(&document, &YEAR_SEL, YEAR, url, strictness)?;

    let Some(specs) = document.select(&SPECS_SEL).next() else {
        return match strictness {
            Strictness::Strict => Err(ExtractionError::landmark(SPECIFICATIONS, url)),
            Strictness::Lenient => {
                warn!(url, "no specification section, keeping partial record");
                Ok(record)
            }
        };
    };

    for (idx, row) in specs.select(&ROW_SEL).enumerate() {
        match read_row(row) {
            Some((label, value)) => apply_row(&mut record, &label, &value),
            None => warn!(url, row = idx, "specification row without label or value, skipped"),
        }
    }

    Ok(record)
}

/// Route one specification row into the record. Unknown labels are ignored.
pub fn apply_row(record: &mut BikeRecord, label: &str, value: &str) {
    let label = label.to_lowercase();

    if label.contains("frame") {
        let material = if value.to_lowercase().contains("carbon") {
            "carbon"
        } else {
            "aluminium"
        };
        record.frame_material = Some(material.to_string());
    } else if label.contains("wheel size") {
        record.wheel_size = Some(value.to_string());
    } else if label.contains("drivetrain") {
        record.drivetrain_brand = value.split_whitespace().next().map(str::to_string);
    } else if label.contains("fork") || label.contains("shock") {
        record.merge(parse_specification(&label, value));
    } else {
        debug!(label = label.as_str(), "ignoring specification row");
    }
}

/// Brand slug from `/bikes/<year>/<brand>/...`, capitalized.
pub fn brand_from_url(url: &str) -> Option<String> {
    Pattern::BrandFromUrl.find(url).map(|slug| capitalize(&slug))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn landmark_text(
    document: &Html,
    selector: &Selector,
    landmark: &'static str,
    url: &str,
    strictness: Strictness,
) -> Result<Option<String>, ExtractionError> {
    match document.select(selector).next() {
        Some(el) => Ok(Some(element_text(el))),
        None if strictness == Strictness::Lenient => {
            warn!(url, landmark, "landmark missing");
            Ok(None)
        }
        None => Err(ExtractionError::landmark(landmark, url)),
    }
}

fn read_row(row: ElementRef) -> Option<(String, String)> {
    let label = row.select(&LABEL_SEL).next()?;
    let value = row.select(&VALUE_SEL).next()?;
    Some((element_text(label), element_text(value)))
}

/// Rendered text with whitespace runs collapsed to one space.
pub fn element_text(el: ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://mtbdatabase.com/bikes/2023/trek/fuel-ex-9.8";

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/detail_page.html").unwrap()
    }

    #[test]
    fn brand_from_url_is_capitalized() {
        assert_eq!(brand_from_url(URL).as_deref(), Some("Trek"));
        assert_eq!(
            brand_from_url("https://mtbdatabase.com/bikes/2022/SANTA-CRUZ/hightower/").as_deref(),
            Some("Santa-cruz")
        );
        assert_eq!(brand_from_url("https://mtbdatabase.com/bikes/"), None);
    }

    #[test]
    fn full_detail_page() {
        let r = parse_detail_page(&fixture(), URL, Strictness::Strict).unwrap();
        assert_eq!(r.url, URL);
        assert_eq!(r.title.as_deref(), Some("Trek Fuel EX 9.8 GX AXS"));
        assert_eq!(r.price.as_deref(), Some("€ 6,499"));
        assert_eq!(r.year.as_deref(), Some("2023"));
        assert_eq!(r.brand.as_deref(), Some("Trek"));
        assert_eq!(r.frame_material.as_deref(), Some("carbon"));
        assert_eq!(r.wheel_size.as_deref(), Some("29\""));
        assert_eq!(r.drivetrain_brand.as_deref(), Some("SRAM"));
        assert_eq!(r.fork_brand.as_deref(), Some("Fox"));
        assert_eq!(r.fork_model.as_deref(), Some("36 Factory"));
        assert_eq!(r.fork_travel.as_deref(), Some("150mm"));
        assert_eq!(r.fork_damper.as_deref(), Some("GRIP2"));
        assert_eq!(r.fork_offset.as_deref(), Some("44mm"));
        assert_eq!(r.shock_brand.as_deref(), Some("Fox"));
        assert_eq!(r.shock_model.as_deref(), Some("Float DPX2 Factory"));
        assert_eq!(r.shock_length.as_deref(), Some("210mm"));
        assert_eq!(r.shock_stroke.as_deref(), Some("55mm"));
    }

    #[test]
    fn broken_row_is_skipped() {
        // The seatpost row has no value; the drivetrain row after it still parses.
        let r = parse_detail_page(&fixture(), URL, Strictness::Strict).unwrap();
        assert_eq!(r.drivetrain_brand.as_deref(), Some("SRAM"));
    }

    #[test]
    fn missing_specs_strict_fails() {
        let html = r#"<html><body><h1>Bike</h1><span id="final_price">€ 999</span>
            <div class="col-md-5 col-12"><b>2021</b></div></body></html>"#;
        let err = parse_detail_page(html, URL, Strictness::Strict).unwrap_err();
        assert!(matches!(err, ExtractionError::LandmarkNotFound { landmark: SPECIFICATIONS, .. }));
    }

    #[test]
    fn missing_specs_lenient_keeps_partial_record() {
        let html = r#"<html><body><h1>Bike</h1><span id="final_price">€ 999</span></body></html>"#;
        let r = parse_detail_page(html, URL, Strictness::Lenient).unwrap();
        assert_eq!(r.title.as_deref(), Some("Bike"));
        assert_eq!(r.price.as_deref(), Some("€ 999"));
        assert_eq!(r.year, None);
        assert_eq!(r.brand.as_deref(), Some("Trek"));
        assert_eq!(r.fork_brand, None);
    }

    #[test]
    fn missing_title_strict_fails() {
        let err = parse_detail_page("<html><body></body></html>", URL, Strictness::Strict).unwrap_err();
        assert!(matches!(err, ExtractionError::LandmarkNotFound { landmark: TITLE, .. }));
    }

    #[test]
    fn apply_row_rules() {
        let mut r = BikeRecord::new(URL);
        apply_row(&mut r, "Frame", "Aluminium Alpha Platinum");
        apply_row(&mut r, "Wheel Size", "27.5\"");
        apply_row(&mut r, "Drivetrain", "Shimano Deore 1x12");
        apply_row(&mut r, "Saddle", "Bontrager Arvada");
        assert_eq!(r.frame_material.as_deref(), Some("aluminium"));
        assert_eq!(r.wheel_size.as_deref(), Some("27.5\""));
        assert_eq!(r.drivetrain_brand.as_deref(), Some("Shimano"));

        let mut untouched = BikeRecord::new(URL);
        apply_row(&mut untouched, "Saddle", "Fox 36, 160mm travel");
        assert_eq!(untouched, BikeRecord::new(URL));
    }

    #[test]
    fn frame_carbon_any_case() {
        let mut r = BikeRecord::new(URL);
        apply_row(&mut r, "frame", "OCLV Mountain Carbon");
        assert_eq!(r.frame_material.as_deref(), Some("carbon"));
    }

    #[test]
    fn url_is_kept_verbatim() {
        let url = "https://mtbdatabase.com/bikes/2023/trek/fuel-ex-9.8?ref=list#specs";
        let r = parse_detail_page(&fixture(), url, Strictness::Strict).unwrap();
        assert_eq!(r.url, url);
    }
}
