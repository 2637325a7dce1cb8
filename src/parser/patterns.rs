use std::sync::LazyLock;

use regex::Regex;

static TRAVEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+mm)\s+travel").unwrap());
static OFFSET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+mm)\s+offset").unwrap());
static DAMPER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(GRIP\d?|Fit\d+|Charger\d+)").unwrap());
static MILLIMETRES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+mm)").unwrap());
static LENGTH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+mm)\s+length").unwrap());
static STROKE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+mm)\s+stroke").unwrap());
static BRAND_FROM_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/bikes/\d{4}/([^/]+)/").unwrap());
static YEAR_IN_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})").unwrap());
static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)").unwrap());

/// Named text patterns for every free-text field the scraper normalizes.
///
/// Each pattern has exactly one capture group, which is the extracted value.
/// Site-format drift should only ever need a change here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// `160mm travel`
    Travel,
    /// `44mm offset`
    Offset,
    /// Fork damper cartridges: `GRIP`, `GRIP2`, `Fit4`, `Charger3`
    Damper,
    /// Any `<digits>mm`
    Millimetres,
    /// `210mm length`
    Length,
    /// `55mm stroke`
    Stroke,
    /// Brand slug in a detail URL: `/bikes/2023/<brand>/...`
    BrandFromUrl,
    /// First 4-digit run of a listing title
    YearInTitle,
    /// First decimal number, e.g. the `27.5` in `27.5" wheels`
    Decimal,
}

impl Pattern {
    #[cfg(test)]
    pub const ALL: [Pattern; 9] = [
        Pattern::Travel,
        Pattern::Offset,
        Pattern::Damper,
        Pattern::Millimetres,
        Pattern::Length,
        Pattern::Stroke,
        Pattern::BrandFromUrl,
        Pattern::YearInTitle,
        Pattern::Decimal,
    ];

    #[cfg(test)]
    pub fn name(self) -> &'static str {
        match self {
            Pattern::Travel => "travel",
            Pattern::Offset => "offset",
            Pattern::Damper => "damper",
            Pattern::Millimetres => "millimetres",
            Pattern::Length => "length",
            Pattern::Stroke => "stroke",
            Pattern::BrandFromUrl => "brand_from_url",
            Pattern::YearInTitle => "year_in_title",
            Pattern::Decimal => "decimal",
        }
    }

    pub fn regex(self) -> &'static Regex {
        match self {
            Pattern::Travel => &TRAVEL_RE,
            Pattern::Offset => &OFFSET_RE,
            Pattern::Damper => &DAMPER_RE,
            Pattern::Millimetres => &MILLIMETRES_RE,
            Pattern::Length => &LENGTH_RE,
            Pattern::Stroke => &STROKE_RE,
            Pattern::BrandFromUrl => &BRAND_FROM_URL_RE,
            Pattern::YearInTitle => &YEAR_IN_TITLE_RE,
            Pattern::Decimal => &DECIMAL_RE,
        }
    }

    /// First match in `text`, as written there.
    pub fn find(self, text: &str) -> Option<String> {
        self.regex()
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

// ── Tests ──
