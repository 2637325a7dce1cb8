use std::collections::BTreeMap;

use super::patterns::Pattern;

/// Parsed fields of one specification row. A key that is present with `None`
/// means the row was recognized but the value did not match.
pub type FieldSet = BTreeMap<&'static str, Option<String>>;

/// Map a specification row to normalized suspension fields.
///
/// Labels are matched case-insensitively; values are kept as written.
/// Rows that are neither fork nor shock produce an empty set.
pub fn parse_specification(label: &str, value: &str) -> FieldSet {
    let label = label.to_lowercase();
    let mut fields = FieldSet::new();

    if label.contains("fork") {
        let (brand, model) = brand_and_model(value);
        fields.insert("fork_brand", brand);
        fields.insert("fork_model", model);
        fields.insert("fork_travel", Pattern::Travel.find(value));
        fields.insert("fork_damper", Pattern::Damper.find(value));
        fields.insert("fork_offset", Pattern::Offset.find(value));
    } else if label.contains("shock") {
        let (brand, model) = brand_and_model(value);
        fields.insert("shock_brand", brand);
        fields.insert("shock_model", model);

        // "230mm x 65mm": length before the first x, stroke after it.
        let (length, stroke) = match value.split_once('x') {
            Some((head, tail)) => (Pattern::Millimetres.find(head), Pattern::Millimetres.find(tail)),
            None => (Pattern::Length.find(value), Pattern::Stroke.find(value)),
        };
        fields.insert("shock_length", length);
        fields.insert("shock_stroke", stroke);
    }

    fields
}

/// Brand is the first token; model is the rest of the text before the first
/// comma, and only exists when there is a comma.
fn brand_and_model(value: &str) -> (Option<String>, Option<String>) {
    let value = value.trim();
    let brand = value.split_whitespace().next().map(str::to_string);
    let model = value.split_once(',').and_then(|(head, _)| {
        let rest = head
            .trim()
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim())
            .unwrap_or("");
        (!rest.is_empty()).then(|| rest.to_string())
    });
    (brand, model)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn get<'a>(fields: &'a FieldSet, key: &str) -> Option<&'a str> {
        fields.get(key).and_then(|v| v.as_deref())
    }

    #[test]
    fn unrelated_labels_yield_nothing() {
        for (label, value) in [
            ("Frame", "Carbon, 29\" wheels"),
            ("Wheel size", "29\""),
            ("Brakes", "Shimano XT, 203mm rotors"),
            ("", "Fox 36, 160mm travel"),
        ] {
            assert!(parse_specification(label, value).is_empty(), "{label}");
        }
    }

    #[test]
    fn fork_full_row() {
        let f = parse_specification("Fork", "Fox 36 Factory, 160mm travel, Grip2, 44mm offset");
        assert_eq!(f.len(), 5);
        assert_eq!(get(&f, "fork_brand"), Some("Fox"));
        assert_eq!(get(&f, "fork_model"), Some("36 Factory"));
        assert_eq!(get(&f, "fork_travel"), Some("160mm"));
        assert_eq!(get(&f, "fork_damper"), Some("Grip2"));
        assert_eq!(get(&f, "fork_offset"), Some("44mm"));
    }

    #[test]
    fn fork_label_case_insensitive() {
        let upper = parse_specification("FORK", "RockShox Lyrik Ultimate, 150mm travel, Charger3");
        let lower = parse_specification("fork", "RockShox Lyrik Ultimate, 150mm travel, Charger3");
        assert_eq!(upper, lower);
        assert_eq!(get(&upper, "fork_damper"), Some("Charger3"));
    }

    #[test]
    fn fork_without_comma_has_no_model() {
        let f = parse_specification("Fork", "SR Suntour XCM 100mm travel");
        assert_eq!(get(&f, "fork_brand"), Some("SR"));
        assert!(f.contains_key("fork_model"));
        assert_eq!(get(&f, "fork_model"), None);
        assert_eq!(get(&f, "fork_travel"), Some("100mm"));
        assert_eq!(get(&f, "fork_damper"), None);
        assert_eq!(get(&f, "fork_offset"), None);
    }

    #[test]
    fn fork_empty_value() {
        let f = parse_specification("Fork", "");
        assert_eq!(f.len(), 5);
        assert!(f.values().all(Option::is_none));
    }

    #[test]
    fn shock_with_mm_dimensions() {
        let f = parse_specification("Rear Shock", "Fox Float DPS Performance, 210mm x 50mm");
        assert_eq!(f.len(), 4);
        assert_eq!(get(&f, "shock_brand"), Some("Fox"));
        assert_eq!(get(&f, "shock_model"), Some("Float DPS Performance"));
        assert_eq!(get(&f, "shock_length"), Some("210mm"));
        assert_eq!(get(&f, "shock_stroke"), Some("50mm"));
    }

    #[test]
    fn shock_brand_containing_x_shifts_the_split() {
        // The first x is the one in "RockShox", so the length lands in the stroke slot.
        let f = parse_specification("Rear Shock", "RockShox Super Deluxe Ultimate, 230mm x 65mm");
        assert_eq!(get(&f, "shock_brand"), Some("RockShox"));
        assert_eq!(get(&f, "shock_length"), None);
        assert_eq!(get(&f, "shock_stroke"), Some("230mm"));
    }

    #[test]
    fn shock_bare_dimensions_are_a_known_gap() {
        // Neither "Fox Float X2, 210" nor "55" carries an mm suffix.
        let f = parse_specification("Shock", "Fox Float X2, 210x55");
        assert_eq!(get(&f, "shock_brand"), Some("Fox"));
        assert_eq!(get(&f, "shock_model"), Some("Float X2"));
        assert!(f.contains_key("shock_length"));
        assert_eq!(get(&f, "shock_length"), None);
        assert_eq!(get(&f, "shock_stroke"), None);
    }

    #[test]
    fn shock_splits_on_first_lowercase_x_only() {
        let f = parse_specification("Shock", "Fox Float X, 210mm x 50mm");
        assert_eq!(get(&f, "shock_length"), Some("210mm"));
        assert_eq!(get(&f, "shock_stroke"), Some("50mm"));
    }

    #[test]
    fn shock_length_and_stroke_words() {
        let f = parse_specification("Shock", "Marzocchi Bomber CR, 205mm length, 60mm stroke");
        assert_eq!(get(&f, "shock_length"), Some("205mm"));
        assert_eq!(get(&f, "shock_stroke"), Some("60mm"));
    }

    #[test]
    fn fork_wins_over_shock() {
        let f = parse_specification("Fork / Shock", "Fox 34, 130mm travel");
        assert!(f.contains_key("fork_brand"));
        assert!(!f.contains_key("shock_brand"));
    }
}
