use serde::{Deserialize, Serialize};

use crate::parser::spec_fields::FieldSet;

/// Output CSV header, in column order. Must match the field order of [`BikeRecord`].
pub const FIELD_NAMES: [&str; 17] = [
    "url",
    "title",
    "price",
    "year",
    "brand",
    "frame_material",
    "wheel_size",
    "drivetrain_brand",
    "fork_brand",
    "fork_model",
    "fork_travel",
    "fork_damper",
    "fork_offset",
    "shock_brand",
    "shock_model",
    "shock_length",
    "shock_stroke",
];

/// One scraped bike. `None` is written as an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BikeRecord {
    pub url: String,
    pub title: Option<String>,
    pub price: Option<String>,
    pub year: Option<String>,
    pub brand: Option<String>,
    pub frame_material: Option<String>,
    pub wheel_size: Option<String>,
    pub drivetrain_brand: Option<String>,
    pub fork_brand: Option<String>,
    pub fork_model: Option<String>,
    pub fork_travel: Option<String>,
    pub fork_damper: Option<String>,
    pub fork_offset: Option<String>,
    pub shock_brand: Option<String>,
    pub shock_model: Option<String>,
    pub shock_length: Option<String>,
    pub shock_stroke: Option<String>,
}

impl BikeRecord {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    /// Merge parsed suspension fields. Later rows overwrite earlier ones,
    /// including with an absent value.
    pub fn merge(&mut self, fields: FieldSet) {
        for (name, value) in fields {
            let slot = match name {
                "fork_brand" => &mut self.fork_brand,
                "fork_model" => &mut self.fork_model,
                "fork_travel" => &mut self.fork_travel,
                "fork_damper" => &mut self.fork_damper,
                "fork_offset" => &mut self.fork_offset,
                "shock_brand" => &mut self.shock_brand,
                "shock_model" => &mut self.shock_model,
                "shock_length" => &mut self.shock_length,
                "shock_stroke" => &mut self.shock_stroke,
                _ => continue,
            };
            *slot = value;
        }
    }
}
