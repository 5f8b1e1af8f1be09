//! Typed parameters for each known operation.
//!
//! Missing optional keys fall back to the defaults documented on each field.

use serde::Deserialize;

use super::page::SizeIdentifier;

/// Page margins in millimetres. Absent sides take the caller's defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarginsSpec {
    pub top: Option<f64>,
    pub bottom: Option<f64>,
    pub left: Option<f64>,
    pub right: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Margins {
    pub const ZERO: Margins = Margins {
        top: 0.0,
        bottom: 0.0,
        left: 0.0,
        right: 0.0,
    };

    /// Word-processing defaults: 20 mm top/bottom, 30 mm left/right.
    pub const DOCX_DEFAULT: Margins = Margins {
        top: 20.0,
        bottom: 20.0,
        left: 30.0,
        right: 30.0,
    };

    fn is_valid(&self) -> bool {
        [self.top, self.bottom, self.left, self.right]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl MarginsSpec {
    pub fn resolve(&self, defaults: Margins) -> Option<Margins> {
        let margins = Margins {
            top: self.top.unwrap_or(defaults.top),
            bottom: self.bottom.unwrap_or(defaults.bottom),
            left: self.left.unwrap_or(defaults.left),
            right: self.right.unwrap_or(defaults.right),
        };
        margins.is_valid().then_some(margins)
    }
}

// ─── Word processing ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConvertParams {
    #[serde(default)]
    pub orientation_change: bool,
    pub margins: Option<MarginsSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetPageSizeParams {
    pub size_identifier: SizeIdentifier,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HexColorParams {
    pub hex_color: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FontPropertiesParams {
    pub font_name: Option<String>,
    pub font_size_pt: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractKeywordsParams {
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoldKeywordsParams {
    pub keywords_list: Option<Vec<String>>,
    #[serde(default)]
    pub use_extracted: bool,
}

fn default_lang() -> String {
    "ja".to_string()
}

fn default_top_n() -> usize {
    20
}

// ─── PDF ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RotatePagesParams {
    #[serde(default = "default_rotation")]
    pub rotation_degrees: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResizeAndMarginParams {
    pub target_size_identifier: Option<SizeIdentifier>,
    pub custom_target_size_mm: Option<[f64; 2]>,
    pub margins_mm: Option<MarginsSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PdfPageColorParams {
    pub page_hex_color: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PdfPageNumberParams {
    #[serde(default = "default_font_name")]
    pub font_name: String,
    #[serde(default = "default_font_size")]
    pub font_size_pt: f64,
    #[serde(default = "default_text_color")]
    pub text_hex_color: String,
    #[serde(default = "default_bottom_mm")]
    pub position_bottom_mm: f64,
    #[serde(default = "default_center")]
    pub position_center_x: bool,
    pub position_right_mm: Option<f64>,
}

fn default_rotation() -> i64 {
    90
}

fn default_font_name() -> String {
    "Helvetica".to_string()
}

fn default_font_size() -> f64 {
    10.0
}

fn default_text_color() -> String {
    "000000".to_string()
}

fn default_bottom_mm() -> f64 {
    10.0
}

fn default_center() -> bool {
    true
}
