//! Page background fills and page number stamping.

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

use super::{inherited_attribute, media_box, page_dict_mut, parse_color, wrap_contents, PdfTransform};
use crate::error::TransformError;
use crate::operation::page::mm_to_points;
use crate::operation::params::PdfPageNumberParams;
use crate::operation::HexColor;

/// Resource name of the font used for page numbers.
const PAGE_NUMBER_FONT: &str = "FDocopsPageNumber";

/// Left offset used when numbers are neither centered nor right-aligned.
const DEFAULT_LEFT_MM: f64 = 10.0;

/// The 14 standard Type 1 fonts and the advance width of their digits, in
/// thousandths of an em.
const STANDARD_FONTS: &[(&str, f64)] = &[
    ("Helvetica", 556.0),
    ("Helvetica-Bold", 556.0),
    ("Helvetica-Oblique", 556.0),
    ("Helvetica-BoldOblique", 556.0),
    ("Times-Roman", 500.0),
    ("Times-Bold", 500.0),
    ("Times-Italic", 500.0),
    ("Times-BoldItalic", 500.0),
    ("Courier", 600.0),
    ("Courier-Bold", 600.0),
    ("Courier-Oblique", 600.0),
    ("Courier-BoldOblique", 600.0),
    ("Symbol", 500.0),
    ("ZapfDingbats", 788.0),
];

/// Fills the media box of every page with `color`, beneath the content.
pub fn set_page_color(doc: &mut Document, color: HexColor) -> Result<(), TransformError> {
    let (r, g, b) = color.to_unit_rgb();
    for (_, page_id) in doc.get_pages() {
        let [x0, y0, x1, y1] = media_box(doc, page_id)?;
        let fill = format!(
            "q {:.4} {:.4} {:.4} rg {:.4} {:.4} {:.4} {:.4} re f Q\n",
            r,
            g,
            b,
            x0,
            y0,
            x1 - x0,
            y1 - y0
        );
        wrap_contents(doc, page_id, Some(fill), None)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum HorizontalPosition {
    Center,
    /// Distance of the number's right edge from the page's right edge, in points.
    Right(f64),
    /// Distance of the number's left edge from the page's left edge, in points.
    Left(f64),
}

/// Resolved page number appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct PageNumberStyle {
    pub font_name: String,
    pub digit_width: f64,
    pub font_size_pt: f64,
    pub color: HexColor,
    pub bottom_pt: f64,
    pub position: HorizontalPosition,
}

impl PageNumberStyle {
    pub fn from_params(params: &PdfPageNumberParams) -> Result<Self, TransformError> {
        let tag = PdfTransform::AddPageNumbers.tag();
        let digit_width = STANDARD_FONTS
            .iter()
            .find(|(name, _)| *name == params.font_name)
            .map(|(_, width)| *width)
            .ok_or_else(|| {
                TransformError::invalid_params(
                    tag,
                    format!("'{}' is not one of the standard PDF fonts", params.font_name),
                )
            })?;
        if !(params.font_size_pt.is_finite() && params.font_size_pt > 0.0) {
            return Err(TransformError::invalid_params(
                tag,
                format!("font size must be positive, got {}", params.font_size_pt),
            ));
        }

        let position = if params.position_center_x {
            HorizontalPosition::Center
        } else if let Some(right) = params.position_right_mm {
            HorizontalPosition::Right(mm_to_points(right))
        } else {
            HorizontalPosition::Left(mm_to_points(DEFAULT_LEFT_MM))
        };

        Ok(Self {
            font_name: params.font_name.clone(),
            digit_width,
            font_size_pt: params.font_size_pt,
            color: parse_color(PdfTransform::AddPageNumbers, &params.text_hex_color)?,
            bottom_pt: mm_to_points(params.position_bottom_mm),
            position,
        })
    }

    /// Width of `text` (digits only) at the style's size, in points.
    pub fn text_width(&self, text: &str) -> f64 {
        text.chars().count() as f64 * self.digit_width / 1000.0 * self.font_size_pt
    }

    /// Baseline origin of `text` on a page with the given media box.
    pub fn origin(&self, text: &str, media: [f64; 4]) -> (f64, f64) {
        let [x0, y0, x1, _] = media;
        let width = self.text_width(text);
        let x = match self.position {
            HorizontalPosition::Center => x0 + (x1 - x0 - width) / 2.0,
            HorizontalPosition::Right(right) => x1 - right - width,
            HorizontalPosition::Left(left) => x0 + left,
        };
        (x, y0 + self.bottom_pt)
    }
}

/// Registers the page number font in the page's own resource dictionary,
/// copying inherited resources so other fonts stay reachable.
fn add_font_resource(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<(), TransformError> {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };
    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_default(),
        _ => Dictionary::new(),
    };
    fonts.set(PAGE_NUMBER_FONT, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));
    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Stamps `1..=n` onto the pages in document order.
pub fn add_page_numbers(doc: &mut Document, style: &PageNumberStyle) -> Result<(), TransformError> {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => style.font_name.as_str(),
        "Encoding" => "WinAnsiEncoding",
    });
    let (r, g, b) = style.color.to_unit_rgb();

    for (number, page_id) in doc.get_pages() {
        let text = number.to_string();
        let (x, y) = style.origin(&text, media_box(doc, page_id)?);
        let stamp = format!(
            "Q\nq BT /{} {:.2} Tf {:.4} {:.4} {:.4} rg {:.4} {:.4} Td ({}) Tj ET Q\n",
            PAGE_NUMBER_FONT, style.font_size_pt, r, g, b, x, y, text
        );
        add_font_resource(doc, page_id, font_id)?;
        wrap_contents(doc, page_id, Some("q\n".to_string()), Some(stamp))?;
    }
    Ok(())
}
