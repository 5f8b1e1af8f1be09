//! Section layout edits: orientation, margins and page size.

use super::xml::XmlElement;
use super::{sections_mut, SECT_PR_ORDER};
use crate::operation::page::{mm_to_twips, PageSize};
use crate::operation::params::Margins;
use crate::processor::docx::xml::XmlDocument;

/// Default header/footer distance for a newly created `w:pgMar`, in twips.
const DEFAULT_HEADER_FOOTER_TWIPS: i64 = 720;

fn dimension(element: &XmlElement, attr: &str) -> Option<i64> {
    element.attr(attr).and_then(|v| v.trim().parse::<f64>().ok()).map(|v| v as i64)
}

/// Swaps width and height of every section and flips `w:orient`.
pub fn swap_orientation(document: &mut XmlDocument) {
    sections_mut(&mut document.root, &mut |sect| {
        let Some(pg_sz) = sect.child_mut("pgSz") else {
            return;
        };
        let (Some(width), Some(height)) = (dimension(pg_sz, "w:w"), dimension(pg_sz, "w:h")) else {
            return;
        };

        let was_portrait = width < height;
        pg_sz.set_attr("w:w", &height.to_string());
        pg_sz.set_attr("w:h", &width.to_string());
        if was_portrait {
            pg_sz.set_attr("w:orient", "landscape");
        } else {
            pg_sz.set_attr("w:orient", "portrait");
        }
    });
}

/// Sets the page margins of every section.
pub fn set_margins(document: &mut XmlDocument, margins: Margins) {
    sections_mut(&mut document.root, &mut |sect| {
        let pg_mar = sect.ensure_child("w:pgMar", SECT_PR_ORDER);
        pg_mar.set_attr("w:top", &mm_to_twips(margins.top).to_string());
        pg_mar.set_attr("w:bottom", &mm_to_twips(margins.bottom).to_string());
        pg_mar.set_attr("w:left", &mm_to_twips(margins.left).to_string());
        pg_mar.set_attr("w:right", &mm_to_twips(margins.right).to_string());
        for (attr, default) in [
            ("w:header", DEFAULT_HEADER_FOOTER_TWIPS),
            ("w:footer", DEFAULT_HEADER_FOOTER_TWIPS),
            ("w:gutter", 0),
        ] {
            if pg_mar.attr(attr).is_none() {
                pg_mar.set_attr(attr, &default.to_string());
            }
        }
    });
}

/// Applies `size` to every section, keeping each section's orientation:
/// landscape sections get the longer side as width.
pub fn set_page_size(document: &mut XmlDocument, size: PageSize) {
    let short = mm_to_twips(size.width_mm.min(size.height_mm));
    let long = mm_to_twips(size.width_mm.max(size.height_mm));

    sections_mut(&mut document.root, &mut |sect| {
        let pg_sz = sect.ensure_child("w:pgSz", SECT_PR_ORDER);
        let landscape = match pg_sz.attr("w:orient") {
            Some("landscape") => true,
            Some(_) => false,
            None => matches!(
                (dimension(pg_sz, "w:w"), dimension(pg_sz, "w:h")),
                (Some(w), Some(h)) if w > h
            ),
        };

        let (width, height) = if landscape { (long, short) } else { (short, long) };
        pg_sz.set_attr("w:w", &width.to_string());
        pg_sz.set_attr("w:h", &height.to_string());
    });
}
