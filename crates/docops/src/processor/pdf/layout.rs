//! Page rotation and content rescaling.

use lopdf::{Document, Object};
use tracing::warn;

use super::{inherited_attribute, media_box, page_dict_mut, real, wrap_contents};
use crate::error::TransformError;
use crate::operation::page::mm_to_points;
use crate::operation::params::Margins;

/// Adds `degrees` (clockwise) to every page's effective rotation. Both
/// operands are reduced modulo 360 first, so any `i64` is accepted.
pub fn rotate_pages(doc: &mut Document, degrees: i64) -> Result<(), TransformError> {
    for (_, page_id) in doc.get_pages() {
        let current = inherited_attribute(doc, page_id, b"Rotate")
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);
        let rotation = (current.rem_euclid(360) + degrees.rem_euclid(360)) % 360;
        page_dict_mut(doc, page_id)?.set("Rotate", rotation);
    }
    Ok(())
}

/// Placement of original content on a resized page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale: f64,
    pub tx: f64,
    pub ty: f64,
}

/// Scales the `source` box to fit inside the margins of a `width` x
/// `height` page, anchored at the top-left corner of the margin box.
pub fn placement(source: [f64; 4], width: f64, height: f64, margins_pt: &Margins) -> Option<Placement> {
    let [x0, y0, x1, y1] = source;
    let (orig_w, orig_h) = (x1 - x0, y1 - y0);
    if orig_w <= 0.0 || orig_h <= 0.0 {
        return None;
    }
    let content_w = width - margins_pt.left - margins_pt.right;
    let content_h = height - margins_pt.top - margins_pt.bottom;

    let scale = (content_w / orig_w).min(content_h / orig_h);
    Some(Placement {
        scale,
        tx: margins_pt.left - x0 * scale,
        ty: height - margins_pt.top - orig_h * scale - y0 * scale,
    })
}

/// Gives every page a new media box of the target size and scales the
/// existing content into the margin box. Without a target, the first page's
/// size is used for all pages.
pub fn resize_and_margin(
    doc: &mut Document,
    target_pt: Option<(f64, f64)>,
    margins_mm: Margins,
) -> Result<(), TransformError> {
    let pages = doc.get_pages();
    let (width, height) = match target_pt {
        Some(size) => size,
        None => {
            let first = pages
                .values()
                .next()
                .copied()
                .ok_or_else(|| TransformError::PdfStructure("document has no pages".to_string()))?;
            let [x0, y0, x1, y1] = media_box(doc, first)?;
            (x1 - x0, y1 - y0)
        }
    };

    let margins_pt = Margins {
        top: mm_to_points(margins_mm.top),
        bottom: mm_to_points(margins_mm.bottom),
        left: mm_to_points(margins_mm.left),
        right: mm_to_points(margins_mm.right),
    };
    if width - margins_pt.left - margins_pt.right <= 0.0
        || height - margins_pt.top - margins_pt.bottom <= 0.0
    {
        return Err(TransformError::invalid_params(
            "resize_and_margin",
            "margins are too large for the target page size",
        ));
    }

    for (number, page_id) in pages {
        let source = media_box(doc, page_id)?;
        let Some(place) = placement(source, width, height, &margins_pt) else {
            warn!(page = number, "Skipping page with zero dimensions");
            continue;
        };

        wrap_contents(
            doc,
            page_id,
            Some(format!(
                "q {s:.6} 0 0 {s:.6} {tx:.4} {ty:.4} cm\n",
                s = place.scale,
                tx = place.tx,
                ty = place.ty
            )),
            Some("Q\n".to_string()),
        )?;

        let page = page_dict_mut(doc, page_id)?;
        page.set(
            "MediaBox",
            vec![Object::Integer(0), Object::Integer(0), real(width), real(height)],
        );
        page.remove(b"CropBox");
    }
    Ok(())
}
