//! PDF backend.
//!
//! Every transform loads the document with lopdf, edits page dictionaries
//! and content stream lists, then writes the whole file atomically.

pub mod design;
pub mod layout;

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::TransformBackend;
use crate::error::TransformError;
use crate::operation::params::{
    Margins, PdfPageColorParams, PdfPageNumberParams, ResizeAndMarginParams, RotatePagesParams,
};
use crate::operation::{DocumentFamily, HexColor, Operation, PageSize};
use crate::pipeline::RunState;
use crate::storage;

/// Guards against cyclic `Parent` chains in broken page trees.
const MAX_TREE_DEPTH: usize = 32;

/// Transforms offered for `.pdf` documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfTransform {
    RotatePages,
    ResizeAndMargin,
    SetPageColor,
    AddPageNumbers,
    SetTextColor,
    SetFontProperties,
}

impl PdfTransform {
    pub const ALL: &'static [PdfTransform] = &[
        Self::RotatePages,
        Self::ResizeAndMargin,
        Self::SetPageColor,
        Self::AddPageNumbers,
        Self::SetTextColor,
        Self::SetFontProperties,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::RotatePages => "rotate_pages",
            Self::ResizeAndMargin => "resize_and_margin",
            Self::SetPageColor => "set_page_color",
            Self::AddPageNumbers => "add_page_numbers",
            Self::SetTextColor => "set_text_color",
            Self::SetFontProperties => "set_font_properties",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.tag() == tag)
    }
}

pub struct PdfBackend;

impl PdfBackend {
    pub fn new() -> Self {
        Self
    }

    fn apply_transform(
        &self,
        transform: PdfTransform,
        input: &Path,
        output: &Path,
        operation: &Operation,
    ) -> Result<(), TransformError> {
        match transform {
            PdfTransform::RotatePages => {
                let params: RotatePagesParams = operation.parse_params()?;
                if params.rotation_degrees % 90 != 0 {
                    return Err(TransformError::invalid_params(
                        transform.tag(),
                        format!(
                            "rotation must be a multiple of 90, got {}",
                            params.rotation_degrees
                        ),
                    ));
                }
                edit_document(input, output, |doc| {
                    layout::rotate_pages(doc, params.rotation_degrees)
                })
            }
            PdfTransform::ResizeAndMargin => {
                let params: ResizeAndMarginParams = operation.parse_params()?;
                let target = resize_target(transform, &params)?;
                let margins = params
                    .margins_mm
                    .unwrap_or_default()
                    .resolve(Margins::ZERO)
                    .ok_or_else(|| {
                        TransformError::invalid_params(transform.tag(), "margins must be non-negative")
                    })?;
                edit_document(input, output, |doc| {
                    layout::resize_and_margin(doc, target, margins)
                })
            }
            PdfTransform::SetPageColor => {
                let params: PdfPageColorParams = operation.parse_params()?;
                let color = parse_color(transform, &params.page_hex_color)?;
                edit_document(input, output, |doc| design::set_page_color(doc, color))
            }
            PdfTransform::AddPageNumbers => {
                let params: PdfPageNumberParams = operation.parse_params()?;
                let style = design::PageNumberStyle::from_params(&params)?;
                edit_document(input, output, |doc| design::add_page_numbers(doc, &style))
            }
            PdfTransform::SetTextColor | PdfTransform::SetFontProperties => {
                Err(TransformError::NotImplemented(transform.tag().to_string()))
            }
        }
    }
}

impl Default for PdfBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformBackend for PdfBackend {
    fn family(&self) -> DocumentFamily {
        DocumentFamily::Pdf
    }

    fn operations(&self) -> Vec<&'static str> {
        PdfTransform::ALL.iter().map(|t| t.tag()).collect()
    }

    fn supports(&self, operation_type: &str) -> bool {
        PdfTransform::from_tag(operation_type).is_some()
    }

    fn apply(
        &self,
        operation: &Operation,
        input: &Path,
        output: &Path,
        _state: &mut RunState,
    ) -> Result<(), TransformError> {
        let transform = PdfTransform::from_tag(&operation.kind)
            .ok_or_else(|| TransformError::NotImplemented(operation.kind.clone()))?;
        self.apply_transform(transform, input, output, operation)
    }
}

pub(crate) fn parse_color(transform: PdfTransform, hex: &str) -> Result<HexColor, TransformError> {
    HexColor::parse(hex).ok_or_else(|| {
        TransformError::invalid_params(transform.tag(), format!("invalid hex color '{}'", hex))
    })
}

/// Target page size in points, or `None` to keep the first page's size.
fn resize_target(
    transform: PdfTransform,
    params: &ResizeAndMarginParams,
) -> Result<Option<(f64, f64)>, TransformError> {
    if let Some(ref identifier) = params.target_size_identifier {
        let size = identifier.resolve().ok_or_else(|| {
            TransformError::invalid_params(transform.tag(), identifier.unresolved_reason())
        })?;
        return Ok(Some((size.width_pt(), size.height_pt())));
    }
    if let Some([width, height]) = params.custom_target_size_mm {
        let size = PageSize::new(width, height);
        if !size.is_valid() {
            return Err(TransformError::invalid_params(
                transform.tag(),
                format!("invalid custom size {}x{} mm", width, height),
            ));
        }
        return Ok(Some((size.width_pt(), size.height_pt())));
    }
    Ok(None)
}

fn edit_document(
    input: &Path,
    output: &Path,
    edit: impl FnOnce(&mut Document) -> Result<(), TransformError>,
) -> Result<(), TransformError> {
    let mut doc = Document::load(input)?;
    edit(&mut doc)?;
    save(&mut doc, output)
}

fn save(doc: &mut Document, output: &Path) -> Result<(), TransformError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).map_err(lopdf::Error::from)?;
    storage::write_atomic(output, &buffer)?;
    Ok(())
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Object, TransformError> {
    match object {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

fn number(doc: &Document, object: &Object) -> Option<f64> {
    resolve(doc, object)
        .ok()
        .and_then(|o| o.as_float().ok())
        .map(|v| v as f64)
}

/// Looks up a page attribute, following `Parent` links for inheritable keys
/// such as `MediaBox`, `Rotate` and `Resources`.
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node_id = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(node_id).ok()?;
        if let Ok(value) = node.get(key) {
            return resolve(doc, value).ok().cloned();
        }
        node_id = node.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Normalized `[x0, y0, x1, y1]` media box of a page.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> Result<[f64; 4], TransformError> {
    let object = inherited_attribute(doc, page_id, b"MediaBox").ok_or_else(|| {
        TransformError::PdfStructure(format!("page {} {} has no MediaBox", page_id.0, page_id.1))
    })?;
    let values: Vec<f64> = object
        .as_array()?
        .iter()
        .map(|v| number(doc, v))
        .collect::<Option<_>>()
        .ok_or_else(|| TransformError::PdfStructure("MediaBox holds non-numeric values".into()))?;
    let [a, b, c, d] = values[..] else {
        return Err(TransformError::PdfStructure(format!(
            "MediaBox has {} entries, expected 4",
            values.len()
        )));
    };
    Ok([a.min(c), b.min(d), a.max(c), b.max(d)])
}

pub(crate) fn real(value: f64) -> Object {
    Object::Real(value as _)
}

pub(crate) fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, TransformError> {
    Ok(doc.get_object_mut(page_id)?.as_dict_mut()?)
}

/// Current content stream references of a page, flattened to a list.
fn page_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, TransformError> {
    let page = doc.get_dictionary(page_id)?;
    let Ok(contents) = page.get(b"Contents") else {
        return Ok(Vec::new());
    };
    match contents {
        Object::Array(items) => Ok(items.clone()),
        Object::Reference(id) => match doc.get_object(*id)? {
            Object::Array(items) => Ok(items.clone()),
            _ => Ok(vec![Object::Reference(*id)]),
        },
        Object::Stream(_) => Err(TransformError::PdfStructure(
            "inline page content stream".to_string(),
        )),
        _ => Ok(Vec::new()),
    }
}

/// Surrounds the page's existing content with extra streams.
pub(crate) fn wrap_contents(
    doc: &mut Document,
    page_id: ObjectId,
    before: Option<String>,
    after: Option<String>,
) -> Result<(), TransformError> {
    let existing = page_contents(doc, page_id)?;
    let mut contents = Vec::with_capacity(existing.len() + 2);
    if let Some(ops) = before {
        let id = doc.add_object(Stream::new(Dictionary::new(), ops.into_bytes()));
        contents.push(Object::Reference(id));
    }
    contents.extend(existing);
    if let Some(ops) = after {
        let id = doc.add_object(Stream::new(Dictionary::new(), ops.into_bytes()));
        contents.push(Object::Reference(id));
    }
    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// Programmatic PDF fixtures shared by the backend's unit tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::Path;

    use lopdf::{dictionary, Document, Object, Stream};

    /// A document with `pages` pages of `width` x `height` points, each
    /// drawing one line of text. `Rotate` is set on the page tree node so
    /// pages inherit it.
    pub fn document(pages: usize, width: i64, height: i64, rotate: Option<i64>) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut kids = Vec::new();
        for index in 0..pages {
            let content = format!("BT /F1 12 Tf 50 {} Td (Page {}) Tj ET\n", height - 50, index + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let mut pages_dict = dictionary! {
            "Type" => "Pages",
            "Count" => pages as i64,
            "Kids" => kids,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        };
        if let Some(degrees) = rotate {
            pages_dict.set("Rotate", degrees);
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    pub fn write_pdf(path: &Path, pages: usize, width: i64, height: i64) {
        let mut doc = document(pages, width, height, None);
        doc.save(path).unwrap();
    }

    pub fn write_rotated_pdf(path: &Path, pages: usize, rotate: i64) {
        let mut doc = document(pages, 612, 792, Some(rotate));
        doc.save(path).unwrap();
    }
}
