//! Word-processing (`.docx`) backend.

pub mod design;
pub mod footer;
pub mod layout;
pub mod package;
pub mod text;
pub mod xml;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use self::package::{DocxPackage, DOCUMENT_PART, SETTINGS_PART};
use self::xml::{XmlDocument, XmlElement, XmlNode};
use super::TransformBackend;
use crate::analysis::KeywordExtractor;
use crate::error::TransformError;
use crate::operation::params::{
    BoldKeywordsParams, ExtractKeywordsParams, FontPropertiesParams, HexColorParams,
    LayoutConvertParams, Margins, SetPageSizeParams,
};
use crate::operation::{DocumentFamily, HexColor, Operation};
use crate::pipeline::RunState;
use crate::storage;

pub(crate) const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Child order of `w:sectPr` (CT_SectPr).
pub(crate) const SECT_PR_ORDER: &[&str] = &[
    "headerReference",
    "footerReference",
    "footnotePr",
    "endnotePr",
    "type",
    "pgSz",
    "pgMar",
    "paperSrc",
    "pgBorders",
    "lnNumType",
    "pgNumType",
    "cols",
    "formProt",
    "vAlign",
    "noEndnote",
    "titlePg",
    "textDirection",
    "bidi",
    "rtlGutter",
    "docGrid",
    "printerSettings",
    "sectPrChange",
];

/// Child order of `w:rPr` (CT_RPr).
pub(crate) const RPR_ORDER: &[&str] = &[
    "rStyle",
    "rFonts",
    "b",
    "bCs",
    "i",
    "iCs",
    "caps",
    "smallCaps",
    "strike",
    "dstrike",
    "outline",
    "shadow",
    "emboss",
    "imprint",
    "noProof",
    "snapToGrid",
    "vanish",
    "webHidden",
    "color",
    "spacing",
    "w",
    "kern",
    "position",
    "sz",
    "szCs",
    "highlight",
    "u",
    "effect",
    "bdr",
    "shd",
    "fitText",
    "vertAlign",
    "rtl",
    "cs",
    "em",
    "lang",
    "eastAsianLayout",
    "specVanish",
    "oMath",
];

/// Visits every section of the document. A body without any `w:sectPr`
/// gets one appended so section-level edits always have a target.
pub(crate) fn sections_mut(root: &mut XmlElement, f: &mut dyn FnMut(&mut XmlElement)) {
    let mut visited = 0;
    root.for_each_descendant_mut(&mut |element| {
        if element.is("sectPr") {
            visited += 1;
            f(element);
        }
    });
    if visited > 0 {
        return;
    }

    if let Some(body) = root.child_mut("body") {
        body.children
            .push(XmlNode::Element(XmlElement::new("w:sectPr")));
        if let Some(sect) = body.elements_mut().last() {
            f(sect);
        }
    }
}

/// Transforms offered for `.docx` documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordTransform {
    LayoutConvert,
    SetPageSize,
    SetPageColor,
    SetTextColor,
    SetFontProperties,
    AddPageNumbers,
    CorrectMisspellings,
    ExtractKeywordsForBolding,
    BoldKeywords,
}

impl WordTransform {
    pub const ALL: &'static [WordTransform] = &[
        Self::LayoutConvert,
        Self::SetPageSize,
        Self::SetPageColor,
        Self::SetTextColor,
        Self::SetFontProperties,
        Self::AddPageNumbers,
        Self::CorrectMisspellings,
        Self::ExtractKeywordsForBolding,
        Self::BoldKeywords,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::LayoutConvert => "layout_convert",
            Self::SetPageSize => "set_page_size",
            Self::SetPageColor => "set_page_color",
            Self::SetTextColor => "set_text_color",
            Self::SetFontProperties => "set_font_properties",
            Self::AddPageNumbers => "add_page_numbers",
            Self::CorrectMisspellings => "correct_misspellings",
            Self::ExtractKeywordsForBolding => "extract_keywords_for_bolding",
            Self::BoldKeywords => "bold_keywords",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.tag() == tag)
    }
}

pub struct DocxBackend {
    keywords: Arc<dyn KeywordExtractor>,
}

impl DocxBackend {
    pub fn new(keywords: Arc<dyn KeywordExtractor>) -> Self {
        Self { keywords }
    }

    fn apply_transform(
        &self,
        transform: WordTransform,
        input: &Path,
        output: &Path,
        operation: &Operation,
        state: &mut RunState,
    ) -> Result<(), TransformError> {
        match transform {
            WordTransform::LayoutConvert => {
                let params: LayoutConvertParams = operation.parse_params()?;
                let margins = params
                    .margins
                    .unwrap_or_default()
                    .resolve(Margins::DOCX_DEFAULT)
                    .ok_or_else(|| {
                        TransformError::invalid_params(transform.tag(), "margins must be non-negative")
                    })?;
                edit_document(input, output, |doc| {
                    if params.orientation_change {
                        layout::swap_orientation(doc);
                    }
                    layout::set_margins(doc, margins);
                })
            }
            WordTransform::SetPageSize => {
                let params: SetPageSizeParams = operation.parse_params()?;
                let size = params.size_identifier.resolve().ok_or_else(|| {
                    TransformError::invalid_params(
                        transform.tag(),
                        params.size_identifier.unresolved_reason(),
                    )
                })?;
                edit_document(input, output, |doc| layout::set_page_size(doc, size))
            }
            WordTransform::SetPageColor => {
                let color = parse_color(transform, operation)?;
                let mut package = DocxPackage::open(input)?;
                let mut document = package.xml_part(DOCUMENT_PART)?;
                design::set_page_color(&mut document, color);
                package.set_xml_part(DOCUMENT_PART, &document)?;
                if package.has_part(SETTINGS_PART) {
                    let mut settings = package.xml_part(SETTINGS_PART)?;
                    design::enable_background_display(&mut settings);
                    package.set_xml_part(SETTINGS_PART, &settings)?;
                }
                package.save(output)
            }
            WordTransform::SetTextColor => {
                let color = parse_color(transform, operation)?;
                edit_document(input, output, |doc| design::set_text_color(doc, color))
            }
            WordTransform::SetFontProperties => {
                let params: FontPropertiesParams = operation.parse_params()?;
                if params.font_name.is_none() && params.font_size_pt.is_none() {
                    return Err(TransformError::invalid_params(
                        transform.tag(),
                        "either font_name or font_size_pt is required",
                    ));
                }
                if let Some(size) = params.font_size_pt {
                    if !(size.is_finite() && size > 0.0) {
                        return Err(TransformError::invalid_params(
                            transform.tag(),
                            format!("font size must be positive, got {}", size),
                        ));
                    }
                }
                edit_document(input, output, |doc| {
                    design::set_font_properties(doc, params.font_name.as_deref(), params.font_size_pt)
                })
            }
            WordTransform::AddPageNumbers => {
                let mut package = DocxPackage::open(input)?;
                footer::add_page_numbers(&mut package)?;
                package.save(output)
            }
            WordTransform::CorrectMisspellings => {
                Err(TransformError::NotImplemented(transform.tag().to_string()))
            }
            WordTransform::ExtractKeywordsForBolding => {
                if state.extracted_keywords().map_or(true, |k| k.is_empty()) {
                    let params: ExtractKeywordsParams = operation.parse_params()?;
                    let text = extract_text(input)?;
                    let phrases: Vec<String> = self
                        .keywords
                        .extract(&text, &params.lang, params.top_n)
                        .into_iter()
                        .filter(|p| p.score >= 0.0)
                        .map(|p| p.phrase)
                        .collect();
                    info!(count = phrases.len(), lang = %params.lang, "Extracted keywords");
                    state.set_extracted_keywords(phrases);
                } else {
                    debug!("Keywords already extracted for this run");
                }
                storage::copy_artifact(input, output)?;
                Ok(())
            }
            WordTransform::BoldKeywords => {
                let params: BoldKeywordsParams = operation.parse_params()?;
                let extracted = if params.use_extracted {
                    state.extracted_keywords().filter(|k| !k.is_empty())
                } else {
                    None
                };
                let keywords = extracted.or(params.keywords_list).unwrap_or_default();

                let Some(pattern) = text::keyword_pattern(&keywords) else {
                    debug!("No keywords to bold");
                    storage::copy_artifact(input, output)?;
                    return Ok(());
                };
                let mut package = DocxPackage::open(input)?;
                let mut document = package.xml_part(DOCUMENT_PART)?;
                let matches = text::bold_keywords(&mut document, &pattern);
                debug!(matches, "Bolded keyword matches");
                package.set_xml_part(DOCUMENT_PART, &document)?;
                package.save(output)
            }
        }
    }
}

impl TransformBackend for DocxBackend {
    fn family(&self) -> DocumentFamily {
        DocumentFamily::WordProcessing
    }

    fn operations(&self) -> Vec<&'static str> {
        WordTransform::ALL.iter().map(|t| t.tag()).collect()
    }

    fn supports(&self, operation_type: &str) -> bool {
        WordTransform::from_tag(operation_type).is_some()
    }

    fn apply(
        &self,
        operation: &Operation,
        input: &Path,
        output: &Path,
        state: &mut RunState,
    ) -> Result<(), TransformError> {
        let transform = WordTransform::from_tag(&operation.kind)
            .ok_or_else(|| TransformError::NotImplemented(operation.kind.clone()))?;
        self.apply_transform(transform, input, output, operation, state)
    }
}

fn parse_color(transform: WordTransform, operation: &Operation) -> Result<HexColor, TransformError> {
    let params: HexColorParams = operation.parse_params()?;
    HexColor::parse(&params.hex_color).ok_or_else(|| {
        TransformError::invalid_params(
            transform.tag(),
            format!("invalid hex color '{}'", params.hex_color),
        )
    })
}

/// Opens `input`, edits its main document part and saves to `output`.
fn edit_document(
    input: &Path,
    output: &Path,
    edit: impl FnOnce(&mut XmlDocument),
) -> Result<(), TransformError> {
    let mut package = DocxPackage::open(input)?;
    let mut document = package.xml_part(DOCUMENT_PART)?;
    edit(&mut document);
    package.set_xml_part(DOCUMENT_PART, &document)?;
    package.save(output)
}

/// Plain text of the main document, one line per paragraph.
pub fn extract_text(path: &Path) -> Result<String, TransformError> {
    let package = DocxPackage::open(path)?;
    let data = package
        .part(DOCUMENT_PART)
        .ok_or_else(|| TransformError::Docx(format!("Package has no part '{}'", DOCUMENT_PART)))?;
    let xml = String::from_utf8_lossy(data);
    text::parse_docx_xml(xml.trim_start_matches('\u{feff}'))
}

/// Programmatic DOCX fixtures shared by the backend's unit tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Write;
    use std::path::Path;

    use zip::write::SimpleFileOptions;

    use super::xml::XmlDocument;
    use super::W_NS;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/settings.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml"/></Types>"#;

    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

    const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings" Target="settings.xml"/></Relationships>"#;

    /// Source of `word/document.xml` with one run per paragraph. A paragraph
    /// equal to `"\x0c"` becomes a page break.
    pub fn document_source(paragraphs: &[&str]) -> String {
        let mut body = String::new();
        for text in paragraphs {
            if *text == "\x0c" {
                body.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
                continue;
            }
            body.push_str(&format!(
                r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
                quick_xml::escape::escape(*text)
            ));
        }
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n",
                r#"<w:document xmlns:w="{}"><w:body>{}"#,
                r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/>"#,
                r#"<w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/>"#,
                r#"</w:sectPr></w:body></w:document>"#
            ),
            W_NS, body
        )
    }

    pub fn settings_source() -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n",
                r#"<w:settings xmlns:w="{}"><w:zoom w:percent="100"/>"#,
                r#"<w:defaultTabStop w:val="720"/><w:compat/></w:settings>"#
            ),
            W_NS
        )
    }

    pub fn document_xml(paragraphs: &[&str]) -> XmlDocument {
        XmlDocument::parse("word/document.xml", &document_source(paragraphs)).unwrap()
    }

    pub fn settings_xml() -> XmlDocument {
        XmlDocument::parse("word/settings.xml", &settings_source()).unwrap()
    }

    pub fn write_docx(path: &Path, paragraphs: &[&str]) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("_rels/.rels", ROOT_RELS.to_string()),
            ("word/document.xml", document_source(paragraphs)),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS.to_string()),
            ("word/settings.xml", settings_source()),
        ];
        for (name, content) in parts {
            writer.start_file(name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
}
