//! Text extraction and keyword bolding.

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use super::xml::{XmlDocument, XmlElement, XmlNode};
use super::RPR_ORDER;
use crate::error::TransformError;

/// Extracts plain text from `word/document.xml`, one line per paragraph.
pub fn parse_docx_xml(xml: &str) -> Result<String, TransformError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut text = String::new();
    let mut in_text_element = false;
    let mut in_paragraph = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let local_name = e.local_name();
                match local_name.as_ref() {
                    b"t" => in_text_element = true,
                    b"p" => in_paragraph = true,
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let local_name = e.local_name();
                match local_name.as_ref() {
                    b"t" => in_text_element = false,
                    b"p" => {
                        if in_paragraph {
                            text.push('\n');
                            in_paragraph = false;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                if in_paragraph && e.local_name().as_ref() == b"tab" {
                    text.push('\t');
                }
            }
            Ok(Event::Text(e)) => {
                if in_text_element {
                    let decoded = e.unescape().unwrap_or_default();
                    text.push_str(&decoded);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TransformError::Xml {
                    part: super::package::DOCUMENT_PART.to_string(),
                    reason: e.to_string(),
                });
            }
            _ => {}
        }
    }

    Ok(text)
}

/// Case-insensitive alternation of `keywords`, longest first so that a
/// phrase wins over any keyword it contains. `None` when nothing remains
/// after dropping empty entries.
pub fn keyword_pattern(keywords: &[String]) -> Option<Regex> {
    let mut valid: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    if valid.is_empty() {
        return None;
    }
    valid.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    valid.dedup();

    let alternation = valid
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){}", alternation)).ok()
}

/// A paragraph whose content is only runs of plain text.
struct SimpleParagraph {
    properties: Option<XmlElement>,
    run_properties: Option<XmlElement>,
    text: String,
}

fn simple_paragraph(paragraph: &XmlElement) -> Option<SimpleParagraph> {
    let mut properties = None;
    let mut run_properties = None;
    let mut text = String::new();
    let mut saw_run = false;

    for node in &paragraph.children {
        let element = match node {
            XmlNode::Element(e) => e,
            XmlNode::Text(raw) if raw.trim().is_empty() => continue,
            _ => return None,
        };

        if element.is("pPr") {
            properties = Some(element.clone());
            continue;
        }
        if element.name != "w:r" {
            return None;
        }

        for part in element.elements() {
            match part.local_name() {
                "rPr" => {
                    if !saw_run {
                        run_properties = Some(part.clone());
                    }
                }
                "t" => text.push_str(&part.plain_text()?),
                "tab" => text.push('\t'),
                _ => return None,
            }
        }
        saw_run = true;
    }

    saw_run.then_some(SimpleParagraph {
        properties,
        run_properties,
        text,
    })
}

fn text_run(run_properties: Option<&XmlElement>, text: &str, bold: bool) -> XmlElement {
    let mut run = XmlElement::new("w:r");

    let mut rpr = run_properties.cloned().unwrap_or_else(|| XmlElement::new("w:rPr"));
    if bold {
        rpr.ensure_child("w:b", RPR_ORDER).remove_attr("w:val");
        rpr.ensure_child("w:bCs", RPR_ORDER).remove_attr("w:val");
    }
    if bold || !rpr.children.is_empty() {
        run.children.push(XmlNode::Element(rpr));
    }

    // Tabs are real elements in WordprocessingML, not characters.
    for (index, piece) in text.split('\t').enumerate() {
        if index > 0 {
            run.children.push(XmlNode::Element(XmlElement::new("w:tab")));
        }
        if !piece.is_empty() {
            run.children.push(XmlNode::Element(
                XmlElement::new("w:t")
                    .with_attr("xml:space", "preserve")
                    .with_text(piece),
            ));
        }
    }
    run
}

/// Rebuilds every plain-text paragraph containing a match so that matched
/// spans sit in their own bold runs. Formatting of the paragraph's first run
/// is carried onto all rebuilt runs. Paragraphs holding fields, hyperlinks
/// or other structure are left untouched. Returns the number of matches.
pub fn bold_keywords(document: &mut XmlDocument, pattern: &Regex) -> usize {
    let mut total = 0;

    document.root.for_each_descendant_mut(&mut |element| {
        if element.name != "w:p" {
            return;
        }
        let Some(paragraph) = simple_paragraph(element) else {
            return;
        };
        let matches: Vec<(usize, usize)> = pattern
            .find_iter(&paragraph.text)
            .map(|m| (m.start(), m.end()))
            .filter(|(s, e)| s < e)
            .collect();
        if matches.is_empty() {
            return;
        }
        total += matches.len();

        let rpr = paragraph.run_properties.as_ref();
        let mut children = Vec::new();
        if let Some(ppr) = paragraph.properties {
            children.push(XmlNode::Element(ppr));
        }

        let mut last_end = 0;
        for (start, end) in matches {
            if start > last_end {
                children.push(XmlNode::Element(text_run(rpr, &paragraph.text[last_end..start], false)));
            }
            children.push(XmlNode::Element(text_run(rpr, &paragraph.text[start..end], true)));
            last_end = end;
        }
        if last_end < paragraph.text.len() {
            children.push(XmlNode::Element(text_run(rpr, &paragraph.text[last_end..], false)));
        }

        element.children = children;
    });

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::docx::fixtures;

    fn runs(doc: &XmlDocument) -> Vec<(String, bool)> {
        doc.root
            .descendants("r")
            .into_iter()
            .map(|r| {
                let text: String = r
                    .elements()
                    .filter(|e| e.is("t"))
                    .filter_map(|t| t.plain_text())
                    .collect();
                let bold = r.child("rPr").is_some_and(|p| p.child("b").is_some());
                (text, bold)
            })
            .collect()
    }

    #[test]
    fn test_parse_simple_xml() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
            <w:body>
                <w:p>
                    <w:r>
                        <w:t>Hello World</w:t>
                    </w:r>
                </w:p>
            </w:body>
        </w:document>"#;

        let text = parse_docx_xml(xml).unwrap();
        assert!(text.contains("Hello World"));
    }

    #[test]
    fn test_parse_paragraphs_become_lines() {
        let doc = fixtures::document_xml(&["First", "Second"]);
        let xml = String::from_utf8(doc.to_bytes("document.xml").unwrap()).unwrap();
        assert_eq!(parse_docx_xml(&xml).unwrap(), "First\nSecond\n");
    }

    #[test]
    fn test_keyword_pattern_prefers_longer_phrase() {
        let pattern =
            keyword_pattern(&["rust".to_string(), "rust pipeline".to_string()]).unwrap();
        let found: Vec<&str> = pattern
            .find_iter("A Rust Pipeline in rust")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(found, ["Rust Pipeline", "rust"]);
    }

    #[test]
    fn test_keyword_pattern_escapes_and_skips_empty() {
        assert!(keyword_pattern(&["".to_string(), "  ".to_string()]).is_none());
        let pattern = keyword_pattern(&["c++".to_string()]).unwrap();
        assert!(pattern.is_match("I like C++"));
    }

    #[test]
    fn test_bold_keywords_splits_runs() {
        let mut doc = fixtures::document_xml(&["The quick brown fox", "nothing here"]);
        let pattern = keyword_pattern(&["QUICK".to_string(), "fox".to_string()]).unwrap();

        assert_eq!(bold_keywords(&mut doc, &pattern), 2);
        assert_eq!(
            runs(&doc),
            vec![
                ("The ".to_string(), false),
                ("quick".to_string(), true),
                (" brown ".to_string(), false),
                ("fox".to_string(), true),
                ("nothing here".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_bold_keywords_skips_complex_paragraphs() {
        let mut doc = fixtures::document_xml(&["keyword"]);
        let paragraph = doc.root.child_mut("body").unwrap().child_mut("p").unwrap();
        paragraph
            .children
            .push(XmlNode::Element(XmlElement::new("w:hyperlink")));

        let pattern = keyword_pattern(&["keyword".to_string()]).unwrap();
        assert_eq!(bold_keywords(&mut doc, &pattern), 0);
    }

    #[test]
    fn test_bold_keywords_japanese_text() {
        let mut doc = fixtures::document_xml(&["文書処理の自動化"]);
        let pattern = keyword_pattern(&["自動化".to_string()]).unwrap();
        assert_eq!(bold_keywords(&mut doc, &pattern), 1);
        assert_eq!(
            runs(&doc),
            vec![
                ("文書処理の".to_string(), false),
                ("自動化".to_string(), true)
            ]
        );
    }
}
