//! Centered `PAGE` field footers.
//!
//! A new footer part is added to the package, wired up through a document
//! relationship and a content-type override, and referenced as the default
//! footer of every section.

use super::package::{DocxPackage, CONTENT_TYPES_PART, DOCUMENT_PART, DOCUMENT_RELS_PART};
use super::xml::{XmlDocument, XmlElement};
use super::{sections_mut, SECT_PR_ORDER, W_NS};
use crate::error::TransformError;

const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const FOOTER_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
const FOOTER_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml";
const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

pub fn add_page_numbers(package: &mut DocxPackage) -> Result<(), TransformError> {
    let footer_name = next_footer_name(package);
    let footer_part = format!("word/{}", footer_name);

    let rel_id = add_relationship(package, &footer_name)?;
    add_content_type_override(package, &footer_part)?;

    let footer = XmlDocument::parse(&footer_part, &footer_xml())?;
    package.set_xml_part(&footer_part, &footer)?;

    let mut document = package.xml_part(DOCUMENT_PART)?;
    if document.root.attr("xmlns:r").is_none() {
        document.root.set_attr("xmlns:r", R_NS);
    }
    sections_mut(&mut document.root, &mut |sect| {
        sect.remove_children(|child| {
            child.is("footerReference") && child.attr("w:type") == Some("default")
        });
        let reference = XmlElement::new("w:footerReference")
            .with_attr("w:type", "default")
            .with_attr("r:id", &rel_id);
        sect.insert_ordered(reference, SECT_PR_ORDER);
    });
    package.set_xml_part(DOCUMENT_PART, &document)
}

fn next_footer_name(package: &DocxPackage) -> String {
    (1..)
        .map(|n| format!("footer{}.xml", n))
        .find(|name| !package.has_part(&format!("word/{}", name)))
        .unwrap_or_else(|| "footer_docops.xml".to_string())
}

fn add_relationship(package: &mut DocxPackage, target: &str) -> Result<String, TransformError> {
    let mut rels = if package.has_part(DOCUMENT_RELS_PART) {
        package.xml_part(DOCUMENT_RELS_PART)?
    } else {
        XmlDocument::parse(
            DOCUMENT_RELS_PART,
            &format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{}"/>"#, RELS_NS),
        )?
    };

    let used: Vec<String> = rels
        .root
        .elements()
        .filter_map(|rel| rel.attr("Id").map(str::to_string))
        .collect();
    let rel_id = (1..)
        .map(|n| format!("rId{}", n))
        .find(|id| !used.contains(id))
        .unwrap_or_else(|| "rIdDocops".to_string());

    rels.root.children.push(super::xml::XmlNode::Element(
        XmlElement::new("Relationship")
            .with_attr("Id", &rel_id)
            .with_attr("Type", FOOTER_REL_TYPE)
            .with_attr("Target", target),
    ));
    package.set_xml_part(DOCUMENT_RELS_PART, &rels)?;
    Ok(rel_id)
}

fn add_content_type_override(package: &mut DocxPackage, part: &str) -> Result<(), TransformError> {
    let mut types = package.xml_part(CONTENT_TYPES_PART)?;
    let part_name = format!("/{}", part);
    let exists = types
        .root
        .elements()
        .any(|e| e.is("Override") && e.attr("PartName") == Some(part_name.as_str()));
    if !exists {
        types.root.children.push(super::xml::XmlNode::Element(
            XmlElement::new("Override")
                .with_attr("PartName", &part_name)
                .with_attr("ContentType", FOOTER_CONTENT_TYPE),
        ));
    }
    package.set_xml_part(CONTENT_TYPES_PART, &types)
}

fn footer_xml() -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:ftr xmlns:w="{w}" xmlns:r="{r}">"#,
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr>"#,
            r#"<w:r><w:fldChar w:fldCharType="begin"/></w:r>"#,
            r#"<w:r><w:instrText xml:space="preserve"> PAGE </w:instrText></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="separate"/></w:r>"#,
            r#"<w:r><w:t>1</w:t></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="end"/></w:r>"#,
            r#"</w:p></w:ftr>"#
        ),
        w = W_NS,
        r = R_NS
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::docx::fixtures;
    use tempfile::TempDir;

    fn package_with(paragraphs: &[&str]) -> (TempDir, DocxPackage) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("in.docx");
        fixtures::write_docx(&path, paragraphs);
        let package = DocxPackage::open(&path).unwrap();
        (temp, package)
    }

    #[test]
    fn test_add_page_numbers_wires_footer() {
        let (_temp, mut package) = package_with(&["Page one"]);
        add_page_numbers(&mut package).unwrap();

        let footer = package.xml_part("word/footer1.xml").unwrap();
        let instr = footer.root.descendants("instrText");
        assert_eq!(instr[0].plain_text().as_deref(), Some(" PAGE "));
        assert_eq!(
            footer.root.descendants("jc")[0].attr("w:val"),
            Some("center")
        );

        let rels = package.xml_part(DOCUMENT_RELS_PART).unwrap();
        let rel = rels
            .root
            .elements()
            .find(|r| r.attr("Target") == Some("footer1.xml"))
            .unwrap();
        let rel_id = rel.attr("Id").unwrap().to_string();
        assert_eq!(rel.attr("Type"), Some(FOOTER_REL_TYPE));

        let types = package.xml_part(CONTENT_TYPES_PART).unwrap();
        assert!(types
            .root
            .elements()
            .any(|e| e.attr("PartName") == Some("/word/footer1.xml")));

        let document = package.xml_part(DOCUMENT_PART).unwrap();
        assert_eq!(document.root.attr("xmlns:r"), Some(R_NS));
        let sect = document.root.descendants("sectPr")[0];
        let first = sect.elements().next().unwrap();
        assert!(first.is("footerReference"));
        assert_eq!(first.attr("r:id"), Some(rel_id.as_str()));
    }

    #[test]
    fn test_add_page_numbers_twice_uses_new_part_and_single_reference() {
        let (_temp, mut package) = package_with(&["Page one"]);
        add_page_numbers(&mut package).unwrap();
        add_page_numbers(&mut package).unwrap();

        assert!(package.has_part("word/footer2.xml"));
        let document = package.xml_part(DOCUMENT_PART).unwrap();
        let sect = document.root.descendants("sectPr")[0];
        assert_eq!(sect.elements().filter(|e| e.is("footerReference")).count(), 1);
    }
}
