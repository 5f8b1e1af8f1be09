//! Visual edits: page background, run color and run font.

use super::xml::{XmlDocument, XmlElement, XmlNode};
use super::RPR_ORDER;
use crate::operation::HexColor;

/// Elements that may precede `w:displayBackgroundShape` in `w:settings`.
const SETTINGS_ORDER: &[&str] = &[
    "writeProtection",
    "view",
    "zoom",
    "removePersonalInformation",
    "removeDateAndTime",
    "doNotDisplayPageBoundaries",
    "displayBackgroundShape",
    "printPostScriptOverText",
    "printFractionalCharacterWidth",
    "printFormsData",
    "embedTrueTypeFonts",
    "embedSystemFonts",
    "saveSubsetFonts",
    "saveFormsData",
    "mirrorMargins",
    "alignBordersAndEdges",
    "bordersDoNotSurroundHeader",
    "bordersDoNotSurroundFooter",
    "gutterAtTop",
    "hideSpellingErrors",
    "hideGrammaticalErrors",
    "proofState",
    "defaultTabStop",
];

/// Sets `w:background` on the document root; it must precede `w:body`.
pub fn set_page_color(document: &mut XmlDocument, color: HexColor) {
    let root = &mut document.root;
    if let Some(background) = root.child_mut("background") {
        background.set_attr("w:color", &color.to_hex());
        return;
    }

    let background = XmlElement::new("w:background").with_attr("w:color", &color.to_hex());
    let index = root
        .children
        .iter()
        .position(|n| matches!(n, XmlNode::Element(_)))
        .unwrap_or(root.children.len());
    root.children.insert(index, XmlNode::Element(background));
}

/// Word only renders the background when the settings part asks for it.
pub fn enable_background_display(settings: &mut XmlDocument) {
    settings
        .root
        .ensure_child("w:displayBackgroundShape", SETTINGS_ORDER);
}

/// Applies `f` to the run properties of every run, creating `w:rPr` as the
/// first child where missing.
fn for_each_run_properties(document: &mut XmlDocument, f: &mut dyn FnMut(&mut XmlElement)) {
    document.root.for_each_descendant_mut(&mut |element| {
        if element.name != "w:r" {
            return;
        }
        if element.child("rPr").is_none() {
            element
                .children
                .insert(0, XmlNode::Element(XmlElement::new("w:rPr")));
        }
        if let Some(rpr) = element.child_mut("rPr") {
            f(rpr);
        }
    });
}

pub fn set_text_color(document: &mut XmlDocument, color: HexColor) {
    let hex = color.to_hex();
    for_each_run_properties(document, &mut |rpr| {
        let color_el = rpr.ensure_child("w:color", RPR_ORDER);
        color_el.set_attr("w:val", &hex);
        color_el.remove_attr("w:themeColor");
        color_el.remove_attr("w:themeShade");
        color_el.remove_attr("w:themeTint");
    });
}

pub fn set_font_properties(document: &mut XmlDocument, font_name: Option<&str>, font_size_pt: Option<f64>) {
    let half_points = font_size_pt.map(|pt| ((pt * 2.0).round() as i64).to_string());

    for_each_run_properties(document, &mut |rpr| {
        if let Some(name) = font_name {
            let fonts = rpr.ensure_child("w:rFonts", RPR_ORDER);
            for attr in ["w:ascii", "w:hAnsi", "w:eastAsia", "w:cs"] {
                fonts.set_attr(attr, name);
            }
            for theme_attr in ["w:asciiTheme", "w:hAnsiTheme", "w:eastAsiaTheme", "w:cstheme"] {
                fonts.remove_attr(theme_attr);
            }
        }
        if let Some(ref size) = half_points {
            rpr.ensure_child("w:sz", RPR_ORDER).set_attr("w:val", size);
            rpr.ensure_child("w:szCs", RPR_ORDER).set_attr("w:val", size);
        }
    });
}
