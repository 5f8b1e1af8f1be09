use serde::{Deserialize, Serialize};

/// Millimetres to PDF points.
pub const MM_TO_POINTS: f64 = 2.83465;

const MM_PER_INCH: f64 = 25.4;
const TWIPS_PER_INCH: f64 = 1440.0;

/// Named page sizes in millimetres (width, height), portrait.
const NAMED_SIZES: &[(&str, f64, f64)] = &[
    ("A4", 210.0, 297.0),
    ("B5", 182.0, 257.0),
    ("A3", 297.0, 420.0),
    ("A5", 148.0, 210.0),
    ("LETTER", 215.9, 279.4),
    ("LEGAL", 215.9, 355.6),
    ("SHIROKUBAN", 127.0, 188.0),
    ("BUNKO", 105.0, 148.0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PageSize {
    pub fn new(width_mm: f64, height_mm: f64) -> Self {
        Self {
            width_mm,
            height_mm,
        }
    }

    /// Looks up a named size, case-insensitively.
    pub fn named(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        NAMED_SIZES
            .iter()
            .find(|(n, _, _)| *n == upper)
            .map(|&(_, w, h)| Self::new(w, h))
    }

    pub fn known_names() -> impl Iterator<Item = &'static str> {
        NAMED_SIZES.iter().map(|(n, _, _)| *n)
    }

    pub fn width_pt(&self) -> f64 {
        mm_to_points(self.width_mm)
    }

    pub fn height_pt(&self) -> f64 {
        mm_to_points(self.height_mm)
    }

    pub fn is_valid(&self) -> bool {
        self.width_mm.is_finite()
            && self.height_mm.is_finite()
            && self.width_mm > 0.0
            && self.height_mm > 0.0
    }
}

/// Either a named size (`"A4"`) or an explicit `[width_mm, height_mm]` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeIdentifier {
    Named(String),
    Dimensions([f64; 2]),
}

impl SizeIdentifier {
    pub fn resolve(&self) -> Option<PageSize> {
        let size = match self {
            Self::Named(name) => PageSize::named(name)?,
            Self::Dimensions([w, h]) => PageSize::new(*w, *h),
        };
        size.is_valid().then_some(size)
    }

    /// Error text for an identifier that [`resolve`](Self::resolve) rejected.
    pub fn unresolved_reason(&self) -> String {
        match self {
            Self::Named(name) => format!(
                "unknown page size '{}', expected one of {}",
                name,
                PageSize::known_names().collect::<Vec<_>>().join(", ")
            ),
            Self::Dimensions([w, h]) => format!("invalid page size {}x{} mm", w, h),
        }
    }
}

pub fn mm_to_points(mm: f64) -> f64 {
    mm * MM_TO_POINTS
}

pub fn points_to_mm(pt: f64) -> f64 {
    pt / MM_TO_POINTS
}

/// Millimetres to twentieths of a point, as used by WordprocessingML.
pub fn mm_to_twips(mm: f64) -> i64 {
    (mm * TWIPS_PER_INCH / MM_PER_INCH).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_reason_lists_names() {
        let reason = SizeIdentifier::Named("A9".into()).unresolved_reason();
        assert!(reason.contains("'A9'"));
        assert!(reason.contains("SHIROKUBAN"));
        assert_eq!(
            SizeIdentifier::Dimensions([0.0, 10.0]).unresolved_reason(),
            "invalid page size 0x10 mm"
        );
    }

    #[test]
    fn test_named_sizes_are_case_insensitive() {
        assert_eq!(PageSize::named("a4"), Some(PageSize::new(210.0, 297.0)));
        assert_eq!(PageSize::named(" Letter "), Some(PageSize::new(215.9, 279.4)));
        assert_eq!(PageSize::named("shirokuban"), Some(PageSize::new(127.0, 188.0)));
        assert_eq!(PageSize::named("B4"), None);
    }

    #[test]
    fn test_size_identifier_deserializes_both_shapes() {
        let named: SizeIdentifier = serde_json::from_str("\"A5\"").unwrap();
        assert_eq!(named.resolve(), Some(PageSize::new(148.0, 210.0)));

        let dims: SizeIdentifier = serde_json::from_str("[100, 150.5]").unwrap();
        assert_eq!(dims.resolve(), Some(PageSize::new(100.0, 150.5)));
    }

    #[test]
    fn test_size_identifier_rejects_invalid_dimensions() {
        assert_eq!(SizeIdentifier::Dimensions([0.0, 100.0]).resolve(), None);
        assert_eq!(SizeIdentifier::Named("unknown".into()).resolve(), None);
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(mm_to_twips(210.0), 11906);
        assert_eq!(mm_to_twips(297.0), 16838);
        assert!((mm_to_points(10.0) - 28.3465).abs() < 1e-9);
        assert!((points_to_mm(mm_to_points(42.0)) - 42.0).abs() < 1e-9);
    }
}
