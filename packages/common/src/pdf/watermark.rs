use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use super::error::PdfError;

/// Stamp text burned diagonally across every page of a perusal copy.
const PERUSAL_STAMP_TEXT: &str = "PERUSAL COPY - NOT FOR PERFORMANCE";

/// Vertical margin for header/footer placements, in points.
const EDGE_MARGIN: f32 = 24.0;

/// Line spacing added on top of the font size in multi-line blocks.
const LINE_GAP: f32 = 3.0;

/// An RGB color with components in `0..=1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// Where overlay text is placed on each page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Rotated through the page center.
    Diagonal,
    /// Horizontally centered near the top margin.
    Header,
    /// Horizontally centered near the bottom margin.
    Footer,
    /// Unrotated page center.
    Center,
}

/// Options for a single watermark pass.
#[derive(Clone, Debug)]
pub struct WatermarkOptions {
    pub text: String,
    pub font_size: f32,
    /// Alpha in `0..=1`; values outside the range are clamped.
    pub opacity: f32,
    pub color: Rgb,
    /// Rotation in degrees; only used for [`Placement::Diagonal`].
    pub rotation_degrees: f32,
    pub placement: Placement,
}

/// Watermark content for a perusal delivery.
#[derive(Clone, Debug)]
pub struct PerusalStamp {
    pub organization: String,
    pub contact_email: String,
}

/// Watermark content for a licensed full-script delivery.
#[derive(Clone, Debug)]
pub struct LicenseStamp {
    pub theater: String,
    pub license_type: String,
    pub license_id: String,
    pub performance_dates: Vec<String>,
}

/// Overlay `opts` onto every page and re-serialize.
///
/// Pure: the same input bytes and options always produce the same output
/// bytes. The page count is never changed; a zero-page document round-trips
/// untouched.
pub fn watermark(pdf: &[u8], opts: &WatermarkOptions) -> Result<Vec<u8>, PdfError> {
    let mut doc = load_document(pdf)?;
    apply_watermark(&mut doc, opts)?;
    serialize(&mut doc)
}

/// Parse the document and return its page count.
pub fn page_count(pdf: &[u8]) -> Result<usize, PdfError> {
    Ok(load_document(pdf)?.get_pages().len())
}

/// Stamp a perusal copy: a prominent red diagonal notice across every page,
/// plus a small footer identifying the requesting organization.
pub fn perusal_watermark(pdf: &[u8], stamp: &PerusalStamp) -> Result<Vec<u8>, PdfError> {
    let mut doc = load_document(pdf)?;
    apply_watermark(
        &mut doc,
        &WatermarkOptions {
            text: PERUSAL_STAMP_TEXT.to_string(),
            font_size: 42.0,
            opacity: 0.35,
            color: Rgb::new(0.8, 0.1, 0.1),
            rotation_degrees: 45.0,
            placement: Placement::Diagonal,
        },
    )?;
    let footer = if stamp.contact_email.is_empty() {
        format!("Perusal copy prepared for {}", stamp.organization)
    } else {
        format!(
            "Perusal copy prepared for {} <{}>",
            stamp.organization, stamp.contact_email
        )
    };
    apply_watermark(
        &mut doc,
        &WatermarkOptions {
            text: footer,
            font_size: 8.0,
            opacity: 0.8,
            color: Rgb::new(0.25, 0.25, 0.25),
            rotation_degrees: 0.0,
            placement: Placement::Footer,
        },
    )?;
    serialize(&mut doc)
}

/// Stamp a licensed copy: a compact header block on the first page and a
/// faint forensic diagonal mark on all pages.
pub fn license_watermark(pdf: &[u8], stamp: &LicenseStamp) -> Result<Vec<u8>, PdfError> {
    let mut doc = load_document(pdf)?;

    let mut lines = vec![
        format!("Licensed to: {}", stamp.theater),
        format!("License: {} ({})", stamp.license_type, stamp.license_id),
    ];
    if !stamp.performance_dates.is_empty() {
        lines.push(format!(
            "Performances: {}",
            stamp.performance_dates.join(", ")
        ));
    }
    draw_first_page_block(&mut doc, &lines, 9.0)?;

    apply_watermark(
        &mut doc,
        &WatermarkOptions {
            text: format!("{} - {}", stamp.theater, stamp.license_id),
            font_size: 36.0,
            opacity: 0.1,
            color: Rgb::new(0.3, 0.3, 0.3),
            rotation_degrees: 45.0,
            placement: Placement::Diagonal,
        },
    )?;
    serialize(&mut doc)
}

pub(super) fn load_document(pdf: &[u8]) -> Result<Document, PdfError> {
    let doc = Document::load_mem(pdf).map_err(|e| PdfError::Malformed(e.to_string()))?;
    if doc.is_encrypted() {
        return Err(PdfError::Encrypted);
    }
    Ok(doc)
}

pub(super) fn serialize(doc: &mut Document) -> Result<Vec<u8>, PdfError> {
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| PdfError::Serialize(e.to_string()))?;
    Ok(out)
}

/// Apply one watermark pass to every page of an already-loaded document.
fn apply_watermark(doc: &mut Document, opts: &WatermarkOptions) -> Result<(), PdfError> {
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Ok(());
    }

    let opacity = opts.opacity.clamp(0.0, 1.0);
    let font_size = opts.font_size.max(1.0);
    let (font_name, font_id, gs_name, gs_id) = alloc_overlay_resources(doc, opacity);

    for page_id in pages {
        add_page_resources(doc, page_id, &font_name, font_id, &gs_name, gs_id)?;
        let rect = page_rect(doc, page_id);
        let operations = stamp_operations(opts, font_size, rect, &font_name, &gs_name);
        append_content(doc, page_id, operations)?;
    }
    Ok(())
}

/// Draw a small multi-line text block near the top-left of the first page.
/// A no-op on zero-page documents.
fn draw_first_page_block(
    doc: &mut Document,
    lines: &[String],
    font_size: f32,
) -> Result<(), PdfError> {
    let Some(page_id) = doc.get_pages().into_values().next() else {
        return Ok(());
    };

    let (font_name, font_id, gs_name, gs_id) = alloc_overlay_resources(doc, 0.85);
    add_page_resources(doc, page_id, &font_name, font_id, &gs_name, gs_id)?;

    let (x0, y0, _, height) = page_rect(doc, page_id);
    let line_height = font_size + LINE_GAP;

    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(gs_name.into_bytes())]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font_name.into_bytes()), font_size.into()],
        ),
        Operation::new("rg", vec![0.1_f32.into(), 0.1_f32.into(), 0.1_f32.into()]),
        Operation::new(
            "Tm",
            vec![
                1.0_f32.into(),
                0.0_f32.into(),
                0.0_f32.into(),
                1.0_f32.into(),
                (x0 + 36.0).into(),
                (y0 + height - EDGE_MARGIN - font_size).into(),
            ],
        ),
    ];
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            operations.push(Operation::new(
                "Td",
                vec![0.0_f32.into(), (-line_height).into()],
            ));
        }
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(line.as_str())],
        ));
    }
    operations.push(Operation::new("ET", vec![]));
    operations.push(Operation::new("Q", vec![]));

    append_content(doc, page_id, operations)
}

/// Allocate the shared font and graphics-state objects for one overlay pass.
/// Resource names embed the object number so repeated passes never collide.
fn alloc_overlay_resources(doc: &mut Document, opacity: f32) -> (String, ObjectId, String, ObjectId) {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let gs_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => opacity,
        "CA" => opacity,
    });
    (
        format!("Fwm{}", font_id.0),
        font_id,
        format!("Gwm{}", gs_id.0),
        gs_id,
    )
}

/// Build the content-stream operations for one stamped page.
fn stamp_operations(
    opts: &WatermarkOptions,
    font_size: f32,
    rect: (f32, f32, f32, f32),
    font_name: &str,
    gs_name: &str,
) -> Vec<Operation> {
    let (x0, y0, width, height) = rect;
    // Helvetica averages roughly half an em per glyph; close enough to
    // center a stamp without measuring glyph widths.
    let approx_width = 0.5 * font_size * opts.text.chars().count() as f32;

    let theta = match opts.placement {
        Placement::Diagonal => opts.rotation_degrees.to_radians(),
        _ => 0.0,
    };
    let (sin, cos) = theta.sin_cos();

    let (tx, ty) = match opts.placement {
        Placement::Diagonal | Placement::Center => {
            let cx = x0 + width / 2.0;
            let cy = y0 + height / 2.0;
            (
                cx - approx_width / 2.0 * cos,
                cy - approx_width / 2.0 * sin,
            )
        }
        Placement::Header => (
            x0 + (width - approx_width) / 2.0,
            y0 + height - EDGE_MARGIN - font_size,
        ),
        Placement::Footer => (x0 + (width - approx_width) / 2.0, y0 + EDGE_MARGIN),
    };

    vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(gs_name.as_bytes().to_vec())]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font_name.as_bytes().to_vec()), font_size.into()],
        ),
        Operation::new(
            "rg",
            vec![opts.color.r.into(), opts.color.g.into(), opts.color.b.into()],
        ),
        Operation::new(
            "Tm",
            vec![
                cos.into(),
                sin.into(),
                (-sin).into(),
                cos.into(),
                tx.into(),
                ty.into(),
            ],
        ),
        Operation::new("Tj", vec![Object::string_literal(opts.text.as_str())]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Walk the page's `Parent` chain looking for an (optionally inherited)
/// dictionary entry.
fn inherited_entry(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..32 {
        let dict = doc.get_object(current).and_then(Object::as_dict).ok()?;
        if let Ok(obj) = dict.get(key) {
            return Some(obj.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Resolve an entry to an owned dictionary, following one reference level.
fn as_owned_dict(doc: &Document, obj: Option<Object>) -> Dictionary {
    match obj {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => doc
            .get_object(id)
            .and_then(Object::as_dict)
            .map(Clone::clone)
            .unwrap_or_default(),
        _ => Dictionary::new(),
    }
}

/// Register the overlay font and graphics state in the page's resources.
///
/// Inherited or shared resource dictionaries are cloned into a page-level
/// dictionary first so sibling pages are never mutated through a shared
/// reference.
fn add_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
    font_name: &str,
    font_id: ObjectId,
    gs_name: &str,
    gs_id: ObjectId,
) -> Result<(), PdfError> {
    let mut resources = as_owned_dict(doc, inherited_entry(doc, page_id, b"Resources"));

    let mut fonts = as_owned_dict(doc, resources.get(b"Font").ok().cloned());
    fonts.set(font_name, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let mut states = as_owned_dict(doc, resources.get(b"ExtGState").ok().cloned());
    states.set(gs_name, Object::Reference(gs_id));
    resources.set("ExtGState", Object::Dictionary(states));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfError::Malformed(e.to_string()))?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Resolve the page rectangle `(x0, y0, width, height)` from the (possibly
/// inherited) MediaBox, defaulting to US Letter.
fn page_rect(doc: &Document, page_id: ObjectId) -> (f32, f32, f32, f32) {
    if let Some(obj) = inherited_entry(doc, page_id, b"MediaBox") {
        let resolved = match &obj {
            Object::Reference(id) => doc.get_object(*id).ok().cloned().unwrap_or(obj.clone()),
            _ => obj.clone(),
        };
        if let Ok(values) = resolved.as_array() {
            let nums: Vec<f32> = values.iter().filter_map(number).collect();
            if nums.len() == 4 {
                return (nums[0], nums[1], nums[2] - nums[0], nums[3] - nums[1]);
            }
        }
    }
    (0.0, 0.0, 612.0, 792.0)
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// Append an overlay content stream after the page's existing content.
fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), PdfError> {
    let encoded = Content { operations }
        .encode()
        .map_err(|e| PdfError::Serialize(e.to_string()))?;
    let stream_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let existing = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| PdfError::Malformed(e.to_string()))?
        .get(b"Contents")
        .ok()
        .cloned();

    let contents = match existing {
        Some(Object::Array(mut items)) => {
            items.push(Object::Reference(stream_id));
            Object::Array(items)
        }
        Some(reference @ Object::Reference(_)) => {
            Object::Array(vec![reference, Object::Reference(stream_id)])
        }
        Some(direct) => {
            // A direct content stream must become an indirect object before
            // it can sit in a Contents array.
            let moved = doc.add_object(direct);
            Object::Array(vec![Object::Reference(moved), Object::Reference(stream_id)])
        }
        None => Object::Reference(stream_id),
    };

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfError::Malformed(e.to_string()))?;
    page.set("Contents", contents);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{build_pdf, page_texts};
    use super::*;

    fn test_options(text: &str) -> WatermarkOptions {
        WatermarkOptions {
            text: text.to_string(),
            font_size: 24.0,
            opacity: 0.5,
            color: Rgb::new(0.5, 0.5, 0.5),
            rotation_degrees: 45.0,
            placement: Placement::Diagonal,
        }
    }

    #[test]
    fn watermark_preserves_page_count() {
        let input = build_pdf(3);
        let output = watermark(&input, &test_options("CONFIDENTIAL")).unwrap();
        assert_eq!(page_count(&output).unwrap(), 3);
    }

    #[test]
    fn watermark_reaches_every_page() {
        let input = build_pdf(4);
        let output = watermark(&input, &test_options("CONFIDENTIAL")).unwrap();
        for text in page_texts(&output) {
            assert!(text.contains("CONFIDENTIAL"));
        }
    }

    #[test]
    fn watermark_keeps_original_content() {
        let input = build_pdf(2);
        let output = watermark(&input, &test_options("STAMP")).unwrap();
        let texts = page_texts(&output);
        assert!(texts[0].contains("Page 1"));
        assert!(texts[1].contains("Page 2"));
    }

    #[test]
    fn watermark_is_deterministic() {
        let input = build_pdf(2);
        let opts = test_options("STAMP");
        let first = watermark(&input, &opts).unwrap();
        let second = watermark(&input, &opts).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn watermark_rejects_garbage() {
        let result = watermark(b"definitely not a pdf", &test_options("X"));
        assert!(matches!(result, Err(PdfError::Malformed(_))));
    }

    #[test]
    fn zero_page_document_round_trips() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut empty = Vec::new();
        doc.save_to(&mut empty).unwrap();

        let output = watermark(&empty, &test_options("STAMP")).unwrap();
        assert_eq!(page_count(&output).unwrap(), 0);
    }

    #[test]
    fn header_and_footer_placements_land_on_every_page() {
        for placement in [Placement::Header, Placement::Footer, Placement::Center] {
            let mut opts = test_options("EDGE TEXT");
            opts.placement = placement;
            opts.rotation_degrees = 0.0;
            let output = watermark(&build_pdf(2), &opts).unwrap();
            for text in page_texts(&output) {
                assert!(text.contains("EDGE TEXT"));
            }
        }
    }

    #[test]
    fn perusal_watermark_stamps_and_footers_every_page() {
        let input = build_pdf(3);
        let stamp = PerusalStamp {
            organization: "Lantern Theater".to_string(),
            contact_email: "literary@lantern.example".to_string(),
        };
        let output = perusal_watermark(&input, &stamp).unwrap();
        assert_eq!(page_count(&output).unwrap(), 3);
        for text in page_texts(&output) {
            assert!(text.contains("PERUSAL COPY - NOT FOR PERFORMANCE"));
            assert!(text.contains("Lantern Theater"));
            assert!(text.contains("literary@lantern.example"));
        }
    }

    #[test]
    fn license_watermark_headers_first_page_only() {
        let input = build_pdf(3);
        let stamp = LicenseStamp {
            theater: "Riverside Players".to_string(),
            license_type: "standard".to_string(),
            license_id: "0193aaaa-1111-7abc-8000-000000000001".to_string(),
            performance_dates: vec!["2026-09-12 Main Stage".to_string()],
        };
        let output = license_watermark(&input, &stamp).unwrap();
        let texts = page_texts(&output);

        assert!(texts[0].contains("Licensed to: Riverside Players"));
        assert!(texts[0].contains("Performances: 2026-09-12 Main Stage"));
        assert!(!texts[1].contains("Licensed to:"));
        assert!(!texts[2].contains("Licensed to:"));

        // The faint forensic stamp still lands on every page.
        for text in &texts {
            assert!(text.contains("Riverside Players - 0193aaaa"));
        }
    }

    #[test]
    fn page_count_rejects_garbage() {
        assert!(matches!(
            page_count(b"nope"),
            Err(PdfError::Malformed(_))
        ));
    }
}
