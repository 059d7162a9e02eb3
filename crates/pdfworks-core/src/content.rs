//! Drawing overlays onto existing pages
//!
//! A [`PageOverlay`] collects drawing operations in *displayed* page space:
//! origin at the bottom-left corner of the page as a viewer shows it, after
//! the crop box and `/Rotate` are applied. On [`PageOverlay::apply`] the
//! operations are wrapped in a transform back to user space and appended
//! after the page's existing content, which is isolated in its own `q`/`Q`
//! pair so its graphics state cannot leak into the overlay.

use crate::coords::{PageSize, PdfRect};
use crate::document::{inherited_attribute, page_frame, real, resolve, rotation};
use crate::error::PdfWorksError;
use crate::text::{encode_win_ansi, text_width, StandardFont};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::HashMap;

/// RGB color with components in 0-1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB`, `RRGGBB` or `#RGB`; anything else is black
    pub fn from_hex(color: &str) -> Self {
        let hex = color.trim().trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).unwrap_or(0) as f32 / 255.0;
        if hex.len() >= 6 && hex.is_char_boundary(6) {
            Color::rgb(channel(&hex[0..2]), channel(&hex[2..4]), channel(&hex[4..6]))
        } else if hex.len() == 3 && hex.is_ascii() {
            let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
            Color::rgb(expand(0), expand(1), expand(2))
        } else {
            Color::BLACK
        }
    }

    fn operands(&self) -> Vec<Object> {
        vec![
            Object::Real(self.r),
            Object::Real(self.g),
            Object::Real(self.b),
        ]
    }
}

/// A standard-14 font dictionary using WinAnsi encoding
pub fn font_dictionary(font: StandardFont) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn win_ansi_string(text: &str) -> Object {
    Object::String(encode_win_ansi(text), StringFormat::Hexadecimal)
}

/// Affine matrix `[a b c d e f]` mapping displayed space to user space
fn display_matrix(frame: PdfRect, rotation: i64) -> [f64; 6] {
    let PdfRect {
        x,
        y,
        width: w,
        height: h,
    } = frame;
    match rotation {
        90 => [0.0, 1.0, -1.0, 0.0, x + w, y],
        180 => [-1.0, 0.0, 0.0, -1.0, x + w, y + h],
        270 => [0.0, -1.0, 1.0, 0.0, x, y + h],
        _ => [1.0, 0.0, 0.0, 1.0, x, y],
    }
}

fn transform_point(m: &[f64; 6], x: f64, y: f64) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

pub struct PageOverlay {
    frame: PdfRect,
    rotation: i64,
    operations: Vec<Operation>,
    fonts: Vec<(String, StandardFont)>,
    opacities: Vec<(String, f64)>,
    images: Vec<(String, ObjectId)>,
    annotations: Vec<Dictionary>,
}

impl PageOverlay {
    pub fn for_page(doc: &Document, page_id: ObjectId) -> Self {
        Self::with_frame(page_frame(doc, page_id), rotation(doc, page_id))
    }

    pub fn with_frame(frame: PdfRect, rotation: i64) -> Self {
        Self {
            frame,
            rotation,
            operations: Vec::new(),
            fonts: Vec::new(),
            opacities: Vec::new(),
            images: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Page size as displayed
    pub fn size(&self) -> PageSize {
        match self.rotation {
            90 | 270 => PageSize::new(self.frame.height, self.frame.width),
            _ => self.frame.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.annotations.is_empty()
    }

    /// Map a displayed-space rectangle into user space (for annotation `/Rect`)
    pub fn to_user_rect(&self, rect: PdfRect) -> PdfRect {
        let m = display_matrix(self.frame, self.rotation);
        let (x0, y0) = transform_point(&m, rect.x, rect.y);
        let (x1, y1) = transform_point(&m, rect.right(), rect.top());
        PdfRect::from_box([x0, y0, x1, y1])
    }

    fn font(&mut self, font: StandardFont) -> String {
        if let Some((name, _)) = self.fonts.iter().find(|(_, f)| *f == font) {
            return name.clone();
        }
        let name = format!("PWF{}", self.fonts.len() + 1);
        self.fonts.push((name.clone(), font));
        name
    }

    fn opacity(&mut self, opacity: f64) {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity >= 1.0 {
            return;
        }
        let name = match self
            .opacities
            .iter()
            .find(|(_, o)| (*o - opacity).abs() < 1e-6)
        {
            Some((name, _)) => name.clone(),
            None => {
                let name = format!("PWGS{}", self.opacities.len() + 1);
                self.opacities.push((name.clone(), opacity));
                name
            }
        };
        self.push("gs", vec![Object::Name(name.into_bytes())]);
    }

    fn image_name(&mut self, id: ObjectId) -> String {
        if let Some((name, _)) = self.images.iter().find(|(_, i)| *i == id) {
            return name.clone();
        }
        let name = format!("PWIm{}", self.images.len() + 1);
        self.images.push((name.clone(), id));
        name
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    fn rotate_about(&mut self, cx: f64, cy: f64, degrees: f64) {
        let (sin, cos) = degrees.to_radians().sin_cos();
        self.push(
            "cm",
            vec![real(cos), real(sin), real(-sin), real(cos), real(cx), real(cy)],
        );
    }

    pub fn fill_rect(&mut self, rect: PdfRect, color: Color, opacity: f64) {
        self.push("q", vec![]);
        self.opacity(opacity);
        self.push("rg", color.operands());
        self.push(
            "re",
            vec![real(rect.x), real(rect.y), real(rect.width), real(rect.height)],
        );
        self.push("f", vec![]);
        self.push("Q", vec![]);
    }

    pub fn stroke_rect(&mut self, rect: PdfRect, color: Color, line_width: f64, opacity: f64) {
        self.push("q", vec![]);
        self.opacity(opacity);
        self.push("RG", color.operands());
        self.push("w", vec![real(line_width)]);
        self.push(
            "re",
            vec![real(rect.x), real(rect.y), real(rect.width), real(rect.height)],
        );
        self.push("S", vec![]);
        self.push("Q", vec![]);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: Color, width: f64, opacity: f64) {
        self.push("q", vec![]);
        self.opacity(opacity);
        self.push("RG", color.operands());
        self.push("w", vec![real(width)]);
        self.push("m", vec![real(x1), real(y1)]);
        self.push("l", vec![real(x2), real(y2)]);
        self.push("S", vec![]);
        self.push("Q", vec![]);
    }

    /// One line of text with its baseline starting at `(x, y)`
    #[allow(clippy::too_many_arguments)]
    pub fn text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        font: StandardFont,
        size: f64,
        color: Color,
        opacity: f64,
    ) {
        let font_name = self.font(font);
        self.push("q", vec![]);
        self.opacity(opacity);
        self.push("BT", vec![]);
        self.push("Tf", vec![Object::Name(font_name.into_bytes()), real(size)]);
        self.push("rg", color.operands());
        self.push("Td", vec![real(x), real(y)]);
        self.push("Tj", vec![win_ansi_string(text)]);
        self.push("ET", vec![]);
        self.push("Q", vec![]);
    }

    /// One line of text centered on `(cx, cy)` and rotated counter-clockwise
    #[allow(clippy::too_many_arguments)]
    pub fn rotated_text(
        &mut self,
        text: &str,
        cx: f64,
        cy: f64,
        font: StandardFont,
        size: f64,
        color: Color,
        opacity: f64,
        degrees: f64,
    ) {
        let width = text_width(text, font, size);
        let font_name = self.font(font);
        self.push("q", vec![]);
        self.opacity(opacity);
        self.rotate_about(cx, cy, degrees);
        self.push("BT", vec![]);
        self.push("Tf", vec![Object::Name(font_name.into_bytes()), real(size)]);
        self.push("rg", color.operands());
        // cap height of the standard fonts is roughly 0.7 em
        self.push("Td", vec![real(-width / 2.0), real(-size * 0.35)]);
        self.push("Tj", vec![win_ansi_string(text)]);
        self.push("ET", vec![]);
        self.push("Q", vec![]);
    }

    /// Draw an image XObject into `rect`, rotated about the rect's center
    pub fn image(&mut self, image_id: ObjectId, rect: PdfRect, opacity: f64, degrees: f64) {
        let name = self.image_name(image_id);
        self.push("q", vec![]);
        self.opacity(opacity);
        if degrees.abs() > f64::EPSILON {
            self.rotate_about(rect.x + rect.width / 2.0, rect.y + rect.height / 2.0, degrees);
            self.push(
                "cm",
                vec![
                    real(rect.width),
                    real(0.0),
                    real(0.0),
                    real(rect.height),
                    real(-rect.width / 2.0),
                    real(-rect.height / 2.0),
                ],
            );
        } else {
            self.push(
                "cm",
                vec![
                    real(rect.width),
                    real(0.0),
                    real(0.0),
                    real(rect.height),
                    real(rect.x),
                    real(rect.y),
                ],
            );
        }
        self.push("Do", vec![Object::Name(name.into_bytes())]);
        self.push("Q", vec![]);
    }

    /// Attach an annotation dictionary; its `/Rect` must already be in user space
    pub fn annotation(&mut self, annotation: Dictionary) {
        self.annotations.push(annotation);
    }

    /// Write the overlay into the page
    pub fn apply(mut self, doc: &mut Document, page_id: ObjectId) -> Result<(), PdfWorksError> {
        if self.is_empty() {
            return Ok(());
        }

        let mut resources = match inherited_attribute(doc, page_id, b"Resources") {
            Some(Object::Dictionary(dict)) => dict,
            _ => Dictionary::new(),
        };
        let mut font_dict = sub_dictionary(doc, &resources, b"Font");
        let mut gs_dict = sub_dictionary(doc, &resources, b"ExtGState");
        let mut xobject_dict = sub_dictionary(doc, &resources, b"XObject");

        let mut renames: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();
        for (name, font) in &self.fonts {
            let unique = unique_name(&font_dict, name);
            let font_id = doc.add_object(font_dictionary(*font));
            font_dict.set(unique.clone(), Object::Reference(font_id));
            renames.insert(name.clone().into_bytes(), unique.into_bytes());
        }
        for (name, opacity) in &self.opacities {
            let unique = unique_name(&gs_dict, name);
            gs_dict.set(
                unique.clone(),
                dictionary! {
                    "Type" => "ExtGState",
                    "ca" => real(*opacity),
                    "CA" => real(*opacity),
                },
            );
            renames.insert(name.clone().into_bytes(), unique.into_bytes());
        }
        for (name, id) in &self.images {
            let unique = unique_name(&xobject_dict, name);
            xobject_dict.set(unique.clone(), Object::Reference(*id));
            renames.insert(name.clone().into_bytes(), unique.into_bytes());
        }

        for op in self.operations.iter_mut() {
            for operand in op.operands.iter_mut() {
                if let Object::Name(name) = operand {
                    if let Some(new_name) = renames.get(name.as_slice()) {
                        *name = new_name.clone();
                    }
                }
            }
        }

        if !font_dict.is_empty() {
            resources.set("Font", Object::Dictionary(font_dict));
        }
        if !gs_dict.is_empty() {
            resources.set("ExtGState", Object::Dictionary(gs_dict));
        }
        if !xobject_dict.is_empty() {
            resources.set("XObject", Object::Dictionary(xobject_dict));
        }

        let mut contents = existing_contents(doc, page_id)?;
        if !self.operations.is_empty() {
            let m = display_matrix(self.frame, self.rotation);
            let mut operations = vec![
                Operation::new("Q", vec![]),
                Operation::new("q", vec![]),
                Operation::new("cm", m.iter().map(|v| real(*v)).collect()),
            ];
            operations.append(&mut self.operations);
            operations.push(Operation::new("Q", vec![]));
            let overlay = Content { operations }.encode()?;

            let prefix_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));
            contents.insert(0, Object::Reference(prefix_id));
            contents.push(Object::Reference(overlay_id));
        }

        let mut annots = existing_annotations(doc, page_id);
        for mut annotation in self.annotations.drain(..) {
            annotation.set("P", Object::Reference(page_id));
            annots.push(Object::Reference(doc.add_object(annotation)));
        }

        let page = doc.get_dictionary_mut(page_id)?;
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Array(contents));
        if !annots.is_empty() {
            page.set("Annots", Object::Array(annots));
        }
        Ok(())
    }
}

fn sub_dictionary(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    resources
        .get(key)
        .ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

fn unique_name(dict: &Dictionary, base: &str) -> String {
    let mut candidate = base.to_string();
    let mut n = 1;
    while dict.has(candidate.as_bytes()) {
        candidate = format!("{}_{}", base, n);
        n += 1;
    }
    candidate
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, PdfWorksError> {
    let page = doc.get_dictionary(page_id)?;
    Ok(match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    })
}

fn existing_annotations(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    doc.get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{load_document, page_id, save_document};
    use crate::test_support::{create_test_pdf, create_test_pdf_with, page_content};

    #[test]
    fn test_color_from_hex() {
        assert_eq!(Color::from_hex("#FF0000"), Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(Color::from_hex("00ff00"), Color::rgb(0.0, 1.0, 0.0));
        assert_eq!(Color::from_hex("#fff"), Color::WHITE);
        assert_eq!(Color::from_hex("nope"), Color::BLACK);
    }

    #[test]
    fn test_display_matrix_corners() {
        let frame = PdfRect::new(0.0, 0.0, 612.0, 792.0);
        // displayed top-left of a page rotated 90 is user bottom-left
        let m = display_matrix(frame, 90);
        assert_eq!(transform_point(&m, 0.0, 612.0), (0.0, 0.0));
        let m = display_matrix(frame, 180);
        assert_eq!(transform_point(&m, 0.0, 0.0), (612.0, 792.0));
        let m = display_matrix(frame, 270);
        assert_eq!(transform_point(&m, 0.0, 0.0), (0.0, 792.0));
    }

    #[test]
    fn test_overlay_keeps_original_content() {
        let pdf = create_test_pdf(1, "Overlay");
        let mut doc = load_document(&pdf, None).unwrap();
        let id = page_id(&doc, 1).unwrap();

        let mut overlay = PageOverlay::for_page(&doc, id);
        overlay.text("STAMPED", 72.0, 72.0, StandardFont::Helvetica, 12.0, Color::BLACK, 0.5);
        overlay.apply(&mut doc, id).unwrap();
        let bytes = save_document(&mut doc).unwrap();

        let content = page_content(&bytes, 1);
        assert!(content.contains("Overlay-Page-1"));
        assert!(content.starts_with("q"));
        let text = load_document(&bytes, None).unwrap().extract_text(&[1]).unwrap();
        assert!(text.contains("STAMPED"), "{text:?}");
    }

    #[test]
    fn test_resource_names_do_not_collide() {
        let pdf = create_test_pdf(1, "Twice");
        let mut doc = load_document(&pdf, None).unwrap();
        let id = page_id(&doc, 1).unwrap();
        for font in [StandardFont::Helvetica, StandardFont::Courier] {
            let mut overlay = PageOverlay::for_page(&doc, id);
            overlay.text("x", 10.0, 10.0, font, 10.0, Color::BLACK, 1.0);
            overlay.apply(&mut doc, id).unwrap();
        }

        let page = doc.get_dictionary(id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = sub_dictionary(&doc, resources, b"Font");
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(b"PWF1"));
        assert!(fonts.has(b"PWF1_1"));
    }

    #[test]
    fn test_rotated_page_size_is_swapped() {
        let pdf = create_test_pdf_with(1, "Rot", |_, pages| {
            pages[0].set("Rotate", 90);
        });
        let doc = load_document(&pdf, None).unwrap();
        let id = page_id(&doc, 1).unwrap();
        let overlay = PageOverlay::for_page(&doc, id);
        assert_eq!(overlay.size(), PageSize::new(792.0, 612.0));

        let user = overlay.to_user_rect(PdfRect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(user, PdfRect::new(562.0, 0.0, 50.0, 100.0));
    }

    #[test]
    fn test_empty_overlay_is_noop() {
        let pdf = create_test_pdf(1, "Noop");
        let mut doc = load_document(&pdf, None).unwrap();
        let id = page_id(&doc, 1).unwrap();
        let before = doc.get_dictionary(id).unwrap().clone();
        PageOverlay::for_page(&doc, id).apply(&mut doc, id).unwrap();
        assert_eq!(
            format!("{:?}", doc.get_dictionary(id).unwrap()),
            format!("{:?}", before)
        );
    }
}
