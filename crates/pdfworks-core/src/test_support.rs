//! Synthetic documents and a fake renderer for unit tests

use crate::coords::PageSize;
use crate::error::PdfWorksError;
use crate::raster::PageRenderer;
use image::{Rgb, RgbImage};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// Create a simple PDF with N letter-size pages containing identifiable text
pub fn create_test_pdf(num_pages: u32, content_prefix: &str) -> Vec<u8> {
    create_test_pdf_with(num_pages, content_prefix, |_, _| {})
}

/// Like [`create_test_pdf`], letting the caller adjust the page tree root and
/// page dictionaries before they are stored
pub fn create_test_pdf_with<F>(num_pages: u32, content_prefix: &str, customize: F) -> Vec<u8>
where
    F: FnOnce(&mut Dictionary, &mut Vec<Dictionary>),
{
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => Object::Reference(font_id) },
    });

    let mut page_dicts = Vec::new();
    for page_num in 0..num_pages {
        let content = format!(
            "BT /F1 12 Tf 50 700 Td ({}-Page-{}) Tj ET",
            content_prefix,
            page_num + 1
        );
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        page_dicts.push(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
            "Resources" => Object::Reference(resources_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
    }

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Count" => num_pages as i64,
    };
    customize(&mut pages, &mut page_dicts);

    let kids: Vec<Object> = page_dicts
        .into_iter()
        .map(|dict| Object::Reference(doc.add_object(dict)))
        .collect();
    pages.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// A one-page PDF carrying a large, incompressible raw image stream
pub fn create_image_heavy_pdf(image_bytes: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let side = ((image_bytes / 3) as f64).sqrt().ceil() as u32;
    let mut state: u32 = 0x1234_5678;
    let data: Vec<u8> = (0..(side * side * 3))
        .map(|_| {
            // xorshift32 noise from a fixed seed
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xff) as u8
        })
        .collect();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => side as i64,
            "Height" => side as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        data,
    ));
    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        b"q 612 0 0 792 0 0 cm /Im1 Do Q".to_vec(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "Contents" => Object::Reference(content_id),
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im1" => Object::Reference(image_id) },
        },
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Minimal PNG of the given size and color
pub fn create_test_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Renderer that paints every page a flat color at the requested scale
pub struct FlatRenderer {
    pub color: [u8; 3],
    /// 0-based page indices that fail to render
    pub failing_pages: Vec<u32>,
}

impl Default for FlatRenderer {
    fn default() -> Self {
        Self {
            color: [250, 250, 250],
            failing_pages: Vec::new(),
        }
    }
}

impl FlatRenderer {
    fn page_size(bytes: &[u8], index: u32) -> Result<PageSize, PdfWorksError> {
        let doc = Document::load_mem(bytes).map_err(|e| PdfWorksError::ParseError(e.to_string()))?;
        let id = crate::document::page_id(&doc, index + 1)?;
        Ok(crate::document::page_frame(&doc, id).size())
    }
}

impl PageRenderer for FlatRenderer {
    fn page_count(&self, bytes: &[u8], _password: Option<&str>) -> Result<u32, PdfWorksError> {
        let doc = Document::load_mem(bytes).map_err(|e| PdfWorksError::ParseError(e.to_string()))?;
        Ok(doc.get_pages().len() as u32)
    }

    fn render_page(
        &self,
        bytes: &[u8],
        _password: Option<&str>,
        index: u32,
        scale: f64,
    ) -> Result<RgbImage, PdfWorksError> {
        if self.failing_pages.contains(&index) {
            return Err(PdfWorksError::RenderError(format!("page {} is broken", index)));
        }
        let size = Self::page_size(bytes, index)?;
        let w = ((size.width * scale).round() as u32).max(1);
        let h = ((size.height * scale).round() as u32).max(1);
        Ok(RgbImage::from_pixel(w, h, Rgb(self.color)))
    }
}

/// Concatenated, decompressed content of a page
pub fn page_content(bytes: &[u8], page: u32) -> String {
    let doc = Document::load_mem(bytes).unwrap();
    let id = doc.get_pages()[&page];
    String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned()
}
