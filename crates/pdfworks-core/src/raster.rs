//! Page rasterization seam and image-based document construction
//!
//! Rendering is delegated to a [`PageRenderer`]; with the `pdfium` feature a
//! libpdfium-backed implementation is available in [`pdfium`].

use crate::coords::{PageSize, PdfRect};
use crate::document::{
    displayed_size, inherited_attribute, load_document, page_frame, page_id, page_ids, real,
    remap_object_refs, DocumentBuilder,
};
use crate::error::PdfWorksError;
use crate::progress::ProgressReporter;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Renders pages of a PDF to RGB rasters.
///
/// `scale` is pixels per point: 1.0 renders at 72 dpi.
pub trait PageRenderer {
    fn page_count(&self, bytes: &[u8], password: Option<&str>) -> Result<u32, PdfWorksError>;

    /// Render the page at 0-based `index`
    fn render_page(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        index: u32,
        scale: f64,
    ) -> Result<RgbImage, PdfWorksError>;
}

/// Caps applied to every rasterization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterLimits {
    /// Largest raster side in pixels
    pub max_dimension_px: u32,
    /// Scale used when flattening
    pub flatten_scale: f64,
}

impl Default for RasterLimits {
    fn default() -> Self {
        Self {
            max_dimension_px: 4096,
            flatten_scale: 2.0,
        }
    }
}

/// Reduce `scale` so neither side of the rendered page exceeds the cap
pub fn bounded_scale(page: PageSize, scale: f64, limits: &RasterLimits) -> f64 {
    let longest = page.width.max(page.height);
    if longest <= 0.0 || scale <= 0.0 {
        return scale.max(0.0);
    }
    scale.min(limits.max_dimension_px as f64 / longest)
}

/// Encode as baseline JPEG; `quality` in 0-1
pub fn encode_jpeg(image: &RgbImage, quality: f64) -> Result<Vec<u8>, PdfWorksError> {
    let q = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, q)
        .encode_image(image)
        .map_err(|e| PdfWorksError::EncodeError(e.to_string()))?;
    Ok(buffer)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfWorksError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PdfWorksError::EncodeError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PdfWorksError::EncodeError(e.to_string()))
}

/// An image XObject added to a document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbeddedImage {
    pub id: ObjectId,
    pub width: u32,
    pub height: u32,
}

impl EmbeddedImage {
    /// Height over width
    pub fn aspect_ratio(&self) -> f64 {
        if self.width == 0 {
            1.0
        } else {
            self.height as f64 / self.width as f64
        }
    }
}

fn jpeg_xobject(jpeg: Vec<u8>, width: u32, height: u32, gray: bool) -> Stream {
    let mut stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => if gray { "DeviceGray" } else { "DeviceRGB" },
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    );
    stream.allows_compression = false;
    stream
}

/// Add a JPEG as a DCTDecode image without re-encoding it
pub fn embed_jpeg(doc: &mut Document, jpeg: Vec<u8>) -> Result<EmbeddedImage, PdfWorksError> {
    let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
        .map_err(|e| PdfWorksError::InvalidInput(format!("Invalid JPEG: {}", e)))?;
    let (width, height) = decoded.dimensions();
    let gray = matches!(decoded, DynamicImage::ImageLuma8(_));
    let id = doc.add_object(jpeg_xobject(jpeg, width, height, gray));
    Ok(EmbeddedImage { id, width, height })
}

/// JPEG-encode a rendered page and add it as an image
pub fn embed_raster(doc: &mut Document, image: &RgbImage, quality: f64) -> Result<EmbeddedImage, PdfWorksError> {
    let (width, height) = image.dimensions();
    let jpeg = encode_jpeg(image, quality)?;
    let id = doc.add_object(jpeg_xobject(jpeg, width, height, false));
    Ok(EmbeddedImage { id, width, height })
}

/// Add raw RGB pixels as a Flate-compressed image
pub fn embed_rgb(doc: &mut Document, image: &RgbImage) -> Result<EmbeddedImage, PdfWorksError> {
    let (width, height) = image.dimensions();
    let data = deflate(image.as_raw())?;
    let mut stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        data,
    );
    stream.allows_compression = false;
    let id = doc.add_object(stream);
    Ok(EmbeddedImage { id, width, height })
}

/// Embed PNG or JPEG bytes. JPEG passes through untouched; other formats
/// are decoded and stored losslessly, with alpha as a soft mask.
pub fn embed_image(doc: &mut Document, bytes: &[u8]) -> Result<EmbeddedImage, PdfWorksError> {
    let format = image::guess_format(bytes)
        .map_err(|e| PdfWorksError::InvalidInput(format!("Unrecognized image: {}", e)))?;
    if format == ImageFormat::Jpeg {
        return embed_jpeg(doc, bytes.to_vec());
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| PdfWorksError::InvalidInput(format!("Invalid image: {}", e)))?;
    let embedded = embed_rgb(doc, &decoded.to_rgb8())?;

    if decoded.color().has_alpha() {
        let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|p| p.0[3]).collect();
        if alpha.iter().any(|&a| a != 255) {
            let mut mask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => embedded.width as i64,
                    "Height" => embedded.height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                deflate(&alpha)?,
            );
            mask.allows_compression = false;
            let mask_id = doc.add_object(mask);
            if let Ok(Object::Stream(stream)) = doc.get_object_mut(embedded.id) {
                stream.dict.set("SMask", Object::Reference(mask_id));
            }
        }
    }

    Ok(embedded)
}

/// Copy every object of `source` into `doc` past its highest id and return
/// the id offset applied. Callers prune afterwards to drop whatever the
/// destination never references.
pub fn import_objects(doc: &mut Document, source: &Document) -> u32 {
    let offset = doc.max_id;
    for (id, object) in source.objects.iter() {
        let new_id = (id.0 + offset, id.1);
        doc.max_id = doc.max_id.max(new_id.0);
        doc.objects
            .insert(new_id, remap_object_refs(object.clone(), offset));
    }
    offset
}

/// Wrap a 1-indexed page of `source`, already imported at `offset`, in a
/// Form XObject scaled to the unit square so it can be placed exactly like an
/// image
pub fn page_form(
    doc: &mut Document,
    source: &Document,
    page_number: u32,
    offset: u32,
) -> Result<EmbeddedImage, PdfWorksError> {
    let page = page_id(source, page_number)?;
    let frame = page_frame(source, page);

    let mut content = Vec::new();
    for stream_id in source.get_page_contents(page) {
        if let Ok(stream) = source.get_object(stream_id).and_then(Object::as_stream) {
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            content.extend_from_slice(&data);
            content.push(b'\n');
        }
    }
    let resources = inherited_attribute(source, page, b"Resources")
        .unwrap_or_else(|| Object::Dictionary(lopdf::Dictionary::new()));

    let b = frame.to_box();
    let form = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => b.iter().map(|v| real(*v)).collect::<Vec<_>>(),
            "Matrix" => vec![
                real(1.0 / frame.width),
                real(0.0),
                real(0.0),
                real(1.0 / frame.height),
                real(-frame.x / frame.width),
                real(-frame.y / frame.height),
            ],
            "Resources" => remap_object_refs(resources, offset),
        },
        content,
    );
    let id = doc.add_object(form);
    Ok(EmbeddedImage {
        id,
        width: frame.width.round().max(1.0) as u32,
        height: frame.height.round().max(1.0) as u32,
    })
}

/// Import the first page of another PDF as a unit-square Form XObject.
///
/// Every object of the source is copied; callers prune the document afterwards
/// to drop the source's unreachable page tree.
pub fn embed_pdf_page(doc: &mut Document, pdf: &[u8]) -> Result<EmbeddedImage, PdfWorksError> {
    let source = load_document(pdf, None)?;
    let offset = import_objects(doc, &source);
    page_form(doc, &source, 1, offset)
}

/// One rasterized page ready to be placed into a document
#[derive(Debug, Clone)]
pub struct RasterPage {
    pub jpeg: Vec<u8>,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Size of the page the raster fills, in points
    pub page_size: PageSize,
}

impl RasterPage {
    pub fn from_image(image: &RgbImage, page_size: PageSize, quality: f64) -> Result<Self, PdfWorksError> {
        Ok(Self {
            jpeg: encode_jpeg(image, quality)?,
            pixel_width: image.width(),
            pixel_height: image.height(),
            page_size,
        })
    }
}

/// Content stream painting image `name` over `rect`
pub fn image_content(name: &str, rect: PdfRect) -> Result<Vec<u8>, PdfWorksError> {
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    real(rect.width),
                    real(0.0),
                    real(0.0),
                    real(rect.height),
                    real(rect.x),
                    real(rect.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    Ok(content.encode()?)
}

/// Add a page to `builder` painted edge to edge with an embedded image
pub fn add_image_page(
    builder: &mut DocumentBuilder,
    image: EmbeddedImage,
    page_size: PageSize,
) -> Result<ObjectId, PdfWorksError> {
    let content = image_content(
        "Im0",
        PdfRect::new(0.0, 0.0, page_size.width, page_size.height),
    )?;
    let content_id = builder
        .document_mut()
        .add_object(Stream::new(lopdf::Dictionary::new(), content));
    Ok(builder.add_page(dictionary! {
        "MediaBox" => vec![
            0.into(),
            0.into(),
            real(page_size.width),
            real(page_size.height),
        ],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => Object::Reference(image.id) },
        },
        "Contents" => Object::Reference(content_id),
    }))
}

/// Build a document with one full-page JPEG per raster page
pub fn build_image_document(pages: Vec<RasterPage>) -> Result<Document, PdfWorksError> {
    let mut builder = DocumentBuilder::new();
    for page in pages {
        let image = EmbeddedImage {
            id: builder.document_mut().add_object(jpeg_xobject(
                page.jpeg,
                page.pixel_width,
                page.pixel_height,
                false,
            )),
            width: page.pixel_width,
            height: page.pixel_height,
        };
        add_image_page(&mut builder, image, page.page_size)?;
    }
    builder.finish()
}

/// Settings for [`rasterize_document`]
#[derive(Debug, Clone, Copy)]
pub struct RasterPass<'a> {
    pub password: Option<&'a str>,
    /// Requested pixels per point, before the dimension cap
    pub scale: f64,
    /// JPEG quality, 0-1
    pub quality: f64,
    /// Progress band covered by the page loop
    pub band: (u8, u8),
}

/// Render every page of `source` (parsed from `bytes`) and rebuild it as an
/// image-only document of the same page sizes. A render failure on any page
/// aborts the pass.
pub fn rasterize_document(
    source: &Document,
    bytes: &[u8],
    renderer: &dyn PageRenderer,
    pass: &RasterPass<'_>,
    limits: &RasterLimits,
    progress: &mut ProgressReporter<'_>,
) -> Result<Document, PdfWorksError> {
    let ids = page_ids(source);
    let total = ids.len();
    let (from, to) = pass.band;

    let mut pages = Vec::with_capacity(total);
    for (index, id) in ids.iter().enumerate() {
        let size = displayed_size(source, *id);
        let scale = bounded_scale(size, pass.scale, limits);
        let image = renderer.render_page(bytes, pass.password, index as u32, scale)?;
        pages.push(RasterPage::from_image(&image, size, pass.quality)?);
        progress.step(
            index + 1,
            total,
            from,
            to,
            &format!("Rendered page {} of {}", index + 1, total),
        );
    }

    build_image_document(pages)
}

#[cfg(feature = "pdfium")]
pub mod pdfium {
    //! libpdfium renderer, bound at runtime

    use super::PageRenderer;
    use crate::error::PdfWorksError;
    use image::{DynamicImage, RgbaImage, RgbImage};
    use pdfium_render::prelude::*;
    use std::path::Path;
    use tracing::debug;

    pub struct PdfiumRenderer {
        pdfium: Pdfium,
    }

    fn render_error(e: PdfiumError) -> PdfWorksError {
        PdfWorksError::RenderError(e.to_string())
    }

    fn load_error(e: PdfiumError) -> PdfWorksError {
        match e {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                PdfWorksError::IncorrectPassword
            }
            other => PdfWorksError::ParseError(other.to_string()),
        }
    }

    impl PdfiumRenderer {
        /// Bind libpdfium from `library_dir` when given, else from the working
        /// directory, else from the system library path
        pub fn new(library_dir: Option<&Path>) -> Result<Self, PdfWorksError> {
            let dir = library_dir.unwrap_or_else(|| Path::new("./"));
            let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| {
                    PdfWorksError::RenderError(format!("Failed to bind to Pdfium library: {}", e))
                })?;
            debug!("Bound libpdfium");
            Ok(Self {
                pdfium: Pdfium::new(bindings),
            })
        }
    }

    impl PageRenderer for PdfiumRenderer {
        fn page_count(&self, bytes: &[u8], password: Option<&str>) -> Result<u32, PdfWorksError> {
            let doc = self
                .pdfium
                .load_pdf_from_byte_slice(bytes, password)
                .map_err(load_error)?;
            Ok(doc.pages().len() as u32)
        }

        fn render_page(
            &self,
            bytes: &[u8],
            password: Option<&str>,
            index: u32,
            scale: f64,
        ) -> Result<RgbImage, PdfWorksError> {
            let doc = self
                .pdfium
                .load_pdf_from_byte_slice(bytes, password)
                .map_err(load_error)?;
            let page = doc.pages().get(index as u16).map_err(render_error)?;

            let width = ((page.width().value as f64 * scale).round() as i32).max(1);
            let height = ((page.height().value as f64 * scale).round() as i32).max(1);
            let config = PdfRenderConfig::new()
                .set_target_width(width)
                .set_target_height(height);
            let bitmap = page.render_with_config(&config).map_err(render_error)?;

            let rgba = RgbaImage::from_raw(
                bitmap.width() as u32,
                bitmap.height() as u32,
                bitmap.as_rgba_bytes(),
            )
            .ok_or_else(|| PdfWorksError::RenderError("Bitmap size mismatch".into()))?;
            Ok(DynamicImage::ImageRgba8(rgba).to_rgb8())
        }
    }
}
