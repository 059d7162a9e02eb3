//! Document loading, saving and page-level helpers shared by every operation

use crate::coords::{PageSize, PdfRect};
use crate::error::PdfWorksError;
use crate::metadata::{read_metadata, DocumentMetadata};
use crate::security;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use tracing::debug;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Decode PDF bytes, decrypting when the document is password protected.
///
/// A protected document without a password fails with
/// [`PdfWorksError::NeedsPassword`] unless its user password is empty.
pub fn load_document(bytes: &[u8], password: Option<&str>) -> Result<Document, PdfWorksError> {
    check_header(bytes)?;

    let mut doc =
        Document::load_mem(bytes).map_err(|e| PdfWorksError::ParseError(e.to_string()))?;

    if is_encrypted(&doc) {
        match password {
            Some(pw) => security::decrypt_document(&mut doc, pw.as_bytes())?,
            None => match security::decrypt_document(&mut doc, b"") {
                Ok(()) => debug!("Opened protected document with empty user password"),
                Err(PdfWorksError::IncorrectPassword) => {
                    return Err(PdfWorksError::NeedsPassword)
                }
                Err(e) => return Err(e),
            },
        }
    }

    if doc.get_pages().is_empty() {
        return Err(PdfWorksError::InvalidInput("PDF has no pages".into()));
    }

    Ok(doc)
}

/// Reject buffers that cannot possibly be PDF before handing them to the parser
pub fn check_header(bytes: &[u8]) -> Result<(), PdfWorksError> {
    if bytes.is_empty() {
        return Err(PdfWorksError::InvalidInput("File is empty".into()));
    }
    if bytes.len() < 8 {
        return Err(PdfWorksError::InvalidInput(
            "File too small to be a valid PDF".into(),
        ));
    }
    let head = &bytes[..bytes.len().min(1024)];
    if !head.windows(5).any(|w| w == b"%PDF-") {
        return Err(PdfWorksError::ParseError(
            "Not a valid PDF file (missing %PDF- header)".into(),
        ));
    }
    Ok(())
}

/// Whether the trailer still references an encryption dictionary
pub fn is_encrypted(doc: &Document) -> bool {
    doc.trailer.has(b"Encrypt")
}

/// Serialize a document
pub fn save_document(doc: &mut Document) -> Result<Vec<u8>, PdfWorksError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfWorksError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

/// Page object ids in document order
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Object id of a 1-indexed page
pub fn page_id(doc: &Document, page_number: u32) -> Result<ObjectId, PdfWorksError> {
    let pages = doc.get_pages();
    pages.get(&page_number).copied().ok_or_else(|| {
        PdfWorksError::InvalidRange(format!(
            "Page {} does not exist (document has {} pages)",
            page_number,
            pages.len()
        ))
    })
}

/// Numeric value of an integer or real object
pub fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Real object from a float
pub fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

/// Follow a reference to its target; other objects are returned as-is
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Look up a page attribute, walking up the page tree for inheritable keys
pub fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(id) = current {
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value).clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
        if depth > 64 {
            break;
        }
    }

    None
}

fn box_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<PdfRect> {
    let obj = inherited_attribute(doc, page_id, key)?;
    let arr = obj.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(arr.iter()) {
        *slot = number(resolve(doc, item))?;
    }
    Some(PdfRect::from_box(values))
}

/// Media box of a page; US Letter when the document omits it
pub fn media_box(doc: &Document, page_id: ObjectId) -> PdfRect {
    box_attribute(doc, page_id, b"MediaBox")
        .filter(|r| r.width > 0.0 && r.height > 0.0)
        .unwrap_or_else(|| PdfRect::new(0.0, 0.0, 612.0, 792.0))
}

/// Visible area of a page: the crop box clipped to the media box
pub fn page_frame(doc: &Document, page_id: ObjectId) -> PdfRect {
    let media = media_box(doc, page_id);
    match box_attribute(doc, page_id, b"CropBox") {
        Some(crop) => {
            let x0 = crop.x.max(media.x);
            let y0 = crop.y.max(media.y);
            let x1 = crop.right().min(media.right());
            let y1 = crop.top().min(media.top());
            if x1 > x0 && y1 > y0 {
                PdfRect::new(x0, y0, x1 - x0, y1 - y0)
            } else {
                media
            }
        }
        None => media,
    }
}

/// Page rotation normalized to 0, 90, 180 or 270
pub fn rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|o| o.as_i64().ok())
        .map(|r| r.rem_euclid(360) / 90 * 90)
        .unwrap_or(0)
}

pub fn set_rotation(doc: &mut Document, page_id: ObjectId, angle: i64) -> Result<(), PdfWorksError> {
    let dict = doc.get_dictionary_mut(page_id)?;
    dict.set("Rotate", Object::Integer(angle.rem_euclid(360)));
    Ok(())
}

/// Size of a page as the viewer displays it (width/height swapped for 90/270)
pub fn displayed_size(doc: &Document, page_id: ObjectId) -> PageSize {
    let frame = page_frame(doc, page_id);
    match rotation(doc, page_id) {
        90 | 270 => PageSize::new(frame.height, frame.width),
        _ => frame.size(),
    }
}

/// Basic per-page information
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageInfo {
    pub number: u32,
    pub width: f64,
    pub height: f64,
    pub rotation: i64,
}

/// Document information extracted without requiring a password
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub page_count: u32,
    pub version: String,
    pub encrypted: bool,
    pub size_bytes: usize,
    pub pages: Vec<PageInfo>,
    pub metadata: DocumentMetadata,
}

/// Inspect a document. Encrypted documents report structure but no metadata.
pub fn inspect_document(bytes: &[u8]) -> Result<DocumentInfo, PdfWorksError> {
    check_header(bytes)?;
    let doc = Document::load_mem(bytes).map_err(|e| PdfWorksError::ParseError(e.to_string()))?;
    let encrypted = is_encrypted(&doc);

    let pages = doc
        .get_pages()
        .into_iter()
        .map(|(number, id)| {
            let frame = page_frame(&doc, id);
            PageInfo {
                number,
                width: frame.width,
                height: frame.height,
                rotation: rotation(&doc, id),
            }
        })
        .collect::<Vec<_>>();

    let metadata = if encrypted {
        DocumentMetadata::default()
    } else {
        read_metadata(&doc)
    };

    Ok(DocumentInfo {
        page_count: pages.len() as u32,
        version: doc.version.clone(),
        encrypted,
        size_bytes: bytes.len(),
        pages,
        metadata,
    })
}

/// Accumulates pages from one or more source documents into a fresh document.
///
/// Imported objects are renumbered past the destination's highest id, each
/// imported page gets its inherited attributes copied onto itself, and the
/// source page trees are dropped when the result is pruned.
pub struct DocumentBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Id of the page tree root every added page must name as its parent
    pub fn pages_id(&self) -> ObjectId {
        self.pages_id
    }

    /// Mutable access for adding resources (images, fonts) before adding pages
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Copy the given 1-indexed pages (all pages when `None`) in the given order
    pub fn import_pages(&mut self, source: &Document, pages: Option<&[u32]>) -> Result<(), PdfWorksError> {
        let source_pages = source.get_pages();
        let wanted: Vec<u32> = match pages {
            Some(list) => list.to_vec(),
            None => source_pages.keys().copied().collect(),
        };

        // Inherited attributes must be resolved against the source tree
        let mut flattened: Vec<(ObjectId, Vec<(&[u8], Object)>)> = Vec::new();
        for number in &wanted {
            let id = source_pages.get(number).copied().ok_or_else(|| {
                PdfWorksError::InvalidRange(format!(
                    "Page {} does not exist (document has {} pages)",
                    number,
                    source_pages.len()
                ))
            })?;
            let attrs = INHERITABLE
                .iter()
                .filter_map(|key| inherited_attribute(source, id, key).map(|v| (*key, v)))
                .collect();
            flattened.push((id, attrs));
        }

        let offset = self.doc.max_id;
        let mut max_id = self.doc.max_id;
        for (old_id, object) in source.objects.iter() {
            let new_id = (old_id.0 + offset, old_id.1);
            max_id = max_id.max(new_id.0);
            self.doc
                .objects
                .insert(new_id, remap_object_refs(object.clone(), offset));
        }
        self.doc.max_id = max_id;

        for (old_id, attrs) in flattened {
            let mut new_id = (old_id.0 + offset, old_id.1);
            // The same source page may be requested twice; the copy needs its own object
            if self.kids.contains(&new_id) {
                let copy = self.doc.get_object(new_id)?.clone();
                new_id = self.doc.add_object(copy);
            }

            let dict = self.doc.get_dictionary_mut(new_id)?;
            for (key, value) in attrs {
                // Indirect resources keep pointing into the imported object space
                dict.set(key, remap_object_refs(value, offset));
            }
            dict.set("Parent", Object::Reference(self.pages_id));
            self.kids.push(new_id);
        }

        Ok(())
    }

    /// Append a page dictionary created directly in the builder's document
    pub fn add_page(&mut self, mut page: Dictionary) -> ObjectId {
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(self.pages_id));
        let id = self.doc.add_object(page);
        self.kids.push(id);
        id
    }

    /// Install the page tree and catalog, drop unreachable objects
    pub fn finish(mut self) -> Result<Document, PdfWorksError> {
        if self.kids.is_empty() {
            return Err(PdfWorksError::OperationError(
                "Output document would have no pages".into(),
            ));
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => self.kids.len() as i64,
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(self.pages_id),
        });
        self.doc.trailer = Dictionary::new();
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        self.doc.prune_objects();
        self.doc.max_id = self.doc.objects.keys().map(|id| id.0).max().unwrap_or(0);

        Ok(self.doc)
    }
}

/// Recursively remap object references in an object
pub fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Rebuild a document by copying all of its pages into a fresh one.
///
/// The Info dictionary is carried over; everything unreachable from the new
/// page tree is dropped.
pub fn rebuild_document(source: &Document) -> Result<Document, PdfWorksError> {
    let mut builder = DocumentBuilder::new();
    builder.import_pages(source, None)?;
    let mut doc = builder.finish()?;
    let metadata = read_metadata(source);
    crate::metadata::write_metadata(&mut doc, &metadata);
    Ok(doc)
}
