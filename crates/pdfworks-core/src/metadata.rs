//! Document information dictionary (title, author, dates, ...)

use crate::document::{load_document, resolve, save_document};
use crate::error::PdfWorksError;
use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document, Object, StringFormat};
use serde::{Deserialize, Serialize};

/// Producer string written into documents this engine creates
pub const PRODUCER: &str = concat!("pdfworks ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    /// Raw PDF date string, e.g. `D:20240131120000Z`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
}

impl DocumentMetadata {
    fn fields(&self) -> [(&'static [u8], &Option<String>); 8] {
        [
            (b"Title", &self.title),
            (b"Author", &self.author),
            (b"Subject", &self.subject),
            (b"Keywords", &self.keywords),
            (b"Creator", &self.creator),
            (b"Producer", &self.producer),
            (b"CreationDate", &self.creation_date),
            (b"ModDate", &self.modification_date),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    /// Overlay `update` onto this metadata. `Some("")` clears a field.
    pub fn apply(&mut self, update: &DocumentMetadata) {
        fn merge(slot: &mut Option<String>, value: &Option<String>) {
            match value.as_deref() {
                Some("") => *slot = None,
                Some(v) => *slot = Some(v.to_string()),
                None => {}
            }
        }
        merge(&mut self.title, &update.title);
        merge(&mut self.author, &update.author);
        merge(&mut self.subject, &update.subject);
        merge(&mut self.keywords, &update.keywords);
        merge(&mut self.creator, &update.creator);
        merge(&mut self.producer, &update.producer);
        merge(&mut self.creation_date, &update.creation_date);
        merge(&mut self.modification_date, &update.modification_date);
    }
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    resolve(doc, info).as_dict().ok()
}

/// Read the Info dictionary; absent or malformed entries are `None`
pub fn read_metadata(doc: &Document) -> DocumentMetadata {
    let Some(info) = info_dictionary(doc) else {
        return DocumentMetadata::default();
    };

    let get = |key: &[u8]| -> Option<String> {
        let obj = resolve(doc, info.get(key).ok()?);
        let bytes = obj.as_str().ok()?;
        let decoded = decode_text_string(bytes);
        if decoded.is_empty() {
            None
        } else {
            Some(decoded)
        }
    };

    DocumentMetadata {
        title: get(b"Title"),
        author: get(b"Author"),
        subject: get(b"Subject"),
        keywords: get(b"Keywords"),
        creator: get(b"Creator"),
        producer: get(b"Producer"),
        creation_date: get(b"CreationDate"),
        modification_date: get(b"ModDate"),
    }
}

/// Replace the Info dictionary with `metadata`
pub fn write_metadata(doc: &mut Document, metadata: &DocumentMetadata) {
    if metadata.is_empty() {
        doc.trailer.remove(b"Info");
        return;
    }

    let mut info = Dictionary::new();
    for (key, value) in metadata.fields() {
        if let Some(value) = value {
            info.set(key, encode_text_string(value));
        }
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", Object::Reference(info_id));
}

/// Load, apply `update` to the existing metadata, stamp the modification date, save
pub fn update_metadata(
    bytes: &[u8],
    password: Option<&str>,
    update: &DocumentMetadata,
) -> Result<Vec<u8>, PdfWorksError> {
    let mut doc = load_document(bytes, password)?;

    let mut metadata = read_metadata(&doc);
    metadata.apply(update);
    if update.modification_date.is_none() {
        metadata.modification_date = Some(pdf_date(Utc::now()));
    }
    write_metadata(&mut doc, &metadata);

    save_document(&mut doc)
}

/// Format a timestamp as a PDF date string
pub fn pdf_date(at: DateTime<Utc>) -> String {
    at.format("D:%Y%m%d%H%M%SZ").to_string()
}

/// Decode a PDF text string: UTF-16BE with BOM, otherwise Latin-1
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if bytes.len() >= 3 && bytes[..3] == [0xEF, 0xBB, 0xBF] {
        String::from_utf8_lossy(&bytes[3..]).into_owned()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Encode a text string, Latin-1 when possible and UTF-16BE otherwise
pub fn encode_text_string(text: &str) -> Object {
    let bytes = if text.chars().all(|c| (c as u32) < 0x80) {
        text.as_bytes().to_vec()
    } else if text.chars().all(|c| (0xA0..0x100).contains(&(c as u32)) || (c as u32) < 0x80) {
        text.chars().map(|c| c as u32 as u8).collect()
    } else {
        let mut out = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            out.extend_from_slice(&unit.to_be_bytes());
        }
        out
    };
    Object::String(bytes, StringFormat::Hexadecimal)
}
