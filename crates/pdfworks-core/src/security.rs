//! Standard security handler: password checks, decryption and encryption
//!
//! Supports revisions 2-4 (RC4 40/128-bit and AES-128). Revisions 5 and 6
//! (AES-256) are reported as unsupported so callers can fall back to a
//! renderer that understands them.

use crate::error::PdfWorksError;
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use md5::{Digest, Md5};
use rand_core::{OsRng, RngCore};
use rc4::{consts::*, KeyInit, Rc4, StreamCipher};
use serde::{Deserialize, Serialize};
use tracing::debug;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Password padding string (ISO 32000-1, 7.6.3.3)
const PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// `/P` bits that must be set regardless of granted permissions
const P_RESERVED: u32 = 0xFFFF_F0C0;

/// User access permissions, mapped onto the `/P` bit field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Permissions {
    pub print: bool,
    pub modify: bool,
    pub copy: bool,
    pub annotate: bool,
    pub fill_forms: bool,
    pub accessibility: bool,
    pub assemble: bool,
    pub print_high_quality: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self::all()
    }
}

impl Permissions {
    pub fn all() -> Self {
        Self {
            print: true,
            modify: true,
            copy: true,
            annotate: true,
            fill_forms: true,
            accessibility: true,
            assemble: true,
            print_high_quality: true,
        }
    }

    pub fn none() -> Self {
        Self {
            print: false,
            modify: false,
            copy: false,
            annotate: false,
            fill_forms: false,
            accessibility: false,
            assemble: false,
            print_high_quality: false,
        }
    }

    fn bits(&self) -> [(bool, u32); 8] {
        [
            (self.print, 1 << 2),
            (self.modify, 1 << 3),
            (self.copy, 1 << 4),
            (self.annotate, 1 << 5),
            (self.fill_forms, 1 << 8),
            (self.accessibility, 1 << 9),
            (self.assemble, 1 << 10),
            (self.print_high_quality, 1 << 11),
        ]
    }

    pub fn to_p_value(&self) -> i32 {
        let p = self
            .bits()
            .iter()
            .filter(|(granted, _)| *granted)
            .fold(P_RESERVED, |acc, (_, bit)| acc | bit);
        p as i32
    }

    pub fn from_p_value(p: i32) -> Self {
        let p = p as u32;
        Self {
            print: p & (1 << 2) != 0,
            modify: p & (1 << 3) != 0,
            copy: p & (1 << 4) != 0,
            annotate: p & (1 << 5) != 0,
            fill_forms: p & (1 << 8) != 0,
            accessibility: p & (1 << 9) != 0,
            assemble: p & (1 << 10) != 0,
            print_high_quality: p & (1 << 11) != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionAlgorithm {
    /// RC4, 128-bit key, revision 3
    Rc4_128,
    /// AES-128 CBC, revision 4
    #[default]
    Aes128,
}

/// Passwords and permissions used to protect a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionSettings {
    pub user_password: String,
    /// Falls back to the user password when empty
    #[serde(default)]
    pub owner_password: String,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub algorithm: EncryptionAlgorithm,
}

impl EncryptionSettings {
    pub fn new(user_password: impl Into<String>) -> Self {
        Self {
            user_password: user_password.into(),
            owner_password: String::new(),
            permissions: Permissions::default(),
            algorithm: EncryptionAlgorithm::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CryptMethod {
    Identity,
    Rc4,
    Aes,
}

/// Per-document crypt state derived from the encryption dictionary and a password
struct CryptHandler {
    key: Vec<u8>,
    string_method: CryptMethod,
    stream_method: CryptMethod,
    encrypt_metadata: bool,
}

/// Fields of a Standard encryption dictionary needed for key derivation
struct StandardParams {
    revision: i64,
    key_len: usize,
    owner: Vec<u8>,
    user: Vec<u8>,
    p: i32,
    file_id: Vec<u8>,
    encrypt_metadata: bool,
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let n = password.len().min(32);
    padded[..n].copy_from_slice(&password[..n]);
    padded[n..].copy_from_slice(&PAD[..32 - n]);
    padded
}

macro_rules! rc4_apply {
    ($key:expr, $data:expr, $($len:literal => $size:ty),+ $(,)?) => {
        match $key.len() {
            $($len => {
                let mut cipher = Rc4::<$size>::new_from_slice($key)
                    .map_err(|_| PdfWorksError::OperationError("RC4 key rejected".into()))?;
                cipher.apply_keystream($data);
            })+
            n => {
                return Err(PdfWorksError::UnsupportedEncryption(format!(
                    "RC4 key length {} bytes",
                    n
                )))
            }
        }
    };
}

fn rc4(key: &[u8], data: &[u8]) -> Result<Vec<u8>, PdfWorksError> {
    let mut out = data.to_vec();
    rc4_apply!(key, &mut out,
        5 => U5, 6 => U6, 7 => U7, 8 => U8, 9 => U9, 10 => U10,
        11 => U11, 12 => U12, 13 => U13, 14 => U14, 15 => U15, 16 => U16,
    );
    Ok(out)
}

fn xor_key(key: &[u8], i: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ i).collect()
}

fn aes_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, PdfWorksError> {
    if data.len() < 16 {
        return Ok(Vec::new());
    }
    let (iv, body) = data.split_at(16);
    let mut buf = body[..body.len() - body.len() % 16].to_vec();
    let decrypted_len = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|e| PdfWorksError::OperationError(format!("AES key/IV error: {:?}", e)))?
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|e| PdfWorksError::OperationError(format!("AES decryption error: {:?}", e)))?
        .len();
    buf.truncate(decrypted_len);

    // Strip PKCS#7 padding when it is well formed; some writers omit it
    if let Some(&pad) = buf.last() {
        let pad = pad as usize;
        if (1..=16).contains(&pad)
            && pad <= buf.len()
            && buf[buf.len() - pad..].iter().all(|&b| b as usize == pad)
        {
            buf.truncate(buf.len() - pad);
        }
    }
    Ok(buf)
}

fn aes_encrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, PdfWorksError> {
    let mut iv = [0u8; 16];
    OsRng.fill_bytes(&mut iv);

    let pad = 16 - data.len() % 16;
    let mut buf = data.to_vec();
    buf.extend(std::iter::repeat(pad as u8).take(pad));
    let len = buf.len();
    Aes128CbcEnc::new_from_slices(key, &iv)
        .map_err(|e| PdfWorksError::OperationError(format!("AES key/IV error: {:?}", e)))?
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .map_err(|e| PdfWorksError::OperationError(format!("AES encryption error: {:?}", e)))?;

    let mut out = iv.to_vec();
    out.extend(buf);
    Ok(out)
}

impl StandardParams {
    /// Algorithm 2: file key from a (user) password
    fn file_key(&self, password: &[u8]) -> Vec<u8> {
        let mut hasher = Md5::new();
        hasher.update(pad_password(password));
        hasher.update(&self.owner);
        hasher.update((self.p as u32).to_le_bytes());
        hasher.update(&self.file_id);
        if self.revision >= 4 && !self.encrypt_metadata {
            hasher.update([0xFF; 4]);
        }
        let mut hash = hasher.finalize().to_vec();

        if self.revision >= 3 {
            for _ in 0..50 {
                hash = Md5::digest(&hash[..self.key_len]).to_vec();
            }
        }
        hash.truncate(self.key_len);
        hash
    }

    /// Algorithm 3 steps a-d: RC4 key derived from the owner password
    fn owner_key(&self, owner_password: &[u8]) -> Vec<u8> {
        let mut hash = Md5::digest(pad_password(owner_password)).to_vec();
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = Md5::digest(&hash).to_vec();
            }
        }
        hash.truncate(self.key_len);
        hash
    }

    /// Algorithm 3: the `/O` entry
    fn compute_owner(&self, owner_password: &[u8], user_password: &[u8]) -> Result<Vec<u8>, PdfWorksError> {
        let key = self.owner_key(owner_password);
        let mut out = rc4(&key, &pad_password(user_password))?;
        if self.revision >= 3 {
            for i in 1..=19u8 {
                out = rc4(&xor_key(&key, i), &out)?;
            }
        }
        Ok(out)
    }

    /// Algorithms 4 and 5: the `/U` entry for a file key
    fn compute_user(&self, key: &[u8]) -> Result<Vec<u8>, PdfWorksError> {
        if self.revision == 2 {
            return rc4(key, &PAD);
        }
        let mut hasher = Md5::new();
        hasher.update(PAD);
        hasher.update(&self.file_id);
        let mut out = rc4(key, &hasher.finalize())?;
        for i in 1..=19u8 {
            out = rc4(&xor_key(key, i), &out)?;
        }
        out.resize(32, 0);
        Ok(out)
    }

    fn check_user(&self, password: &[u8]) -> Result<Option<Vec<u8>>, PdfWorksError> {
        let key = self.file_key(password);
        let expected = self.compute_user(&key)?;
        let n = if self.revision == 2 { 32 } else { 16 };
        if self.user.len() >= n && expected[..n] == self.user[..n] {
            Ok(Some(key))
        } else {
            Ok(None)
        }
    }

    /// Algorithm 7: recover the user password from `/O`, then authenticate it
    fn check_owner(&self, password: &[u8]) -> Result<Option<Vec<u8>>, PdfWorksError> {
        let key = self.owner_key(password);
        let mut user_password = self.owner.clone();
        if self.revision == 2 {
            user_password = rc4(&key, &user_password)?;
        } else {
            for i in (0..=19u8).rev() {
                user_password = rc4(&xor_key(&key, i), &user_password)?;
            }
        }
        self.check_user(&user_password)
    }
}

fn dict_int(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key)
        .ok()
        .map(|o| crate::document::resolve(doc, o))
        .and_then(|o| o.as_i64().ok())
}

fn dict_bytes(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<Vec<u8>> {
    dict.get(key)
        .ok()
        .map(|o| crate::document::resolve(doc, o))
        .and_then(|o| o.as_str().ok())
        .map(|s| s.to_vec())
}

fn first_file_id(doc: &Document) -> Vec<u8> {
    doc.trailer
        .get(b"ID")
        .ok()
        .and_then(|o| o.as_array().ok())
        .and_then(|arr| arr.first())
        .and_then(|o| o.as_str().ok())
        .map(|s| s.to_vec())
        .unwrap_or_default()
}

/// Crypt method named by a V4 crypt filter (`/StmF` or `/StrF`)
fn crypt_filter_method(dict: &Dictionary, key: &[u8]) -> Result<CryptMethod, PdfWorksError> {
    let name = match dict.get(key).and_then(Object::as_name) {
        Ok(name) => name,
        Err(_) => return Ok(CryptMethod::Identity),
    };
    if name == b"Identity" {
        return Ok(CryptMethod::Identity);
    }
    let cfm = dict
        .get(b"CF")
        .and_then(Object::as_dict)
        .and_then(|cf| cf.get(name))
        .and_then(Object::as_dict)
        .and_then(|filter| filter.get(b"CFM"))
        .and_then(Object::as_name)
        .unwrap_or(b"None");
    match cfm {
        b"V2" => Ok(CryptMethod::Rc4),
        b"AESV2" => Ok(CryptMethod::Aes),
        b"None" => Ok(CryptMethod::Identity),
        other => Err(PdfWorksError::UnsupportedEncryption(format!(
            "crypt filter method {}",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn encryption_dictionary(doc: &Document) -> Result<(Option<ObjectId>, Dictionary), PdfWorksError> {
    let entry = doc
        .trailer
        .get(b"Encrypt")
        .map_err(|_| PdfWorksError::InvalidInput("Document is not encrypted".into()))?;
    match entry {
        Object::Reference(id) => Ok((Some(*id), doc.get_dictionary(*id)?.clone())),
        Object::Dictionary(dict) => Ok((None, dict.clone())),
        _ => Err(PdfWorksError::ParseError("Malformed /Encrypt entry".into())),
    }
}

impl CryptHandler {
    fn object_key(&self, id: ObjectId, method: CryptMethod) -> Vec<u8> {
        let mut hasher = Md5::new();
        hasher.update(&self.key);
        hasher.update(&id.0.to_le_bytes()[..3]);
        hasher.update(&id.1.to_le_bytes()[..2]);
        if method == CryptMethod::Aes {
            hasher.update(b"sAlT");
        }
        let hash = hasher.finalize();
        hash[..(self.key.len() + 5).min(16)].to_vec()
    }

    fn transform(&self, id: ObjectId, method: CryptMethod, data: &[u8], encrypt: bool) -> Result<Vec<u8>, PdfWorksError> {
        match method {
            CryptMethod::Identity => Ok(data.to_vec()),
            CryptMethod::Rc4 => rc4(&self.object_key(id, method), data),
            CryptMethod::Aes if encrypt => aes_encrypt(&self.object_key(id, method), data),
            CryptMethod::Aes => aes_decrypt(&self.object_key(id, method), data),
        }
    }

    fn apply_strings(&self, id: ObjectId, obj: &mut Object, encrypt: bool) -> Result<(), PdfWorksError> {
        match obj {
            Object::String(bytes, _) => {
                *bytes = self.transform(id, self.string_method, bytes, encrypt)?;
            }
            Object::Array(items) => {
                for item in items.iter_mut() {
                    self.apply_strings(id, item, encrypt)?;
                }
            }
            Object::Dictionary(dict) => {
                for (_, value) in dict.iter_mut() {
                    self.apply_strings(id, value, encrypt)?;
                }
            }
            Object::Stream(stream) => {
                for (_, value) in stream.dict.iter_mut() {
                    self.apply_strings(id, value, encrypt)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn apply(&self, doc: &mut Document, skip: Option<ObjectId>, encrypt: bool) -> Result<(), PdfWorksError> {
        for (&id, obj) in doc.objects.iter_mut() {
            if Some(id) == skip {
                continue;
            }
            self.apply_strings(id, obj, encrypt)?;

            if let Object::Stream(stream) = obj {
                let kind = stream.dict.get(b"Type").and_then(Object::as_name).ok();
                if kind == Some(b"XRef".as_slice()) {
                    continue;
                }
                if kind == Some(b"Metadata".as_slice()) && !self.encrypt_metadata {
                    continue;
                }
                let content = self.transform(id, self.stream_method, &stream.content, encrypt)?;
                stream.set_content(content);
            }
        }
        Ok(())
    }
}

/// Decrypt every string and stream in place and drop the encryption dictionary.
///
/// The password is tried as the user password first, then as the owner password.
pub fn decrypt_document(doc: &mut Document, password: &[u8]) -> Result<(), PdfWorksError> {
    let (encrypt_id, dict) = encryption_dictionary(doc)?;

    let filter = dict.get(b"Filter").and_then(Object::as_name).unwrap_or(b"");
    if filter != b"Standard" {
        return Err(PdfWorksError::UnsupportedEncryption(format!(
            "security handler {}",
            String::from_utf8_lossy(filter)
        )));
    }

    let version = dict_int(doc, &dict, b"V").unwrap_or(0);
    let revision = dict_int(doc, &dict, b"R").unwrap_or(0);
    if !(1..=4).contains(&version) || !(2..=4).contains(&revision) {
        return Err(PdfWorksError::UnsupportedEncryption(format!(
            "V{} R{} (AES-256 and newer handlers are not supported)",
            version, revision
        )));
    }

    let (string_method, stream_method, key_len) = if version == 4 {
        let methods = (
            crypt_filter_method(&dict, b"StrF")?,
            crypt_filter_method(&dict, b"StmF")?,
        );
        (methods.0, methods.1, 16)
    } else {
        let bits = dict_int(doc, &dict, b"Length").unwrap_or(40);
        let key_len = if version == 1 { 5 } else { (bits / 8).clamp(5, 16) as usize };
        (CryptMethod::Rc4, CryptMethod::Rc4, key_len)
    };

    let params = StandardParams {
        revision,
        key_len,
        owner: dict_bytes(doc, &dict, b"O").unwrap_or_default(),
        user: dict_bytes(doc, &dict, b"U").unwrap_or_default(),
        p: dict_int(doc, &dict, b"P").unwrap_or(-1) as i32,
        file_id: first_file_id(doc),
        encrypt_metadata: dict
            .get(b"EncryptMetadata")
            .and_then(Object::as_bool)
            .unwrap_or(true),
    };

    let key = match params.check_user(password)? {
        Some(key) => key,
        None => params
            .check_owner(password)?
            .ok_or(PdfWorksError::IncorrectPassword)?,
    };

    let handler = CryptHandler {
        key,
        string_method,
        stream_method,
        encrypt_metadata: params.encrypt_metadata,
    };
    handler.apply(doc, encrypt_id, false)?;

    doc.trailer.remove(b"Encrypt");
    if let Some(id) = encrypt_id {
        doc.objects.remove(&id);
    }
    debug!(
        "Decrypted document (V{} R{}, {}-bit key)",
        version,
        revision,
        key_len * 8
    );
    Ok(())
}

/// Encrypt a document in place with the Standard security handler.
///
/// The document must not already be encrypted. A fresh file identifier is
/// written to the trailer.
pub fn encrypt_document(doc: &mut Document, settings: &EncryptionSettings) -> Result<(), PdfWorksError> {
    if doc.trailer.has(b"Encrypt") {
        return Err(PdfWorksError::InvalidInput("Document is already encrypted".into()));
    }
    if settings.user_password.is_empty() && settings.owner_password.is_empty() {
        return Err(PdfWorksError::MissingInput("A password is required".into()));
    }

    let owner_password = if settings.owner_password.is_empty() {
        &settings.user_password
    } else {
        &settings.owner_password
    };

    let file_id = uuid::Uuid::new_v4().as_bytes().to_vec();
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(file_id.clone(), StringFormat::Hexadecimal),
            Object::String(file_id.clone(), StringFormat::Hexadecimal),
        ]),
    );

    let (revision, method) = match settings.algorithm {
        EncryptionAlgorithm::Rc4_128 => (3, CryptMethod::Rc4),
        EncryptionAlgorithm::Aes128 => (4, CryptMethod::Aes),
    };
    let p = settings.permissions.to_p_value();

    let mut params = StandardParams {
        revision,
        key_len: 16,
        owner: Vec::new(),
        user: Vec::new(),
        p,
        file_id,
        encrypt_metadata: true,
    };
    params.owner = params.compute_owner(owner_password.as_bytes(), settings.user_password.as_bytes())?;
    let key = params.file_key(settings.user_password.as_bytes());
    params.user = params.compute_user(&key)?;

    let handler = CryptHandler {
        key,
        string_method: method,
        stream_method: method,
        encrypt_metadata: true,
    };
    handler.apply(doc, None, true)?;

    let mut encrypt = dictionary! {
        "Filter" => "Standard",
        "R" => revision,
        "Length" => 128,
        "O" => Object::String(params.owner, StringFormat::Hexadecimal),
        "U" => Object::String(params.user, StringFormat::Hexadecimal),
        "P" => p as i64,
    };
    match settings.algorithm {
        EncryptionAlgorithm::Rc4_128 => encrypt.set("V", 2),
        EncryptionAlgorithm::Aes128 => {
            encrypt.set("V", 4);
            encrypt.set(
                "CF",
                dictionary! {
                    "StdCF" => dictionary! {
                        "CFM" => "AESV2",
                        "AuthEvent" => "DocOpen",
                        "Length" => 16,
                    },
                },
            );
            encrypt.set("StmF", "StdCF");
            encrypt.set("StrF", "StdCF");
        }
    }
    let encrypt_id = doc.add_object(encrypt);
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));

    debug!("Encrypted document with {:?}", settings.algorithm);
    Ok(())
}

/// Permissions granted by an encrypted document's `/P` entry, if any
pub fn document_permissions(doc: &Document) -> Option<Permissions> {
    let (_, dict) = encryption_dictionary(doc).ok()?;
    dict_int(doc, &dict, b"P").map(|p| Permissions::from_p_value(p as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{load_document, save_document};
    use crate::test_support::create_test_pdf;

    fn encrypted(settings: &EncryptionSettings) -> Vec<u8> {
        let pdf = create_test_pdf(2, "Secret");
        let mut doc = load_document(&pdf, None).unwrap();
        encrypt_document(&mut doc, settings).unwrap();
        save_document(&mut doc).unwrap()
    }

    #[test]
    fn test_permissions_p_value() {
        assert_eq!(Permissions::none().to_p_value() as u32, 0xFFFF_F0C0);
        assert_eq!(Permissions::all().to_p_value() as u32, 0xFFFF_FFFC);
        let print_only = Permissions {
            print: true,
            ..Permissions::none()
        };
        assert_eq!(Permissions::from_p_value(print_only.to_p_value()), print_only);
    }

    #[test]
    fn test_pad_password() {
        assert_eq!(pad_password(b""), PAD);
        let padded = pad_password(b"abc");
        assert_eq!(&padded[..3], b"abc");
        assert_eq!(&padded[3..], &PAD[..29]);
    }

    #[test]
    fn test_rc4_round_trip() {
        let data = b"stream contents";
        let encrypted = rc4(b"0123456789abcdef", data).unwrap();
        assert_ne!(encrypted.as_slice(), data);
        assert_eq!(rc4(b"0123456789abcdef", &encrypted).unwrap(), data);
        assert!(rc4(b"abc", data).is_err());
    }

    #[test]
    fn test_aes_round_trip() {
        let key = [7u8; 16];
        let encrypted = aes_encrypt(&key, b"hello aes").unwrap();
        assert_eq!(encrypted.len(), 32);
        assert_eq!(aes_decrypt(&key, &encrypted).unwrap(), b"hello aes");
    }

    #[test]
    fn test_encrypted_document_requires_password() {
        for algorithm in [EncryptionAlgorithm::Aes128, EncryptionAlgorithm::Rc4_128] {
            let settings = EncryptionSettings {
                algorithm,
                ..EncryptionSettings::new("hunter2")
            };
            let bytes = encrypted(&settings);

            assert!(matches!(
                load_document(&bytes, None),
                Err(PdfWorksError::NeedsPassword)
            ));
            assert!(matches!(
                load_document(&bytes, Some("wrong")),
                Err(PdfWorksError::IncorrectPassword)
            ));

            let doc = load_document(&bytes, Some("hunter2")).unwrap();
            let text = doc.extract_text(&[2]).unwrap();
            assert!(text.contains("Secret-Page-2"), "{algorithm:?}: {text:?}");
        }
    }

    #[test]
    fn test_owner_password_opens_document() {
        let settings = EncryptionSettings {
            owner_password: "boss".into(),
            permissions: Permissions::none(),
            ..EncryptionSettings::new("reader")
        };
        let bytes = encrypted(&settings);
        let doc = load_document(&bytes, Some("boss")).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_permissions_are_recorded() {
        let settings = EncryptionSettings {
            permissions: Permissions {
                copy: false,
                ..Permissions::all()
            },
            ..EncryptionSettings::new("pw")
        };
        let bytes = encrypted(&settings);
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        if doc.trailer.has(b"Encrypt") {
            let perms = document_permissions(&doc).unwrap();
            assert!(!perms.copy);
            assert!(perms.print);
        }
    }

    #[test]
    fn test_refuses_double_encryption() {
        let pdf = create_test_pdf(1, "Twice");
        let mut doc = load_document(&pdf, None).unwrap();
        encrypt_document(&mut doc, &EncryptionSettings::new("a")).unwrap();
        assert!(encrypt_document(&mut doc, &EncryptionSettings::new("b")).is_err());
    }
}
