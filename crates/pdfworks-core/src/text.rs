//! Standard-14 text fonts: selection, WinAnsi encoding, width measurement and wrapping

use serde::{Deserialize, Serialize};

/// The text faces of the PDF standard 14 fonts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StandardFont {
    #[default]
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    pub fn base_font(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    /// Resolve a family name (CSS generic or concrete) plus style flags
    pub fn from_family(name: &str, bold: bool, italic: bool) -> Self {
        let lower = name.to_lowercase();
        let bold = bold || lower.contains("bold");
        let italic = italic || lower.contains("italic") || lower.contains("oblique");

        let family = if lower == "serif"
            || lower.contains("times")
            || lower.contains("georgia")
            || lower.contains("garamond")
        {
            Family::Times
        } else if lower == "monospace"
            || lower.contains("courier")
            || lower.contains("mono")
            || lower.contains("consolas")
            || lower.contains("monaco")
        {
            Family::Courier
        } else {
            Family::Helvetica
        };

        match (family, bold, italic) {
            (Family::Helvetica, false, false) => StandardFont::Helvetica,
            (Family::Helvetica, true, false) => StandardFont::HelveticaBold,
            (Family::Helvetica, false, true) => StandardFont::HelveticaOblique,
            (Family::Helvetica, true, true) => StandardFont::HelveticaBoldOblique,
            (Family::Times, false, false) => StandardFont::TimesRoman,
            (Family::Times, true, false) => StandardFont::TimesBold,
            (Family::Times, false, true) => StandardFont::TimesItalic,
            (Family::Times, true, true) => StandardFont::TimesBoldItalic,
            (Family::Courier, false, false) => StandardFont::Courier,
            (Family::Courier, true, false) => StandardFont::CourierBold,
            (Family::Courier, false, true) => StandardFont::CourierOblique,
            (Family::Courier, true, true) => StandardFont::CourierBoldOblique,
        }
    }

    /// Advance width of a WinAnsi byte in 1/1000 em.
    ///
    /// Times variants share the Times-Roman metrics; bytes outside printable
    /// ASCII use the face's average width.
    pub fn char_width(&self, byte: u8) -> u16 {
        let table = match self {
            StandardFont::Courier
            | StandardFont::CourierBold
            | StandardFont::CourierOblique
            | StandardFont::CourierBoldOblique => return 600,
            StandardFont::Helvetica | StandardFont::HelveticaOblique => &HELVETICA_WIDTHS,
            StandardFont::HelveticaBold | StandardFont::HelveticaBoldOblique => {
                &HELVETICA_BOLD_WIDTHS
            }
            _ => &TIMES_ROMAN_WIDTHS,
        };
        match byte {
            32..=126 => table[(byte - 32) as usize],
            _ => table[(b'n' - 32) as usize],
        }
    }
}

#[derive(Clone, Copy)]
enum Family {
    Helvetica,
    Times,
    Courier,
}

/// Font selection for drawn text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextStyle {
    pub font_size: f64,
    pub color: String,
    /// Family name, mapped onto the standard fonts
    #[serde(default)]
    pub font_name: Option<String>,
    #[serde(default)]
    pub is_italic: bool,
    #[serde(default)]
    pub is_bold: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            color: "#000000".to_string(),
            font_name: None,
            is_italic: false,
            is_bold: false,
        }
    }
}

impl TextStyle {
    pub fn font(&self) -> StandardFont {
        StandardFont::from_family(
            self.font_name.as_deref().unwrap_or("Helvetica"),
            self.is_bold,
            self.is_italic,
        )
    }
}

/// Encode text as WinAnsi bytes; unmappable characters become `?`
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => match c {
                '\u{20AC}' => 0x80,
                '\u{2026}' => 0x85,
                '\u{2018}' => 0x91,
                '\u{2019}' => 0x92,
                '\u{201C}' => 0x93,
                '\u{201D}' => 0x94,
                '\u{2022}' => 0x95,
                '\u{2013}' => 0x96,
                '\u{2014}' => 0x97,
                '\u{2122}' => 0x99,
                '\t' => b' ',
                _ => b'?',
            },
        })
        .collect()
}

/// Width of `text` in points when set in `font` at `size`
pub fn text_width(text: &str, font: StandardFont, size: f64) -> f64 {
    let units: u32 = encode_win_ansi(text)
        .iter()
        .map(|&b| font.char_width(b) as u32)
        .sum();
    units as f64 * size / 1000.0
}

/// Greedy word wrap to `max_width` points. Explicit newlines are kept and
/// words wider than a line are broken between characters.
pub fn wrap_text(text: &str, font: StandardFont, size: f64, max_width: f64) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", line, word)
            };
            if text_width(&candidate, font, size) <= max_width {
                line = candidate;
                continue;
            }

            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if text_width(word, font, size) <= max_width {
                line = word.to_string();
            } else {
                for c in word.chars() {
                    let mut next = line.clone();
                    next.push(c);
                    if !line.is_empty() && text_width(&next, font, size) > max_width {
                        lines.push(std::mem::replace(&mut line, c.to_string()));
                    } else {
                        line = next;
                    }
                }
            }
        }
        lines.push(line);
    }

    lines
}

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];
