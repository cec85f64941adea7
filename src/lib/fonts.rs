//! Base-14 Helvetica metrics and text measurement for direct PDF layout.
//!
//! Pages laid out without a browser, and the running heads stamped at merge time, use the
//! standard Helvetica family that every PDF reader provides, so nothing is embedded.
//! Text is written in WinAnsi encoding. Characters outside that code page are transliterated
//! with `deunicode` before encoding (`"Łódź"` becomes `"Lodz"`), never dropped silently.

use deunicode::deunicode_char;

/// Advance widths of Helvetica for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A..M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a..m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n..z
    334, 260, 334, 584, // {..~
];

/// Advance widths of Helvetica-Bold for ASCII 32..=126, in 1/1000 em.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    333, 333, 584, 584, 584, 611, 975, // :..@
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, // A..M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N..Z
    333, 278, 333, 584, 556, 333, // [..`
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, // a..m
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, // n..z
    389, 280, 389, 584, // {..~
];

const SPACE_WIDTH: f32 = 278.0;

/// Face of the Helvetica family used for a run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFace {
    Regular,
    Bold,
    Italic,
}

impl FontFace {
    pub const ALL: [FontFace; 3] = [FontFace::Regular, FontFace::Bold, FontFace::Italic];

    /// Name of the font in a page's resource dictionary.
    pub fn resource_name(&self) -> &'static str {
        match self {
            FontFace::Regular => "F1",
            FontFace::Bold => "F2",
            FontFace::Italic => "F3",
        }
    }

    pub fn base_font(&self) -> &'static str {
        match self {
            FontFace::Regular => "Helvetica",
            FontFace::Bold => "Helvetica-Bold",
            FontFace::Italic => "Helvetica-Oblique",
        }
    }

    fn byte_width(&self, byte: u8) -> u16 {
        let table = match self {
            FontFace::Bold => &HELVETICA_BOLD_WIDTHS,
            FontFace::Regular | FontFace::Italic => &HELVETICA_WIDTHS,
        };
        match byte {
            32..=126 => table[(byte - 32) as usize],
            0x85 | 0x97 => 1000,
            0x91 | 0x92 => 222,
            0x93 | 0x94 => 333,
            0x95 => 350,
            0xA0 => 278,
            0xA9 | 0xAE => 737,
            _ => 556,
        }
    }
}

fn win_ansi_byte(c: char) -> Option<u8> {
    let byte = match c {
        ' '..='~' => c as u8,
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        '\t' => b' ',
        _ => return None,
    };
    Some(byte)
}

/// Encodes text for a Helvetica `Tj` string in WinAnsi.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        if let Some(byte) = win_ansi_byte(c) {
            bytes.push(byte);
            continue;
        }
        match deunicode_char(c) {
            Some(ascii) => bytes.extend(ascii.bytes().filter(|b| (32..=126).contains(b))),
            None => bytes.push(b'?'),
        }
    }
    bytes
}

/// Width of already encoded bytes at `size` points.
pub fn encoded_width(bytes: &[u8], face: FontFace, size: f32) -> f32 {
    let units: u32 = bytes.iter().map(|b| face.byte_width(*b) as u32).sum();
    units as f32 * size / 1000.0
}

/// Width of `text` at `size` points.
pub fn text_width(text: &str, face: FontFace, size: f32) -> f32 {
    encoded_width(&encode_win_ansi(text), face, size)
}

/// A run of text drawn in a single face.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub text: String,
    pub face: FontFace,
}

/// An unbreakable word; pieces differ in face (`**bold**,` is a bold piece and a comma).
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub pieces: Vec<Piece>,
}

impl Word {
    pub fn width(&self, size: f32) -> f32 {
        self.pieces
            .iter()
            .map(|p| text_width(&p.text, p.face, size))
            .sum()
    }
}

/// Splits styled runs into words. Runs that touch without whitespace form one word.
pub fn split_words(runs: &[(String, FontFace)]) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();
    let mut glue = false;
    for (text, face) in runs {
        for (i, segment) in text.split(char::is_whitespace).enumerate() {
            if i > 0 {
                glue = false;
            }
            if segment.is_empty() {
                continue;
            }
            let piece = Piece {
                text: segment.to_string(),
                face: *face,
            };
            match words.last_mut() {
                Some(word) if glue => word.pieces.push(piece),
                _ => words.push(Word {
                    pieces: vec![piece],
                }),
            }
            glue = true;
        }
        if text.ends_with(char::is_whitespace) {
            glue = false;
        }
    }
    words
}

/// One wrapped line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub words: Vec<Word>,
    /// Natural width including single spaces between words.
    pub width: f32,
}

impl Line {
    pub fn space_count(&self) -> usize {
        self.words.len().saturating_sub(1)
    }

    /// Pieces to draw, with the inter-word spaces folded in and same-face neighbours merged.
    pub fn pieces(&self) -> Vec<Piece> {
        let mut pieces: Vec<Piece> = Vec::new();
        for (i, word) in self.words.iter().enumerate() {
            for (j, piece) in word.pieces.iter().enumerate() {
                let mut text = String::new();
                if i > 0 && j == 0 {
                    text.push(' ');
                }
                text.push_str(&piece.text);
                match pieces.last_mut() {
                    Some(last) if last.face == piece.face => last.text.push_str(&text),
                    _ => pieces.push(Piece {
                        text,
                        face: piece.face,
                    }),
                }
            }
        }
        pieces
    }
}

/// Greedy word wrap. The first line is `first_width` wide (narrower when indented), the rest
/// `width`. A word wider than the line is placed on its own line and overflows.
pub fn wrap(words: &[Word], size: f32, first_width: f32, width: f32) -> Vec<Line> {
    let space = SPACE_WIDTH * size / 1000.0;
    let mut lines: Vec<Line> = Vec::new();
    let mut current = Line {
        words: Vec::new(),
        width: 0.0,
    };
    for word in words {
        let max = if lines.is_empty() { first_width } else { width };
        let word_width = word.width(size);
        if !current.words.is_empty() && current.width + space + word_width > max {
            lines.push(std::mem::replace(
                &mut current,
                Line {
                    words: Vec::new(),
                    width: 0.0,
                },
            ));
        }
        if !current.words.is_empty() {
            current.width += space;
        }
        current.width += word_width;
        current.words.push(word.clone());
    }
    if !current.words.is_empty() {
        lines.push(current);
    }
    lines
}

/// Width of a single space at `size` points.
pub fn space_width(size: f32) -> f32 {
    SPACE_WIDTH * size / 1000.0
}
