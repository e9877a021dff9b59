//! Turns authoring sources into plain `\n`-separated text for the parser.
//!
//! Rich text is stripped on a best-effort basis: markup that is not understood
//! is dropped rather than reported, so decoding never fails.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFormat {
    #[default]
    Plain,
    RichText,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown source format '{0}' (expected plain or richtext)")]
pub struct UnknownFormat(pub String);

impl FromStr for SourceFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" | "txt" => Ok(SourceFormat::Plain),
            "richtext" | "rich-text" | "rtf" => Ok(SourceFormat::RichText),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

impl SourceFormat {
    pub fn from_file_name(name: &str) -> Self {
        if name.to_ascii_lowercase().ends_with(".rtf") {
            SourceFormat::RichText
        } else {
            SourceFormat::Plain
        }
    }
}

static DESTINATION_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\\\*[^}]*\}").expect("destination regex"));
static HEADER_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\{\\(?:fonttbl|colortbl|stylesheet|info|expandedcolortbl)[^{}]*(?:\{[^{}]*\}[^{}]*)*\}",
    )
    .expect("header table regex")
});
static UNICODE_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\u(-?\d+) ?\??").expect("unicode escape regex"));
static HEX_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\'([0-9a-fA-F]{2})").expect("hex escape regex"));
static CONTROL_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\([a-zA-Z]+)(-?\d+)? ?").expect("control word regex"));
static ESCAPED_NEWLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\\r?\n").expect("escaped newline regex"));
static ANY_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\\.").expect("escape regex"));
static HORIZONTAL_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("whitespace regex"));
static LINE_EDGE_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]*\n[ \t]*").expect("line edge regex"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n+").expect("blank line regex"));

pub fn decode(raw: &str, format: SourceFormat) -> String {
    match format {
        SourceFormat::Plain => normalize_newlines(raw.trim_start_matches('\u{feff}')),
        SourceFormat::RichText => strip_rich_text(raw),
    }
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn strip_rich_text(raw: &str) -> String {
    let text = DESTINATION_GROUP.replace_all(raw, "");
    let text = HEADER_TABLE.replace_all(&text, "");
    let text = UNICODE_ESCAPE.replace_all(&text, |caps: &Captures| {
        caps[1]
            .parse::<i32>()
            .ok()
            .map(|code| if code < 0 { code + 65_536 } else { code })
            .and_then(|code| char::from_u32(code as u32))
            .map(String::from)
            .unwrap_or_default()
    });
    let text = HEX_ESCAPE.replace_all(&text, |caps: &Captures| {
        u8::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(windows_1252)
            .map(String::from)
            .unwrap_or_default()
    });
    let text = CONTROL_WORD.replace_all(&text, |caps: &Captures| match &caps[1] {
        "par" | "line" => "\n",
        "tab" => "\t",
        _ => "",
    });
    let text = text
        .replace("\\~", " ")
        .replace("\\_", "-")
        .replace("\\-", "-");
    let text = ESCAPED_NEWLINE.replace_all(&text, "\n");
    let text = ANY_ESCAPE.replace_all(&text, "");
    let text: String = text
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '\\'))
        .collect();

    let text = normalize_newlines(&text);
    let text = HORIZONTAL_RUN.replace_all(&text, " ");
    let text = LINE_EDGE_SPACE.replace_all(&text, "\n");
    let text = BLANK_LINES.replace_all(&text, "\n");
    text.trim().to_string()
}

/// Byte from a `\'hh` escape. Only the typographic punctuation of the
/// 0x80..0x9F block is mapped; the rest of that block is dropped.
fn windows_1252(byte: u8) -> Option<char> {
    match byte {
        0x85 => Some('\u{2026}'),
        0x91 => Some('\u{2018}'),
        0x92 => Some('\u{2019}'),
        0x93 => Some('\u{201C}'),
        0x94 => Some('\u{201D}'),
        0x96 => Some('\u{2013}'),
        0x97 => Some('\u{2014}'),
        0x80..=0x9f => None,
        other => Some(char::from(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_only_normalizes_line_endings() {
        let raw = "\u{feff}title: A\r\nquestion: B\rcorrect: 1";
        assert_eq!(decode(raw, SourceFormat::Plain), "title: A\nquestion: B\ncorrect: 1");
    }

    #[test]
    fn rich_text_document_is_flattened() {
        let raw = r"{\rtf1\ansi\deff0{\fonttbl{\f0 Times;}}{\*\generator Riched20;}\f0\fs24 title: Sample\par question: 2+2?\par\pard answer1: 3\tab x\par}";
        assert_eq!(
            decode(raw, SourceFormat::RichText),
            "title: Sample\nquestion: 2+2?\nanswer1: 3\tx"
        );
    }

    #[test]
    fn rich_text_symbols_are_translated() {
        let raw = r"{\rtf1 a\~b\_c\line d\'93e\'94 \u8220?f}";
        assert_eq!(decode(raw, SourceFormat::RichText), "a b-c\nd\u{201C}e\u{201D} \u{201C}f");
    }

    #[test]
    fn rich_text_drops_unknown_escapes_and_collapses_whitespace() {
        let raw = "{\\rtf1 one\\{   two\\\\  \\\n\n\n  three\\}}\\";
        assert_eq!(decode(raw, SourceFormat::RichText), "one two\nthree");
    }

    #[test]
    fn format_from_name_and_label() {
        assert_eq!(SourceFormat::from_file_name("Quiz.RTF"), SourceFormat::RichText);
        assert_eq!(SourceFormat::from_file_name("quiz.txt"), SourceFormat::Plain);
        assert_eq!("RichText".parse::<SourceFormat>(), Ok(SourceFormat::RichText));
        assert!("docx".parse::<SourceFormat>().is_err());
    }
}
