//! Text and filename normalization.
//!
//! Everything that is compared downstream goes through [`Normalizer`] first:
//! fenced code blocks are dropped, script variants are folded, and only
//! alphanumeric characters survive (ASCII lower-cased).

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::script::ScriptFolder;

/// Fenced blocks (```json ... ```) carry structured fields, not prose.
static RE_CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("Invalid regex"));

/// Leading numeric identifier: digits, then a separator or end of stem.
static RE_NUMERIC_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:[\s_.\-、]+|$)").expect("Invalid regex"));

static RE_LEADING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+").expect("Invalid regex"));

/// What a filename says about its document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub raw_id: Option<String>,
    pub numeric_id: Option<u32>,
    pub title: String,
    /// Starts with digits that do not form an identifier (`15水泥粉…`).
    pub malformed_id: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    folder: ScriptFolder,
}

impl Normalizer {
    pub fn new(folder: ScriptFolder) -> Self {
        Self { folder }
    }

    /// Strip fences, punctuation, symbols and whitespace; fold script variants.
    pub fn normalize_text(&self, text: &str) -> String {
        let body = RE_CODE_FENCE.replace_all(text, "");
        self.normalize_fragment(&body)
    }

    /// Normalize a fragment that carries no fenced blocks (titles, fields).
    pub fn normalize_fragment(&self, text: &str) -> String {
        text.chars()
            .filter(|c| c.is_alphanumeric())
            .map(|c| self.folder.fold(c.to_ascii_lowercase()))
            .collect()
    }
}

/// Split a filename into identifier and title.
///
/// `07 换刃卡顿.txt` → id 7, title `换刃卡顿`;
/// `215_後腳送轉別掰髖__L-adv__S-powder.md` → id 215, title `後腳送轉別掰髖`;
/// `15水泥粉里不摔跤小技巧.txt` → no id, flagged malformed, title is the whole stem.
pub fn parse_filename(file_name: &str) -> ParsedName {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let (raw_id, numeric_id, rest, malformed_id) = match RE_NUMERIC_PREFIX.captures(&stem) {
        Some(caps) => {
            let digits = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
            match digits.parse::<u32>() {
                Ok(n) => (Some(digits.to_string()), Some(n), &stem[whole..], false),
                Err(_) => (None, None, stem.as_str(), true),
            }
        }
        None => (None, None, stem.as_str(), RE_LEADING_DIGITS.is_match(&stem)),
    };

    let title = match rest.find("__") {
        Some(cut) => &rest[..cut],
        None => rest,
    };

    ParsedName {
        raw_id,
        numeric_id,
        title: title.trim().to_string(),
        malformed_id,
    }
}
