//! Cell reference extraction from cleaned formula text.
//!
//! Three passes run over progressively reduced text, so a reference consumed
//! by a stricter pattern is never re-matched by a looser one:
//!
//! 1. External: `'[book.xlsx]Sheet'!A1` (optionally preceded by a leftover path)
//! 2. Internal: `'Sheet Name'!A1`, `FRIGO+OVEN!A1`, `Sheet2!A1`, `SUM(Sheet2!A1:A5)`
//! 3. Simple: bare `A1` tokens on the parent sheet
//!
//! Every consumed span is swapped for a placeholder in the working text and,
//! once all passes are done, the placeholders are expanded into canonical ids
//! (`file_sheet_cell`) to build the updated formula. Range endpoints are both
//! recorded against the range's sheet; ranges are not expanded cell by cell.

use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::cell_ref::{CellAddress, is_valid_cell};
use super::reference::Reference;

/// Sheet names that contain a literal `+` and must not be read as addition.
pub const DEFAULT_SPECIAL_SHEETS: &[&str] = &["FRIGO+OVEN", "KOLOM+BL", "LEGGERS+OVEN"];

const CELL_PATTERN: &str = r"\$?(?P<col>[A-Za-z]+)\$?(?P<row>[0-9]+)(?::\$?(?P<col2>[A-Za-z]+)\$?(?P<row2>[0-9]+))?";

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorOptions {
    pub special_sheets: Vec<String>,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        ExtractorOptions {
            special_sheets: DEFAULT_SPECIAL_SHEETS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReferenceExtractor {
    internal_re: Regex,
}

impl Default for ReferenceExtractor {
    fn default() -> Self {
        ReferenceExtractor::new(&ExtractorOptions::default())
    }
}

/// Accumulates references and placeholder replacements across passes.
struct Pass<'a> {
    parent_file: &'a str,
    parent_sheet: &'a str,
    references: Vec<Reference>,
    seen: HashSet<String>,
    replacements: Vec<String>,
}

impl<'a> Pass<'a> {
    /// Record the reference (once per identity) and return its canonical id.
    fn record(&mut self, file: &str, sheet: &str, cell: &str) -> String {
        let address = CellAddress::new(file, sheet, cell);
        let id = address.id();
        if self.seen.insert(id.clone()) {
            self.references.push(Reference::new(address));
        } else {
            tracing::debug!(%id, "duplicate reference dropped");
        }
        id
    }

    /// Replace one matched span: record its endpoints and hand back a placeholder.
    /// Returns the matched text untouched when the start cell is invalid.
    fn consume(&mut self, caps: &Captures, text: &str, file: &str, sheet: &str) -> String {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        if is_glued(text, None, Some(whole.1)) {
            return caps[0].to_string();
        }
        let start = format!("{}{}", &caps["col"], &caps["row"]);
        if !is_valid_cell(&start) {
            return caps[0].to_string();
        }

        let mut replacement = self.record(file, sheet, &start);
        if let (Some(col2), Some(row2)) = (caps.name("col2"), caps.name("row2")) {
            let end = format!("{}{}", col2.as_str(), row2.as_str());
            replacement.push(':');
            if is_valid_cell(&end) {
                replacement.push_str(&self.record(file, sheet, &end));
            } else {
                replacement.push_str(&end);
            }
        }
        self.placeholder(replacement)
    }

    fn placeholder(&mut self, replacement: String) -> String {
        let idx = self.replacements.len();
        self.replacements.push(replacement);
        format!("@@@{}@@@", idx)
    }
}

impl ReferenceExtractor {
    pub fn new(options: &ExtractorOptions) -> Self {
        let mut special: Vec<&str> = options
            .special_sheets
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        // Longest first so a name is never shadowed by one of its prefixes.
        special.sort_by_key(|s| std::cmp::Reverse(s.len()));
        let special_alt = if special.is_empty() {
            String::new()
        } else {
            let escaped: Vec<String> = special.iter().map(|s| regex::escape(s)).collect();
            format!("|(?P<special>{})", escaped.join("|"))
        };
        let pattern = format!(
            r"(?:'(?P<quoted>[^'\[\]]+)'{}|(?P<bare>[\w.]+))!{}",
            special_alt, CELL_PATTERN
        );
        let internal_re = Regex::new(&pattern).expect("internal reference regex must compile");
        ReferenceExtractor { internal_re }
    }

    /// Extract the references of `cleaned_formula`, which lives on
    /// `(parent_file, parent_sheet)`.
    ///
    /// Returns the references in pass order (external, internal, simple; each
    /// left to right), de-duplicated by identity, together with the formula
    /// rewritten in canonical ids. Text that matches nothing yields no
    /// references and an unchanged formula.
    pub fn extract_references(
        &self,
        cleaned_formula: &str,
        parent_file: &str,
        parent_sheet: &str,
    ) -> (Vec<Reference>, String) {
        let mut pass = Pass {
            parent_file,
            parent_sheet,
            references: Vec::new(),
            seen: HashSet::new(),
            replacements: Vec::new(),
        };

        let external = external_re()
            .replace_all(cleaned_formula, |caps: &Captures| {
                let file = caps["file"].to_string();
                let sheet = caps["sheet"].to_string();
                pass.consume(caps, cleaned_formula, &file, &sheet)
            })
            .into_owned();

        let internal = self
            .internal_re
            .replace_all(&external, |caps: &Captures| {
                let sheet = caps
                    .name("quoted")
                    .or_else(|| caps.name("special"))
                    .or_else(|| caps.name("bare"))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                let file = pass.parent_file;
                pass.consume(caps, &external, file, &sheet)
            })
            .into_owned();

        let simple = simple_re()
            .replace_all(&internal, |caps: &Captures| {
                let Some(m) = caps.get(0) else {
                    return String::new();
                };
                if is_glued(&internal, Some(m.start()), Some(m.end()))
                    || internal[m.end()..].starts_with('!')
                {
                    return m.as_str().to_string();
                }
                let cell = format!("{}{}", &caps["col"], &caps["row"]);
                if !is_valid_cell(&cell) {
                    return m.as_str().to_string();
                }
                let (file, sheet) = (pass.parent_file, pass.parent_sheet);
                let id = pass.record(file, sheet, &cell);
                pass.placeholder(id)
            })
            .into_owned();

        let updated = restore_placeholders(&simple, &pass.replacements);
        (pass.references, updated)
    }
}

/// True when the span touches an identifier character on either side, i.e.
/// it is part of a larger token (a function name, a file name, a canonical id).
fn is_glued(text: &str, start: Option<usize>, end: Option<usize>) -> bool {
    let touches = |c: char| c.is_alphanumeric() || c == '_' || c == '.';
    let before = start
        .and_then(|s| text[..s].chars().next_back())
        .is_some_and(touches);
    let after = end.and_then(|e| text[e..].chars().next()).is_some_and(touches);
    before || after
}

fn external_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?:'[^'\[\]!]*[\\/])?'?\[(?P<file>[^\]]+)\](?P<sheet>[^'\[\]!]+)'?!{}",
            CELL_PATTERN
        );
        Regex::new(&pattern).expect("external reference regex must compile")
    })
}

fn simple_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$?(?P<col>[A-Za-z]+)\$?(?P<row>[0-9]+)")
            .expect("simple reference regex must compile")
    })
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@@@([0-9]+)@@@").expect("placeholder regex must compile"))
}

fn restore_placeholders(text: &str, replacements: &[String]) -> String {
    if replacements.is_empty() {
        return text.to_string();
    }
    placeholder_re()
        .replace_all(text, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|idx| replacements.get(idx))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
