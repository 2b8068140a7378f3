//! Raw cell reads from workbooks on disk.
//!
//! [`WorkbookProvider`] is the [`CellProvider`] used for real runs. It keeps
//! an LRU of open workbooks; every open workbook loads a sheet's value and
//! formula ranges the first time a cell on that sheet is read.
//!
//! Formulas in xlsx files refer to other workbooks through an index into the
//! workbook's external link parts (`[1]Sheet!A1`). The provider rewrites the
//! index back to the linked file name so the extractor sees `[file]Sheet!A1`.

use calamine::{Data, Range, Reader, Sheets, open_workbook_auto};
use lru::LruCache;
use percent_encoding::percent_decode;
use quick_xml::events::Event;
use quick_xml::reader::Reader as XmlReader;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use bomgraph_engine::engine::{CellAddress, CellProvider, CellValue, RawCell};
use bomgraph_engine::error::{LookupError, Result as LookupResult};

use super::index::{FileIndex, lookup_key};
use crate::config::DEFAULT_WORKBOOK_CACHE;
use crate::error::Result;

struct SheetData {
    values: Range<Data>,
    formulas: Range<String>,
}

struct OpenWorkbook {
    sheets: Sheets<BufReader<File>>,
    sheet_names: Vec<String>,
    loaded: HashMap<String, SheetData>,
    external_links: HashMap<u32, String>,
}

impl OpenWorkbook {
    fn open(path: &Path) -> Result<OpenWorkbook> {
        let sheets = open_workbook_auto(path)?;
        let sheet_names = sheets.sheet_names();
        let external_links = if is_zip_workbook(path) {
            read_external_links(path).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "could not read external links");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };
        tracing::debug!(path = %path.display(), sheets = sheet_names.len(), links = external_links.len(), "opened workbook");
        Ok(OpenWorkbook {
            sheets,
            sheet_names,
            loaded: HashMap::new(),
            external_links,
        })
    }

    /// Exact sheet name first, then Excel's case-insensitive match, then a
    /// match with whitespace ignored.
    fn find_sheet(&self, name: &str) -> Option<String> {
        self.sheet_names
            .iter()
            .find(|s| *s == name)
            .or_else(|| self.sheet_names.iter().find(|s| s.eq_ignore_ascii_case(name)))
            .or_else(|| {
                let key = lookup_key(name);
                self.sheet_names.iter().find(|s| lookup_key(s) == key)
            })
            .cloned()
    }

    fn load_sheet(&mut self, name: &str) -> LookupResult<()> {
        if !self.loaded.contains_key(name) {
            let values = self
                .sheets
                .worksheet_range(name)
                .map_err(|e| LookupError::Workbook(e.to_string()))?;
            let formulas = self
                .sheets
                .worksheet_formula(name)
                .map_err(|e| LookupError::Workbook(e.to_string()))?;
            self.loaded
                .insert(name.to_string(), SheetData { values, formulas });
        }
        Ok(())
    }
}

fn is_zip_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx") || e.eq_ignore_ascii_case("xlsm"))
}

pub struct WorkbookProvider {
    index: FileIndex,
    open: LruCache<String, OpenWorkbook>,
}

impl WorkbookProvider {
    pub fn new(index: FileIndex, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_WORKBOOK_CACHE))
            .unwrap_or(NonZeroUsize::MIN);
        WorkbookProvider {
            index,
            open: LruCache::new(capacity),
        }
    }

    pub fn open_workbooks(&self) -> usize {
        self.open.len()
    }

    fn workbook(&mut self, file: &str) -> LookupResult<&mut OpenWorkbook> {
        let path: PathBuf = self
            .index
            .get(file)
            .ok_or_else(|| LookupError::FileNotFound(file.to_string()))?
            .to_path_buf();
        let key = path.to_string_lossy().into_owned();
        if !self.open.contains(&key) {
            let workbook =
                OpenWorkbook::open(&path).map_err(|e| LookupError::Workbook(e.to_string()))?;
            if let Some((evicted, _)) = self.open.push(key.clone(), workbook) {
                if evicted != key {
                    tracing::debug!(%evicted, "closed workbook");
                }
            }
        }
        self.open
            .get_mut(&key)
            .ok_or_else(|| LookupError::FileNotFound(file.to_string()))
    }
}

impl CellProvider for WorkbookProvider {
    fn read_cell(&mut self, address: &CellAddress) -> LookupResult<RawCell> {
        let position = address
            .position()
            .ok_or_else(|| LookupError::CellNotFound(address.cell.clone()))?;
        let workbook = self.workbook(&address.file)?;
        let sheet_name = workbook
            .find_sheet(&address.sheet)
            .ok_or_else(|| LookupError::SheetNotFound(address.sheet.clone()))?;
        workbook.load_sheet(&sheet_name)?;
        let sheet = workbook
            .loaded
            .get(&sheet_name)
            .ok_or_else(|| LookupError::SheetNotFound(address.sheet.clone()))?;
        let links = &workbook.external_links;

        let pos = (position.row, position.col);
        let value = sheet.values.get_value(pos).and_then(cell_value);
        let formula = sheet
            .formulas
            .get_value(pos)
            .filter(|f| !f.is_empty())
            .map(|f| format!("={}", rewrite_external_indices(f, links)));
        Ok(RawCell { formula, value })
    }
}

/// Cached cell value as the engine sees it. Empty cells have no value.
pub fn cell_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty => None,
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::Error(e) => Some(CellValue::Text(e.to_string())),
    }
}

fn link_index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([0-9]+)\]").expect("link index regex must compile"))
}

fn link_rels_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^xl/externalLinks/_rels/externalLink([0-9]+)\.xml\.rels$")
            .expect("link part regex must compile")
    })
}

/// Replace `[N]` link indices with `[file name]`. Unknown indices stay.
pub fn rewrite_external_indices(formula: &str, links: &HashMap<u32, String>) -> String {
    if links.is_empty() {
        return formula.to_string();
    }
    link_index_re()
        .replace_all(formula, |caps: &Captures| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(|n| links.get(&n))
                .map(|name| format!("[{}]", name))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Link index to linked file name, from the archive's external link parts.
pub fn read_external_links(path: &Path) -> Result<HashMap<u32, String>> {
    let file = File::open(path)?;
    external_links_from_archive(file)
}

fn external_links_from_archive<R: Read + Seek>(reader: R) -> Result<HashMap<u32, String>> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let parts: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let caps = link_rels_re().captures(name)?;
            let n = caps[1].parse::<u32>().ok()?;
            Some((n, name.to_string()))
        })
        .collect();

    let mut links = HashMap::new();
    for (n, part) in parts {
        let mut xml = String::new();
        archive.by_name(&part)?.read_to_string(&mut xml)?;
        if let Some(target) = relationship_target(&xml) {
            links.insert(n, link_file_name(&target));
        }
    }
    Ok(links)
}

/// Unescaped `Target` of the first `Relationship` in a `.rels` part.
fn relationship_target(xml: &str) -> Option<String> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let target = e
                    .attributes()
                    .flatten()
                    .find(|attr| attr.key.as_ref() == b"Target")
                    .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()));
                if target.is_some() {
                    return target;
                }
            }
            Ok(Event::Eof) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "malformed external link relationships");
                return None;
            }
            _ => {}
        }
        buf.clear();
    }
}

/// File name part of a relationship target (`file:///C:\x\My%20Book.xlsx`).
pub fn link_file_name(target: &str) -> String {
    let last = target.rsplit(['/', '\\']).next().unwrap_or(target);
    percent_decode(last.as_bytes()).decode_utf8_lossy().into_owned()
}
