//! Formula text normalization.
//!
//! Raw formulas coming out of the workbooks carry absolute markers, leading
//! `=`/`=+`, full base paths of linked files and arbitrary spacing. The
//! cleaner rewrites them into the canonical text the reference extractor's
//! patterns are written against. Cleaning only changes syntax: the set of
//! referenced cells is the same before and after.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Base folders that prefix linked file names in the corpus.
pub const DEFAULT_BASE_URLS: &[&str] = &[
    "https://mordrel-my.sharepoint.com/Kovera/BASISMATERIALEN/",
    "https://mordrel-my.sharepoint.com/personal/matthieu_mordrel_pro/Documents/Work/Projects/Kovera/Project 2/BASISMATERIALEN/",
    "\\\\LS420D340\\Zaak\\Kovera\\BASISMATERIALEN\\",
];

/// Price-group folders that show up between the base folder and the file name.
pub const DEFAULT_FOLDERS: &[&str] = &[
    "1- 2022-COMFORTLINE - KLEUR - MELAMINE A+ MDF BRUT + CORPUS KLEUR",
    "2 - 2022-COMFORTLINE - KLEUR - MELAMINE B + MDF BRUT + CORPUS KLEUR",
    "3 - 2022- COMFORTLINE - LAMINAAT A + CORPUS KLEUR",
    "4 - 2022- COMFORTLINE - LAMINAAT B + CORPUS KLEUR",
    "5 -2022- COMFORTLINE - POEDERLAK-5DUN FINEER + CORPUS KLEUR",
    "6 -2022- COMFORTLINE - VLAK LAK  + CORPUS KLEUR",
    "7 -2022- COMFORTLINE - LAK GEGROEFD OF KADER +FINEER   + CORPUS KLEUR",
    "8 -2022- COMFORTLINE - BALKENEIK  + CORPUS KLEUR",
    "9 -2022- COMFORTLINE - MASSIEF KADER-FINEER  + CORPUS KLEUR",
    "10 -2022- COMFORTLINE - DIK FINEER EN HOOGGLANS  + CORPUS KLEUR",
];

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanerOptions {
    /// Literal prefixes removed wherever they occur.
    pub base_urls: Vec<String>,
    /// Folder names removed when followed by a path separator.
    pub folders: Vec<String>,
    /// Also drop `'` sheet quoting. Off by default: quoted sheet names are
    /// the only way the extractor can see names containing spaces.
    pub strip_quotes: bool,
}

impl Default for CleanerOptions {
    fn default() -> Self {
        CleanerOptions {
            base_urls: DEFAULT_BASE_URLS.iter().map(|s| s.to_string()).collect(),
            folders: DEFAULT_FOLDERS.iter().map(|s| s.to_string()).collect(),
            strip_quotes: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FormulaCleaner {
    options: CleanerOptions,
}

impl FormulaCleaner {
    pub fn new(options: CleanerOptions) -> Self {
        FormulaCleaner { options }
    }

    /// Clean a raw formula. `None` and empty input pass through unchanged.
    pub fn clean(&self, formula: Option<&str>) -> Option<String> {
        let formula = formula?;
        if formula.is_empty() {
            return Some(String::new());
        }
        Some(self.clean_str(formula))
    }

    pub fn clean_str(&self, formula: &str) -> String {
        let mut cleaned = formula.replace('$', "");
        if self.options.strip_quotes {
            cleaned = cleaned.replace('\'', "");
        }

        cleaned = strip_leading_equals(&cleaned).to_string();

        for base_url in &self.options.base_urls {
            if !base_url.is_empty() {
                cleaned = cleaned.replace(base_url.as_str(), "");
            }
        }
        for folder in &self.options.folders {
            if folder.is_empty() {
                continue;
            }
            cleaned = cleaned.replace(&format!("{}/", folder), "");
            cleaned = cleaned.replace(&format!("{}\\", folder), "");
        }

        remove_unquoted_whitespace(&cleaned)
    }
}

fn strip_leading_equals(formula: &str) -> &str {
    let formula = formula.trim_start();
    let formula = formula.strip_prefix("=+").unwrap_or(formula);
    formula.trim_start_matches('=')
}

fn quoted_or_space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"'[^']*'|\s+").expect("quoted segment regex must compile")
    })
}

/// Drop whitespace, keeping quoted segments verbatim.
fn remove_unquoted_whitespace(formula: &str) -> String {
    quoted_or_space_re()
        .replace_all(formula, |caps: &regex::Captures| {
            let m = &caps[0];
            if m.starts_with('\'') {
                m.to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(formula: &str) -> String {
        FormulaCleaner::default().clean_str(formula)
    }

    #[test]
    fn test_none_and_empty_pass_through() {
        let cleaner = FormulaCleaner::default();
        assert_eq!(cleaner.clean(None), None);
        assert_eq!(cleaner.clean(Some("")), Some(String::new()));
    }

    #[test]
    fn test_strips_absolute_markers_and_leading_equals() {
        assert_eq!(clean("=$A$1+B$2"), "A1+B2");
        assert_eq!(clean("=+C19*D17"), "C19*D17");
        assert_eq!(clean("==A1"), "A1");
    }

    #[test]
    fn test_inner_equals_survive() {
        assert_eq!(clean("=IF(A1=B1,1,0)"), "IF(A1=B1,1,0)");
    }

    #[test]
    fn test_whitespace_removed_outside_quotes_only() {
        assert_eq!(
            clean("= 'LADE 35'!J37 + SUM( A1 , B2 )"),
            "'LADE 35'!J37+SUM(A1,B2)"
        );
    }

    #[test]
    fn test_base_url_and_folder_removed() {
        let raw = "='\\\\LS420D340\\Zaak\\Kovera\\BASISMATERIALEN\\[calculatie cat 2022 .xlsx]PLATEN'!E5";
        assert_eq!(clean(raw), "'[calculatie cat 2022 .xlsx]PLATEN'!E5");

        let raw = "='https://mordrel-my.sharepoint.com/Kovera/BASISMATERIALEN/3 - 2022- COMFORTLINE - LAMINAAT A + CORPUS KLEUR/[kast.xlsx]OVERZICHT'!D5";
        assert_eq!(clean(raw), "'[kast.xlsx]OVERZICHT'!D5");
    }

    #[test]
    fn test_strip_quotes_option() {
        let cleaner = FormulaCleaner::new(CleanerOptions {
            strip_quotes: true,
            ..CleanerOptions::default()
        });
        assert_eq!(cleaner.clean_str("'Sheet2'!A1"), "Sheet2!A1");
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let once = clean("=+ $A$1 * 'My Sheet'!$B$2 ");
        assert_eq!(clean(&once), once);
        assert!(!once.contains('$'));
    }
}
