//! A1 notation helpers and column-name to cell-reference translation.

use std::collections::HashMap;

use regex::Regex;

use crate::schema::{FlowStructure, SheetSpec};

/// 1-based column index to its letter form: 1 → A, 27 → AA.
pub fn column_letter(index: usize) -> String {
    let mut n = index;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Quote a sheet title for use in a range, doubling embedded quotes.
pub fn quote_sheet(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

pub fn cell(sheet: &str, column: usize, row: u32) -> String {
    format!("{}!{}{}", quote_sheet(sheet), column_letter(column), row)
}

/// Vertical range within one column, rows inclusive.
pub fn column_range(sheet: &str, column: usize, first_row: u32, last_row: u32) -> String {
    let letter = column_letter(column);
    format!("{}!{}{}:{}{}", quote_sheet(sheet), letter, first_row, letter, last_row)
}

/// Header row range spanning `width` columns.
pub fn header_range(sheet: &str, width: usize) -> String {
    format!(
        "{}!A1:{}1",
        quote_sheet(sheet),
        column_letter(width.max(1))
    )
}

#[derive(Debug, Clone)]
enum Reference {
    /// Same-row cell on the formula's own sheet.
    Cell(String),
    /// Whole column on another (or the same) sheet.
    Column { sheet: String, letter: String },
}

/// Rewrites column names in a formula expression into A1 references for one sheet.
///
/// Bare names resolve against the formula's own sheet and become same-row cells. Qualified
/// names (`Sheet.column`, `Sheet!column`) become whole-column ranges. Text inside string
/// literals is left alone, and longer names win over shorter ones.
#[derive(Debug, Clone)]
pub struct FormulaTranslator {
    pattern: Regex,
    references: HashMap<String, Reference>,
}

impl FormulaTranslator {
    pub fn new(structure: &FlowStructure, sheet: &SheetSpec) -> Result<Self, regex::Error> {
        let mut references = HashMap::new();

        for other in &structure.sheets {
            for (i, column) in other.columns.iter().enumerate() {
                let reference = Reference::Column {
                    sheet: other.name.clone(),
                    letter: column_letter(i + 1),
                };
                for sep in ['.', '!'] {
                    references.insert(format!("{}{}{}", other.name, sep, column.name), reference.clone());
                    references.insert(
                        format!("{}{}{}", quote_sheet(&other.name), sep, column.name),
                        reference.clone(),
                    );
                }
            }
        }
        for (i, column) in sheet.columns.iter().enumerate() {
            references.insert(column.name.clone(), Reference::Cell(column_letter(i + 1)));
        }

        let mut tokens: Vec<&String> = references.keys().collect();
        tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = tokens
            .iter()
            .map(|token| bounded(token))
            .collect::<Vec<_>>()
            .join("|");

        Ok(Self {
            pattern: Regex::new(&alternation)?,
            references,
        })
    }

    pub fn translate(&self, expression: &str, row: u32) -> String {
        // Segments at odd positions sit inside "..." literals; `""` escapes toggle twice.
        expression
            .split('"')
            .enumerate()
            .map(|(i, segment)| {
                if i % 2 == 1 {
                    segment.to_string()
                } else {
                    self.translate_segment(segment, row)
                }
            })
            .collect::<Vec<_>>()
            .join("\"")
    }

    fn translate_segment(&self, segment: &str, row: u32) -> String {
        self.pattern
            .replace_all(segment, |caps: &regex::Captures<'_>| {
                let token = &caps[0];
                match self.references.get(token) {
                    Some(Reference::Cell(letter)) => format!("{}{}", letter, row),
                    Some(Reference::Column { sheet, letter }) => {
                        format!("{}!{}:{}", quote_sheet(sheet), letter, letter)
                    }
                    None => token.to_string(),
                }
            })
            .into_owned()
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Escaped token with `\b` on each side that starts or ends with a word character.
fn bounded(token: &str) -> String {
    let escaped = regex::escape(token);
    let starts_word = token.chars().next().map_or(false, is_word);
    let ends_word = token.chars().last().map_or(false, is_word);
    format!(
        "{}{}{}",
        if starts_word { r"\b" } else { "" },
        escaped,
        if ends_word { r"\b" } else { "" }
    )
}
