//! JSON and CSV rendering of projected records.
//!
//! These adapters only format what the pipeline already produced; they never
//! reorder, drop or coerce fields beyond what each format requires.

use crate::error::{ConfigError, Result};
use crate::value::to_text;
use crate::Record;

/// Options for [`to_json`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonOptions {
    /// Indent nested structures over multiple lines.
    pub pretty: bool,
    /// Write `/` as `\/` (some consumers embed JSON in HTML).
    pub escape_slashes: bool,
}

impl JsonOptions {
    pub fn pretty() -> Self {
        JsonOptions {
            pretty: true,
            ..Default::default()
        }
    }
}

/// Options for [`to_csv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Field separator. Must be a single ASCII character.
    pub delimiter: char,
    /// Character every field is wrapped in. Must be a single ASCII character.
    pub enclosure: char,
}

impl CsvOptions {
    /// Checks both characters and returns them as bytes.
    pub fn validate(&self) -> std::result::Result<(u8, u8), ConfigError> {
        Ok((
            ascii_byte("delimiter", self.delimiter)?,
            ascii_byte("enclosure", self.enclosure)?,
        ))
    }
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            delimiter: ',',
            enclosure: '"',
        }
    }
}

/// Serializes records as a JSON array.
pub fn to_json(records: &[Record], options: JsonOptions) -> Result<String> {
    let json = if options.pretty {
        serde_json::to_string_pretty(records)?
    } else {
        serde_json::to_string(records)?
    };
    // '/' can only occur inside JSON strings, where "\/" is a valid escape.
    Ok(if options.escape_slashes {
        json.replace('/', "\\/")
    } else {
        json
    })
}

/// Column names for CSV output: the keys of the first record, in order.
pub fn csv_headers(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|first| first.keys().cloned().collect())
        .unwrap_or_default()
}

/// Serializes records as CSV.
///
/// The header row comes from the first record's keys. Every field, header
/// included, is wrapped in the enclosure character, with embedded enclosures
/// doubled. Rows are joined by `\n` without a trailing newline. No records
/// means an empty string, not a lone header.
pub fn to_csv(records: &[Record], options: CsvOptions) -> Result<String> {
    let (delimiter, enclosure) = options.validate()?;
    if records.is_empty() {
        return Ok(String::new());
    }
    let headers = csv_headers(records);

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote(enclosure)
        .quote_style(csv::QuoteStyle::Always)
        .double_quote(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(vec![]);

    wtr.write_record(&headers)?;
    for record in records {
        let row: Vec<String> = headers
            .iter()
            .map(|header| record.get(header).map(to_text).unwrap_or_default())
            .collect();
        wtr.write_record(&row)?;
    }

    let bytes = wtr.into_inner()?;
    let mut text = String::from_utf8(bytes)?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

fn ascii_byte(which: &'static str, value: char) -> std::result::Result<u8, ConfigError> {
    if value.is_ascii() {
        Ok(value as u8)
    } else {
        Err(ConfigError::InvalidCsvChar { which, value })
    }
}
