/*!
 * CSV row parsing and export.
 *
 * Input files carry a header row naming (in any order, any case) the
 * `key`, `source` and `target` columns. Quoting follows RFC 4180: quoted
 * cells may contain commas and newlines, and `""` inside a quoted cell is a
 * literal quote. Tokenizing is delegated to the `csv` crate.
 */

use csv::{QuoteStyle, ReaderBuilder, StringRecordsIntoIter, Terminator, WriterBuilder};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::io::Cursor;

use crate::errors::RowParseError;
use crate::translation::model::TranslationItem;

/// Lazy, single-pass iterator over the raw rows of one CSV text
pub struct RowReader {
    records: StringRecordsIntoIter<Cursor<String>>,
}

impl RowReader {
    /// Create a reader over raw file text, normalizing line endings to `\n`
    pub fn from_text(text: &str) -> Self {
        let normalized = text
            .trim_start_matches('\u{feff}')
            .replace("\r\n", "\n")
            .replace('\r', "\n");

        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(Cursor::new(normalized));

        Self {
            records: reader.into_records(),
        }
    }
}

impl Iterator for RowReader {
    type Item = Result<Vec<String>, RowParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e.into())),
            };

            // A row whose only cell is empty carries nothing
            if record.len() == 1 && record[0].trim().is_empty() {
                continue;
            }

            return Some(Ok(record.iter().map(|cell| cell.to_string()).collect()));
        }
    }
}

/// Positions of the recognized columns in the header row
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ColumnMap {
    pub key: Option<usize>,
    pub source: Option<usize>,
    pub target: Option<usize>,
}

impl ColumnMap {
    /// Locate columns by case-insensitive header name
    pub fn from_header(header: &[String]) -> Self {
        let find = |name: &str| {
            header
                .iter()
                .position(|cell| cell.trim().eq_ignore_ascii_case(name))
        };

        Self {
            key: find("key"),
            source: find("source"),
            target: find("target"),
        }
    }

    fn cell<'a>(row: &'a [String], index: Option<usize>) -> &'a str {
        index
            .and_then(|i| row.get(i))
            .map(|s| s.as_str())
            .unwrap_or("")
    }
}

/// Parse raw CSV text into translation items in row order
///
/// Item ids are the 1-based ordinals of the data rows. Rows without a key get
/// a generated `row_<n>` label.
pub fn parse_items(text: &str) -> Result<Vec<TranslationItem>, RowParseError> {
    let mut rows = RowReader::from_text(text);

    let header = match rows.next() {
        Some(header) => header?,
        None => return Err(RowParseError::MissingHeader),
    };
    let columns = ColumnMap::from_header(&header);

    if columns.source.is_none() {
        warn!("CSV header has no 'source' column: {:?}", header);
    }

    let mut items = Vec::new();
    for (index, row) in rows.enumerate() {
        let row = row?;
        let id = index + 1;

        let key = ColumnMap::cell(&row, columns.key).trim();
        let key = if key.is_empty() {
            format!("row_{}", id)
        } else {
            key.to_string()
        };
        let source = ColumnMap::cell(&row, columns.source).to_string();
        let target = ColumnMap::cell(&row, columns.target);
        let target = if target.is_empty() {
            None
        } else {
            Some(target.to_string())
        };

        items.push(TranslationItem::from_row(id, key, source, target));
    }

    debug!("Parsed {} rows", items.len());
    Ok(items)
}

/// SHA-256 hex digest of raw file text, used to recognize re-ingested files
pub fn content_hash(text: &str) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Render items as CSV with header `key,source,target`, every value quoted
pub fn write_csv(items: &[TranslationItem]) -> anyhow::Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(["key", "source", "target"])?;
    for item in items {
        writer.write_record([
            item.key.as_str(),
            item.source.as_str(),
            item.target.as_deref().unwrap_or(""),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}
