/*!
 * Tests for CSV row parsing and export
 */

use locbatch::row_parser::{content_hash, parse_items, write_csv, ColumnMap};
use locbatch::translation::ItemStatus;
use locbatch::RowParseError;

/// Columns are found by name regardless of order and case
#[test]
fn test_parse_items_withReorderedHeader_shouldMapColumnsByName() {
    let items = parse_items("Target,KEY, Source \n,btn.ok,OK\nГаразд,btn.cancel,Cancel\n").unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].key, "btn.ok");
    assert_eq!(items[0].source, "OK");
    assert_eq!(items[0].target, None);
    assert_eq!(items[0].status, ItemStatus::Pending);
    assert_eq!(items[1].target.as_deref(), Some("Гаразд"));
    assert_eq!(items[1].status, ItemStatus::Done);
}

/// Ids are 1-based data row ordinals and missing keys are generated
#[test]
fn test_parse_items_withoutKeyColumn_shouldGenerateRowKeys() {
    let items = parse_items("source\nHello\nWorld\n").unwrap();

    assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(items[0].key, "row_1");
    assert_eq!(items[1].key, "row_2");
}

/// A byte order mark does not hide the first column name
#[test]
fn test_parse_items_withBom_shouldStillFindKeyColumn() {
    let items = parse_items("\u{feff}key,source\nk1,Hello\n").unwrap();
    assert_eq!(items[0].key, "k1");
}

/// Empty source rows have nothing to translate
#[test]
fn test_parse_items_withBlankSource_shouldStartDone() {
    let items = parse_items("key,source\nk1,\"  \"\n").unwrap();
    assert_eq!(items[0].status, ItemStatus::Done);
}

/// Quoted cells keep their commas and line breaks
#[test]
fn test_parse_items_withMultilineCell_shouldKeepItInOneItem() {
    let items = parse_items("key,source\nk1,\"Line one,\r\nline two\"\nk2,Next\n").unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].source, "Line one,\nline two");
}

/// Empty input has no header
#[test]
fn test_parse_items_withEmptyText_shouldReportMissingHeader() {
    assert!(matches!(parse_items(""), Err(RowParseError::MissingHeader)));
}

/// Header detection ignores surrounding whitespace
#[test]
fn test_column_map_fromHeader_shouldLeaveUnknownColumnsUnset() {
    let header = vec!["id".to_string(), " source ".to_string()];
    let columns = ColumnMap::from_header(&header);

    assert_eq!(columns.key, None);
    assert_eq!(columns.source, Some(1));
    assert_eq!(columns.target, None);
}

/// Every exported value is quoted and inner quotes are doubled
#[test]
fn test_write_csv_withQuotes_shouldQuoteEveryValue() {
    let mut items = parse_items("key,source\nk1,\"Say \"\"hi\"\"\"\n").unwrap();
    items[0].target = Some("Скажи \"привіт\"".to_string());

    let csv = write_csv(&items).unwrap();
    assert_eq!(
        csv,
        "\"key\",\"source\",\"target\"\n\"k1\",\"Say \"\"hi\"\"\",\"Скажи \"\"привіт\"\"\"\n"
    );
}

/// Items without a target export an empty cell
#[test]
fn test_write_csv_withPendingItem_shouldWriteEmptyTarget() {
    let items = parse_items("key,source\nk1,Hello\n").unwrap();
    let csv = write_csv(&items).unwrap();
    assert!(csv.ends_with("\"k1\",\"Hello\",\"\"\n"));
}

/// The hash changes with the content and nothing else
#[test]
fn test_content_hash_shouldBeStableAndContentSensitive() {
    assert_eq!(content_hash("a,b\n"), content_hash("a,b\n"));
    assert_ne!(content_hash("a,b\n"), content_hash("a,c\n"));
    assert_eq!(content_hash("").len(), 64);
}
