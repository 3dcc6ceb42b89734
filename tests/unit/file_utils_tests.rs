/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::path::Path;
use locbatch::file_utils::FileManager;
use crate::common;

/// Test that file_exists returns true for existing files
#[test]
fn test_file_exists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "strings.csv", "key,source\n")?;

    assert!(FileManager::file_exists(&test_file));
    assert!(!FileManager::dir_exists(&test_file));
    Ok(())
}

/// Test that generate_output_path creates the correct path
#[test]
fn test_generate_output_path_withValidInputs_shouldCreateCorrectPath() {
    let output_path = FileManager::generate_output_path(Path::new("/tmp/input/menu.csv"), Path::new("/tmp/output"), "de");
    assert_eq!(output_path, Path::new("/tmp/output/menu.de.csv"));
}

/// Previous exports are recognized by their language suffix
#[test]
fn test_is_generated_output_shouldMatchLanguageSuffixOnly() {
    assert!(FileManager::is_generated_output("menu.uk.csv", "uk"));
    assert!(FileManager::is_generated_output("menu.UK.csv", "uk"));
    assert!(!FileManager::is_generated_output("menu.csv", "uk"));
    assert!(!FileManager::is_generated_output("menu.de.csv", "uk"));
}

/// Nested files are found in path order, exports and other files left out
#[test]
fn test_find_csv_files_withNestedDirs_shouldReturnSortedPaths() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "ui/menu.csv", "key,source\n")?;
    common::create_test_file(temp_dir.path(), "dialog.csv", "key,source\n")?;
    common::create_test_file(temp_dir.path(), "dialog.uk.csv", "key,source\n")?;
    common::create_test_file(temp_dir.path(), "readme.md", "")?;

    let names: Vec<String> = FileManager::find_csv_files(temp_dir.path(), "uk")?
        .iter()
        .map(|p| p.strip_prefix(temp_dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    assert_eq!(names, vec!["dialog.csv", "ui/menu.csv"]);
    Ok(())
}

/// Atomic writes create missing parent directories
#[test]
fn test_write_atomic_withMissingParent_shouldCreateIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("out/nested/menu.uk.csv");

    FileManager::write_atomic(&path, "\"key\",\"source\",\"target\"\n")?;
    assert_eq!(FileManager::read_to_string(&path)?, "\"key\",\"source\",\"target\"\n");
    Ok(())
}

/// Raw bytes are returned untouched, including invalid UTF-8
#[test]
fn test_read_bytes_withInvalidUtf8_shouldReturnBytes() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("broken.csv");
    std::fs::write(&path, [0x6b, 0xff, 0xfe])?;

    assert_eq!(FileManager::read_bytes(&path)?, vec![0x6b, 0xff, 0xfe]);
    assert!(FileManager::read_to_string(&path).is_err());
    Ok(())
}
