use std::io::Write;

use tempfile::tempdir;

use super::file_io::*;

#[test]
fn test_create_parent_dir_for_file() {
    let temp_dir = tempdir().unwrap();
    let file_path = temp_dir.path().join("a/b/c/file.log");

    create_parent_dir_if_not_exist(&file_path).unwrap();

    assert!(temp_dir.path().join("a/b/c").is_dir());
    assert!(!file_path.exists());
}

#[test]
fn test_open_file_for_append_keeps_content() {
    let temp_dir = tempdir().unwrap();
    let file_path = temp_dir.path().join("logs/member-1/d.log");

    {
        let mut file = open_file_for_append(&file_path).unwrap();
        writeln!(file, "first").unwrap();
    }
    {
        let mut file = open_file_for_append(&file_path).unwrap();
        writeln!(file, "second").unwrap();
    }

    let content = std::fs::read_to_string(&file_path).unwrap();
    assert_eq!(content, "first\nsecond\n");
}
