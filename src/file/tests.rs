use std::fs;

use tempfile::tempdir;

use super::{decode_field, RecordFile, HEADER_SIZE};
use crate::error::Error;

#[test]
fn append_starts_after_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");

    let mut f: RecordFile<Vec<u64>> = RecordFile::open(&path, false).unwrap();
    assert_eq!(true, f.is_empty().unwrap());

    let offset = f.append(&vec![1, 2, 3]).unwrap();
    assert_eq!(HEADER_SIZE, offset);
}

#[test]
fn save_root_commit_read_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");

    let mut f: RecordFile<Vec<u64>> = RecordFile::open(&path, false).unwrap();
    let block: Vec<u64> = vec![4, 0, 4];
    let offset = f.save_root(&block).unwrap();
    f.commit().unwrap();

    let (root_offset, read_back) = f.read_root().unwrap().unwrap();
    assert_eq!(offset, root_offset);
    assert_eq!(block, read_back);

    // The offset refers to the same bytes after the rename.
    assert_eq!(block, f.get(offset).unwrap());
}

#[test]
fn carry_over_preserves_committed_offsets() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");

    let mut f: RecordFile<Vec<u64>> = RecordFile::open(&path, false).unwrap();
    let first = f.save_root(&vec![1]).unwrap();
    f.commit().unwrap();

    // The next append lands on the write side, behind a carried-over copy of
    // the read side, so both offsets resolve during the operation and after
    // the commit.
    let second = f.append(&vec![2]).unwrap();
    assert!(second > first);
    assert_eq!(vec![1], f.get(first).unwrap());
    assert_eq!(vec![2], f.get(second).unwrap());

    f.commit().unwrap();
    assert_eq!(vec![1], f.get(first).unwrap());
    assert_eq!(vec![2], f.get(second).unwrap());
}

#[test]
fn read_root_commits_pending_write_side() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");

    let mut f: RecordFile<Vec<u64>> = RecordFile::open(&path, false).unwrap();
    f.save_root(&vec![42]).unwrap();
    // Nothing committed yet, the read side is still empty.
    assert_eq!(true, f.is_empty().unwrap());

    let (_, root) = f.read_root().unwrap().unwrap();
    assert_eq!(vec![42], root);
    assert_eq!(false, f.is_empty().unwrap());
}

#[test]
fn header_only_file_is_an_empty_tree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");
    fs::write(&path, format!("{:019}\n", 0)).unwrap();

    let mut f: RecordFile<Vec<u64>> = RecordFile::open(&path, false).unwrap();
    assert!(f.read_root().unwrap().is_none());
}

#[test]
fn corrupt_header_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");
    let mut content = vec![b'x'; 19];
    content.push(b'\n');
    fs::write(&path, content).unwrap();

    let mut f: RecordFile<Vec<u64>> = RecordFile::open(&path, false).unwrap();
    assert!(matches!(f.read_root(), Err(Error::InvalidRecordSize)));
}

#[test]
fn truncated_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");
    fs::write(&path, "123").unwrap();

    let mut f: RecordFile<Vec<u64>> = RecordFile::open(&path, false).unwrap();
    assert!(matches!(f.read_root(), Err(Error::InvalidStorage)));
}

#[test]
fn garbage_root_record_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");
    let mut content = format!("{:019}\n", HEADER_SIZE).into_bytes();
    content.extend_from_slice(b"garbage");
    fs::write(&path, content).unwrap();

    let mut f: RecordFile<Vec<u64>> = RecordFile::open(&path, false).unwrap();
    assert!(matches!(f.read_root(), Err(Error::InvalidRootRecord)));
}

#[test]
fn size_fields_must_be_plain_decimal() {
    assert_eq!(42, decode_field(b"0000000000000000042").unwrap());
    assert_eq!(0, decode_field(b"0000000000000000000").unwrap());

    assert!(decode_field(b"00000000000000000x2").is_err());
    assert!(decode_field(b"+000000000000000042").is_err());
    assert!(decode_field(b"42").is_err());
}

#[test]
fn read_only_engine_refuses_mutation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");

    // Commit a record first so there is something to open.
    let mut f: RecordFile<Vec<u64>> = RecordFile::open(&path, false).unwrap();
    f.save_root(&vec![1]).unwrap();
    f.commit().unwrap();
    drop(f);

    let mut f: RecordFile<Vec<u64>> = RecordFile::open(&path, true).unwrap();
    assert!(f.read_root().unwrap().is_some());
    assert!(matches!(f.append(&vec![2]), Err(Error::StorageReadOnly)));
    // A read-only engine never lays down a write side.
    assert_eq!(false, dir.path().join("index.db.tmp").exists());
}

#[test]
fn write_side_removed_on_drop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");
    let write_path = dir.path().join("index.db.tmp");

    let mut f: RecordFile<Vec<u64>> = RecordFile::open(&path, false).unwrap();
    f.save_root(&vec![1]).unwrap();
    f.commit().unwrap();
    f.append(&vec![2]).unwrap();
    assert_eq!(true, write_path.exists());

    drop(f);
    assert_eq!(false, write_path.exists());
    assert_eq!(true, path.exists());
}
