use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("unable to create storage file {path}")]
    CreateStorage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to read storage file")]
    ReadStorage(#[source] io::Error),
    #[error("unable to modify temporary file")]
    ModifyTemporary(#[source] io::Error),
    #[error("unable to rename temporary file")]
    RenameTemporary(#[source] io::Error),
    #[error("storage is read-only")]
    StorageReadOnly,
    #[error("storage file is no valid index file")]
    InvalidStorage,
    #[error("root record could not be decoded")]
    InvalidRootRecord,
    #[error("record at offset {0} is malformed")]
    InvalidRecord(u64),
    #[error("record size field is malformed")]
    InvalidRecordSize,
    #[error("encoded record does not fit the fixed-width size field")]
    RecordOverflow,
    #[error("child node was never persisted")]
    NodeNotPersisted,
    #[error("key already exists in the index")]
    DuplicateKey,
    #[error("minimum degree {0} is too small, must be at least 2")]
    MinimumDegreeTooSmall(usize),
    #[error("unable to insert element")]
    Insert(#[source] Box<Error>),
    #[error(transparent)]
    Encoding(#[from] bincode::Error),
}
