use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Width in bytes of every numeric field of the file format.
///
/// Both record sizes and record offsets are rendered as zero-padded ASCII
/// decimal numbers of this width, which makes every reference field
/// constant-sized and comparable without decoding the record around it.
pub const FIELD_WIDTH: usize = 19;

/// Size in bytes of the root pointer header at the start of the file.
pub const HEADER_SIZE: u64 = FIELD_WIDTH as u64 + 1;

/// Largest value that still fits into [`FIELD_WIDTH`] decimal digits.
const MAX_FIELD_VALUE: u64 = 9_999_999_999_999_999_999;

/// Render a record size or offset as a fixed-width decimal field.
pub fn encode_field(value: u64) -> String {
    format!("{:0width$}", value, width = FIELD_WIDTH)
}

/// Parse a fixed-width decimal field.
pub fn decode_field(bytes: &[u8]) -> Result<u64> {
    let text = std::str::from_utf8(bytes).map_err(|_| Error::InvalidRecordSize)?;
    if text.len() != FIELD_WIDTH || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidRecordSize);
    }
    text.parse().map_err(|_| Error::InvalidRecordSize)
}

/// Storage engine for a single index file of framed records.
///
/// The engine manages two files: the read side at the configured path, which
/// always holds the last committed state, and a write side at `<path>.tmp`
/// that collects all record revisions of the current operation. Records are
/// only ever appended. [`RecordFile::commit`] publishes the write side by
/// renaming it over the read side, so a reader either observes the previous
/// tree or the complete new one, decided by the root pointer header alone.
///
/// Record bodies are (de-)serialized with the Serde crate, framed as
/// `<size><body><newline>` where `<size>` is a [`FIELD_WIDTH`]-digit decimal.
/// The trailing newline aids manual inspection; readers only trust the size
/// field.
pub struct RecordFile<B> {
    path: PathBuf,
    write_path: PathBuf,
    read_file: File,
    /// `None` for a read-only engine, which never touches the write side.
    write_file: Option<File>,
    serializer: bincode::DefaultOptions,
    phantom: PhantomData<B>,
}

impl<B> RecordFile<B>
where
    B: Serialize + DeserializeOwned,
{
    /// Open the storage at `path`, creating an empty read side if none exists.
    ///
    /// Unless `read_only` is set, the write side at `<path>.tmp` is
    /// re-initialised to its idle state, discarding anything a crashed
    /// process may have left there.
    pub fn open(path: impl AsRef<Path>, read_only: bool) -> Result<RecordFile<B>> {
        let path = path.as_ref().to_path_buf();
        let write_path = temporary_path(&path);

        if !read_only {
            OpenOptions::new()
                .write(true)
                .create(true)
                .open(&path)
                .map_err(|source| Error::CreateStorage {
                    path: path.clone(),
                    source,
                })?;
        }
        let read_file = File::open(&path).map_err(Error::ReadStorage)?;

        let write_file = if read_only {
            None
        } else {
            let mut f = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&write_path)
                .map_err(|source| Error::CreateStorage {
                    path: write_path.clone(),
                    source,
                })?;
            write_header(&mut f, 0)?;
            Some(f)
        };

        debug!(path = %path.display(), read_only, "opened index storage");

        Ok(RecordFile {
            path,
            write_path,
            read_file,
            write_file,
            serializer: bincode::DefaultOptions::new(),
            phantom: PhantomData,
        })
    }

    /// Whether the read side holds no data at all (no tree has ever been
    /// committed at this path).
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read_len()? == 0)
    }

    /// Append a record to the write side and return its offset.
    ///
    /// Offsets returned here stay valid after [`RecordFile::commit`] because
    /// the commit renames the write side instead of copying regions.
    pub fn append(&mut self, block: &B) -> Result<u64> {
        self.begin_write()?;

        let body = self.serializer.serialize(block)?;
        let size = body.len() as u64;
        if size > MAX_FIELD_VALUE {
            return Err(Error::RecordOverflow);
        }

        let write_file = self.write_file.as_mut().ok_or(Error::StorageReadOnly)?;
        let offset = write_file
            .seek(SeekFrom::End(0))
            .map_err(Error::ModifyTemporary)?;
        write_file
            .write_all(encode_field(size).as_bytes())
            .map_err(Error::ModifyTemporary)?;
        write_file.write_all(&body).map_err(Error::ModifyTemporary)?;
        write_file.write_all(b"\n").map_err(Error::ModifyTemporary)?;

        trace!(offset, size, "appended record");
        Ok(offset)
    }

    /// Append a record and move the write-side root pointer to it.
    pub fn save_root(&mut self, block: &B) -> Result<u64> {
        let offset = self.append(block)?;
        let write_file = self.write_file.as_mut().ok_or(Error::StorageReadOnly)?;
        write_header(write_file, offset)?;
        trace!(offset, "moved root pointer");
        Ok(offset)
    }

    /// Read the current root record, or `None` if no tree exists yet.
    ///
    /// A pending write side is committed first, so the answer always comes
    /// from a consistent read side. A zero-length file and the initialised
    /// but empty form (header only, root pointer `0`) both count as "no tree".
    pub fn read_root(&mut self) -> Result<Option<(u64, B)>> {
        if self.is_dirty()? {
            self.commit()?;
        }

        let read_len = self.read_len()?;
        if read_len == 0 {
            return Ok(None);
        }
        if read_len < HEADER_SIZE {
            return Err(Error::InvalidStorage);
        }

        self.read_file
            .seek(SeekFrom::Start(0))
            .map_err(Error::ReadStorage)?;
        let mut header = [0u8; HEADER_SIZE as usize];
        self.read_file
            .read_exact(&mut header)
            .map_err(Error::ReadStorage)?;
        if header[FIELD_WIDTH] != b'\n' {
            return Err(Error::InvalidStorage);
        }

        let root_offset = decode_field(&header[..FIELD_WIDTH])?;
        if root_offset == 0 {
            return Ok(None);
        }

        let block = self.get(root_offset).map_err(|_| Error::InvalidRootRecord)?;
        Ok(Some((root_offset, block)))
    }

    /// Read and decode the record starting at `offset`.
    ///
    /// Offsets inside the read side are served from there; larger offsets can
    /// only refer to records appended during the current operation and are
    /// looked up on the write side with the same framing.
    pub fn get(&mut self, offset: u64) -> Result<B> {
        let read_len = self.read_len()?;
        let body = if offset < read_len {
            read_record(&mut self.read_file, offset, read_len)?
        } else if let Some(write_file) = &mut self.write_file {
            let write_len = write_file.metadata().map_err(Error::ModifyTemporary)?.len();
            if offset >= write_len {
                return Err(Error::InvalidRecord(offset));
            }
            read_record(write_file, offset, write_len)?
        } else {
            return Err(Error::InvalidRecord(offset));
        };

        self.serializer
            .deserialize(&body)
            .map_err(|_| Error::InvalidRecord(offset))
    }

    /// Publish the write side: the read side is replaced by an atomic rename
    /// and a fresh, idle write side is laid down.
    ///
    /// A clean write side means there is nothing to publish and the call is a
    /// no-op, so the previously committed tree is never clobbered.
    pub fn commit(&mut self) -> Result<()> {
        if !self.is_dirty()? {
            return Ok(());
        }

        if let Some(write_file) = &mut self.write_file {
            write_file.flush().map_err(Error::ModifyTemporary)?;
        }

        fs::remove_file(&self.path).map_err(Error::RenameTemporary)?;
        fs::rename(&self.write_path, &self.path).map_err(Error::RenameTemporary)?;
        self.read_file = File::open(&self.path).map_err(Error::ReadStorage)?;

        let mut write_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.write_path)
            .map_err(|source| Error::CreateStorage {
                path: self.write_path.clone(),
                source,
            })?;
        write_header(&mut write_file, 0)?;
        self.write_file = Some(write_file);

        debug!(path = %self.path.display(), "committed write side");
        Ok(())
    }

    /// Whether the write side carries uncommitted records.
    fn is_dirty(&self) -> Result<bool> {
        match &self.write_file {
            Some(f) => {
                let len = f.metadata().map_err(Error::ModifyTemporary)?.len();
                Ok(len > HEADER_SIZE)
            }
            None => Ok(false),
        }
    }

    /// Prepare the write side for appends.
    ///
    /// The first mutation after a commit carries the whole read side over to
    /// the write side so that existing record offsets keep referring to the
    /// same byte positions once the write side is renamed into place.
    fn begin_write(&mut self) -> Result<()> {
        let read_len = self.read_len()?;
        let write_file = self.write_file.as_mut().ok_or(Error::StorageReadOnly)?;
        let write_len = write_file.metadata().map_err(Error::ModifyTemporary)?.len();

        if write_len == HEADER_SIZE && read_len > 0 {
            write_file.set_len(0).map_err(Error::ModifyTemporary)?;
            write_file
                .seek(SeekFrom::Start(0))
                .map_err(Error::ModifyTemporary)?;
            self.read_file
                .seek(SeekFrom::Start(0))
                .map_err(Error::ReadStorage)?;
            std::io::copy(&mut self.read_file, write_file).map_err(Error::ModifyTemporary)?;
            trace!(bytes = read_len, "carried read side over to write side");
        }
        Ok(())
    }

    fn read_len(&self) -> Result<u64> {
        Ok(self.read_file.metadata().map_err(Error::ReadStorage)?.len())
    }
}

impl<B> Drop for RecordFile<B> {
    fn drop(&mut self) {
        if self.write_file.take().is_some() {
            let _ = fs::remove_file(&self.write_path);
        }
    }
}

/// The write side lives next to the read side as `<file name>.tmp`.
fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("index"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Overwrite the header at the start of the file with the given root offset.
fn write_header(file: &mut File, root_offset: u64) -> Result<()> {
    file.seek(SeekFrom::Start(0)).map_err(Error::ModifyTemporary)?;
    file.write_all(encode_field(root_offset).as_bytes())
        .map_err(Error::ModifyTemporary)?;
    file.write_all(b"\n").map_err(Error::ModifyTemporary)?;
    Ok(())
}

/// Read the framed record starting at `offset` and return its body bytes.
///
/// Only the size field delimits the body; the trailing newline sentinel is
/// never scanned for.
fn read_record(file: &mut File, offset: u64, file_len: u64) -> Result<Vec<u8>> {
    if offset < HEADER_SIZE || offset + FIELD_WIDTH as u64 > file_len {
        return Err(Error::InvalidRecordSize);
    }

    file.seek(SeekFrom::Start(offset)).map_err(Error::ReadStorage)?;
    let mut size_field = [0u8; FIELD_WIDTH];
    file.read_exact(&mut size_field).map_err(Error::ReadStorage)?;
    let size = decode_field(&size_field)?;

    let body_end = (offset + FIELD_WIDTH as u64)
        .checked_add(size)
        .ok_or(Error::InvalidRecordSize)?;
    if body_end > file_len {
        return Err(Error::InvalidRecordSize);
    }
    let size = usize::try_from(size).map_err(|_| Error::InvalidRecordSize)?;
    let mut body = vec![0u8; size];
    file.read_exact(&mut body).map_err(Error::ReadStorage)?;
    Ok(body)
}

#[cfg(test)]
mod tests;
