//! Append-only chain file.
//!
//! Each record is a 4-byte big-endian length followed by a bincode
//! [`LogRecord`]. A file that ends cleanly on a record boundary is complete;
//! a torn tail is reported as [`Error::UnexpectedEof`].

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tessera_hash::Hash;

use crate::entry::{Entry, Header};
use crate::error::{Error, Result};

/// Largest record accepted on replay.
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// One persisted chain mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogRecord {
    Append { header: Header, entry: Entry },
    Reject { header_hash: Hash },
}

/// Write handle on a chain file.
#[derive(Debug)]
pub struct ChainLog {
    path: PathBuf,
}

impl ChainLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and sync it to disk.
    pub fn append(&self, record: &LogRecord) -> Result<()> {
        let bytes = bincode::serialize(record)?;
        if bytes.len() > MAX_RECORD_SIZE {
            return Err(Error::RecordTooLarge(bytes.len()));
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&(bytes.len() as u32).to_be_bytes())?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Read every record. A missing file is an empty chain.
    pub fn read_all(&self) -> Result<Vec<LogRecord>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        while let Some(record) = read_one(&mut reader)? {
            records.push(record);
        }
        Ok(records)
    }
}

fn read_one<R: Read>(reader: &mut R) -> Result<Option<LogRecord>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_RECORD_SIZE {
        return Err(Error::RecordTooLarge(len));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof
        } else {
            e.into()
        }
    })?;
    Ok(Some(bincode::deserialize(&data)?))
}
