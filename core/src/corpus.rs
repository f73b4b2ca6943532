//! Line-delimited JSON corpus access: byte-range batching for the build
//! coordinator and ranged document iteration for the workers.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// One corpus record as it appears on disk. Missing fields default to `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDoc {
    #[serde(default)]
    pub doc_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
}

/// Lazily yields `(start, end)` byte ranges covering `batch_size` lines each,
/// plus a final partial range. Ranges are contiguous, non-overlapping, cover
/// the whole file, and start and end on line boundaries.
pub fn batch_offsets(path: &Path, batch_size: usize) -> io::Result<BatchOffsets> {
    let reader = BufReader::new(File::open(path)?);
    Ok(BatchOffsets {
        reader,
        batch_size: batch_size.max(1),
        pos: 0,
        buf: Vec::new(),
        done: false,
    })
}

pub struct BatchOffsets {
    reader: BufReader<File>,
    batch_size: usize,
    pos: u64,
    buf: Vec<u8>,
    done: bool,
}

impl Iterator for BatchOffsets {
    type Item = io::Result<(u64, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let start = self.pos;
        let mut lines = 0usize;
        while lines < self.batch_size {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => {
                    self.pos += n as u64;
                    lines += 1;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        if lines == 0 {
            None
        } else {
            Some(Ok((start, self.pos)))
        }
    }
}

/// Seeks to `start` and yields parsed records for every non-blank line whose
/// first byte lies before `end`. Malformed JSON is fatal to the caller.
pub fn iter_docs_in_range(path: &Path, start: u64, end: u64) -> Result<DocRange> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    Ok(DocRange {
        reader: BufReader::new(file),
        pos: start,
        end,
        buf: Vec::new(),
    })
}

pub struct DocRange {
    reader: BufReader<File>,
    pos: u64,
    end: u64,
    buf: Vec<u8>,
}

impl Iterator for DocRange {
    type Item = Result<RawDoc>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pos >= self.end {
                return None;
            }
            let line_start = self.pos;
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(n) => self.pos += n as u64,
                Err(e) => return Some(Err(e.into())),
            }
            let line = trim_ascii(&self.buf);
            if line.is_empty() {
                continue;
            }
            return Some(serde_json::from_slice(line).map_err(|source| {
                Error::MalformedRecord {
                    offset: line_start,
                    source,
                }
            }));
        }
    }
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if first.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = bytes {
        if last.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}
