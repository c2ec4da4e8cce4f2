//! Sync tag scanner.
//!
//! Finds the start of a header in an arbitrary byte stream. The scanner
//! tracks how many leading bytes of the tag have matched so far; a byte that
//! breaks the match but equals the tag's first byte restarts the match at 1.

use super::wire_format::{Direction, SYNC_SIZE};

/// Outcome of scanning a buffer for the sync tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSearch {
    /// A full tag starts at this offset.
    Found(usize),
    /// The buffer ends with `matched` bytes of the tag starting at `offset`.
    Partial { offset: usize, matched: usize },
    /// Nothing in the buffer can start a tag.
    NotFound,
}

/// Advance the match count by one byte.
///
/// Returns `count + 1` if `byte` continues the match, 1 if it restarts the
/// match, otherwise 0. A count of `SYNC_SIZE` means a full tag was seen.
#[inline]
pub fn advance_sync(tag: &[u8; SYNC_SIZE], byte: u8, count: usize) -> usize {
    if count < SYNC_SIZE && byte == tag[count] {
        count + 1
    } else if byte == tag[0] {
        1
    } else {
        0
    }
}

/// Scanner for the sync tag of one direction.
#[derive(Debug, Clone)]
pub struct SyncScanner {
    tag: [u8; SYNC_SIZE],
}

impl SyncScanner {
    /// Scanner for frames travelling in `direction`.
    pub fn new(direction: Direction) -> Self {
        Self {
            tag: direction.sync_bytes(),
        }
    }

    /// Scan a whole buffer for the first tag.
    pub fn find(&self, buf: &[u8]) -> SyncSearch {
        let mut count = 0;
        for (i, &byte) in buf.iter().enumerate() {
            count = advance_sync(&self.tag, byte, count);
            if count == SYNC_SIZE {
                return SyncSearch::Found(i + 1 - SYNC_SIZE);
            }
        }
        if count > 0 {
            SyncSearch::Partial {
                offset: buf.len() - count,
                matched: count,
            }
        } else {
            SyncSearch::NotFound
        }
    }
}
