use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Result, SortError};
use crate::row::{trim_line_terminator, Row};
use crate::sort_key::SortKey;

/// Sequential reader over one sorted chunk, holding the next unconsumed row.
///
/// Handles are identified by `id`, the sequence number of their chunk. Two handles parked on
/// textually equal rows are still distinct and order by id, lower first.
#[derive(Debug)]
pub(crate) struct UnmergedChunkFile {
    id: usize,
    path: PathBuf,
    reader: BufReader<File>,
    head: Option<Row>,
    line: usize,
    sort_key: Arc<SortKey>,
    field_separator: char,
}

impl UnmergedChunkFile {
    pub(crate) fn open(id: usize, path: PathBuf, sort_key: Arc<SortKey>, field_separator: char) -> Result<UnmergedChunkFile> {
        let file = File::open(&path)
            .map_err(|source| SortError::MergeIoFailure { path: path.clone(), source })?;
        let mut unmerged_chunk_file = UnmergedChunkFile {
            id,
            path,
            reader: BufReader::new(file),
            head: None,
            line: 0,
            sort_key,
            field_separator,
        };
        unmerged_chunk_file.head = unmerged_chunk_file.read_row()?;
        Ok(unmerged_chunk_file)
    }

    fn read_row(&mut self) -> Result<Option<Row>> {
        let mut line = Vec::new();
        let bytes = self.reader.read_until(b'\n', &mut line)
            .map_err(|source| SortError::MergeIoFailure { path: self.path.clone(), source })?;
        if bytes == 0 {
            return Ok(None);
        }
        self.line += 1;
        trim_line_terminator(&mut line);
        let row = Row::parse(line, self.field_separator);
        self.sort_key.check(&row, || format!("{} line {}", self.path.display(), self.line))?;
        Ok(Some(row))
    }

    /// Take the current row and move the cursor to the next one.
    pub(crate) fn advance(&mut self) -> Result<Option<Row>> {
        let next = self.read_row()?;
        Ok(std::mem::replace(&mut self.head, next))
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Eq for UnmergedChunkFile {}

impl PartialEq<Self> for UnmergedChunkFile {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd<Self> for UnmergedChunkFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UnmergedChunkFile {
    // flipped so that BinaryHeap (max heap) pops the smallest head, then the lowest id
    fn cmp(&self, other: &Self) -> Ordering {
        let by_head = match (&self.head, &other.head) {
            (Some(head), Some(other_head)) => self.sort_key.compare(other_head, head),
            // exhausted handles come out first so they can be discarded
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        by_head.then_with(|| other.id.cmp(&self.id))
    }
}
