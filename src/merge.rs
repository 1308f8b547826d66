use std::collections::BinaryHeap;
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rlimit::{getrlimit, setrlimit, Resource};

use crate::config::Config;
use crate::error::{Result, SortError};
use crate::sorted_chunk_file::SortedChunkFile;
use crate::unmerged_chunk_file::UnmergedChunkFile;

const OPEN_FILES_HEADROOM: u64 = 256;

/// Deletes the chunk files when dropped, whether the merge succeeded or not.
struct ChunkCleanup {
    paths: Vec<PathBuf>,
}

impl Drop for ChunkCleanup {
    fn drop(&mut self) {
        for path in &self.paths {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    log::warn!("Failed to remove chunk {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// Raises the soft NOFILE limit so one handle per chunk fits, restoring it when dropped.
struct OpenFilesLimit {
    restore: Option<(u64, u64)>,
}

impl OpenFilesLimit {
    fn raise(handles: usize) -> OpenFilesLimit {
        let (current_soft, current_hard) = match getrlimit(Resource::NOFILE) {
            Ok(limits) => limits,
            Err(e) => {
                log::warn!("Failed to read rlimit NOFILE: {}", e);
                return OpenFilesLimit { restore: None };
            }
        };
        let new_soft = (handles as u64 + OPEN_FILES_HEADROOM).min(current_hard);
        if new_soft <= current_soft {
            return OpenFilesLimit { restore: None };
        }
        log::info!("Set new rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard);
        match setrlimit(Resource::NOFILE, new_soft, current_hard) {
            Ok(()) => OpenFilesLimit { restore: Some((current_soft, current_hard)) },
            Err(e) => {
                log::warn!("Failed to set rlimit NOFILE, soft: {}, hard: {}: {}", new_soft, current_hard, e);
                OpenFilesLimit { restore: None }
            }
        }
    }
}

impl Drop for OpenFilesLimit {
    fn drop(&mut self) {
        if let Some((soft, hard)) = self.restore {
            log::info!("Restore rlimit NOFILE, soft: {}, hard: {}", soft, hard);
            if let Err(e) = setrlimit(Resource::NOFILE, soft, hard) {
                log::warn!("Failed to restore rlimit NOFILE: {}", e);
            }
        }
    }
}

/// Merge the sorted chunks into `output` and return the number of rows written.
///
/// All chunk handles are closed and all chunk files deleted before returning, on success and
/// on failure alike. A failed merge leaves a truncated `output` behind.
pub(crate) fn merge(chunks: Vec<SortedChunkFile>, output: &Path, config: &Config) -> Result<usize> {
    let _cleanup = ChunkCleanup {
        paths: chunks.iter().map(|chunk| chunk.path().clone()).collect(),
    };
    let _open_files_limit = OpenFilesLimit::raise(chunks.len());
    merge_chunks(&chunks, output, config)
}

fn merge_chunks(chunks: &[SortedChunkFile], output: &Path, config: &Config) -> Result<usize> {
    log::info!("Merging {} sorted chunks into {}", chunks.len(), output.display());
    let sort_key = Arc::new(config.sort_key().clone());
    let mut frontier = BinaryHeap::with_capacity(chunks.len());
    for chunk in chunks {
        let unmerged_chunk_file = UnmergedChunkFile::open(
            chunk.sequence(),
            chunk.path().clone(),
            sort_key.clone(),
            config.field_separator(),
        )?;
        if unmerged_chunk_file.is_exhausted() {
            log::debug!("Skipping empty chunk {}", chunk.path().display());
        } else {
            frontier.push(unmerged_chunk_file);
        }
    }

    let output_failure = |source: std::io::Error| SortError::MergeIoFailure {
        path: output.to_path_buf(),
        source,
    };
    let mut merged_writer = BufWriter::new(File::create(output).map_err(output_failure)?);
    let mut merged_len: usize = 0;
    let mut field_count: Option<usize> = None;
    while let Some(mut current_min) = frontier.pop() {
        if let Some(row) = current_min.advance()? {
            if field_count.is_some_and(|count| count != row.field_count()) {
                log::warn!(
                    "Field count changed to {} in {}: {}",
                    row.field_count(),
                    current_min.path().display(),
                    String::from_utf8_lossy(row.line())
                );
            }
            field_count = Some(row.field_count());
            merged_writer.write_all(row.line()).map_err(output_failure)?;
            merged_writer.write_all(b"\n").map_err(output_failure)?;
            merged_len += 1;
        }
        if current_min.is_exhausted() {
            log::debug!("Drained chunk {}", current_min.path().display());
        } else {
            frontier.push(current_min);
        }
    }
    merged_writer.flush().map_err(output_failure)?;

    log::info!("Finished merging sorted chunks, merged length: {} lines", merged_len);
    Ok(merged_len)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use crate::config::Config;
    use crate::error::SortError;
    use crate::merge::merge;
    use crate::sort_key::SortKey;
    use crate::sorted_chunk_file::SortedChunkFile;

    fn config(work_dir: &Path, fields: Vec<usize>) -> Config {
        Config::new(work_dir.to_path_buf(), Some("csv".to_string()), 2, ',', true, 1, SortKey::new(fields).unwrap())
    }

    fn write_sorted(work_dir: &Path, sequence: usize, content: &str) -> Result<SortedChunkFile, anyhow::Error> {
        let path = work_dir.join(format!("{sequence}.csv"));
        fs::write(&path, content)?;
        Ok(SortedChunkFile::new(sequence, path, content.lines().count()))
    }

    #[test]
    fn test_duplicate_heads_both_merged() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let chunks = vec![
            write_sorted(dir.path(), 1, "a,1\nx,5\n")?,
            write_sorted(dir.path(), 2, "x,5\ny,0\n")?,
        ];
        let output = dir.path().join("sorted-input.csv");
        let merged = merge(chunks, &output, &config(dir.path(), vec![0, 1]))?;
        assert_eq!(merged, 4);
        assert_eq!(fs::read_to_string(&output)?, "a,1\nx,5\nx,5\ny,0\n");
        Ok(())
    }

    #[test]
    fn test_ties_follow_chunk_sequence() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let chunks = vec![
            write_sorted(dir.path(), 2, "a,1,second\n")?,
            write_sorted(dir.path(), 1, "a,1,first\n")?,
            write_sorted(dir.path(), 3, "a,0,third\n")?,
        ];
        let output = dir.path().join("sorted-input.csv");
        merge(chunks, &output, &config(dir.path(), vec![0, 1]))?;
        assert_eq!(fs::read_to_string(&output)?, "a,0,third\na,1,first\na,1,second\n");
        Ok(())
    }

    #[test]
    fn test_chunks_removed_and_empty_chunk_skipped() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let chunks = vec![
            write_sorted(dir.path(), 1, "b\nd\n")?,
            write_sorted(dir.path(), 2, "")?,
            write_sorted(dir.path(), 3, "a\nc\ne\n")?,
        ];
        let output = dir.path().join("sorted-input.csv");
        merge(chunks, &output, &config(dir.path(), vec![0]))?;
        assert_eq!(fs::read_to_string(&output)?, "a\nb\nc\nd\ne\n");
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_no_chunks() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("sorted-input.csv");
        let merged = merge(Vec::new(), &output, &config(dir.path(), vec![0]))?;
        assert_eq!(merged, 0);
        assert_eq!(fs::read_to_string(&output)?, "");
        Ok(())
    }

    #[test]
    fn test_failure_still_removes_chunks() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let good = write_sorted(dir.path(), 1, "a,1\n")?;
        let missing = SortedChunkFile::new(2, dir.path().join("2.csv"), 1);
        let output = dir.path().join("sorted-input.csv");
        let result = merge(vec![good.clone(), missing], &output, &config(dir.path(), vec![0]));
        match result {
            Err(SortError::MergeIoFailure { path, .. }) => assert!(path.ends_with("2.csv")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!good.path().exists());
        Ok(())
    }

    #[test]
    fn test_short_row_aborts_merge() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let chunks = vec![
            write_sorted(dir.path(), 1, "a,1\nb\n")?,
            write_sorted(dir.path(), 2, "c,3\n")?,
        ];
        let output = dir.path().join("sorted-input.csv");
        let result = merge(chunks, &output, &config(dir.path(), vec![1]));
        assert!(matches!(result, Err(SortError::ComparisonArityMismatch { .. })));
        assert!(!dir.path().join("1.csv").exists());
        assert!(!dir.path().join("2.csv").exists());
        Ok(())
    }
}
