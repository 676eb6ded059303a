use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

use crate::error::RepoFetcherError;

/// A byte range within a [`ScratchFile`] (spec §4.8: "a slice of a local
/// scratch file into which patched/written bytes were appended").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScratchSlice {
    pub offset: u64,
    pub len: u64,
}

/// The append-only backing file for one `moduleOrRepositoryContext`'s
/// patched/written bytes (spec §5 "Scratch file pool... one file per
/// moduleOrRepositoryContext, closed on context release"). Unnamed and
/// unlinked from the filesystem the moment it's created, so there is
/// nothing left to clean up when the owning context drops it.
pub struct ScratchFile {
    file: std::fs::File,
    len: u64,
}

impl ScratchFile {
    pub fn new() -> Result<Self, RepoFetcherError> {
        let file = tempfile::tempfile()?;
        Ok(ScratchFile { file, len: 0 })
    }

    /// Appends `bytes` to the end of the file and returns the slice
    /// they now occupy.
    pub fn append(&mut self, bytes: &[u8]) -> Result<ScratchSlice, RepoFetcherError> {
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(bytes)?;
        let slice = ScratchSlice { offset: self.len, len: bytes.len() as u64 };
        self.len += bytes.len() as u64;
        Ok(slice)
    }

    pub fn read_slice(&mut self, slice: ScratchSlice) -> Result<Vec<u8>, RepoFetcherError> {
        if slice.offset + slice.len > self.len {
            return Err(RepoFetcherError::InvalidArgument(format!(
                "scratch slice {slice:?} is past the file's current length {}",
                self.len
            )));
        }
        self.file.seek(SeekFrom::Start(slice.offset))?;
        let mut buf = vec![0u8; slice.len as usize];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appended_slices_are_readable_back_in_order() {
        let mut scratch = ScratchFile::new().unwrap();
        let a = scratch.append(b"hello").unwrap();
        let b = scratch.append(b" world").unwrap();
        assert_eq!(scratch.read_slice(a).unwrap(), b"hello");
        assert_eq!(scratch.read_slice(b).unwrap(), b" world");
        assert_eq!(scratch.len(), 11);
    }

    #[test]
    fn reading_past_the_end_is_rejected() {
        let mut scratch = ScratchFile::new().unwrap();
        scratch.append(b"hi").unwrap();
        let err = scratch.read_slice(ScratchSlice { offset: 0, len: 10 }).unwrap_err();
        assert!(matches!(err, RepoFetcherError::InvalidArgument(_)));
    }
}
