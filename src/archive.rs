use std::{
    fs::File,
    io::{BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

/// A byte span inside the archive container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: u64,
    pub length: u64,
}

/// Writes original file bytes back-to-back into a single container file,
/// handing back the byte-exact span of each appended file.
///
/// No framing and no compression layer: the index is the only map of where
/// each file lives.
pub struct ArchiveWriter {
    writer: BufWriter<File>,
    position: u64,
}

impl ArchiveWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            position: 0,
        })
    }

    /// Append one file's bytes and return its span.
    pub fn append(&mut self, bytes: &[u8]) -> Result<Span> {
        let span = Span {
            offset: self.position,
            length: bytes.len() as u64,
        };
        self.writer.write_all(bytes)?;
        self.position += span.length;
        Ok(span)
    }

    /// Flush and close the container.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush()?;
        Ok(self.position)
    }
}

/// Random-access reader over a packed container.
///
/// Reads are positioned and touch only the requested span; the container is
/// never decompressed or loaded wholesale.
#[derive(Debug, Clone)]
pub struct ArchiveReader {
    path: PathBuf,
    len: u64,
}

impl ArchiveReader {
    pub fn open(path: &Path) -> Result<Self> {
        let len = std::fs::metadata(path)
            .map_err(|_| Error::NotFound {
                kind: "archive container",
                name: path.display().to_string(),
            })?
            .len();
        Ok(Self {
            path: path.to_path_buf(),
            len,
        })
    }

    /// Total size of the container in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read exactly one span.
    ///
    /// A span reaching past the end of the container means the index and the
    /// container do not belong together; that is fatal, not a per-file skip.
    /// Each call opens its own handle, so spans of disjoint files can be read
    /// from parallel workers without locking.
    pub fn read_span(&self, record_path: &str, span: Span) -> Result<Vec<u8>> {
        if span.offset.checked_add(span.length).is_none_or(|end| end > self.len)
        {
            return Err(Error::ArchiveTruncated {
                path: record_path.to_string(),
                offset: span.offset,
                length: span.length,
                container_len: self.len,
            });
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(span.offset))?;
        let mut buf = vec![0u8; span.length as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let container = tmp.path().join("data.pack");

        let mut writer = ArchiveWriter::create(&container).unwrap();
        let a = writer.append(b"first file").unwrap();
        let b = writer.append(b"second").unwrap();
        let total = writer.finish().unwrap();

        assert_eq!(a, Span { offset: 0, length: 10 });
        assert_eq!(b, Span { offset: 10, length: 6 });
        assert_eq!(total, 16);

        let reader = ArchiveReader::open(&container).unwrap();
        assert_eq!(reader.len(), 16);
        assert_eq!(reader.read_span("a", a).unwrap(), b"first file");
        assert_eq!(reader.read_span("b", b).unwrap(), b"second");
    }

    #[test]
    fn empty_file_has_zero_length_span() {
        let tmp = tempfile::tempdir().unwrap();
        let container = tmp.path().join("data.pack");

        let mut writer = ArchiveWriter::create(&container).unwrap();
        let span = writer.append(b"").unwrap();
        writer.finish().unwrap();

        let reader = ArchiveReader::open(&container).unwrap();
        assert_eq!(reader.read_span("empty", span).unwrap(), b"");
    }

    #[test]
    fn out_of_bounds_span_is_truncation() {
        let tmp = tempfile::tempdir().unwrap();
        let container = tmp.path().join("data.pack");

        let mut writer = ArchiveWriter::create(&container).unwrap();
        writer.append(b"short").unwrap();
        writer.finish().unwrap();

        let reader = ArchiveReader::open(&container).unwrap();
        let err = reader
            .read_span("bad", Span { offset: 3, length: 100 })
            .unwrap_err();
        assert!(matches!(err, Error::ArchiveTruncated { .. }));
    }

    #[test]
    fn span_overflow_is_truncation() {
        let tmp = tempfile::tempdir().unwrap();
        let container = tmp.path().join("data.pack");
        ArchiveWriter::create(&container).unwrap().finish().unwrap();

        let reader = ArchiveReader::open(&container).unwrap();
        let err = reader
            .read_span("bad", Span { offset: u64::MAX, length: 1 })
            .unwrap_err();
        assert!(matches!(err, Error::ArchiveTruncated { .. }));
    }

    #[test]
    fn missing_container_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ArchiveReader::open(&tmp.path().join("absent.pack"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
