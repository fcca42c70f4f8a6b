//! Byte sources for loaders

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::progress::FileProgress;

/// Reports every byte read from `inner` to a progress handle
pub struct ProgressReader<R> {
    inner: R,
    progress: FileProgress,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, progress: FileProgress) -> Self {
        Self { inner, progress }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.progress.advance(n as u64);
        Ok(n)
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}

/// Open `path` for a loader.
///
/// Progress counts on-disk bytes, so a `.gz` file is counted before it is
/// decompressed.
pub fn open_input(path: &Path, progress: FileProgress) -> io::Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    let counted = ProgressReader::new(file, progress);

    if is_gzip(path) {
        Ok(Box::new(GzDecoder::new(BufReader::new(counted))))
    } else {
        Ok(Box::new(counted))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_open_plain_and_gzip() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("a.csv");
        std::fs::write(&plain, b"x,y\n1,2\n").unwrap();

        let gz = dir.path().join("a.csv.gz");
        let mut enc = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        enc.write_all(b"x,y\n1,2\n").unwrap();
        enc.finish().unwrap();

        for path in [&plain, &gz] {
            let mut out = String::new();
            open_input(path, FileProgress::detached())
                .unwrap()
                .read_to_string(&mut out)
                .unwrap();
            assert_eq!(out, "x,y\n1,2\n");
        }
    }

    #[test]
    fn test_open_missing_file() {
        let err = open_input(Path::new("/nonexistent/file.csv"), FileProgress::detached());
        assert!(err.is_err());
    }
}
