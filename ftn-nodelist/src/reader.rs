// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Bounded file reading: optional gzip, SUB terminator, UTF-8 sanitising.

use crate::{Error, Result, MAX_DECOMPRESSED_SIZE};
use flate2::read::GzDecoder;
use std::{
    fs::File,
    io::Read,
    path::Path,
};

/// ASCII SUB; everything from the first occurrence on is ignored.
const SUB: u8 = 0x1a;

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Read a nodelist file into sanitised text.
///
/// Gzip is detected by magic bytes rather than extension so misnamed
/// archives still parse. The decompressed stream is bounded by
/// [`MAX_DECOMPRESSED_SIZE`].
pub fn read_nodelist_text(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::file(path, "open", e))?;

    let mut magic = [0u8; 2];
    let magic_len = file
        .read(&mut magic)
        .map_err(|e| Error::file(path, "read", e))?;

    let mut raw = Vec::new();
    if magic_len == 2 && magic == GZIP_MAGIC {
        let file = File::open(path).map_err(|e| Error::file(path, "open", e))?;
        let mut decoder = GzDecoder::new(file).take(MAX_DECOMPRESSED_SIZE + 1);
        let _ = decoder
            .read_to_end(&mut raw)
            .map_err(|e| Error::file(path, "gunzip", e))?;
    } else {
        raw.extend_from_slice(&magic[..magic_len]);
        let mut reader = file.take(MAX_DECOMPRESSED_SIZE + 1);
        let _ = reader
            .read_to_end(&mut raw)
            .map_err(|e| Error::file(path, "read", e))?;
    }

    if raw.len() as u64 > MAX_DECOMPRESSED_SIZE {
        return Err(Error::DecompressedTooLarge {
            path: path.to_path_buf(),
            limit: MAX_DECOMPRESSED_SIZE,
        });
    }

    if let Some(pos) = raw.iter().position(|b| *b == SUB) {
        raw.truncate(pos);
    }

    Ok(sanitize_utf8(&raw))
}

/// Best-effort UTF-8: invalid byte sequences become `?`. Idempotent, and
/// the output is always valid UTF-8.
pub fn sanitize_utf8(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).replace('\u{fffd}', "?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    #[test]
    fn sanitize_replaces_invalid_bytes_with_question_marks() {
        let raw = b"Zone,2,Fido\xffNet,City,Op,123,9600";
        let text = sanitize_utf8(raw);
        assert_eq!(text, "Zone,2,Fido?Net,City,Op,123,9600");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let raw = b"abc\xf0\x28def";
        let once = sanitize_utf8(raw);
        let twice = sanitize_utf8(once.as_bytes());
        assert_eq!(once, twice);
        assert!(std::str::from_utf8(twice.as_bytes()).is_ok());
    }

    #[test]
    fn read_truncates_at_sub_terminator() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(b"line one\r\nline two\x1agarbage after eof")
            .expect("write");
        let text = read_nodelist_text(file.path()).expect("read");
        assert_eq!(text, "line one\r\nline two");
    }

    #[test]
    fn read_decompresses_gzip_by_magic_bytes() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b";A header\r\n,1,Sys,Loc,Op,123,9600\r\n").expect("gz write");
        let compressed = encoder.finish().expect("gz finish");
        file.write_all(&compressed).expect("write");

        let text = read_nodelist_text(file.path()).expect("read");
        assert!(text.starts_with(";A header"));
    }

    #[test]
    fn read_missing_file_reports_open_error() {
        let err = read_nodelist_text(Path::new("/nonexistent/nodelist.123"))
            .expect_err("should fail");
        match err {
            Error::File { op, .. } => assert_eq!(op, "open"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
