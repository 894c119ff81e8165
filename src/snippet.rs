/// Maximum number of bytes captured into a snippet.
pub const SNIPPET_MAX_BYTES: usize = 2048;

/// Files larger than this never get a snippet.
pub const SNIPPET_MAX_FILE_BYTES: u64 = 100_000;

/// Extensions that are treated as text without sniffing.
const TEXT_EXTS: &[&str] = &[
    "txt", "md", "log", "json", "yaml", "yml", "ini", "cfg", "conf", "py",
    "js", "ts", "rs", "html", "css", "sh", "java", "xml", "csv", "env",
];

/// Heuristic text check: no NUL bytes and mostly printable ASCII.
pub fn looks_like_text(raw: &[u8]) -> bool {
    if raw.contains(&0) {
        return false;
    }
    let printable = raw
        .iter()
        .filter(|&&b| (32..=126).contains(&b) || matches!(b, 9 | 10 | 13))
        .count();
    printable as f64 / raw.len().max(1) as f64 > 0.9
}

/// Capture a snippet from a file's bytes for indexing and reranking.
///
/// Returns the first couple of KiB decoded as UTF-8 when the file has a text
/// extension or sniffs as text; returns `None` for binaries and oversized
/// files. NUL characters never survive, which keeps the snippet safe for the
/// nul-separated record codec.
pub fn capture(bytes: &[u8], extension: Option<&str>, size: u64) -> Option<String> {
    if size > SNIPPET_MAX_FILE_BYTES {
        return None;
    }

    let head = &bytes[..bytes.len().min(SNIPPET_MAX_BYTES)];
    let is_text_ext = extension
        .map(|e| TEXT_EXTS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    if !is_text_ext && !looks_like_text(head) {
        return None;
    }

    let text: String = String::from_utf8_lossy(head)
        .chars()
        .filter(|&c| c != '\0')
        .collect();
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ascii_is_text() {
        assert!(looks_like_text(b"hello world\nsecond line\n"));
    }

    #[test]
    fn nul_byte_is_binary() {
        assert!(!looks_like_text(b"hello\0world"));
    }

    #[test]
    fn mostly_unprintable_is_binary() {
        let raw: Vec<u8> = (1u8..32).filter(|b| !matches!(b, 9 | 10 | 13)).collect();
        assert!(!looks_like_text(&raw));
    }

    #[test]
    fn captures_text_file_head() {
        let snippet = capture(b"line one\nline two\n", Some("md"), 18).unwrap();
        assert!(snippet.starts_with("line one"));
    }

    #[test]
    fn truncates_to_max_bytes() {
        let big = vec![b'a'; SNIPPET_MAX_BYTES * 2];
        let snippet = capture(&big, Some("txt"), big.len() as u64).unwrap();
        assert_eq!(snippet.len(), SNIPPET_MAX_BYTES);
    }

    #[test]
    fn skips_oversized_files() {
        assert!(capture(b"text", Some("md"), SNIPPET_MAX_FILE_BYTES + 1).is_none());
    }

    #[test]
    fn skips_binaries_without_text_extension() {
        let raw = [0u8, 159, 146, 150, 0, 1, 2, 3];
        assert!(capture(&raw, Some("bin"), 8).is_none());
        assert!(capture(&raw, None, 8).is_none());
    }

    #[test]
    fn sniffs_text_without_known_extension() {
        assert!(capture(b"key = value\n", Some("unknown"), 12).is_some());
    }

    #[test]
    fn empty_file_has_no_snippet() {
        assert!(capture(b"", Some("txt"), 0).is_none());
    }
}
