//! Statement scanner for Part 21 files.
//!
//! Checks the exchange-structure envelope and splits the `DATA` section into
//! `;`-terminated statements without tokenizing them. Quoted strings and
//! `/* */` comments may contain `;` and are skipped as a whole.

use memchr::{memchr3, memmem};

use crate::error::GeometryLoadError;

const MAGIC: &str = "ISO-10303-21";
const TRAILER: &str = "END-ISO-10303-21";

/// Validates the file envelope and returns the statements of the first
/// `DATA` section, in file order.
///
/// # Errors
///
/// Returns [`GeometryLoadError::NotStep`] when the file does not start with
/// the Part 21 magic and [`GeometryLoadError::Truncated`] when the trailer,
/// the `DATA` section, or the end of a statement is missing.
pub fn data_statements(content: &str) -> Result<Vec<&str>, GeometryLoadError> {
    let head = content.trim_start_matches('\u{feff}').trim_start();
    if !head.starts_with(MAGIC) {
        let first_line = head.lines().next().unwrap_or_default();
        return Err(GeometryLoadError::NotStep(format!(
            "expected {MAGIC} header, found {first_line:?}"
        )));
    }
    if memmem::rfind(content.as_bytes(), TRAILER.as_bytes()).is_none() {
        return Err(GeometryLoadError::Truncated(format!("missing {TRAILER} trailer")));
    }

    let data_start = find_section(content, 0, "DATA")
        .ok_or_else(|| GeometryLoadError::Truncated("missing DATA section".into()))?;

    let mut scanner = StatementScanner {
        bytes: content.as_bytes(),
        pos: data_start,
    };
    let mut statements = Vec::new();
    loop {
        let Some((start, end)) = scanner.next_statement()? else {
            return Err(GeometryLoadError::Truncated(
                "DATA section is not closed by ENDSEC".into(),
            ));
        };
        let text = content[start..end].trim();
        let body = text.trim_end_matches(';').trim_end();
        if body.eq_ignore_ascii_case("ENDSEC") {
            break;
        }
        if !body.is_empty() {
            statements.push(text);
        }
    }
    Ok(statements)
}

/// Finds `KEYWORD;` (allowing whitespace before `;`) at a statement boundary
/// and returns the offset just past it.
fn find_section(content: &str, from: usize, keyword: &str) -> Option<usize> {
    let bytes = content.as_bytes();
    let finder = memmem::Finder::new(keyword.as_bytes());
    let mut offset = from;
    while let Some(hit) = finder.find(&bytes[offset..]) {
        let at = offset + hit;
        let before_ok = at == 0 || matches!(bytes[at - 1], b';' | b'\n' | b'\r' | b' ' | b'\t');
        let rest = &content[at + keyword.len()..];
        let trimmed = rest.trim_start();
        if before_ok && trimmed.starts_with(';') {
            let skipped = rest.len() - trimmed.len();
            return Some(at + keyword.len() + skipped + 1);
        }
        offset = at + keyword.len();
    }
    None
}

struct StatementScanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl StatementScanner<'_> {
    /// Returns the byte range of the next statement including its `;`, or
    /// `None` at end of input with nothing pending.
    fn next_statement(&mut self) -> Result<Option<(usize, usize)>, GeometryLoadError> {
        let start = self.pos;
        let bytes = self.bytes;
        while self.pos < bytes.len() {
            let Some(hit) = memchr3(b'\'', b';', b'/', &bytes[self.pos..]) else {
                self.pos = bytes.len();
                break;
            };
            self.pos += hit;
            match bytes[self.pos] {
                b';' => {
                    self.pos += 1;
                    return Ok(Some((start, self.pos)));
                }
                b'\'' => self.skip_string()?,
                _ => {
                    if bytes.get(self.pos + 1) == Some(&b'*') {
                        self.skip_comment()?;
                    } else {
                        self.pos += 1;
                    }
                }
            }
        }
        if bytes[start..].iter().all(u8::is_ascii_whitespace) {
            Ok(None)
        } else {
            Err(GeometryLoadError::Truncated(
                "unterminated statement at end of file".into(),
            ))
        }
    }

    fn skip_string(&mut self) -> Result<(), GeometryLoadError> {
        self.pos += 1;
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'\'' {
                if self.bytes.get(self.pos + 1) == Some(&b'\'') {
                    self.pos += 2;
                    continue;
                }
                self.pos += 1;
                return Ok(());
            }
            self.pos += 1;
        }
        Err(GeometryLoadError::Truncated("unterminated string".into()))
    }

    fn skip_comment(&mut self) -> Result<(), GeometryLoadError> {
        match memmem::find(&self.bytes[self.pos + 2..], b"*/") {
            Some(end) => {
                self.pos += end + 4;
                Ok(())
            }
            None => Err(GeometryLoadError::Truncated("unterminated comment".into())),
        }
    }
}
