//! Attachment extraction: allow-listed MIME parts are materialized to files.

use std::path::{Path, PathBuf};

use mail_parser::{Message, MessagePart, MimeHeaders, PartType};

use crate::error::Result;

use super::sanitize::sanitize;
use super::write_atomic;

/// Content types whose parts are saved as separate files.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["application/pdf"];

/// Walk every MIME part of `message`, including parts of nested
/// `message/rfc822` sub-messages, and write each allow-listed part to
/// `<timestamp>-attachment-<part-filename>` (sanitized) under `base_dir`.
///
/// No de-duplication: a later matching part with the same filename overwrites
/// an earlier one. Parts outside the allow list are skipped with no trace.
///
/// Returns the paths written, in extraction order.
pub fn extract(message: &Message, timestamp: &str, base_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    extract_into(message, timestamp, base_dir, &mut written)?;
    Ok(written)
}

fn extract_into(
    message: &Message,
    timestamp: &str,
    base_dir: &Path,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    for part in &message.parts {
        match &part.body {
            PartType::Message(nested) => extract_into(nested, timestamp, base_dir, written)?,
            // Container parts carry no payload of their own
            PartType::Multipart(_) => {}
            _ => {
                let ctype = content_type_string(part);
                if !is_allowed(&ctype) {
                    tracing::debug!(content_type = %ctype, "Skipping part");
                    continue;
                }

                let original = part.attachment_name().unwrap_or("unnamed");
                let name = sanitize(&format!("{timestamp}-attachment-{original}"));
                let path = base_dir.join(&name);
                write_atomic(&path, part.contents())?;
                tracing::info!(path = %path.display(), "Saved attachment");
                written.push(path);
            }
        }
    }
    Ok(())
}

/// Render a part's content type as `"main/sub"` (e.g. `"application/pdf"`).
fn content_type_string(part: &MessagePart) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{sub}", ct.ctype()),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn is_allowed(content_type: &str) -> bool {
    ALLOWED_CONTENT_TYPES
        .iter()
        .any(|a| a.eq_ignore_ascii_case(content_type))
}

#[cfg(test)]
mod tests {
    use mail_parser::MessageParser;

    use super::*;

    fn multipart_with_pdfs(parts: &[(&str, &str, &str)]) -> Vec<u8> {
        let mut raw = String::from(
            "From: a@example.com\r\n\
             Subject: test\r\n\
             Date: Mon, 02 Jan 2023 03:04:05 +0000\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\r\n\
             --XYZ\r\n\
             Content-Type: text/plain\r\n\r\n\
             body text\r\n",
        );
        for (ctype, name, payload) in parts {
            raw.push_str(&format!(
                "--XYZ\r\n\
                 Content-Type: {ctype}\r\n\
                 Content-Disposition: attachment; filename=\"{name}\"\r\n\r\n\
                 {payload}\r\n"
            ));
        }
        raw.push_str("--XYZ--\r\n");
        raw.into_bytes()
    }

    #[test]
    fn test_only_allowed_types_extracted() {
        let raw = multipart_with_pdfs(&[
            ("application/pdf", "invoice.pdf", "%PDF-1.4 fake"),
            ("image/png", "logo.png", "not-a-real-png"),
        ]);
        let msg = MessageParser::default().parse(&raw).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let written = extract(&msg, "20230102-030405", dir.path()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(
            written[0].file_name().unwrap(),
            "20230102-030405-attachment-invoice.pdf"
        );
        // The PNG left no trace
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_duplicate_filenames_last_part_wins() {
        let raw = multipart_with_pdfs(&[
            ("application/pdf", "a.pdf", "first payload"),
            ("application/pdf", "a.pdf", "second payload"),
        ]);
        let msg = MessageParser::default().parse(&raw).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let written = extract(&msg, "20230102-030405", dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0], written[1]);

        // Exactly one file on disk, holding the second part's payload
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        let contents = std::fs::read(&written[1]).unwrap();
        assert_eq!(contents, b"second payload");
    }

    #[test]
    fn test_attachment_filename_is_sanitized() {
        let raw = multipart_with_pdfs(&[("application/pdf", "in/voice?.pdf", "%PDF")]);
        let msg = MessageParser::default().parse(&raw).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let written = extract(&msg, "20230102-030405", dir.path()).unwrap();
        assert_eq!(
            written[0].file_name().unwrap(),
            "20230102-030405-attachment-invoice.pdf"
        );
    }

    #[test]
    fn test_no_matching_parts_writes_nothing() {
        let raw = multipart_with_pdfs(&[("image/png", "logo.png", "png-bytes")]);
        let msg = MessageParser::default().parse(&raw).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let written = extract(&msg, "20230102-030405", dir.path()).unwrap();
        assert!(written.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
