//! Per-message processing: timestamp derivation, verbatim persistence,
//! attachment extraction, and the optional post-processing hook.

use std::path::PathBuf;

use mail_parser::MessageParser;

use crate::error::{Result, StashError};

use super::attachments;
use super::postprocess::PostProcessor;
use super::sanitize::sanitize;
use super::timestamp::derive_timestamp;
use super::write_atomic;

/// Archives one raw message under a base directory.
pub struct MessageProcessor {
    base_dir: PathBuf,
    post: Option<Box<dyn PostProcessor>>,
}

impl MessageProcessor {
    /// Create a processor writing under `base_dir`. The directory is created
    /// if absent.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|e| StashError::io(&base_dir, e))?;
        Ok(Self {
            base_dir,
            post: None,
        })
    }

    /// Attach a post-processing step, run once per archived message.
    pub fn with_post_processor(mut self, post: Box<dyn PostProcessor>) -> Self {
        self.post = Some(post);
        self
    }

    /// Archive one raw message.
    ///
    /// Writes the verbatim bytes to `<timestamp>-<subject>.eml` (sanitized)
    /// and, for multipart messages, extracts allow-listed attachments with the
    /// same timestamp. Re-processing the same message derives the same name
    /// and overwrites the earlier file, so a failed batch is safe to retry.
    ///
    /// Returns the path of the archived `.eml` file.
    pub fn process(&self, raw: &[u8]) -> Result<PathBuf> {
        let msg = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| StashError::Parse("unparseable message".into()))?;

        let date_header = msg.header_raw("Date").ok_or_else(|| StashError::DateParse {
            reason: "missing Date header".into(),
        })?;
        let timestamp = derive_timestamp(date_header)?;
        let subject = msg.subject().unwrap_or("");

        let name = sanitize(&format!("{timestamp}-{subject}.eml"));
        let path = self.base_dir.join(&name);
        write_atomic(&path, raw)?;
        tracing::info!(path = %path.display(), "Archived message");

        if msg.parts.len() > 1 {
            attachments::extract(&msg, &timestamp, &self.base_dir)?;
        }

        if let Some(post) = &self.post {
            // Not part of the core pipeline: failure does not fail the message
            if let Err(e) = post.run(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Post-processing failed");
            }
        }

        Ok(path)
    }
}
