//! Mail server gateway abstraction: trait + IMAP and mock implementations.
//!
//! `MailGateway` defines the operations the archive pipeline needs from a
//! mail server session. `ImapGateway` speaks IMAP over TLS; `MockGateway`
//! provides in-memory mailboxes for tests.

pub mod imap;
pub mod mock;
pub mod retry;

use crate::error::Result;

/// A raw message as fetched from the mail server.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Server-assigned unique identifier (IMAP UID).
    pub uid: u32,
    /// Raw RFC 5322 message bytes, verbatim.
    pub data: Vec<u8>,
}

/// An authenticated session over a remote mailbox.
///
/// All operations act on the currently selected mailbox. Implementations are
/// blocking; the service holds one session for its whole lifetime and releases
/// it with `logout` on every exit path.
pub trait MailGateway {
    /// Set the active mailbox.
    fn select(&mut self, mailbox: &str) -> Result<()>;

    /// UIDs of all messages in the active mailbox, ascending.
    fn search_all(&mut self) -> Result<Vec<u32>>;

    /// Fetch the raw bytes of the given messages.
    fn fetch(&mut self, uids: &[u32]) -> Result<Vec<RawMessage>>;

    /// Copy messages to another mailbox without removing the originals.
    fn copy(&mut self, uids: &[u32], mailbox: &str) -> Result<()>;

    /// Flag messages for removal.
    fn mark_deleted(&mut self, uids: &[u32]) -> Result<()>;

    /// Permanently purge flagged messages from the active mailbox.
    fn expunge(&mut self) -> Result<()>;

    /// Release the session.
    fn logout(&mut self) -> Result<()>;
}

/// Render a UID slice as an IMAP sequence set ("3,5,9").
pub(crate) fn uid_set(uids: &[u32]) -> String {
    uids.iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
