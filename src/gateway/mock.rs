//! In-memory gateway for unit and integration tests.
//!
//! Holds named mailboxes as UID → bytes maps and records every mutating
//! call so tests can assert on the exact sequence of mailbox operations.

use std::collections::BTreeMap;

use crate::error::{Result, StashError};

use super::{MailGateway, RawMessage};

/// In-memory mock of a mail server session.
#[derive(Debug, Default)]
pub struct MockGateway {
    mailboxes: BTreeMap<String, BTreeMap<u32, Vec<u8>>>,
    selected: Option<String>,
    deleted: Vec<u32>,
    /// (uids, destination) pairs, one per `copy` call.
    pub copies: Vec<(Vec<u32>, String)>,
    /// Number of `expunge` calls.
    pub expunges: usize,
    /// Whether `logout` has been called.
    pub logged_out: bool,
}

impl MockGateway {
    /// Create a mock with no mailboxes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a message into a mailbox, creating the mailbox if needed.
    pub fn deposit(&mut self, mailbox: &str, uid: u32, data: impl Into<Vec<u8>>) {
        self.mailboxes
            .entry(mailbox.to_string())
            .or_default()
            .insert(uid, data.into());
    }

    /// UIDs currently present in a mailbox (empty if it does not exist).
    pub fn uids_in(&self, mailbox: &str) -> Vec<u32> {
        self.mailboxes
            .get(mailbox)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    fn selected_box(&mut self) -> Result<&mut BTreeMap<u32, Vec<u8>>> {
        let name = self
            .selected
            .clone()
            .ok_or_else(|| StashError::Connection("no mailbox selected".into()))?;
        self.mailboxes
            .get_mut(&name)
            .ok_or_else(|| StashError::Connection(format!("no such mailbox: {name}")))
    }
}

impl MailGateway for MockGateway {
    fn select(&mut self, mailbox: &str) -> Result<()> {
        self.mailboxes.entry(mailbox.to_string()).or_default();
        self.selected = Some(mailbox.to_string());
        Ok(())
    }

    fn search_all(&mut self) -> Result<Vec<u32>> {
        Ok(self.selected_box()?.keys().copied().collect())
    }

    fn fetch(&mut self, uids: &[u32]) -> Result<Vec<RawMessage>> {
        let mbox = self.selected_box()?;
        let mut out = Vec::with_capacity(uids.len());
        for &uid in uids {
            let data = mbox
                .get(&uid)
                .ok_or_else(|| StashError::Connection(format!("no such uid: {uid}")))?;
            out.push(RawMessage {
                uid,
                data: data.clone(),
            });
        }
        Ok(out)
    }

    fn copy(&mut self, uids: &[u32], mailbox: &str) -> Result<()> {
        let mut moved = Vec::with_capacity(uids.len());
        {
            let src = self.selected_box()?;
            for &uid in uids {
                let data = src
                    .get(&uid)
                    .ok_or_else(|| StashError::Connection(format!("no such uid: {uid}")))?;
                moved.push((uid, data.clone()));
            }
        }
        let dst = self.mailboxes.entry(mailbox.to_string()).or_default();
        for (uid, data) in moved {
            dst.insert(uid, data);
        }
        self.copies.push((uids.to_vec(), mailbox.to_string()));
        Ok(())
    }

    fn mark_deleted(&mut self, uids: &[u32]) -> Result<()> {
        self.selected_box()?;
        self.deleted.extend_from_slice(uids);
        Ok(())
    }

    fn expunge(&mut self) -> Result<()> {
        let deleted = std::mem::take(&mut self.deleted);
        let mbox = self.selected_box()?;
        for uid in deleted {
            mbox.remove(&uid);
        }
        self.expunges += 1;
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        self.logged_out = true;
        Ok(())
    }
}
