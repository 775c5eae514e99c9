//! The poll loop: fetch, process, move, delete, compact, sleep, repeat.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{Result, StashError};
use crate::gateway::retry::with_backoff;
use crate::gateway::MailGateway;

use super::processor::MessageProcessor;

/// Retry budget for individual gateway calls within a cycle.
const GATEWAY_ATTEMPTS: u32 = 3;
const GATEWAY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Granularity of the inter-cycle sleep, so cancellation is observed
/// promptly at the sleep boundary without interrupting a cycle.
const SLEEP_SLICE: Duration = Duration::from_secs(1);

/// Outcome of one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Messages processed and moved to the outbox this cycle.
    pub archived: usize,
}

/// The archiver: owns the gateway session for its whole lifetime and runs
/// the poll loop over it.
pub struct ArchiveService<G: MailGateway> {
    gateway: G,
    processor: MessageProcessor,
    outbox: String,
    poll_interval: Duration,
}

impl<G: MailGateway> ArchiveService<G> {
    /// Create a service over an already-authenticated gateway with the inbox
    /// selected as the active mailbox.
    pub fn new(
        mut gateway: G,
        processor: MessageProcessor,
        inbox: &str,
        outbox: impl Into<String>,
        poll_interval: Duration,
    ) -> Result<Self> {
        gateway.select(inbox)?;
        Ok(Self {
            gateway,
            processor,
            outbox: outbox.into(),
            poll_interval,
        })
    }

    /// Run one poll cycle.
    ///
    /// Fetches every message currently in the inbox and processes each in
    /// sequence. Only after the whole batch has been processed without error
    /// are the messages copied to the outbox, marked deleted, and expunged.
    /// If any message fails, the move step does not run for the entire batch:
    /// files already written stay on disk, every message stays in the inbox,
    /// and the next cycle re-derives the same filenames and overwrites them.
    ///
    /// The move set is the set of messages actually fetched and processed.
    /// A message the server returned without a body is never moved: it stays
    /// in the inbox for the next cycle rather than being removed unarchived.
    pub fn run_once(&mut self) -> Result<CycleStats> {
        let uids = with_backoff(GATEWAY_ATTEMPTS, GATEWAY_BASE_DELAY, || {
            self.gateway.search_all()
        })?;
        if uids.is_empty() {
            tracing::debug!("Inbox empty, nothing to archive");
            return Ok(CycleStats::default());
        }

        let messages = with_backoff(GATEWAY_ATTEMPTS, GATEWAY_BASE_DELAY, || {
            self.gateway.fetch(&uids)
        })?;
        let processed: Vec<u32> = messages.iter().map(|m| m.uid).collect();
        if processed.len() != uids.len() {
            tracing::warn!(
                searched = uids.len(),
                fetched = processed.len(),
                "Fetch returned fewer messages than searched; the rest stay in the inbox"
            );
        }
        if messages.is_empty() {
            return Ok(CycleStats::default());
        }
        tracing::info!(count = messages.len(), "Processing batch");

        for message in &messages {
            self.processor.process(&message.data).map_err(|e| {
                tracing::warn!(uid = message.uid, error = %e, "Message failed, batch stays in inbox");
                e
            })?;
        }

        with_backoff(GATEWAY_ATTEMPTS, GATEWAY_BASE_DELAY, || {
            self.gateway.copy(&processed, &self.outbox)
        })?;
        with_backoff(GATEWAY_ATTEMPTS, GATEWAY_BASE_DELAY, || {
            self.gateway.mark_deleted(&processed)
        })?;
        with_backoff(GATEWAY_ATTEMPTS, GATEWAY_BASE_DELAY, || {
            self.gateway.expunge()
        })?;

        tracing::info!(count = processed.len(), outbox = %self.outbox, "Batch archived");
        Ok(CycleStats {
            archived: processed.len(),
        })
    }

    /// Run poll cycles until `cancel` is set or a fatal error occurs.
    ///
    /// Cycle-level errors (malformed message, disk write failure) leave the
    /// inbox unchanged and the loop continues with the next cycle; connection
    /// and authentication errors are fatal. The gateway is logged out on every
    /// exit path.
    pub fn run(&mut self, cancel: &AtomicBool) -> Result<()> {
        let result = self.run_loop(cancel);
        if let Err(e) = self.gateway.logout() {
            tracing::warn!(error = %e, "Logout failed");
        }
        result
    }

    fn run_loop(&mut self, cancel: &AtomicBool) -> Result<()> {
        loop {
            match self.run_once() {
                Ok(stats) if stats.archived > 0 => {
                    tracing::info!(archived = stats.archived, "Cycle complete");
                }
                Ok(_) => {}
                Err(e @ (StashError::Connection(_) | StashError::Auth(_))) => {
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Cycle aborted, will retry next poll");
                }
            }

            if self.sleep_until_cancelled(cancel) {
                tracing::info!("Cancellation observed, shutting down");
                return Ok(());
            }
        }
    }

    /// Sleep the poll interval in slices, returning `true` if cancelled.
    fn sleep_until_cancelled(&self, cancel: &AtomicBool) -> bool {
        let mut remaining = self.poll_interval;
        loop {
            if cancel.load(Ordering::SeqCst) {
                return true;
            }
            if remaining.is_zero() {
                return false;
            }
            let slice = remaining.min(SLEEP_SLICE);
            std::thread::sleep(slice);
            remaining -= slice;
        }
    }

    /// Log out and release the session without running the loop.
    pub fn shutdown(mut self) -> Result<()> {
        self.gateway.logout()
    }

    /// Consume the service, returning the gateway (test hook).
    #[cfg(test)]
    pub(crate) fn into_gateway(self) -> G {
        self.gateway
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::MockGateway;

    const DATED: &[u8] = b"From: a@example.com\r\n\
        Subject: hello\r\n\
        Date: Mon, 02 Jan 2023 03:04:05 +0000\r\n\r\n\
        body\r\n";

    fn service(gw: MockGateway, dir: &std::path::Path) -> ArchiveService<MockGateway> {
        ArchiveService::new(
            gw,
            MessageProcessor::new(dir).unwrap(),
            "INBOX",
            "Archive",
            Duration::ZERO,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_inbox_makes_no_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let mut svc = service(MockGateway::new(), dir.path());

        let stats = svc.run_once().unwrap();
        assert_eq!(stats.archived, 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let gw = svc.into_gateway();
        assert!(gw.copies.is_empty());
        assert_eq!(gw.expunges, 0);
    }

    #[test]
    fn test_successful_cycle_moves_batch() {
        let mut gw = MockGateway::new();
        gw.deposit("INBOX", 1, DATED.to_vec());
        let dir = tempfile::tempdir().unwrap();
        let mut svc = service(gw, dir.path());

        let stats = svc.run_once().unwrap();
        assert_eq!(stats.archived, 1);

        let gw = svc.into_gateway();
        assert!(gw.uids_in("INBOX").is_empty());
        assert_eq!(gw.uids_in("Archive"), vec![1]);
        assert_eq!(gw.copies, vec![(vec![1], "Archive".to_string())]);
        assert_eq!(gw.expunges, 1);
    }

    #[test]
    fn test_failing_message_aborts_whole_batch() {
        let mut gw = MockGateway::new();
        gw.deposit("INBOX", 1, DATED.to_vec());
        gw.deposit("INBOX", 2, b"Subject: no date header\r\n\r\nbody\r\n".to_vec());
        gw.deposit("INBOX", 3, DATED.to_vec());
        let dir = tempfile::tempdir().unwrap();
        let mut svc = service(gw, dir.path());

        let err = svc.run_once().unwrap_err();
        assert!(matches!(err, StashError::DateParse { .. }));

        // Message 1 was written before the failure and stays on disk
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        // No mailbox mutation happened for any of the three
        let gw = svc.into_gateway();
        assert_eq!(gw.uids_in("INBOX"), vec![1, 2, 3]);
        assert!(gw.uids_in("Archive").is_empty());
        assert!(gw.copies.is_empty());
        assert_eq!(gw.expunges, 0);
    }

    /// Gateway whose fetch responses omit one message, like a server
    /// returning a body-less FETCH.
    struct DroppingGateway {
        inner: MockGateway,
        drop_uid: u32,
    }

    impl MailGateway for DroppingGateway {
        fn select(&mut self, mailbox: &str) -> crate::error::Result<()> {
            self.inner.select(mailbox)
        }
        fn search_all(&mut self) -> crate::error::Result<Vec<u32>> {
            self.inner.search_all()
        }
        fn fetch(&mut self, uids: &[u32]) -> crate::error::Result<Vec<crate::gateway::RawMessage>> {
            let uids: Vec<u32> = uids.iter().copied().filter(|&u| u != self.drop_uid).collect();
            self.inner.fetch(&uids)
        }
        fn copy(&mut self, uids: &[u32], mailbox: &str) -> crate::error::Result<()> {
            self.inner.copy(uids, mailbox)
        }
        fn mark_deleted(&mut self, uids: &[u32]) -> crate::error::Result<()> {
            self.inner.mark_deleted(uids)
        }
        fn expunge(&mut self) -> crate::error::Result<()> {
            self.inner.expunge()
        }
        fn logout(&mut self) -> crate::error::Result<()> {
            self.inner.logout()
        }
    }

    #[test]
    fn test_unfetched_message_stays_in_inbox() {
        let second = b"From: a@example.com\r\n\
            Subject: second\r\n\
            Date: Mon, 02 Jan 2023 03:04:06 +0000\r\n\r\n\
            body\r\n";
        let mut inner = MockGateway::new();
        inner.deposit("INBOX", 1, DATED.to_vec());
        inner.deposit("INBOX", 2, second.to_vec());
        inner.deposit("INBOX", 3, DATED.to_vec());
        let gw = DroppingGateway {
            inner,
            drop_uid: 2,
        };

        let dir = tempfile::tempdir().unwrap();
        let mut svc = ArchiveService::new(
            gw,
            MessageProcessor::new(dir.path()).unwrap(),
            "INBOX",
            "Archive",
            Duration::ZERO,
        )
        .unwrap();

        let stats = svc.run_once().unwrap();
        // Only the fetched messages count as archived
        assert_eq!(stats.archived, 2);

        let gw = svc.into_gateway().inner;
        // The unfetched message was neither moved nor deleted
        assert_eq!(gw.uids_in("INBOX"), vec![2]);
        assert_eq!(gw.uids_in("Archive"), vec![1, 3]);
        assert_eq!(gw.copies, vec![(vec![1, 3], "Archive".to_string())]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        // Next cycle picks it up once the server serves it
        let mut inner = MockGateway::new();
        inner.deposit("INBOX", 2, second.to_vec());
        let mut svc = service(inner, dir.path());
        let stats = svc.run_once().unwrap();
        assert_eq!(stats.archived, 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_run_logs_out_on_cancellation() {
        let mut gw = MockGateway::new();
        gw.deposit("INBOX", 1, DATED.to_vec());
        let dir = tempfile::tempdir().unwrap();
        let mut svc = service(gw, dir.path());

        let cancel = AtomicBool::new(true);
        svc.run(&cancel).unwrap();

        let gw = svc.into_gateway();
        assert!(gw.logged_out);
        // The in-flight cycle completed before cancellation was observed
        assert_eq!(gw.uids_in("Archive"), vec![1]);
    }
}
