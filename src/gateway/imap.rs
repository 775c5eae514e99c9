//! IMAP gateway using the `imap` crate (sync, TLS).
//!
//! Construction connects and logs in; a rejected login is `Auth` (fatal,
//! never retried), everything network-level is `Connection`. All commands
//! are UID-based so identifiers stay stable across the cycle.

use crate::config::ServerConfig;
use crate::error::{Result, StashError};

use super::{uid_set, MailGateway, RawMessage};

type TlsSession = imap::Session<native_tls::TlsStream<std::net::TcpStream>>;

/// An authenticated IMAP session over TLS.
pub struct ImapGateway {
    session: TlsSession,
    host: String,
}

impl ImapGateway {
    /// Connect to the server and log in.
    pub fn connect(server: &ServerConfig) -> Result<Self> {
        let tls = native_tls::TlsConnector::builder()
            .build()
            .map_err(|e| StashError::Connection(format!("TLS setup failed: {e}")))?;

        let addr = (server.host.as_str(), server.port);
        let client = imap::connect(addr, &server.host, &tls).map_err(|e| {
            StashError::Connection(format!(
                "cannot connect to {}:{}: {e}",
                server.host, server.port
            ))
        })?;

        let session = client
            .login(&server.username, &server.password)
            .map_err(|e| StashError::Auth(format!("login as '{}': {}", server.username, e.0)))?;

        tracing::info!(host = %server.host, user = %server.username, "Logged in");
        Ok(Self {
            session,
            host: server.host.clone(),
        })
    }

    fn conn_err(&self, what: &str, e: imap::error::Error) -> StashError {
        StashError::Connection(format!("{what} on {}: {e}", self.host))
    }
}

impl MailGateway for ImapGateway {
    fn select(&mut self, mailbox: &str) -> Result<()> {
        self.session
            .select(mailbox)
            .map_err(|e| StashError::Connection(format!("SELECT {mailbox} on {}: {e}", self.host)))?;
        Ok(())
    }

    fn search_all(&mut self) -> Result<Vec<u32>> {
        let uids = self
            .session
            .uid_search("ALL")
            .map_err(|e| self.conn_err("UID SEARCH", e))?;
        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn fetch(&mut self, uids: &[u32]) -> Result<Vec<RawMessage>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let fetches = self
            .session
            .uid_fetch(uid_set(uids), "RFC822")
            .map_err(|e| self.conn_err("UID FETCH", e))?;

        let mut messages = Vec::with_capacity(uids.len());
        for fetch in fetches.iter() {
            let uid = match fetch.uid {
                Some(uid) => uid,
                None => continue,
            };
            if let Some(body) = fetch.body() {
                messages.push(RawMessage {
                    uid,
                    data: body.to_vec(),
                });
            } else {
                tracing::warn!(uid, "Fetch returned no body");
            }
        }
        messages.sort_by_key(|m| m.uid);
        Ok(messages)
    }

    fn copy(&mut self, uids: &[u32], mailbox: &str) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }
        self.session
            .uid_copy(uid_set(uids), mailbox)
            .map_err(|e| self.conn_err("UID COPY", e))?;
        Ok(())
    }

    fn mark_deleted(&mut self, uids: &[u32]) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }
        self.session
            .uid_store(uid_set(uids), "+FLAGS (\\Deleted)")
            .map_err(|e| self.conn_err("UID STORE", e))?;
        Ok(())
    }

    fn expunge(&mut self) -> Result<()> {
        self.session
            .expunge()
            .map_err(|e| self.conn_err("EXPUNGE", e))?;
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        self.session
            .logout()
            .map_err(|e| self.conn_err("LOGOUT", e))?;
        tracing::info!(host = %self.host, "Logged out");
        Ok(())
    }
}

impl std::fmt::Debug for ImapGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapGateway").field("host", &self.host).finish()
    }
}
