//! `mailstash` — an automated IMAP mailbox archiver.
//!
//! This crate provides the core library: the mail server gateway
//! abstraction, the message-archiving pipeline, and the poll loop that
//! moves processed messages out of the inbox.

pub mod archive;
pub mod config;
pub mod error;
pub mod gateway;
