//! # Directory Mailbox
//!
//! A file-system mailbox handler: messages live as `.b2f` files named by
//! MID under `in/`, `out/`, `sent/`, and `archive/` subdirectories.
//!
//! This is the handler most stations run with; anything fancier (SQL,
//! IMAP bridging) only needs to implement [`MBoxHandler`].

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::{ProtocolError, Result};
use crate::handler::MBoxHandler;
use crate::message::{Address, Message, FILE_EXTENSION};
use crate::protocol::proposal::{Proposal, ProposalAnswer};

const DIR_INBOX: &str = "in";
const DIR_OUTBOX: &str = "out";
const DIR_SENT: &str = "sent";
const DIR_ARCHIVE: &str = "archive";

/// Marks a message for peer-to-peer delivery only; never offered to a CMS.
const HEADER_P2P_ONLY: &str = "X-P2POnly";
/// Local bookkeeping: set on inbound messages until first read.
const HEADER_UNREAD: &str = "X-Unread";
/// Local bookkeeping: where the message file lives on disk.
const HEADER_FILE_PATH: &str = "X-FilePath";

/// A directory-backed mailbox handler.
pub struct DirHandler {
    root: PathBuf,
    send_only: bool,
    deferred: HashSet<String>,
}

impl DirHandler {
    /// Wrap the directory at `root`. With `send_only`, every inbound
    /// proposal is deferred.
    pub fn new<P: AsRef<Path>>(root: P, send_only: bool) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            send_only,
            deferred: HashSet::new(),
        }
    }

    pub fn inbox(&self) -> Result<Vec<Message>> {
        load_message_dir(&self.root.join(DIR_INBOX))
    }

    pub fn outbox(&self) -> Result<Vec<Message>> {
        load_message_dir(&self.root.join(DIR_OUTBOX))
    }

    pub fn sent(&self) -> Result<Vec<Message>> {
        load_message_dir(&self.root.join(DIR_SENT))
    }

    pub fn archive(&self) -> Result<Vec<Message>> {
        load_message_dir(&self.root.join(DIR_ARCHIVE))
    }

    pub fn inbox_count(&self) -> usize {
        count_messages(&self.root.join(DIR_INBOX))
    }

    pub fn outbox_count(&self) -> usize {
        count_messages(&self.root.join(DIR_OUTBOX))
    }

    /// Queue a message for outbound delivery.
    pub fn add_outbound(&self, msg: &Message) -> Result<()> {
        msg.validate()?;
        let path = self.message_path(DIR_OUTBOX, msg.mid());
        fs::write(path, msg.to_bytes())?;
        Ok(())
    }

    fn message_path(&self, dir: &str, mid: &str) -> PathBuf {
        self.root.join(dir).join(format!("{mid}{FILE_EXTENSION}"))
    }
}

impl MBoxHandler for DirHandler {
    fn prepare(&mut self) -> Result<()> {
        self.deferred.clear();
        for dir in [DIR_INBOX, DIR_OUTBOX, DIR_SENT, DIR_ARCHIVE] {
            fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    fn get_outbound(&mut self, fw: &[Address]) -> Vec<Message> {
        let all = match self.outbox() {
            Ok(msgs) => msgs,
            Err(err) => {
                error!(%err, "unable to read outbox");
                return Vec::new();
            }
        };

        let mut deliver = Vec::with_capacity(all.len());
        for mut msg in all {
            if self.deferred.contains(msg.mid()) {
                continue;
            }

            if !fw.is_empty() {
                // Only messages addressed solely to one of the remote's
                // forwarder addresses may go out this session.
                if !fw.iter().any(|addr| addr.is_only_recipient(&msg)) {
                    continue;
                }
            } else if msg.header().get(HEADER_P2P_ONLY) == Some("true") {
                continue; // Remote is a CMS.
            }

            for name in [HEADER_P2P_ONLY, HEADER_FILE_PATH, HEADER_UNREAD] {
                msg.header_mut().del(name);
            }
            deliver.push(msg);
        }
        deliver
    }

    fn set_sent(&mut self, mid: &str, rejected: bool) {
        let from = self.message_path(DIR_OUTBOX, mid);
        let to = self.message_path(DIR_SENT, mid);
        debug!(mid, rejected, "moving message to sent");
        if let Err(err) = fs::rename(&from, &to) {
            error!(%err, mid, "unable to move message to sent");
        }
    }

    fn set_deferred(&mut self, mid: &str) {
        self.deferred.insert(mid.to_string());
    }

    fn get_inbound_answer(&mut self, proposal: &Proposal) -> ProposalAnswer {
        if self.send_only {
            return ProposalAnswer::Defer;
        }
        if self.message_path(DIR_INBOX, proposal.mid()).exists() {
            return ProposalAnswer::Reject;
        }
        ProposalAnswer::Accept
    }

    fn process_inbound(&mut self, msgs: Vec<Message>) -> Result<()> {
        for mut msg in msgs {
            msg.header_mut().set(HEADER_UNREAD, "true");
            let path = self.message_path(DIR_INBOX, msg.mid());
            fs::write(&path, msg.to_bytes()).map_err(|e| {
                ProtocolError::Mailbox(format!(
                    "unable to write received message {}: {e}",
                    path.display()
                ))
            })?;
        }
        Ok(())
    }
}

/// Open a single message file, recording its path in a private header.
pub fn open_message<P: AsRef<Path>>(path: P) -> Result<Message> {
    let data = fs::read(&path).map_err(|e| {
        ProtocolError::Mailbox(format!("unable to open {}: {e}", path.as_ref().display()))
    })?;
    let mut msg = Message::from_bytes(&data)?;
    msg.header_mut()
        .set(HEADER_FILE_PATH, &path.as_ref().to_string_lossy());
    Ok(msg)
}

/// Load every message file in a directory.
pub fn load_message_dir(dir: &Path) -> Result<Vec<Message>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ProtocolError::Mailbox(format!("unable to read {}: {e}", dir.display())))?;

    let mut msgs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ProtocolError::Mailbox(e.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || !name.to_ascii_lowercase().ends_with(FILE_EXTENSION) {
            continue;
        }
        msgs.push(open_message(&path)?);
    }
    Ok(msgs)
}

fn count_messages(dir: &Path) -> usize {
    load_message_dir(dir).map(|msgs| msgs.len()).unwrap_or(0)
}

/// True if the given message is marked as unread.
pub fn is_unread(msg: &Message) -> bool {
    msg.header().get(HEADER_UNREAD) == Some("true")
}

/// Mark a message read/unread and rewrite its file.
pub fn set_unread(msg: &mut Message, unread: bool) -> Result<()> {
    if !unread && msg.header().get(HEADER_UNREAD).is_none() {
        return Ok(());
    }

    if unread {
        msg.header_mut().set(HEADER_UNREAD, "true");
    } else {
        msg.header_mut().del(HEADER_UNREAD);
    }

    let Some(path) = msg.header().get(HEADER_FILE_PATH).map(PathBuf::from) else {
        return Err(ProtocolError::Mailbox(
            "message has no file path".to_string(),
        ));
    };
    fs::write(path, msg.to_bytes())?;
    Ok(())
}
