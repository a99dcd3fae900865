//! The inbound half of the turn loop: collect a proposal batch, answer it,
//! and receive the accepted data blocks.

use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::config::MAX_BATCH_SIZE;
use crate::error::{ProtocolError, Result};
use crate::message::Message;
use crate::protocol::negated_sum;
use crate::protocol::proposal::{
    self, Proposal, ProposalAnswer, BLOCK_END, BLOCK_START,
};
use crate::protocol::secure_login::CHALLENGE_PREFIX;
use crate::protocol::session::Session;
use crate::protocol::wire::Wire;
use crate::status::Status;
use crate::transport::Connection;

/// Chunk size for data-block reads; status updates are emitted per chunk.
const RECV_CHUNK: usize = 1024;
/// Cap on the title and offset fields inside a data-block header.
const MAX_HEADER_FIELD: usize = 256;

impl Session {
    /// One inbound turn: read lines until the peer signals no traffic,
    /// quits, or completes a proposal batch, then answer the batch and
    /// receive the accepted payloads.
    pub(crate) async fn handle_inbound<C: Connection>(
        &mut self,
        wire: &mut Wire<C>,
    ) -> Result<()> {
        let deadline = self.config.timeouts.line;
        let mut batch: Vec<Proposal> = Vec::new();
        // Checksum input: the proposal lines exactly as transmitted.
        let mut batch_bytes: Vec<u8> = Vec::new();

        loop {
            let line = wire.read_line(deadline).await?;
            if line.is_empty() {
                continue;
            }

            if let Some(text) = line.strip_prefix("***") {
                return Err(ProtocolError::Remote(text.trim().to_string()));
            }
            if line.starts_with(';') {
                // Some gateways challenge after the banner instead of
                // before it; answer whenever the challenge shows up.
                if let Some(token) = line.strip_prefix(CHALLENGE_PREFIX) {
                    let token = token.trim().to_string();
                    self.answer_challenge(wire, &token).await?;
                } else if !self.try_parse_fw_line(&line) {
                    // Forwarder updates are meaningful; other comment
                    // lines (MOTD, QTC report) are not.
                    debug!(%line, "comment");
                }
                continue;
            }
            match line.as_str() {
                "FF" => {
                    debug!("remote has no traffic this turn");
                    self.remote_no_msgs = true;
                    return Ok(());
                }
                "FQ" => {
                    debug!("remote is quitting");
                    self.quit_received = true;
                    return Ok(());
                }
                _ => {}
            }
            if let Some(field) = line.strip_prefix("F>") {
                self.remote_no_msgs = false;
                self.finish_batch(wire, &mut batch, &batch_bytes, field.trim())
                    .await?;
                return Ok(());
            }
            if line.starts_with('F') {
                let prop = Proposal::parse_line(&line)?;
                if batch.len() == MAX_BATCH_SIZE {
                    return Err(ProtocolError::TooManyProposals(batch.len() + 1));
                }
                batch.push(prop);
                batch_bytes.extend_from_slice(line.as_bytes());
                batch_bytes.push(b'\r');
                continue;
            }

            return Err(ProtocolError::Protocol(format!("unexpected line: {line}")));
        }
    }

    /// Verify the batch checksum, answer every proposal, and receive the
    /// accepted data blocks.
    async fn finish_batch<C: Connection>(
        &mut self,
        wire: &mut Wire<C>,
        batch: &mut [Proposal],
        batch_bytes: &[u8],
        checksum_field: &str,
    ) -> Result<()> {
        let deadline = self.config.timeouts.line;

        if batch.is_empty() {
            return Err(ProtocolError::Protocol(
                "batch end without proposals".to_string(),
            ));
        }

        let declared = u8::from_str_radix(checksum_field, 16).map_err(|_| {
            ProtocolError::Protocol(format!("bad batch checksum: {checksum_field}"))
        })?;
        if declared != negated_sum(batch_bytes) {
            // Reject everything so the remote does not start sending data
            // we will not read.
            let rejects = "-".repeat(batch.len());
            wire.write_line(&format!("FS {rejects}"), deadline).await?;
            return Err(ProtocolError::Protocol(
                "proposal batch checksum mismatch".to_string(),
            ));
        }

        for prop in batch.iter_mut() {
            let answer = match self.handler.as_mut() {
                Some(handler) => handler.get_inbound_answer(prop),
                None => ProposalAnswer::Reject,
            };
            prop.set_answer(answer);
        }
        let answers = proposal::encode_answers(batch);
        wire.write_line(&format!("FS {answers}"), deadline).await?;

        let mut received = Vec::new();
        for prop in batch
            .iter_mut()
            .filter(|p| p.answer() == Some(ProposalAnswer::Accept))
        {
            self.read_data_block(wire, prop).await?;
            let msg = prop.message()?;
            info!(mid = prop.mid(), "message received");
            received.push((prop.mid().to_string(), msg));
        }

        if received.is_empty() {
            return Ok(());
        }

        let (mids, msgs): (Vec<String>, Vec<Message>) = received.into_iter().unzip();
        if let Some(handler) = self.handler.as_mut() {
            handler
                .process_inbound(msgs)
                .map_err(|e| ProtocolError::Mailbox(e.to_string()))?;
        }
        self.stats.received.extend(mids);
        Ok(())
    }

    /// Receive one data block into `prop`, verifying the trailer checksum.
    async fn read_data_block<C: Connection>(
        &mut self,
        wire: &mut Wire<C>,
        prop: &mut Proposal,
    ) -> Result<()> {
        let deadline = self.config.timeouts.transfer;

        let start = wire.read_byte(deadline).await?;
        if start != BLOCK_START {
            return Err(ProtocolError::Protocol(format!(
                "expected start-of-block marker, got {start:#04x}"
            )));
        }

        let title = wire.read_until_nul(deadline, MAX_HEADER_FIELD).await?;
        prop.set_title(&String::from_utf8_lossy(&title));

        let offset_field = wire.read_until_nul(deadline, MAX_HEADER_FIELD).await?;
        let offset: usize = String::from_utf8_lossy(&offset_field)
            .parse()
            .map_err(|_| ProtocolError::Protocol("bad offset in block header".to_string()))?;
        if offset != prop.offset() {
            // We never request resumes, so a nonzero offset means the
            // peer and we disagree about this transfer.
            return Err(ProtocolError::Protocol(format!(
                "unexpected resume offset {offset}"
            )));
        }

        let total = prop.compressed_size() - offset;
        let mut payload = vec![0u8; total];
        let mut done = 0usize;
        self.push_status(Status {
            sending: None,
            receiving: Some(prop),
            bytes_transferred: 0,
            bytes_total: total,
            done: false,
            when: SystemTime::now(),
        });
        while done < total {
            let end = (done + RECV_CHUNK).min(total);
            wire.read_exact(&mut payload[done..end], deadline).await?;
            done = end;
            self.push_status(Status {
                sending: None,
                receiving: Some(prop),
                bytes_transferred: done,
                bytes_total: total,
                done: false,
                when: SystemTime::now(),
            });
        }

        let end_marker = wire.read_byte(deadline).await?;
        if end_marker != BLOCK_END {
            return Err(ProtocolError::Protocol(format!(
                "expected end-of-block marker, got {end_marker:#04x}"
            )));
        }
        let checksum = wire.read_byte(deadline).await?;
        let sum: u32 = payload.iter().map(|&b| b as u32).sum();
        if (sum + checksum as u32) % 256 != 0 {
            warn!(mid = prop.mid(), "data block checksum mismatch");
            return Err(ProtocolError::ChecksumMismatch);
        }

        prop.set_compressed_data(payload);
        if !prop.data_is_complete() {
            return Err(ProtocolError::Protocol(format!(
                "incomplete payload for {}",
                prop.mid()
            )));
        }

        self.push_status(Status {
            sending: None,
            receiving: Some(prop),
            bytes_transferred: total,
            bytes_total: total,
            done: true,
            when: SystemTime::now(),
        });
        Ok(())
    }
}
