//! The outbound half of the turn loop: offer proposals, read answers, and
//! deliver accepted data blocks.

use std::time::SystemTime;

use tracing::{debug, info};

use crate::config::{RobustMode, MAX_BATCH_SIZE};
use crate::error::{ProtocolError, Result};
use crate::protocol::negated_sum;
use crate::protocol::proposal::{
    self, block_checksum, sort_proposals, PropCode, Proposal, ProposalAnswer,
};
use crate::protocol::session::Session;
use crate::protocol::wire::Wire;
use crate::status::Status;
use crate::transport::Connection;

/// Chunk size for data-block writes; status updates are emitted per chunk.
const SEND_CHUNK: usize = 1024;

impl Session {
    /// One outbound turn: either signal no traffic (`FF`), terminate the
    /// session (`FQ`), or offer a batch of proposals and deliver the
    /// accepted payloads.
    pub(crate) async fn handle_outbound<C: Connection>(
        &mut self,
        wire: &mut Wire<C>,
    ) -> Result<()> {
        let deadline = self.config.timeouts.line;
        let mut proposals = self.outbound_proposals();

        if proposals.is_empty() {
            // Quit only after both sides have signaled an empty turn;
            // until then an empty turn is a plain "no traffic".
            if self.remote_no_msgs && self.sent_no_msgs {
                debug!("nothing to offer and remote is idle, quitting");
                wire.write_line("FQ", deadline).await?;
                self.quit_sent = true;
            } else {
                wire.write_line("FF", deadline).await?;
                self.sent_no_msgs = true;
            }
            return Ok(());
        }

        self.sent_no_msgs = false;
        let batch_len = proposals.len().min(MAX_BATCH_SIZE);
        let batch = &mut proposals[..batch_len];

        // The checksum covers the proposal lines exactly as transmitted,
        // CR included.
        let mut lines = Vec::new();
        for prop in batch.iter() {
            debug!(line = %prop.wire_line(), "offering");
            lines.extend_from_slice(prop.wire_line().as_bytes());
            lines.push(b'\r');
        }
        wire.write_raw(&lines, deadline).await?;
        wire.write_line(&format!("F> {:02X}", negated_sum(&lines)), deadline)
            .await?;

        let answers = self.read_answer_line(wire, batch_len).await?;
        for (prop, (answer, offset)) in batch.iter_mut().zip(answers) {
            prop.set_answer(answer);
            prop.set_offset(offset);
        }

        for prop in batch.iter_mut() {
            match prop.answer() {
                Some(ProposalAnswer::Accept) => {
                    self.send_data_block(wire, prop).await?;
                    prop.mark_sent();
                    if let Some(handler) = self.handler.as_mut() {
                        handler.set_sent(prop.mid(), false);
                    }
                    self.stats.sent.push(prop.mid().to_string());
                    info!(mid = prop.mid(), "message delivered");
                }
                Some(ProposalAnswer::Reject) => {
                    // The remote already has this message.
                    prop.mark_sent();
                    if let Some(handler) = self.handler.as_mut() {
                        handler.set_sent(prop.mid(), true);
                    }
                    debug!(mid = prop.mid(), "proposal rejected by remote");
                }
                Some(ProposalAnswer::Defer) | None => {
                    if let Some(handler) = self.handler.as_mut() {
                        handler.set_deferred(prop.mid());
                    }
                    debug!(mid = prop.mid(), "proposal deferred by remote");
                }
            }
        }
        Ok(())
    }

    /// Collect, validate, compress, and order the pending outbound
    /// messages. Invalid or uncompressible messages are skipped with a
    /// warning; the session goes on without them.
    fn outbound_proposals(&mut self) -> Vec<Proposal> {
        let code = if self.gzip_negotiated() {
            PropCode::Gzip
        } else {
            PropCode::Wl2k
        };

        let fw = self.remote_fw.clone();
        let msgs = match self.handler.as_mut() {
            Some(handler) => handler.get_outbound(&fw),
            None => Vec::new(),
        };

        let mut proposals = Vec::with_capacity(msgs.len());
        for msg in msgs {
            if let Err(err) = msg.validate() {
                self.warn_skipped(msg.mid(), &err);
                continue;
            }
            match msg.proposal(code) {
                Ok(prop) => proposals.push(prop),
                Err(err) => self.warn_skipped(msg.mid(), &err),
            }
        }
        sort_proposals(&mut proposals);
        proposals
    }

    /// Read the `FS` answer line for a batch of `expected` proposals.
    async fn read_answer_line<C: Connection>(
        &mut self,
        wire: &mut Wire<C>,
        expected: usize,
    ) -> Result<Vec<(ProposalAnswer, usize)>> {
        let deadline = self.config.timeouts.line;
        loop {
            let line = wire.read_line(deadline).await?;
            if line.is_empty() {
                continue;
            }
            if let Some(text) = line.strip_prefix("***") {
                return Err(ProtocolError::Remote(text.trim().to_string()));
            }
            if line.starts_with(';') {
                continue;
            }
            let Some(field) = line.strip_prefix("FS") else {
                return Err(ProtocolError::Protocol(format!(
                    "expected proposal answer, got: {line}"
                )));
            };
            let answers = proposal::parse_answers(field.trim())?;
            if answers.len() != expected {
                return Err(ProtocolError::Protocol(format!(
                    "got {} answers for {} proposals",
                    answers.len(),
                    expected
                )));
            }
            return Ok(answers);
        }
    }

    /// Deliver one accepted proposal as a data block, suspending robust
    /// mode for the duration of the transfer when running `RobustAuto`.
    async fn send_data_block<C: Connection>(
        &mut self,
        wire: &mut Wire<C>,
        prop: &Proposal,
    ) -> Result<()> {
        let suspend_robust = self.config.robust_mode == RobustMode::Auto
            && wire.conn_mut().supports_robust();
        if suspend_robust {
            wire.conn_mut().set_robust(false);
        }

        let result = self.send_data_block_inner(wire, prop).await;

        if suspend_robust {
            wire.conn_mut().set_robust(true);
        }

        // Final status update, also emitted on failure so observers see
        // the transfer end.
        let payload_len = prop
            .compressed_data()
            .len()
            .saturating_sub(prop.offset());
        self.push_status(Status {
            sending: Some(prop),
            receiving: None,
            bytes_transferred: if result.is_ok() { payload_len } else { 0 },
            bytes_total: payload_len,
            done: true,
            when: SystemTime::now(),
        });
        result
    }

    async fn send_data_block_inner<C: Connection>(
        &mut self,
        wire: &mut Wire<C>,
        prop: &Proposal,
    ) -> Result<()> {
        let deadline = self.config.timeouts.transfer;
        let payload = &prop.compressed_data()[prop.offset().min(prop.compressed_size())..];

        let mut header = vec![proposal::BLOCK_START];
        header.extend_from_slice(prop.title().as_bytes());
        header.push(0x00);
        header.extend_from_slice(prop.offset().to_string().as_bytes());
        header.push(0x00);
        wire.write_raw(&header, deadline).await?;

        let mut sent = 0usize;
        self.push_status(Status {
            sending: Some(prop),
            receiving: None,
            bytes_transferred: 0,
            bytes_total: payload.len(),
            done: false,
            when: SystemTime::now(),
        });
        for chunk in payload.chunks(SEND_CHUNK) {
            wire.write_raw(chunk, deadline).await?;
            sent += chunk.len();
            self.push_status(Status {
                sending: Some(prop),
                receiving: None,
                bytes_transferred: sent,
                bytes_total: payload.len(),
                done: false,
                when: SystemTime::now(),
            });
        }

        wire.write_raw(&[proposal::BLOCK_END, block_checksum(payload)], deadline)
            .await
    }
}
