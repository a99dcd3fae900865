//! # B2F Protocol
//!
//! The line-oriented session protocol: banner/SID exchange, secure login,
//! proposal batches, data blocks, and the turn-based state machine that
//! drives them.
//!
//! ## Wire Format
//! ```text
//! [b2f-0.1.0-B2FHM$]\r              banner with capability flags
//! ;FW: LA5NTA\r                     forwarder list
//! ;PQ: 23753528\r                   secure-login challenge
//! ;PR: <base64>\r                   secure-login response
//! FC EM TJKYEIMMHSRB 527 123 0\r    proposal
//! F> 2A\r                           batch end + checksum
//! FS +-=\r                          answers, one char per proposal
//! <0x01>title<0x00>0<0x00>…<0x04><checksum>   data block
//! FF\r / FQ\r                       no traffic / quit
//! *** message\r\n                   error report
//! ```

mod inbound;
mod outbound;
pub mod proposal;
pub mod secure_login;
mod session;
pub mod sid;
pub(crate) mod wire;

pub use session::{SecureLoginFn, Session};

/// Low byte of the negated sum of `data`, the checksum form shared by
/// proposal batches (`F>`) and data-block trailers.
pub(crate) fn negated_sum(data: &[u8]) -> u8 {
    let sum: u32 = data.iter().map(|&b| b as u32).sum();
    (sum as u8).wrapping_neg()
}
