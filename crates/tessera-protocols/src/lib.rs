//! Tessera Protocols - Peer Messaging
//!
//! The message envelope, request/response bodies and error taxonomy shared
//! by every tessera node.
//!
//! # Overview
//!
//! A [`Message`] is `{type, time, body, from}`. Three stream protocols carry
//! requests:
//!
//! - **`tessera-dht`**: PUT, DEL, MOD, GET, LINK and GETLINK against a peer's
//!   DHT replica
//! - **`tessera-validate`**: ask a peer to resupply the validation package
//!   (entry, header, author key) for an entry
//! - **`tessera-gossip`**: exchange change-log slices to converge replicas
//!
//! A handler answers with OK_RESPONSE or ERROR_RESPONSE. Error bodies carry
//! a stable [`ErrorCode`] so callers branch on the code, never the text.
//!
//! A message's [`fingerprint`](Message::fingerprint) digests
//! `(type, time, body)` and leaves out the sender, so one logical change
//! relayed by several peers is recognised as the same event.

pub mod body;
pub mod codec;
pub mod error;
pub mod message;
pub mod protocol;
pub mod status;

pub use body::{
    Body, DelReq, GetReq, GetResp, Gossip, GossipReq, LinkQuery, LinkQueryResp, LinkReq, ModReq,
    Put, PutReq, TaggedHash, ValidateQuery, ValidationPackage,
};
pub use codec::{read_frame, read_message, write_frame, write_message, MAX_FRAME_SIZE};
pub use error::{Error, ErrorCode, ErrorResponse, ResponseError, Result};
pub use message::{fingerprint, Message, MsgType};
pub use protocol::Protocol;
pub use status::{Status, StatusMask};
