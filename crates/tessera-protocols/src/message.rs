//! Message envelope and fingerprints.

use std::fmt;

use serde::{Deserialize, Serialize};
use tessera_chain::{PeerId, Timestamp};
use tessera_hash::{Hash, HashSpec, HashType};

use crate::body::Body;
use crate::error::{Error, Result};

/// Numeric message type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum MsgType {
    ErrorResponse = 0,
    OkResponse = 1,
    PutRequest = 2,
    DelRequest = 3,
    ModRequest = 4,
    GetRequest = 5,
    LinkRequest = 6,
    GetLinkRequest = 7,
    GossipRequest = 8,
    ValidatePutRequest = 9,
    ValidateLinkRequest = 10,
    ValidateDelRequest = 11,
    ValidateModRequest = 12,
}

impl MsgType {
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// True for the request types that change DHT state.
    pub const fn is_change(self) -> bool {
        matches!(
            self,
            Self::PutRequest | Self::DelRequest | Self::ModRequest | Self::LinkRequest
        )
    }
}

impl From<MsgType> for u8 {
    fn from(t: MsgType) -> Self {
        t as u8
    }
}

impl TryFrom<u8> for MsgType {
    type Error = Error;

    fn try_from(n: u8) -> Result<Self> {
        Ok(match n {
            0 => Self::ErrorResponse,
            1 => Self::OkResponse,
            2 => Self::PutRequest,
            3 => Self::DelRequest,
            4 => Self::ModRequest,
            5 => Self::GetRequest,
            6 => Self::LinkRequest,
            7 => Self::GetLinkRequest,
            8 => Self::GossipRequest,
            9 => Self::ValidatePutRequest,
            10 => Self::ValidateLinkRequest,
            11 => Self::ValidateDelRequest,
            12 => Self::ValidateModRequest,
            other => return Err(Error::UnknownMsgType(other)),
        })
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ErrorResponse => "ERROR_RESPONSE",
            Self::OkResponse => "OK_RESPONSE",
            Self::PutRequest => "PUT_REQUEST",
            Self::DelRequest => "DEL_REQUEST",
            Self::ModRequest => "MOD_REQUEST",
            Self::GetRequest => "GET_REQUEST",
            Self::LinkRequest => "LINK_REQUEST",
            Self::GetLinkRequest => "GETLINK_REQUEST",
            Self::GossipRequest => "GOSSIP_REQUEST",
            Self::ValidatePutRequest => "VALIDATE_PUT_REQUEST",
            Self::ValidateLinkRequest => "VALIDATE_LINK_REQUEST",
            Self::ValidateDelRequest => "VALIDATE_DEL_REQUEST",
            Self::ValidateModRequest => "VALIDATE_MOD_REQUEST",
        };
        f.write_str(name)
    }
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub msg_type: MsgType,
    pub time: Timestamp,
    pub from: PeerId,
    pub body: Body,
}

impl Message {
    /// Stamp a message with the current time.
    pub fn new(msg_type: MsgType, from: PeerId, body: Body) -> Self {
        Self {
            msg_type,
            time: Timestamp::now(),
            from,
            body,
        }
    }

    /// True if the body is the one `msg_type` carries.
    pub fn body_matches_type(&self) -> bool {
        match self.msg_type {
            MsgType::ErrorResponse => matches!(self.body, Body::Error(_)),
            MsgType::OkResponse => true,
            MsgType::PutRequest => matches!(self.body, Body::Put(_)),
            MsgType::DelRequest => matches!(self.body, Body::Del(_)),
            MsgType::ModRequest => matches!(self.body, Body::Mod(_)),
            MsgType::GetRequest => matches!(self.body, Body::Get(_)),
            MsgType::LinkRequest => matches!(self.body, Body::Link(_)),
            MsgType::GetLinkRequest => matches!(self.body, Body::GetLink(_)),
            MsgType::GossipRequest => matches!(self.body, Body::Gossip(_)),
            MsgType::ValidatePutRequest
            | MsgType::ValidateLinkRequest
            | MsgType::ValidateDelRequest
            | MsgType::ValidateModRequest => matches!(self.body, Body::Validate(_)),
        }
    }

    /// Digest of `(type, time, body)`.
    ///
    /// The sender is excluded, so a request relayed by another peer keeps
    /// its identity.
    pub fn fingerprint(&self) -> Result<Hash> {
        let bytes = bincode::serialize(&(self.msg_type, self.time, &self.body))?;
        Ok(HashSpec::with_type(HashType::Sha2_256).sum(&bytes))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Fingerprint of an optional message; `None` yields the null hash.
pub fn fingerprint(msg: Option<&Message>) -> Result<Hash> {
    match msg {
        Some(m) => m.fingerprint(),
        None => Ok(Hash::null()),
    }
}
