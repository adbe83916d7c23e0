//! Protocol families and inbound message checks.

use std::fmt;

use crate::error::ResponseError;
use crate::message::{Message, MsgType};

/// The three stream protocols a node serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Direct DHT requests.
    Dht,
    /// Validation-package solicitation.
    Validate,
    /// Change-log reconciliation.
    Gossip,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::Dht, Protocol::Validate, Protocol::Gossip];

    /// Name used when opening a stream.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dht => "tessera-dht",
            Self::Validate => "tessera-validate",
            Self::Gossip => "tessera-gossip",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// True if this protocol declares `msg_type`.
    pub const fn accepts(self, msg_type: MsgType) -> bool {
        use MsgType::*;
        match self {
            Self::Dht => matches!(
                msg_type,
                PutRequest | DelRequest | ModRequest | GetRequest | LinkRequest | GetLinkRequest
            ),
            Self::Validate => matches!(
                msg_type,
                ValidatePutRequest | ValidateLinkRequest | ValidateDelRequest | ValidateModRequest
            ),
            Self::Gossip => matches!(msg_type, GossipRequest),
        }
    }

    /// The protocol that carries a request type, if any.
    pub fn for_type(msg_type: MsgType) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.accepts(msg_type))
    }

    /// Checks every inbound message passes before dispatch.
    ///
    /// The source check comes first, so a sourceless message is always
    /// refused with the same error whatever its type.
    pub fn check(self, msg: &Message) -> Result<(), ResponseError> {
        if msg.from.is_empty() {
            return Err(ResponseError::MissingSource);
        }
        if !self.accepts(msg.msg_type) {
            return Err(ResponseError::UnsupportedType {
                msg_type: msg.msg_type.code(),
                protocol: self.name().to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, GossipReq};
    use tessera_chain::PeerId;

    #[test]
    fn missing_source_wins() {
        for t in [MsgType::PutRequest, MsgType::GossipRequest, MsgType::OkResponse] {
            let msg = Message::new(t, PeerId::empty(), Body::Empty);
            for p in Protocol::ALL {
                assert_eq!(p.check(&msg), Err(ResponseError::MissingSource));
            }
        }
    }

    #[test]
    fn wrong_family_is_named() {
        let msg = Message::new(MsgType::PutRequest, PeerId::from("peer"), Body::Empty);
        let err = Protocol::Validate.check(&msg).unwrap_err();
        assert_eq!(err.to_string(), "message type 2 not in tessera-validate protocol");
        assert!(Protocol::Dht.check(&msg).is_ok());
    }

    #[test]
    fn families_partition_requests() {
        assert_eq!(Protocol::for_type(MsgType::GetLinkRequest), Some(Protocol::Dht));
        assert_eq!(Protocol::for_type(MsgType::ValidateModRequest), Some(Protocol::Validate));
        assert_eq!(Protocol::for_type(MsgType::GossipRequest), Some(Protocol::Gossip));
        assert_eq!(Protocol::for_type(MsgType::OkResponse), None);

        let msg = Message::new(
            MsgType::GossipRequest,
            PeerId::from("peer"),
            Body::Gossip(GossipReq { my_idx: 0, your_idx: 0 }),
        );
        assert!(Protocol::Gossip.check(&msg).is_ok());
        assert_eq!(Protocol::from_name("tessera-gossip"), Some(Protocol::Gossip));
        assert_eq!(Protocol::from_name("bogus"), None);
    }
}
