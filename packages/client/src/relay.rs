//! Relay prefix added by the forwarding unit.
//!
//! When the forwarding unit relays a frame it prepends its own 5-byte prefix:
//!
//! ```text
//! +----------+------------------+------------------------------+
//! | kind (1) | sender id (4 LE) | body                         |
//! +----------+------------------+------------------------------+
//! ```
//!
//! For `kind = 0` the body is the sender's original frame (route id + payload).
//! For `kind = 1` a peer opened its socket and the body is that peer's id.

use crate::codec::{Frame, FrameCodec, HEADER_LEN, split_header};
use crate::error::DecodeError;

/// Length of the relay prefix in bytes.
pub const PREFIX_LEN: usize = 1 + HEADER_LEN;

const KIND_DATA: u8 = 0;
const KIND_OPEN: u8 = 1;

/// A message as relayed by the forwarding unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEnvelope {
    /// A peer joined the stream group
    PeerOpened { sender: u32, peer: u32 },
    /// A frame sent by another peer
    Data { sender: u32, frame: Frame },
}

impl RelayEnvelope {
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let Some((&kind, rest)) = bytes.split_first() else {
            return Err(DecodeError::Truncated {
                len: 0,
                needed: PREFIX_LEN,
            });
        };
        let (sender, body) = split_header(rest).map_err(|_| DecodeError::Truncated {
            len: bytes.len(),
            needed: PREFIX_LEN,
        })?;
        let sender = u32::from_le_bytes(sender);

        match kind {
            KIND_DATA => Ok(RelayEnvelope::Data {
                sender,
                frame: FrameCodec::decode(body).map_err(|_| DecodeError::Truncated {
                    len: bytes.len(),
                    needed: PREFIX_LEN + HEADER_LEN,
                })?,
            }),
            KIND_OPEN => {
                let (peer, _) = split_header(body).map_err(|_| DecodeError::Truncated {
                    len: bytes.len(),
                    needed: PREFIX_LEN + HEADER_LEN,
                })?;
                Ok(RelayEnvelope::PeerOpened {
                    sender,
                    peer: u32::from_le_bytes(peer),
                })
            }
            unknown => Err(DecodeError::UnknownRelayKind(unknown)),
        }
    }

    pub fn sender(&self) -> u32 {
        match self {
            RelayEnvelope::PeerOpened { sender, .. } | RelayEnvelope::Data { sender, .. } => *sender,
        }
    }
}

impl TryFrom<&Frame> for RelayEnvelope {
    type Error = DecodeError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        Self::parse(&frame.to_bytes())
    }
}
