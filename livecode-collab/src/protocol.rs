//! Binary protocol for operation and selection exchange.
//!
//! Wire format (bincode-encoded):
//! ```text
//! ┌──────────┬───────────┬──────────┬──────────┬──────────┐
//! │ msg_type │ peer_id   │ doc_id   │ clock    │ payload  │
//! │ 1 byte   │ 16 bytes  │ 16 bytes │ varint   │ variable │
//! └──────────┴───────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! `payload` is itself bincode: an [`Operation`] for `Operation`
//! messages, a [`RemoteSelectionUpdate`] for `Selection` messages.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::operation::Operation;
use crate::selection::{RemoteSelectionUpdate, SelectionPayload, UserColor};

/// Message types for the sync protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Text operation against the sender's confirmed document
    Operation = 1,
    /// Cursor/selection update; a `None` selection means the peer left
    Selection = 2,
}

/// Top-level protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub msg_type: MessageType,
    pub peer_id: Uuid,
    pub doc_id: Uuid,
    /// Lamport clock for causal ordering
    pub clock: u64,
    pub payload: Vec<u8>,
}

fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| ProtocolError::SerializationError(e.to_string()))
}

fn decode_payload<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
    Ok(value)
}

impl SyncMessage {
    /// Create an operation message.
    pub fn operation(peer_id: Uuid, doc_id: Uuid, clock: u64, op: &Operation) -> Result<Self, ProtocolError> {
        Ok(Self {
            msg_type: MessageType::Operation,
            peer_id,
            doc_id,
            clock,
            payload: encode_payload(op)?,
        })
    }

    /// Create a selection message.
    pub fn selection(
        peer_id: Uuid,
        doc_id: Uuid,
        clock: u64,
        update: &RemoteSelectionUpdate,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            msg_type: MessageType::Selection,
            peer_id,
            doc_id,
            clock,
            payload: encode_payload(update)?,
        })
    }

    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_payload(self)
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode_payload(bytes)
    }

    /// Parse operation payload.
    pub fn operation_payload(&self) -> Result<Operation, ProtocolError> {
        if self.msg_type != MessageType::Operation {
            return Err(ProtocolError::InvalidMessageType);
        }
        decode_payload(&self.payload)
    }

    /// Parse selection payload. The user id is always the sender's.
    pub fn selection_update(&self) -> Result<RemoteSelectionUpdate, ProtocolError> {
        if self.msg_type != MessageType::Selection {
            return Err(ProtocolError::InvalidMessageType);
        }
        let mut update: RemoteSelectionUpdate = decode_payload(&self.payload)?;
        update.user_id = self.peer_id;
        Ok(update)
    }

    /// Decode into the event the session consumes.
    pub fn into_inbound(self) -> Result<InboundEvent, ProtocolError> {
        match self.msg_type {
            MessageType::Operation => Ok(InboundEvent::Operation {
                doc_id: self.doc_id,
                op: self.operation_payload()?,
            }),
            MessageType::Selection => Ok(InboundEvent::Selection {
                doc_id: self.doc_id,
                updates: vec![self.selection_update()?],
            }),
        }
    }
}

/// Something received from peers.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Operation { doc_id: Uuid, op: Operation },
    Selection { doc_id: Uuid, updates: Vec<RemoteSelectionUpdate> },
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    InvalidMessageType,
    ConnectionClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::InvalidMessageType => write!(f, "Invalid message type"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}

// ───────────────────────────────────────────────────────────────────
// Transport
// ───────────────────────────────────────────────────────────────────

/// Outbound half of the network session.
pub trait Transport {
    fn send_operation(&mut self, doc_id: Uuid, op: &Operation) -> Result<(), ProtocolError>;

    /// `None` tells peers to drop this user's decorations.
    fn send_selection(
        &mut self,
        doc_id: Uuid,
        selection: Option<&SelectionPayload>,
    ) -> Result<(), ProtocolError>;
}

/// Transport that writes encoded [`SyncMessage`] frames to a channel,
/// e.g. the outbound queue of a WebSocket task.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    peer_id: Uuid,
    display_name: String,
    color: UserColor,
    clock: u64,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelTransport {
    pub fn new(peer_id: Uuid, display_name: impl Into<String>, tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            peer_id,
            display_name: display_name.into(),
            color: UserColor::from_uuid(peer_id),
            clock: 0,
            tx,
        }
    }

    pub fn with_color(mut self, color: UserColor) -> Self {
        self.color = color;
        self
    }

    pub fn peer_id(&self) -> Uuid {
        self.peer_id
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Advance the clock past a received message.
    pub fn observe(&mut self, clock: u64) {
        self.clock = self.clock.max(clock);
    }

    fn send(&mut self, msg: SyncMessage) -> Result<(), ProtocolError> {
        let bytes = msg.encode()?;
        self.tx.send(bytes).map_err(|_| ProtocolError::ConnectionClosed)
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

impl Transport for ChannelTransport {
    fn send_operation(&mut self, doc_id: Uuid, op: &Operation) -> Result<(), ProtocolError> {
        let clock = self.tick();
        let msg = SyncMessage::operation(self.peer_id, doc_id, clock, op)?;
        self.send(msg)
    }

    fn send_selection(
        &mut self,
        doc_id: Uuid,
        selection: Option<&SelectionPayload>,
    ) -> Result<(), ProtocolError> {
        let update = RemoteSelectionUpdate {
            user_id: self.peer_id,
            color: self.color,
            display_name: self.display_name.clone(),
            selection: selection.cloned(),
        };
        let clock = self.tick();
        let msg = SyncMessage::selection(self.peer_id, doc_id, clock, &update)?;
        self.send(msg)
    }
}
