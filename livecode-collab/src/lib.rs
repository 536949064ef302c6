//! # livecode-collab: Real-time collaborative editing core
//!
//! Turns local editor changes into operational-transform operations,
//! applies operations received from peers straight to the editor buffer,
//! and mirrors every user's cursors and selections as decorations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  change lists   ┌──────────────────┐  Operation  ┌───────────┐
//! │ EditorBuffer │ ──────────────► │ ChangeTranslator │ ──────────► │           │
//! │ (widget)     │                 └──────────────────┘             │ LiveSync  │
//! │              │ ◄────────────── position edits ───────────────── │ Controller│
//! └──────┬───────┘                                                  └─────┬─────┘
//!        │ selections                                                     │
//!        ▼                                                                ▼
//! ┌──────────────────────┐       SelectionPayload / Operation      ┌───────────┐
//! │ SelectionSynchronizer│ ◄─────────────────────────────────────► │ Transport │
//! └──────────────────────┘                                         └───────────┘
//! ```
//!
//! All positions exchanged with peers are character offsets into the
//! document; [`offset`] converts them to and from editor line/column
//! positions.
//!
//! ## Modules
//!
//! - [`offset`]: Offset ↔ line/column mapping
//! - [`operation`]: Retain/Insert/Delete operations: apply, compose, transform
//! - [`translate`]: Editor change lists → one operation
//! - [`live`]: Live sync state machine and per-document sessions
//! - [`selection`]: Outgoing selection debounce, remote decorations
//! - [`protocol`]: Binary wire protocol and the transport seam
//! - [`session`]: Host-facing facade over all of the above
//! - [`driver`]: Tokio event loop for headless peers

pub mod config;
pub mod driver;
pub mod editor;
pub mod live;
pub mod offset;
pub mod operation;
pub mod protocol;
pub mod schedule;
pub mod selection;
pub mod session;
pub mod translate;

// Re-exports for convenience
pub use config::SyncConfig;
pub use driver::{Driver, EditorCommand, EventQueue};
pub use editor::{
    DecorationId, DecorationSpec, EditorBuffer, EditorEvent, EditorSelection, MemoryEditor,
    TextChange,
};
pub use live::{DocumentSession, LiveSyncController, SyncError, SyncState};
pub use offset::{offset_to_position, position_to_offset, Position, TextRange};
pub use operation::{Operation, OperationError, Step};
pub use protocol::{ChannelTransport, InboundEvent, MessageType, ProtocolError, SyncMessage, Transport};
pub use schedule::{Deferred, TaskToken};
pub use selection::{
    DecorationStyle, OffsetRange, RemoteSelection, RemoteSelectionUpdate, SelectionData,
    SelectionPayload, SelectionSynchronizer, SelectionTrigger, UserColor,
};
pub use session::CollabSession;
pub use translate::{ChangeTranslator, TranslateError};
