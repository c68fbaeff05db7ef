//! Serial-link and control-channel message framing.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      Wire Stack                            │
//! │                                                            │
//! │  UART bytes ──▶ LineDecoder ──▶ decode_line ──▶ Envelope   │
//! │                  (framing)       (JSON)          │         │
//! │                                                  ▼         │
//! │                                   PeerMessage (closed enum)│
//! │                                                            │
//! │  Directive ──▶ encode_line ──▶ "{...}\n" ──▶ UART          │
//! │                                                            │
//! │  WS text ──▶ parse_control_frame ──▶ ControlFrame          │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is pure and stateless apart from the line buffer
//! inside [`codec::LineDecoder`].

pub mod codec;
pub mod envelope;
pub mod messages;
