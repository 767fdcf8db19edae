//! SSE (Server-Sent Events) stream decoding
//!
//! Decodes the oplog event stream into [`Operation`](crate::operation::Operation)
//! records. SSE format consists of:
//! - `id: <id>` - record id, used as resume token
//! - `event: <kind>` - operation kind
//! - `data: <json>` - payload, always a single line
//! - Empty line - ends the record
//! - Lines starting with `:` - comments (ignored)
//!
//! # Module structure
//! - `line` - line classification (`SseLine`, `parse_sse_line`)
//! - `decoder` - record framing over a byte stream (`Decoder`)

mod decoder;
mod line;

pub use decoder::Decoder;
pub use line::{parse_sse_line, SseLine};
