//! Protocol module containing message types, the 32-byte header and the
//! fragmenting binary codec.

pub mod codec;
pub mod header;
pub mod messages;

pub use codec::{
    decode_datagram, decode_message, decode_payload, encode_message, encode_payload,
    fragment_payload, ProtocolError,
};
pub use header::WireHeader;
pub use messages::*;
