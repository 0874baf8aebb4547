//! Framing and typed codec for the master server's binary TCP protocol.
//!
//! Wire format (spec.md §3): `[signature:1=0x55][sequence:1][bodyLen:2
//! LE][packetId:1][body: bodyLen-1 bytes]`.

pub mod error;
pub mod frame;
pub mod packet_id;
pub mod primitive;

pub use error::CodecError;
pub use frame::{Frame, FrameDecoder, FrameEncoder, SequenceCounter, SIGNATURE};
pub use packet_id::{ClientPacketId, ServerPacketId};
pub use primitive::{Be, Decode, Encode, PacketLongString, PacketString};
