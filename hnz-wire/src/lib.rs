//! Wire-level types shared by every HNZ path: link addresses, frame codes,
//! the TS image, and the decode/encode logic for application messages.

pub mod address;
pub mod codes;
pub mod decode;
pub mod encode;
pub mod frame;
pub mod image;

pub use address::RemoteStationAddress;
pub use decode::{decode, repeat_bit, Event};
pub use encode::{encode, IngestParameters, MsgCode};
pub use frame::{Frame, FrameCodec, TcpFrameCodec, MAX_FRAME_LEN};
pub use image::TsImage;
