//! X.690 Basic Encoding Rules, limited to what v1/v2c messages use.
//!
//! [`Decoder`] reads lengths the way net-snmp does (non-minimal forms are
//! accepted) but refuses indefinite lengths and constructed strings.
//! [`EncodeBuf`] always writes definite, minimal encodings.

mod decode;
mod encode;
mod length;
pub mod tag;

pub use decode::Decoder;
pub use encode::EncodeBuf;
pub use length::MAX_LENGTH;
