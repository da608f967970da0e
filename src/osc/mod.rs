//! Codec for the address-pattern messages the X32 speaks over UDP.
//!
//! Every field of a message is padded with NULs to a 4-byte boundary:
//! the address, the type tag string (introduced by `,`), and each
//! string argument. Integers and floats are 4 bytes, big-endian.

mod error;
pub use error::Error;

pub mod msg;
pub use msg::{decode, encode, Msg, Value};

/// Leading byte of the type tag string.
pub const TYPE_TAG_MARKER: u8 = b',';

const ALIGNMENT: usize = 4;

/// Rounds `len` up to the next 4-byte boundary.
#[inline]
pub const fn aligned(len: usize) -> usize {
    (len + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

#[cfg(test)]
mod tests {
    #[test]
    fn alignment() {
        assert_eq!(super::aligned(0), 0);
        assert_eq!(super::aligned(1), 4);
        assert_eq!(super::aligned(4), 4);
        assert_eq!(super::aligned(9), 12);
    }
}
