//! MIDI byte stream as spoken by Mackie Control surfaces.

mod error;
pub use error::Error;

pub mod event;
pub use event::{decode, Event};

pub mod msg;
pub use msg::Msg;

/// Keep-alive byte, sent on its own.
pub const ACTIVE_SENSING: u8 = 0xfe;

pub mod status {
    use super::Tag;

    pub const CONTROL_CHANGE: Tag = Tag::from(0xb0);
    pub const CHANNEL_PRESSURE: Tag = Tag::from(0xd0);
    pub const PITCH_BEND: Tag = Tag::from(0xe0);
}

/// High nibble of a status byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Tag(u8);

impl Tag {
    pub const fn from(byte: u8) -> Self {
        Self(byte & 0xf0)
    }
}

impl From<Tag> for u8 {
    fn from(tag: Tag) -> u8 {
        tag.0
    }
}

/// Low nibble of a status byte, i.e. the 0-based MIDI channel.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Channel(u8);

impl Channel {
    pub const fn from(byte: u8) -> Self {
        Self(byte & 0x0f)
    }

    /// 1-based channel number, as displayed to users.
    pub const fn number(self) -> u8 {
        self.0 + 1
    }
}

impl From<Channel> for u8 {
    fn from(chan: Channel) -> u8 {
        chan.0
    }
}

impl std::ops::BitOr<Channel> for Tag {
    type Output = u8;

    fn bitor(self, chan: Channel) -> Self::Output {
        self.0 | chan.0
    }
}

pub mod u14 {
    use super::Error;

    pub const MAX: u16 = 0x3fff;

    /// Combines two 7-bit data bytes, least significant first.
    #[inline]
    pub fn from_lsb_msb(lsb: u8, msb: u8) -> Result<u16, Error> {
        if lsb > 0x7f || msb > 0x7f {
            return Err(Error::InvalidTwoBytesValue { lsb, msb });
        }

        Ok(((msb as u16) << 7) | lsb as u16)
    }

    /// Splits `val` into two 7-bit data bytes, least significant first.
    #[inline]
    pub fn to_lsb_msb(val: u16) -> Result<[u8; 2], Error> {
        if val > MAX {
            return Err(Error::InvalidU14(val));
        }

        Ok([val as u8 & 0x7f, (val >> 7) as u8])
    }
}

pub mod normalized_f64 {
    use super::Error;

    pub const MAX: f64 = 1f64;
    pub const QUANTUM: f64 = 1f64 / super::u14::MAX as f64;

    #[inline]
    pub fn from_u14(val: u16) -> f64 {
        val.min(super::u14::MAX) as f64 * QUANTUM
    }

    /// Quantizes `val` in `[0.0, 1.0]` to the nearest 14-bit step.
    #[inline]
    pub fn to_u14(val: f64) -> Result<u16, Error> {
        if !(0f64..=MAX).contains(&val) {
            return Err(Error::InvalidNormalizedFloat(val));
        }

        Ok((super::u14::MAX as f64 * val).round() as u16)
    }
}
