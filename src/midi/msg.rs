use super::{status, u14, Channel, Error, ACTIVE_SENSING};
use crate::bytes;

/// An outbound MIDI message.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Msg(Box<[u8]>);

impl Msg {
    pub fn inner(&self) -> &[u8] {
        self.0.as_ref()
    }

    pub fn display(&self) -> bytes::Displayable {
        bytes::Displayable::from(self.0.as_ref())
    }

    pub fn control_change(chan: Channel, controller: u8, value: u8) -> Self {
        Self::from([
            status::CONTROL_CHANGE | chan,
            controller & 0x7f,
            value & 0x7f,
        ])
    }

    pub fn pitch_bend(chan: Channel, value: u16) -> Result<Self, Error> {
        let [lsb, msb] = u14::to_lsb_msb(value)?;

        Ok(Self::from([status::PITCH_BEND | chan, lsb, msb]))
    }

    pub fn active_sensing() -> Self {
        Self::from([ACTIVE_SENSING])
    }
}

impl<const S: usize> From<[u8; S]> for Msg {
    fn from(buf: [u8; S]) -> Self {
        Self(buf.into())
    }
}

impl From<&[u8]> for Msg {
    fn from(buf: &[u8]) -> Self {
        Self(buf.into())
    }
}

impl std::ops::Deref for Msg {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders() {
        assert_eq!(
            Msg::control_change(Channel::default(), 16, 0x7f).inner(),
            &[0xb0, 0x10, 0x7f]
        );
        assert_eq!(
            Msg::pitch_bend(Channel::from(7), 16383).unwrap().inner(),
            &[0xe7, 0x7f, 0x7f]
        );
        assert!(Msg::pitch_bend(Channel::default(), 0x4000).is_err());
        assert_eq!(Msg::active_sensing().inner(), &[0xfe]);
    }
}
