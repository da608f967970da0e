use std::ops::RangeInclusive;

use super::{normalized_f64, status, u14, Channel, Tag};
use crate::bytes;

/// Controllers reporting channel mute buttons, channel 1 at the start.
pub const MUTE_CONTROLLERS: RangeInclusive<u8> = 16..=47;

/// Data bytes have their high bit cleared.
const DATA_MAX: u8 = 0x7f;

/// A state change reported by the mixer.
///
/// Channels are 1-based.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Event {
    FaderCoarse { channel: u8, value: u8 },
    FaderFine { channel: u8, value: u16 },
    Mute { channel: u8, muted: bool },
    Control { controller: u8, value: u8 },
}

impl Event {
    /// Fader position as a fraction in `[0.0, 1.0]`.
    pub fn fader_level(&self) -> Option<f64> {
        match *self {
            Event::FaderCoarse { value, .. } => Some(value.min(0x7f) as f64 / 127f64),
            Event::FaderFine { value, .. } => Some(normalized_f64::from_u14(value)),
            _ => None,
        }
    }
}

/// Scans a chunk of the inbound stream.
///
/// Bytes which don't start a known message are skipped one at a time.
/// A message cut by the end of the chunk is dropped: chunks are not
/// reassembled.
pub fn decode(buf: &[u8]) -> Vec<Event> {
    let mut events = Vec::new();
    let mut idx = 0;

    while let Some(&status_byte) = buf.get(idx) {
        let channel = Channel::from(status_byte).number();

        let (event, len) = match Tag::from(status_byte) {
            status::CHANNEL_PRESSURE => match buf.get(idx + 1) {
                Some(&value) if value <= DATA_MAX => {
                    (Some(Event::FaderCoarse { channel, value }), 2)
                }
                Some(&value) => {
                    log::debug!("Dropping channel pressure with status byte 0x{value:02x}");
                    (None, 1)
                }
                None => {
                    truncated(buf, idx);
                    break;
                }
            },
            status::CONTROL_CHANGE => match buf.get(idx + 1..idx + 3) {
                Some(&[controller, value]) => (Some(control_change(controller, value)), 3),
                _ => {
                    truncated(buf, idx);
                    break;
                }
            },
            status::PITCH_BEND => match buf.get(idx + 1..idx + 3) {
                Some(&[lsb, msb]) => match u14::from_lsb_msb(lsb, msb) {
                    Ok(value) => (Some(Event::FaderFine { channel, value }), 3),
                    Err(err) => {
                        log::debug!("Dropping pitch bend: {err}");
                        (None, 1)
                    }
                },
                _ => {
                    truncated(buf, idx);
                    break;
                }
            },
            _ => (None, 1),
        };

        events.extend(event);
        idx += len;
    }

    events
}

fn control_change(controller: u8, value: u8) -> Event {
    if MUTE_CONTROLLERS.contains(&controller) {
        Event::Mute {
            channel: controller - MUTE_CONTROLLERS.start() + 1,
            muted: value == 0x01 || value == 0x7f,
        }
    } else {
        Event::Control { controller, value }
    }
}

fn truncated(buf: &[u8], idx: usize) {
    log::debug!(
        "Dropping truncated MIDI message {}",
        bytes::Displayable::from(&buf[idx..])
    );
}
