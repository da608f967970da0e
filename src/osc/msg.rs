use std::{fmt, sync::Arc};

use super::{aligned, Error, TYPE_TAG_MARKER};
use crate::bytes;

/// A typed message argument.
///
/// The wire type is chosen by the caller: a float fader level of exactly
/// `1.0` stays a float, it is never mistaken for the integer `1`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Str(Arc<str>),
}

impl Value {
    pub fn tag(&self) -> u8 {
        match self {
            Value::Int(_) => b'i',
            Value::Float(_) => b'f',
            Value::Str(_) => b's',
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(val) => Some(*val),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(val) => Some(*val),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(val) => Some(val),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(val: i32) -> Self {
        Value::Int(val)
    }
}

impl From<f32> for Value {
    fn from(val: f32) -> Self {
        Value::Float(val)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::Str(val.into())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(val) => write!(f, "{val}"),
            Value::Float(val) => write!(f, "{val:?}"),
            Value::Str(val) => write!(f, "{val:?}"),
        }
    }
}

/// An address followed by its ordered arguments.
///
/// A message without arguments is a query: the X32 answers it with the
/// current value found at `address`.
#[derive(Clone, Debug, PartialEq)]
pub struct Msg {
    address: Arc<str>,
    args: Vec<Value>,
}

impl Msg {
    /// Builds a message for a known well-formed address.
    ///
    /// Use [`Msg::try_new`] for addresses coming from outside the crate.
    pub fn new(address: impl Into<Arc<str>>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    pub fn try_new(address: impl Into<Arc<str>>) -> Result<Self, Error> {
        let address = address.into();
        check_address(address.as_bytes())?;

        Ok(Self::new(address))
    }

    #[must_use]
    pub fn with(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn is_query(&self) -> bool {
        self.args.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode(&self.address, &self.args)
    }
}

impl fmt::Display for Msg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)?;
        for arg in self.args.iter() {
            write!(f, " {arg}")?;
        }

        Ok(())
    }
}

fn check_address(address: &[u8]) -> Result<(), Error> {
    if address.is_empty() {
        return Err(Error::EmptyAddress);
    }

    if !address.is_ascii() || address.contains(&0) {
        return Err(Error::InvalidAddress(
            bytes::Displayable::from(address).to_owned(),
        ));
    }

    Ok(())
}

fn push_padded(buf: &mut Vec<u8>, field: &[u8]) {
    buf.extend_from_slice(field);
    buf.push(0);
    buf.resize(aligned(buf.len()), 0);
}

/// Serializes `address` and `args`.
///
/// The output length is always a multiple of 4.
pub fn encode(address: &str, args: &[Value]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        aligned(address.len() + 1) + aligned(args.len() + 2) + 4 * args.len(),
    );

    push_padded(&mut buf, address.as_bytes());

    let tags: Vec<u8> = std::iter::once(TYPE_TAG_MARKER)
        .chain(args.iter().map(Value::tag))
        .collect();
    push_padded(&mut buf, &tags);

    for arg in args {
        match arg {
            Value::Int(val) => buf.extend_from_slice(&val.to_be_bytes()),
            Value::Float(val) => buf.extend_from_slice(&val.to_be_bytes()),
            Value::Str(val) => push_padded(&mut buf, val.as_bytes()),
        }
    }

    buf
}

fn nul_from(buf: &[u8], start: usize) -> Option<usize> {
    buf.get(start..)?
        .iter()
        .position(|&byte| byte == 0)
        .map(|pos| start + pos)
}

fn word_at(buf: &[u8], offset: usize) -> Option<[u8; 4]> {
    buf.get(offset..offset + 4)?.try_into().ok()
}

/// Parses a datagram.
///
/// Only an address without terminator is an error. The address is
/// taken as is, lossily converted to UTF-8. Senders which omit
/// the type tag string yield a message without arguments, and a buffer
/// truncated in the middle of the arguments yields those parsed so far.
pub fn decode(buf: &[u8]) -> Result<Msg, Error> {
    let address_end = nul_from(buf, 0)
        .ok_or_else(|| Error::MissingAddressTerminator(bytes::Displayable::from(buf).to_owned()))?;

    let mut msg = Msg::new(String::from_utf8_lossy(&buf[..address_end]).as_ref());

    let mut offset = aligned(address_end + 1);
    if buf.get(offset) != Some(&TYPE_TAG_MARKER) {
        return Ok(msg);
    }

    let tags_end = match nul_from(buf, offset) {
        Some(tags_end) => tags_end,
        None => return Ok(msg),
    };
    let tags = &buf[offset + 1..tags_end];
    offset = aligned(tags_end + 1);

    for &tag in tags {
        let arg = match tag {
            b'i' => match word_at(buf, offset) {
                Some(word) => Value::Int(i32::from_be_bytes(word)),
                None => break,
            },
            b'f' => match word_at(buf, offset) {
                Some(word) => Value::Float(f32::from_be_bytes(word)),
                None => break,
            },
            b's' => match nul_from(buf, offset) {
                Some(end) => {
                    let val = String::from_utf8_lossy(&buf[offset..end]);
                    offset = aligned(end + 1);
                    msg.args.push(Value::Str(val.as_ref().into()));
                    continue;
                }
                None => break,
            },
            other => {
                // Unknown argument size: the rest can't be located.
                log::trace!("{}: unsupported type tag {:?}", msg.address, other as char);
                break;
            }
        };

        offset += 4;
        msg.args.push(arg);
    }

    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fader_round_trip() {
        let buf = encode("/ch/01/mix/fader", &[Value::Float(0.75)]);
        assert_eq!(buf.len() % 4, 0);

        let msg = decode(&buf).unwrap();
        assert_eq!(msg.address(), "/ch/01/mix/fader");
        assert_eq!(msg.args().len(), 1);
        let level = msg.args()[0].as_float().unwrap();
        assert!((level - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn wire_layout() {
        let buf = Msg::new("/load").with("scene").with(4).to_bytes();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"/load\0\0\0");
        expected.extend_from_slice(b",si\0");
        expected.extend_from_slice(b"scene\0\0\0");
        expected.extend_from_slice(&[0, 0, 0, 4]);
        assert_eq!(buf, expected);
    }

    #[test]
    fn query_has_empty_tag_string() {
        let buf = encode("/ch/01/mix/on", &[]);
        assert_eq!(buf.len(), 20);
        assert_eq!(&buf[16..], b",\0\0\0");
        assert!(decode(&buf).unwrap().is_query());
    }

    #[test]
    fn always_aligned() {
        for address in ["/a", "/ab", "/abc", "/abcd", "/xremote"] {
            for text in ["", "s", "sc", "sce", "scen"] {
                let buf = encode(address, &[Value::from(text), Value::Int(-1), Value::Float(0.5)]);
                assert_eq!(buf.len() % 4, 0, "{address} {text:?}");

                let msg = decode(&buf).unwrap();
                assert_eq!(msg.address(), address);
                assert_eq!(msg.args()[0].as_str(), Some(text));
                assert_eq!(msg.args()[1].as_int(), Some(-1));
            }
        }
    }

    #[test]
    fn float_one_stays_float() {
        let msg = decode(&encode("/dca/1/fader", &[Value::Float(1.0)])).unwrap();
        assert_eq!(msg.args(), &[Value::Float(1.0)]);
    }

    #[test]
    fn missing_type_tags() {
        let msg = decode(b"/info\0\0\0").unwrap();
        assert_eq!(msg.address(), "/info");
        assert!(msg.args().is_empty());

        // Address alone, exactly filling the buffer.
        let msg = decode(b"/ab\0").unwrap();
        assert_eq!(msg.address(), "/ab");
    }

    #[test]
    fn truncated_arguments() {
        let mut buf = encode("/ch/01/mix/on", &[Value::Int(1), Value::Int(0)]);
        buf.truncate(buf.len() - 2);

        let msg = decode(&buf).unwrap();
        assert_eq!(msg.args(), &[Value::Int(1)]);
    }

    #[test]
    fn malformed() {
        assert!(matches!(
            decode(b"/ch/01"),
            Err(Error::MissingAddressTerminator(_))
        ));
        assert!(matches!(decode(b""), Err(Error::MissingAddressTerminator(_))));
    }

    #[test]
    fn unchecked_inbound_address() {
        assert_eq!(decode(b"\0\0\0\0").unwrap().address(), "");

        let msg = decode(b"/\xc3\xa9\0,i\0\0\0\0\0\x01").unwrap();
        assert_eq!(msg.address(), "/é");
        assert_eq!(msg.args(), &[Value::Int(1)]);

        assert_eq!(decode(b"/\xff\0\0").unwrap().address(), "/\u{fffd}");
    }

    #[test]
    fn checked_address() {
        assert!(Msg::try_new("/ch/01/mix/on").is_ok());
        assert!(matches!(Msg::try_new(""), Err(Error::EmptyAddress)));
        assert!(matches!(Msg::try_new("/é"), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn display() {
        let msg = Msg::new("/load").with("scene").with(0);
        assert_eq!(msg.to_string(), r#"/load "scene" 0"#);
    }
}
