use std::{borrow::Cow, fmt};

/// Longest prefix rendered before the remainder is summarized.
const MAX_DISPLAYED: usize = 64;

/// Hex rendering of a raw buffer, for logs and error messages.
#[derive(Debug)]
pub struct Displayable<'a>(Cow<'a, [u8]>);

impl<'a> From<&'a [u8]> for Displayable<'a> {
    fn from(buf: &'a [u8]) -> Self {
        Self(Cow::Borrowed(buf))
    }
}

impl From<Vec<u8>> for Displayable<'static> {
    fn from(buf: Vec<u8>) -> Self {
        Self(Cow::Owned(buf))
    }
}

impl<'a> Displayable<'a> {
    pub fn to_owned(&self) -> Displayable<'static> {
        Displayable::from(self.0.to_vec())
    }
}

impl<'a> fmt::Display for Displayable<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.iter().take(MAX_DISPLAYED);

        match iter.next() {
            Some(first) => write!(f, "(hex) {first:02x}")?,
            None => return f.write_str("(empty)"),
        };

        for val in iter {
            write!(f, " {val:02x}")?;
        }

        if self.0.len() > MAX_DISPLAYED {
            write!(f, " ... ({} bytes)", self.0.len())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_hex() {
        let buf = [0xb0u8, 0x10, 0x7f];
        assert_eq!(Displayable::from(buf.as_slice()).to_string(), "(hex) b0 10 7f");
        assert_eq!(Displayable::from(Vec::new()).to_string(), "(empty)");
    }

    #[test]
    fn summarizes_long_buffers() {
        let rendered = Displayable::from(vec![0u8; 100]).to_string();
        assert!(rendered.ends_with("... (100 bytes)"));
    }
}
