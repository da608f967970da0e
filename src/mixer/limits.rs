//! Ranges the X32 accepts for user supplied numbers.

use super::Error;

#[derive(Clone, Copy, Debug)]
pub struct Limit {
    pub what: &'static str,
    pub min: u8,
    pub max: u8,
}

pub const CHANNEL: Limit = Limit {
    what: "channel",
    min: 1,
    max: 32,
};

pub const DCA: Limit = Limit {
    what: "DCA",
    min: 1,
    max: 8,
};

pub const SCENE: Limit = Limit {
    what: "scene",
    min: 1,
    max: 100,
};

pub const MUTE_GROUP: Limit = Limit {
    what: "mute group",
    min: 1,
    max: 6,
};

impl Limit {
    pub fn check(&self, value: u8) -> Result<u8, Error> {
        if !(self.min..=self.max).contains(&value) {
            return Err(Error::OutOfRange {
                what: self.what,
                value,
                min: self.min,
                max: self.max,
            });
        }

        Ok(value)
    }

    /// Parses and checks a command line value.
    pub fn parse(&self, arg: &str) -> Result<u8, String> {
        let value = arg.parse::<u8>().map_err(|_| {
            format!(
                "{} must be a number from {} to {}",
                self.what, self.min, self.max
            )
        })?;

        self.check(value).map_err(|err| err.to_string())
    }
}
