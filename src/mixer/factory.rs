use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use super::{protocol, ConnectionConfig, Error, Mixer};

pub static FACTORY: Lazy<Factory> = Lazy::new(|| {
    Factory::default()
        .with::<protocol::X32Client>()
        .with::<protocol::McuClient>()
});

pub trait Buildable: Mixer {
    const NAME: &'static str;
    const DEFAULT_PORT: u16;

    fn build(cfg: ConnectionConfig) -> Result<Box<dyn Mixer>, Error>;
}

struct Entry {
    default_port: u16,
    build: fn(ConnectionConfig) -> Result<Box<dyn Mixer>, Error>,
}

/// Mixer clients by protocol name.
#[derive(Default)]
pub struct Factory(BTreeMap<&'static str, Entry>);

impl Factory {
    pub(super) fn with<B: Buildable>(mut self) -> Self {
        self.0.insert(
            B::NAME,
            Entry {
                default_port: B::DEFAULT_PORT,
                build: B::build,
            },
        );
        self
    }

    pub fn list(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().cloned()
    }

    pub fn default_port(&self, name: &str) -> Option<u16> {
        self.0.get(name).map(|entry| entry.default_port)
    }

    pub fn build(&self, name: &str, cfg: ConnectionConfig) -> Result<Box<dyn Mixer>, Error> {
        let entry = self
            .0
            .get(name)
            .ok_or_else(|| Error::UnknownProtocol(name.into()))?;

        (entry.build)(cfg)
    }
}
