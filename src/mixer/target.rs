use std::fmt;

/// Something whose state can be polled: 1-based channel, DCA or mute group.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Target {
    Channel(u8),
    Dca(u8),
    MuteGroup(u8),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Channel(ch) => write!(f, "channel {ch}"),
            Target::Dca(dca) => write!(f, "DCA {dca}"),
            Target::MuteGroup(grp) => write!(f, "mute group {grp}"),
        }
    }
}
