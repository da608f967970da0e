use crate::bytes;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("OSC address is not NUL terminated: {}", .0)]
    MissingAddressTerminator(bytes::Displayable<'static>),

    #[error("Empty OSC address")]
    EmptyAddress,

    #[error("Invalid OSC address: {}", .0)]
    InvalidAddress(bytes::Displayable<'static>),
}
