#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid two bytes value: lsb {lsb:#04x}, msb {msb:#04x}")]
    InvalidTwoBytesValue { lsb: u8, msb: u8 },

    #[error("Invalid u14: {}", .0)]
    InvalidU14(u16),

    #[error("Invalid normalized float: {}", .0)]
    InvalidNormalizedFloat(f64),
}
