pub mod mackie;
pub use mackie::McuClient;

pub mod x32;
pub use x32::X32Client;
