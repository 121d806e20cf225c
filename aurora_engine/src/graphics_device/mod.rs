/// Graphics device module - the driver API surface and its value types

pub mod graphics_device;
pub mod handles;
pub mod types;
pub mod desc;
pub mod command;
pub mod config;

pub use graphics_device::*;
pub use handles::*;
pub use types::*;
pub use desc::*;
pub use command::*;
pub use config::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
