// Serial module - Device seam and its implementations
pub mod device;
pub mod loopback;
pub mod ports;
pub mod scripted;

pub use device::{SerialDevice, SystemSerialDevice};
pub use loopback::LoopbackDevice;
pub use ports::{list_ports, PortSummary};
pub use scripted::{ReadStep, ScriptedDevice, WriteMode};
