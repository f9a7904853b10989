pub mod acquisition;
pub mod buffers;
pub mod config;
pub mod device;
pub mod events;
pub mod fetch;
pub mod plan;
pub mod progress;
pub mod sim;

pub use acquisition::{RunReport, Termination, run};
pub use buffers::{BufferPool, SampleEncoding};
pub use device::DeviceSession;
pub use events::{EventMux, EventSignal, EventSource};
pub use plan::AcquisitionPlan;
