pub mod lifecycle;

pub use lifecycle::{CaptureService, ForegroundPresence, NoForeground};
