pub mod capture;
mod worker;

pub use capture::CaptureSession;
