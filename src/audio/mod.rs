pub mod capture;
pub mod device;

pub use capture::{drain_capture, CaptureBuffer, SealedCapture};
pub use device::{AudioFrame, FileMicrophone, MicrophoneDevice, MicrophoneSession};
