pub mod capture;

pub use capture::CapturedRequest;
