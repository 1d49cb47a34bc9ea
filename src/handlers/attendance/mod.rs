pub mod verify;

pub use verify::verify;
