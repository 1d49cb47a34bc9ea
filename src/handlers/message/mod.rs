pub mod relay;

pub use relay::relay;
