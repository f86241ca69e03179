pub mod csrf;
pub mod ctx;
pub mod tracing;
pub mod views;
