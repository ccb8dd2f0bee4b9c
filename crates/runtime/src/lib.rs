
pub mod args;
pub mod log;
