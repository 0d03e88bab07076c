pub mod args;
pub mod optimize;
pub mod simulate;
