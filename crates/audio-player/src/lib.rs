//! Interactive terminal playback: decode, render, control and report.

pub mod config;
pub mod decode;
pub mod device;
pub mod done;
pub mod engine;
pub mod input;
pub mod keys;
pub mod output;
pub mod resample;
pub mod session;
pub mod status;
pub mod stream;
pub mod terminal;
pub mod transport;
