pub mod cli;
pub mod client;
pub mod sse;

pub use client::HttpBackend;
