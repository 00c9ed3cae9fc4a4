pub mod client;
pub mod contracts;
pub mod controller;
pub mod error;
pub mod runner;
pub mod sse;

pub use client::*;
pub use contracts::*;
pub use controller::*;
pub use error::*;
pub use runner::*;
