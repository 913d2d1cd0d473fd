//! Prompt construction, admission control and output extraction for a
//! hosted clinical LLM.
//!
//! The model itself runs elsewhere; this crate decides what to send it,
//! how many requests may be in flight, and how to shape what comes back.

pub mod client;
pub mod extraction;
pub mod gate;
pub mod prompts;
pub mod service;
pub mod tabular;

pub use client::*;
pub use extraction::*;
pub use gate::*;
pub use prompts::*;
pub use service::*;
pub use tabular::*;
