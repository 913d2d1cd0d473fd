//! Domain models for the Vecta service.

mod analysis;
mod output;
mod reviewer;
mod validation;

pub use analysis::*;
pub use output::*;
pub use reviewer::*;
pub use validation::*;
