pub mod constants;
pub mod types;
pub mod errors;
pub mod protocol;

pub use constants::*;
pub use types::*;
