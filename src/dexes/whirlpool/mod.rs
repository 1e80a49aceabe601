pub mod decoder;
pub mod quote;
pub mod swap;

pub use decoder::{ORCA_WHIRLPOOL_PROGRAM_ID, WhirlpoolState};
pub use swap::WhirlpoolSwapBuilder;
