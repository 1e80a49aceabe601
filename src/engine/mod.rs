mod builder;
mod cycle;
mod error;
mod identity;
mod scheduler;
mod signer;
mod swap;

pub use builder::{
    BLOCKHASH_VALIDITY_BLOCKS, BaseTransaction, TransactionAssembler, TransactionEnvelope,
};
pub use cycle::SwapEngine;
pub use error::{EngineError, EngineResult};
pub use identity::EngineIdentity;
pub use scheduler::{MAX_SLEEP_SECS, ScheduleSettings, ScheduleSummary, Scheduler};
pub use signer::{KeypairSigner, SignedTransaction, SigningAdapter};
pub use swap::{PreparedSwap, SwapBuilder, SwapDirection, SwapQuote, SwapRequest};
