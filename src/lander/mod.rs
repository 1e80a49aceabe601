pub mod error;
mod priority;
mod rpc;
mod submission;

pub use error::LanderError;
pub use priority::{
    FeeInstructions, FeeParameters, compute_fee_instructions, compute_priority_fee_micro_lamports,
};
pub use rpc::{
    BlockReference, ConfirmationLevel, LandingRpc, RpcLander, SignatureState, commitment_label,
};
pub use submission::{
    DEFAULT_MAX_ATTEMPTS, LandingOutcome, LandingReport, LandingSchedule, SubmissionLoop,
};
