pub mod compute_budget;
pub mod wsol;
