pub mod etl_use_case;
pub mod ports;

pub use etl_use_case::{EtlUseCase, RunSummary};
