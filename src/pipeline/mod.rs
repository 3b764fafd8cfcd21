// Transform pipeline: stage implementations and their row-count reports

pub mod processing;
pub mod stage_report;

pub use stage_report::{DropReason, Stage, StageReport};
