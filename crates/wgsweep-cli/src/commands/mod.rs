//! CLI command implementations

pub mod merge;
pub mod plan;
pub mod run;
pub mod show;

pub use merge::MergeCommand;
pub use plan::PlanCommand;
pub use run::RunCommand;
pub use show::ShowCommand;
