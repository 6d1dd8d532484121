//! Mediaconv Processing Library
//!
//! Turns pipeline steps into external tool invocations and runs them:
//!
//! - `operations`: step to program + argument vector
//! - `command`: the process seam, with a real and a recording runner
//! - `executor`: sequential step execution inside a scratch directory

pub mod command;
pub mod executor;
pub mod operations;

pub use command::{CommandOutput, CommandRunner, ProcessRunner, RecordingRunner};
pub use executor::{scratch_dir, JobExecutor, OUTPUT_DIR};
pub use operations::{map_operation, map_step, substitute, ExecutionContext, Tool, ToolInvocation};
