//! Build pipeline module for sitepipe
//!
//! Turns the site sources into the build folder.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Tasks**: named units of work with declared prerequisites ([`task`])
//! - **Planning**: a task plan grouped into levels of independent tasks
//! - **Execution**: the [`TaskRunner`] runs levels concurrently and applies
//!   each task's failure policy
//! - **Stages**: the actions that read sources and write outputs ([`stages`])
//!
//! # Example
//!
//! ```ignore
//! use sitepipe::build::{BuildContext, TaskRunner};
//! use sitepipe::config::load_config;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root, flags);
//! let result = TaskRunner::new(context).run(&["build"])?;
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod discovery;
pub mod error;
pub mod result;
pub mod runner;
pub mod stages;
pub mod task;

pub use context::*;
pub use error::*;
pub use result::*;
pub use runner::*;
pub use task::*;
