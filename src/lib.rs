//! sitepipe - a task-based build pipeline for static sites
//!
//! This library provides functionality to:
//! - Resolve the source and output folders of a site project
//! - Plan and run named build tasks with declared prerequisites
//! - Compile templates, stylesheets, scripts and images into a build folder
//! - Watch sources, rebuild incrementally and live-reload a dev server
//! - Rename the build for deployment

pub mod build;
pub mod cli;
pub mod config;
pub mod env;
pub mod logging;
pub mod paths;
pub mod preprocess;
pub mod server;
pub mod watch;
