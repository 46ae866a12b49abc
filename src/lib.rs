//! parmin - parallel JavaScript minification.
//!
//! A [`coordinator::Coordinator`] takes the matching assets of a
//! [`host::Compilation`], ships each one as a job to a bounded pool of worker
//! processes, and writes the minified replacements and their diagnostics
//! back into the compilation. Replacements are cached by input identity, so
//! an unchanged asset is never sent to a worker twice.
//!
//! ```no_run
//! use parmin::config::MinifyOptions;
//! use parmin::coordinator::Coordinator;
//! use parmin::host::{Asset, Compilation, RequestShortener};
//! use parmin::worker::ProcessSpawner;
//!
//! # fn main() -> parmin::error::Result<()> {
//! let mut compilation = Compilation::new();
//! compilation.emit("main", "main.js", Asset::raw("var answer = 42;"));
//!
//! let spawner = ProcessSpawner::current_exe()?;
//! let mut coordinator =
//!     Coordinator::new(MinifyOptions::default(), spawner, RequestShortener::new("."));
//! coordinator.optimize_chunk_assets(&mut compilation, Box::new(|_| {}))?;
//! coordinator.wait(&mut compilation);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod host;
pub mod logging;
pub mod mapping;
pub mod matcher;
pub mod worker;
