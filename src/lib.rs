//! Tycho: an agent invocation runtime.
//!
//! Drives tool-calling model loops, composes agents sequentially, in
//! parallel, or in a loop, and routes every phase of execution through an
//! ordered plugin chain for interception, fallback, and retry policy.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tycho::prelude::*;
//!
//! # async fn example(model: Arc<dyn tycho::model::Model>) -> tycho::error::Result<()> {
//! let agent = Arc::new(
//!     LlmAgent::builder()
//!         .name("assistant")
//!         .model(model)
//!         .instruction("Answer briefly.")
//!         .build(),
//! );
//! let runner = Runner::new("demo", agent);
//! let events = runner
//!     .run_collect("user-1", "session-1", "Hello!", RunConfig::default())
//!     .await?;
//! for event in events {
//!     println!("{:?}: {}", event.author, event.text());
//! }
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod config;
pub mod context;
pub mod error;
pub mod flow;
pub mod model;
pub mod plugin;
pub mod prelude;
pub mod runner;
pub mod session;
pub mod streaming;
pub mod tools;
pub mod types;
