//! Claudix host command registry
//!
//! The extension runtime calls back into the IDE by command id
//! (`_workbench.diff`, `revealInExplorer`, ...). This crate holds the table
//! mapping those ids to handler objects and the method each one dispatches
//! on, and performs the dispatch.
//!
//! # Examples
//!
//! ```ignore
//! use claudix_commands::{handler_fn, CommandArgs, CommandDescriptor, CommandRegistry, ReturnType};
//! use serde_json::json;
//!
//! let registry = CommandRegistry::new();
//! registry.register(
//!     CommandDescriptor::new("claudix.ping", "ping", handler_fn(|_args| async { Ok(json!(true)) }))
//!         .with_return_type(ReturnType::Bool),
//! )?;
//!
//! let pong = registry.invoke("claudix.ping", CommandArgs::new()).await?;
//! ```

pub mod error;
pub mod handler;
pub mod registry;
pub mod types;

pub use error::{CommandError, Result};
pub use handler::{handler_fn, CommandHandler};
pub use registry::CommandRegistry;
pub use types::{CommandArgs, CommandDescriptor, HandlerFactory, ReturnType};
