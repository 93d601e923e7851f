//! A client for a personal expense tracker: the derivation pipeline behind the expense table and
//! charts, the rules for changing the expense collection, the remote API contract, and a CLI.

pub mod api;
pub mod args;
pub mod commands;
mod config;
pub mod context;
mod error;
pub mod model;
pub mod pipeline;
pub mod store;
mod utils;


pub use api::{ApiError, ExpenseApi, Mode};
pub use config::Config;
pub use context::{AppContext, Theme};
pub use error::{Error, ErrorType, Result};
pub use store::{ExpenseStore, Outcome};
