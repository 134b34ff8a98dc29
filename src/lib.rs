//! Stockroom Request & Transfer Engine
//!
//! Client-side engine for requesting, borrowing and transferring inventory
//! across warehouses: cart and stock rules, the company → customer → project →
//! work order chain that qualifies a request, borrow-request submission, and the
//! peer-to-peer transfer lifecycle.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod backend;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod retry;
pub mod services;
pub mod session;

pub use backend::{HttpInventoryApi, InventoryApi};
pub use config::AppConfig;
pub use errors::{ErrorKind, ErrorPrompt, ServiceError};
pub use services::factory::ServiceFactory;
pub use session::{Connectivity, Session, SessionUser};
