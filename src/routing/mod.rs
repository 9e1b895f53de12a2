//! Route rules and the ordered route table.
//!
//! # Design Decisions
//! - Patterns are regular expressions matched against the request path
//! - First match wins, in declaration order; callers order rules accordingly
//! - Rules are immutable once constructed and read-only while dispatching

pub mod files;
pub mod proxy;
pub mod route;
pub mod table;

pub use files::static_files;
pub use proxy::proxy;
pub use route::{
    download, favicon, handler, humans, redirect, robots, url, ContentMode, Handler,
    HandlerFuture, Outcome, Route,
};
pub use table::RouteTable;
