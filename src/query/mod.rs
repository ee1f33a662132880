//! Companion store queries.
//!
//! Helpers that consult the companion store go through the [`QueryClient`]
//! trait. [`SocketQueryClient`] talks to the real store over a unix or TCP
//! stream socket; any `Fn(&str) -> QueryResponse` closure is a client too.

pub mod client;
pub mod protocol;

pub use client::{QueryClient, SocketQueryClient};
pub use protocol::{read_frame, write_frame, QueryResponse, STATUS_ERR, STATUS_OK};
