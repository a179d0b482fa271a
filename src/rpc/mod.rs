//! RPC boundary: wire model, request gateway, unix-socket server.

mod gateway;
mod server;
mod wire;

pub use gateway::{Gateway, Reply};
pub use server::serve;
pub use wire::{Request, Response};
