//! HTTP / SSE handlers

mod http;
mod intake;
mod sse;

pub use http::{get_connections, get_queues, health_check};
pub use intake::{post_broadcast, post_generation};
pub use sse::{global_stream, room_stream, subscribe_room, unsubscribe_room};
