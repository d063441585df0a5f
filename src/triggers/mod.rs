mod backoff;
mod redis;

pub use backoff::ReconnectBackoff;
pub use redis::{RedisDispatchMessage, RedisSubscriber};
