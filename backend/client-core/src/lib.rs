pub mod codec;
pub mod config;
pub mod error;
pub mod reconnect;
pub mod session;
pub mod state;
pub mod transport;

#[cfg(test)]
mod tests;

pub const DEFAULT_PEER_HOSTNAME: &str = "localhost";
pub const DEFAULT_PEER_PORT: u16 = 8080;
pub const DEFAULT_PEER_URL: &str =
    const_format::concatcp!("ws://", DEFAULT_PEER_HOSTNAME, ":", DEFAULT_PEER_PORT, "/");
