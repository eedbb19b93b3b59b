//! # cgowl-gateway
//!
//! Client side of the remote compositional-grammar converter: a lazily
//! connected, mutex-guarded session with a reconnect-and-retry-once policy,
//! and the newline-delimited JSON protocol it speaks over TCP.

pub mod config;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod tcp;

pub use config::{ConfigError, GatewayConfig};
pub use error::GatewayError;
pub use gateway::{
    with_retry, CgParser, ConverterGateway, DefinitionMode, ParseRequest, ParserEndpoint,
    ParserSession,
};
pub use tcp::TcpEndpoint;
