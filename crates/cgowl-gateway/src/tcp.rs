//! TCP transport for the converter protocol.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::{ParserEndpoint, ParserSession};
use crate::protocol::{decode, encode, ClientMessage, ServerMessage, PROTOCOL_VERSION};

#[derive(Debug, Clone)]
pub struct TcpEndpoint {
    config: GatewayConfig,
}

impl TcpEndpoint {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn resolve(&self) -> Result<SocketAddr, GatewayError> {
        let endpoint = self.config.endpoint();
        let mut addrs = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|source| GatewayError::Connect {
                endpoint: endpoint.clone(),
                source,
            })?;
        addrs.next().ok_or_else(|| GatewayError::Connect {
            endpoint,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no address"),
        })
    }
}

impl ParserEndpoint for TcpEndpoint {
    fn connect(&self) -> Result<Box<dyn ParserSession>, GatewayError> {
        let addr = self.resolve()?;
        let timeout = self.config.timeout;
        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|source| {
            GatewayError::Connect {
                endpoint: self.config.endpoint(),
                source,
            }
        })?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        let mut session = TcpSession {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
            timeout,
            next_id: 1,
        };
        session.handshake()?;
        tracing::debug!(endpoint = %self.config.endpoint(), "converter handshake complete");
        Ok(Box::new(session))
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.config.endpoint())
    }
}

pub struct TcpSession {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    timeout: Duration,
    next_id: u64,
}

impl TcpSession {
    fn send(&mut self, message: &ClientMessage) -> Result<(), GatewayError> {
        let line = encode(message)?;
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| GatewayError::from_io(e, self.timeout))
    }

    fn receive(&mut self) -> Result<ServerMessage, GatewayError> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .map_err(|e| GatewayError::from_io(e, self.timeout))?;
        if n == 0 {
            return Err(GatewayError::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by converter",
            )));
        }
        Ok(decode(&line)?)
    }

    fn handshake(&mut self) -> Result<(), GatewayError> {
        self.send(&ClientMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
        })?;
        match self.receive() {
            Ok(ServerMessage::HelloAck {
                protocol_version, ..
            }) if protocol_version == PROTOCOL_VERSION => Ok(()),
            Ok(ServerMessage::HelloAck {
                protocol_version, ..
            }) => Err(GatewayError::Handshake(format!(
                "converter speaks protocol {protocol_version}, expected {PROTOCOL_VERSION}"
            ))),
            Ok(ServerMessage::Error { message, .. }) => Err(GatewayError::Handshake(message)),
            Ok(other) => Err(GatewayError::Handshake(format!("unexpected reply {other:?}"))),
            Err(err) => Err(GatewayError::Handshake(err.to_string())),
        }
    }
}

impl ParserSession for TcpSession {
    fn cgparse(
        &mut self,
        subject: &str,
        primitive: bool,
        expression: &str,
    ) -> Result<Option<String>, GatewayError> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&ClientMessage::Cgparse {
            id,
            subject: subject.to_string(),
            primitive,
            expression: expression.to_string(),
        })?;
        match self.receive()? {
            ServerMessage::Result { id: got, owl } if got == id => Ok(owl),
            ServerMessage::Error { id: got, message } if got.map_or(true, |g| g == id) => {
                Err(GatewayError::Remote(message))
            }
            other => Err(GatewayError::Protocol(format!(
                "expected reply to request {id}, got {other:?}"
            ))),
        }
    }
}
