//! Wire protocol: newline-delimited JSON messages over one TCP stream.
//!
//! Every message is a single JSON object on its own line, tagged by `type`.
//! The client opens with `hello`; afterwards each `cgparse` request receives
//! exactly one `result` or `error` reply carrying the same `id`.

use serde::{Deserialize, Serialize};

/// Protocol version
pub const PROTOCOL_VERSION: u32 = 1;

/// Client to converter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello {
        protocol_version: u32,
    },
    Cgparse {
        id: u64,
        subject: String,
        primitive: bool,
        expression: String,
    },
}

/// Converter to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    HelloAck {
        protocol_version: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server: Option<String>,
    },
    /// `owl` is null when the converter produced nothing.
    Result { id: u64, owl: Option<String> },
    Error {
        #[serde(default)]
        id: Option<u64>,
        message: String,
    },
}

pub fn encode<T: Serialize>(message: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

pub fn decode<'a, T: Deserialize<'a>>(line: &'a str) -> serde_json::Result<T> {
    serde_json::from_str(line.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_one_tagged_line() {
        let line = encode(&ClientMessage::Cgparse {
            id: 7,
            subject: "http://id.who.int/icd/entity/100".into(),
            primitive: true,
            expression: "73211009 |Diabetes mellitus|".into(),
        })
        .unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.contains(r#""type":"cgparse""#));
    }

    #[test]
    fn null_result_decodes_to_none() {
        let msg: ServerMessage = decode(r#"{"type":"result","id":3,"owl":null}"#).unwrap();
        assert_eq!(msg, ServerMessage::Result { id: 3, owl: None });
    }

    #[test]
    fn error_without_id_decodes() {
        let msg: ServerMessage = decode("{\"type\":\"error\",\"message\":\"boom\"}\r\n").unwrap();
        assert_eq!(
            msg,
            ServerMessage::Error {
                id: None,
                message: "boom".into()
            }
        );
    }
}
