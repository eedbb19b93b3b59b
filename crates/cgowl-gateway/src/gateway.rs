//! The connection manager.
//!
//! `ConverterGateway` owns at most one live session with the converter. Every
//! call goes through [`with_retry`]: one attempt, and on any failure one
//! reconnect followed by one more attempt. The mutex is held for the whole
//! sequence, so a reconnect never races a call on the old session.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::tcp::TcpEndpoint;

/// Whether the converted expression defines its subject fully
/// (`owl:equivalentClass`) or only gives a necessary condition
/// (`rdfs:subClassOf`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionMode {
    Primitive,
    FullyDefined,
}

impl DefinitionMode {
    pub fn from_primitive(primitive: bool) -> Self {
        if primitive {
            DefinitionMode::Primitive
        } else {
            DefinitionMode::FullyDefined
        }
    }

    pub fn is_primitive(self) -> bool {
        self == DefinitionMode::Primitive
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseRequest {
    /// Absolute IRI of the class being defined.
    pub subject: String,
    pub mode: DefinitionMode,
    pub expression: String,
}

impl ParseRequest {
    pub fn new(subject: impl Into<String>, mode: DefinitionMode, expression: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            mode,
            expression: expression.into(),
        }
    }
}

/// Something that can turn an expression into an OWL fragment.
pub trait CgParser: Send + Sync {
    fn parse(&self, request: &ParseRequest) -> Result<String, GatewayError>;
}

/// Where sessions come from.
pub trait ParserEndpoint: Send + Sync {
    fn connect(&self) -> Result<Box<dyn ParserSession>, GatewayError>;

    fn describe(&self) -> String;
}

/// One established conversation with the converter.
pub trait ParserSession: Send {
    /// `Ok(None)` is the converter's null answer.
    fn cgparse(
        &mut self,
        subject: &str,
        primitive: bool,
        expression: &str,
    ) -> Result<Option<String>, GatewayError>;
}

enum ConnectionState {
    Disconnected,
    Connected(Box<dyn ParserSession>),
}

/// Run `attempt`; on failure run `recover` and then `attempt` exactly once
/// more. A failing `recover` is returned as is, without a second attempt.
pub fn with_retry<C, T, E>(
    ctx: &mut C,
    mut attempt: impl FnMut(&mut C) -> Result<T, E>,
    recover: impl FnOnce(&mut C, &E) -> Result<(), E>,
) -> Result<T, E> {
    match attempt(ctx) {
        Ok(value) => Ok(value),
        Err(first) => {
            recover(ctx, &first)?;
            attempt(ctx)
        }
    }
}

pub struct ConverterGateway {
    endpoint: Box<dyn ParserEndpoint>,
    state: Mutex<ConnectionState>,
}

impl fmt::Debug for ConverterGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterGateway")
            .field("endpoint", &self.endpoint.describe())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl ConverterGateway {
    /// A gateway that connects on first use.
    pub fn new(endpoint: impl ParserEndpoint + 'static) -> Self {
        Self {
            endpoint: Box::new(endpoint),
            state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    /// Connect to a TCP converter right away.
    pub fn connect(config: GatewayConfig) -> Result<Self, GatewayError> {
        let gateway = Self::new(TcpEndpoint::new(config));
        gateway.reconnect()?;
        Ok(gateway)
    }

    pub fn describe(&self) -> String {
        self.endpoint.describe()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.state.lock(), ConnectionState::Connected(_))
    }

    /// Drop the current session (if any) and establish a new one.
    pub fn reconnect(&self) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        self.establish(&mut state)
    }

    pub fn disconnect(&self) {
        let mut state = self.state.lock();
        if matches!(*state, ConnectionState::Connected(_)) {
            tracing::info!(endpoint = %self.endpoint.describe(), "disconnecting from converter");
        }
        *state = ConnectionState::Disconnected;
    }

    fn establish(&self, state: &mut ConnectionState) -> Result<(), GatewayError> {
        *state = ConnectionState::Disconnected;
        tracing::info!(endpoint = %self.endpoint.describe(), "connecting to converter");
        match self.endpoint.connect() {
            Ok(session) => {
                *state = ConnectionState::Connected(session);
                Ok(())
            }
            Err(err) => {
                tracing::error!(endpoint = %self.endpoint.describe(), error = %err, "converter connection failed");
                Err(err)
            }
        }
    }

    fn attempt(&self, state: &mut ConnectionState, request: &ParseRequest) -> Result<String, GatewayError> {
        if matches!(state, ConnectionState::Disconnected) {
            self.establish(state)?;
        }
        let ConnectionState::Connected(session) = state else {
            return Err(GatewayError::NotConnected);
        };
        session
            .cgparse(&request.subject, request.mode.is_primitive(), &request.expression)?
            .ok_or(GatewayError::NoResult)
    }
}

impl CgParser for ConverterGateway {
    fn parse(&self, request: &ParseRequest) -> Result<String, GatewayError> {
        let mut state = self.state.lock();
        with_retry(
            &mut *state,
            |state| self.attempt(state, request),
            |state, err| {
                tracing::warn!(
                    subject = %request.subject,
                    kind = err.kind(),
                    error = %err,
                    "converter call failed, reconnecting for one retry"
                );
                self.establish(state)
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn with_retry_returns_first_success() {
        let mut calls = 0;
        let out: Result<u32, &str> = with_retry(
            &mut calls,
            |c| {
                *c += 1;
                Ok(5)
            },
            |_, _| panic!("no recovery expected"),
        );
        assert_eq!(out, Ok(5));
        assert_eq!(calls, 1);
    }

    #[test]
    fn with_retry_tries_exactly_twice() {
        let mut calls = 0;
        let mut recovered = 0;
        let out: Result<u32, String> = with_retry(
            &mut calls,
            |c| {
                *c += 1;
                Err(format!("fail {c}"))
            },
            |_, _| {
                recovered += 1;
                Ok(())
            },
        );
        assert_eq!(out, Err("fail 2".to_string()));
        assert_eq!(calls, 2);
        assert_eq!(recovered, 1);
    }

    #[test]
    fn with_retry_stops_when_recovery_fails() {
        let mut calls = 0;
        let out: Result<u32, &str> = with_retry(
            &mut calls,
            |c| {
                *c += 1;
                Err("call")
            },
            |_, _| Err("reconnect"),
        );
        assert_eq!(out, Err("reconnect"));
        assert_eq!(calls, 1);
    }

    /// Endpoint whose sessions answer from a shared script of outcomes.
    struct Scripted {
        connects: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
        fail_first_calls: usize,
        refuse_connect_after: Option<usize>,
    }

    struct ScriptedSession {
        calls: Arc<AtomicUsize>,
        fail_first_calls: usize,
    }

    impl ParserEndpoint for Scripted {
        fn connect(&self) -> Result<Box<dyn ParserSession>, GatewayError> {
            let n = self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse_connect_after.is_some_and(|limit| n >= limit) {
                return Err(GatewayError::Connect {
                    endpoint: "scripted".into(),
                    source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
                });
            }
            Ok(Box::new(ScriptedSession {
                calls: self.calls.clone(),
                fail_first_calls: self.fail_first_calls,
            }))
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    impl ParserSession for ScriptedSession {
        fn cgparse(&mut self, subject: &str, _: bool, _: &str) -> Result<Option<String>, GatewayError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_calls {
                Err(GatewayError::Remote(format!("failure {n}")))
            } else {
                Ok(Some(format!("<{subject}> a <http://www.w3.org/2002/07/owl#Class> .")))
            }
        }
    }

    fn gateway(fail_first_calls: usize, refuse_connect_after: Option<usize>) -> (ConverterGateway, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let connects = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let gw = ConverterGateway::new(Scripted {
            connects: connects.clone(),
            calls: calls.clone(),
            fail_first_calls,
            refuse_connect_after,
        });
        (gw, connects, calls)
    }

    fn request() -> ParseRequest {
        ParseRequest::new("http://id.who.int/icd/entity/100", DefinitionMode::Primitive, "73211009")
    }

    #[test]
    fn connects_lazily() {
        let (gw, connects, _) = gateway(0, None);
        assert!(!gw.is_connected());
        assert_eq!(connects.load(Ordering::SeqCst), 0);
        gw.parse(&request()).unwrap();
        assert!(gw.is_connected());
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn single_failure_is_retried_after_reconnect() {
        let (gw, connects, calls) = gateway(1, None);
        let owl = gw.parse(&request()).unwrap();
        assert!(owl.contains("owl#Class"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn two_failures_propagate_after_exactly_two_calls() {
        let (gw, _, calls) = gateway(2, None);
        let err = gw.parse(&request()).unwrap_err();
        assert!(matches!(err, GatewayError::Remote(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_reconnect_skips_the_retry() {
        let (gw, connects, calls) = gateway(5, Some(1));
        let err = gw.parse(&request()).unwrap_err();
        assert!(matches!(err, GatewayError::Connect { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(connects.load(Ordering::SeqCst), 2);
        assert!(!gw.is_connected());
    }

    #[test]
    fn null_answer_counts_as_failure() {
        struct Null;
        struct NullSession;
        impl ParserEndpoint for Null {
            fn connect(&self) -> Result<Box<dyn ParserSession>, GatewayError> {
                Ok(Box::new(NullSession))
            }
            fn describe(&self) -> String {
                "null".into()
            }
        }
        impl ParserSession for NullSession {
            fn cgparse(&mut self, _: &str, _: bool, _: &str) -> Result<Option<String>, GatewayError> {
                Ok(None)
            }
        }
        let gw = ConverterGateway::new(Null);
        assert!(matches!(gw.parse(&request()), Err(GatewayError::NoResult)));
    }
}
