// Shared fixtures for rspc-client integration tests
#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use rspc_client::flags::Passthrough;
use rspc_client::link::{FnLink, LinkResponse};
use rspc_client::{Link, Next, Operation, ProcedureKind, ProcedureSchema, Procedures};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Procedure set used across the integration tests.
pub struct Api;

impl Procedures for Api {
    fn schema() -> ProcedureSchema {
        ProcedureSchema::new()
            .query("version", "()", "String")
            .query("echo", "Value", "Value")
            .mutation("users.create", "NewUser", "u64")
            .subscription("ticks", "()", "u32")
    }
}

/// Shared log of which stages saw an operation, in call order.
pub type Trace = Arc<Mutex<Vec<String>>>;

pub fn trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

/// Pass-through link that records its name, and the operation's
/// cancellation token, before forwarding.
pub struct Recorder {
    name: String,
    trace: Trace,
    tokens: Arc<Mutex<Vec<CancellationToken>>>,
}

impl Recorder {
    pub fn new(name: &str, trace: &Trace) -> Self {
        Self {
            name: name.to_string(),
            trace: Arc::clone(trace),
            tokens: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_tokens(mut self, tokens: &Arc<Mutex<Vec<CancellationToken>>>) -> Self {
        self.tokens = Arc::clone(tokens);
        self
    }
}

impl<P: Procedures> Link<P> for Recorder {
    type Output = P;
    type Flag = Passthrough;

    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, op: Operation, next: Next) -> LinkResponse {
        self.trace.lock().push(self.name.clone());
        self.tokens.lock().push(op.cancellation().clone());
        next.run(op)
    }
}

/// Terminating link that answers like a small in-process server.
pub fn server() -> FnLink<impl Fn(Operation) -> LinkResponse + Send + Sync + 'static> {
    FnLink::new("server", |op: Operation| match (op.kind, op.key.as_str()) {
        (ProcedureKind::Query, "version") => LinkResponse::value(json!("1.0.0")),
        (ProcedureKind::Mutation, "users.create") => LinkResponse::value(json!(42)),
        (ProcedureKind::Subscription, "ticks") => {
            LinkResponse::from_stream(futures::stream::iter((1..=3).map(|n| Ok(json!(n)))))
        }
        _ => LinkResponse::value(op.input),
    })
}

/// Terminating link that never answers.
pub fn hanging() -> FnLink<impl Fn(Operation) -> LinkResponse + Send + Sync + 'static> {
    FnLink::new("hanging", |_| {
        LinkResponse::from_future(futures::future::pending())
    })
}
