//! Pass-through link that logs every operation.

use std::time::Instant;

use futures::StreamExt;
use log::Level;

use super::{Link, LinkResponse, Next, Operation};
use crate::flags::Passthrough;
use crate::procedures::Procedures;

/// Logs each operation as it enters the chain and each response item or
/// error as it comes back.
///
/// Attach it first to see every operation, or just before the terminating
/// link to see what actually reaches the transport.
#[derive(Debug, Clone)]
pub struct LoggerLink {
    level: Level,
}

impl LoggerLink {
    /// Log at `debug` level.
    pub fn new() -> Self {
        Self {
            level: Level::Debug,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for LoggerLink {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Procedures> Link<P> for LoggerLink {
    type Output = P;
    type Flag = Passthrough;

    fn name(&self) -> &str {
        "logger"
    }

    fn call(&self, op: Operation, next: Next) -> LinkResponse {
        let level = self.level;
        let id = op.id;
        let kind = op.kind;
        let key = op.key.clone();
        let started = Instant::now();

        log::log!(level, "-> {} `{}` #{}", kind, key, id);

        let response = next.run(op).inspect(move |item| match item {
            Ok(_) => log::log!(
                level,
                "<- {} `{}` #{} ok after {:.2?}",
                kind,
                key,
                id,
                started.elapsed()
            ),
            Err(err) => log::warn!(
                "<- {} `{}` #{} failed after {:.2?}: {}",
                kind,
                key,
                id,
                started.elapsed(),
                err
            ),
        });
        LinkResponse::from_stream(response)
    }
}
