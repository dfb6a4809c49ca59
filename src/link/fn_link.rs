//! Closure-backed terminating link.

use std::fmt;
use std::marker::PhantomData;

use super::{Link, LinkResponse, Next, Operation};
use crate::flags::{LinkFlag, TerminatedLink, TerminatedWithoutSubscriptions};
use crate::procedures::Procedures;

/// A terminating link that answers every operation with `handler`.
///
/// Useful for in-process transports and test doubles. The second type
/// parameter is the flag the link contributes: [`FnLink::new`] supports
/// subscriptions, [`FnLink::without_subscriptions`] does not.
///
/// ```
/// use rspc_client::link::{FnLink, LinkResponse};
/// use serde_json::json;
///
/// let link = FnLink::new("static", |_op| LinkResponse::value(json!("ok")));
/// ```
pub struct FnLink<F, M = TerminatedLink> {
    name: String,
    handler: F,
    _flag: PhantomData<fn() -> M>,
}

impl<F> FnLink<F, TerminatedLink>
where
    F: Fn(Operation) -> LinkResponse + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
            _flag: PhantomData,
        }
    }
}

impl<F> FnLink<F, TerminatedWithoutSubscriptions>
where
    F: Fn(Operation) -> LinkResponse + Send + Sync + 'static,
{
    pub fn without_subscriptions(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
            _flag: PhantomData,
        }
    }
}

impl<P, F, M> Link<P> for FnLink<F, M>
where
    P: Procedures,
    F: Fn(Operation) -> LinkResponse + Send + Sync + 'static,
    M: LinkFlag,
{
    type Output = P;
    type Flag = M;

    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, op: Operation, _next: Next) -> LinkResponse {
        (self.handler)(op)
    }
}

impl<F, M: LinkFlag> fmt::Debug for FnLink<F, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLink")
            .field("name", &self.name)
            .field("flags", &M::FLAGS)
            .finish()
    }
}
