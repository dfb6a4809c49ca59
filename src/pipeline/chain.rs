//! Type-erased link chain.
//!
//! Typed links are generic over the procedure set they receive, so the
//! pipeline stores them behind the object-safe [`DynLink`] trait. The chain
//! itself is an immutable, shared slice: attaching a link produces a new
//! chain and leaves the old one untouched.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::errors::LinkError;
use crate::flags::{FlagSet, LinkFlag};
use crate::link::{Link, LinkResponse, Operation};
use crate::procedures::{ProcedureSchema, Procedures};

/// Object-safe view of a link.
///
/// Implement this directly for links whose flags are only known at runtime
/// (for example links built from configuration); typed [`Link`]s are
/// converted with [`into_dyn`].
pub trait DynLink: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Flags contributed when the link is attached.
    fn flags(&self) -> FlagSet;

    /// Procedure set exposed after this link, given the one it receives.
    fn project(&self, input: &Arc<ProcedureSchema>) -> Arc<ProcedureSchema> {
        Arc::clone(input)
    }

    fn call(&self, op: Operation, next: Next) -> LinkResponse;
}

struct Erased<L, P> {
    link: L,
    _procedures: PhantomData<fn() -> P>,
}

impl<L, P> DynLink for Erased<L, P>
where
    P: Procedures,
    L: Link<P>,
{
    fn name(&self) -> &str {
        self.link.name()
    }

    fn flags(&self) -> FlagSet {
        <L::Flag as LinkFlag>::FLAGS
    }

    fn project(&self, input: &Arc<ProcedureSchema>) -> Arc<ProcedureSchema> {
        if TypeId::of::<L::Output>() == TypeId::of::<P>() {
            Arc::clone(input)
        } else {
            Arc::new(<L::Output as Procedures>::schema())
        }
    }

    fn call(&self, op: Operation, next: Next) -> LinkResponse {
        self.link.call(op, next)
    }
}

/// Erase a typed link that receives procedure set `P`.
pub fn into_dyn<P, L>(link: L) -> Arc<dyn DynLink>
where
    P: Procedures,
    L: Link<P>,
{
    Arc::new(Erased {
        link,
        _procedures: PhantomData,
    })
}

/// The attached links, in attachment order.
#[derive(Clone)]
pub(crate) struct Chain {
    links: Arc<[Arc<dyn DynLink>]>,
}

impl Chain {
    pub(crate) fn new() -> Self {
        Self {
            links: Arc::from(Vec::new()),
        }
    }

    /// A new chain with `link` appended.
    pub(crate) fn push(&self, link: Arc<dyn DynLink>) -> Self {
        let mut links = self.links.to_vec();
        links.push(link);
        Self {
            links: Arc::from(links),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.links.len()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.links.iter().map(|link| link.name().to_string()).collect()
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Handle to the remainder of the chain after the current link.
pub struct Next {
    chain: Chain,
    position: usize,
}

impl Next {
    pub(crate) fn start(chain: Chain) -> Self {
        Self { chain, position: 0 }
    }

    /// Position of the link this handle will invoke.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of links left to run, including the one this handle invokes.
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.position)
    }

    /// Invoke the next link with `op`.
    ///
    /// Errors leaving that link are attributed to it unless a link further
    /// down already claimed them. Running past the end of the chain yields
    /// an error attributed to the chain end.
    pub fn run(self, op: Operation) -> LinkResponse {
        let Some(link) = self.chain.links.get(self.position).cloned() else {
            log::debug!(
                "operation #{} `{}` reached the end of the chain unanswered",
                op.id,
                op.key
            );
            return LinkResponse::error(LinkError::unhandled(&op.key, self.chain.len()));
        };

        let position = self.position;
        let name = link.name().to_string();
        log::trace!("operation #{} entering link `{}` (#{})", op.id, name, position);

        let next = Next {
            chain: self.chain,
            position: position + 1,
        };
        link.call(op, next)
            .map_err(move |err| err.attribute(&name, position))
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("position", &self.position)
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{Passthrough, TerminatedLink};
    use crate::procedures::ProcedureKind;
    use futures::StreamExt;
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    struct Tag(&'static str);

    impl<P: Procedures> Link<P> for Tag {
        type Output = P;
        type Flag = Passthrough;

        fn name(&self) -> &str {
            self.0
        }

        fn call(&self, mut op: Operation, next: Next) -> LinkResponse {
            let tags = op.input.as_array_mut().expect("array input");
            tags.push(json!(self.0));
            next.run(op)
        }
    }

    struct Echo;

    impl<P: Procedures> Link<P> for Echo {
        type Output = P;
        type Flag = TerminatedLink;

        fn name(&self) -> &str {
            "echo"
        }

        fn call(&self, op: Operation, _next: Next) -> LinkResponse {
            LinkResponse::value(op.input)
        }
    }

    struct Failing;

    impl<P: Procedures> Link<P> for Failing {
        type Output = P;
        type Flag = TerminatedLink;

        fn name(&self) -> &str {
            "failing"
        }

        fn call(&self, _op: Operation, _next: Next) -> LinkResponse {
            LinkResponse::error(LinkError::new("unreachable host"))
        }
    }

    struct Renamed;

    impl Procedures for Renamed {
        fn schema() -> ProcedureSchema {
            ProcedureSchema::new().query("renamed", "()", "()")
        }
    }

    struct Project;

    impl Link<()> for Project {
        type Output = Renamed;
        type Flag = Passthrough;

        fn call(&self, op: Operation, next: Next) -> LinkResponse {
            next.run(op)
        }
    }

    fn op(input: Value) -> Operation {
        Operation::new(0, ProcedureKind::Query, "q", input, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_links_run_in_attachment_order() {
        let chain = Chain::new()
            .push(into_dyn::<(), _>(Tag("a")))
            .push(into_dyn::<(), _>(Tag("b")))
            .push(into_dyn::<(), _>(Echo));

        let mut response = Next::start(chain).run(op(json!([])));
        let value = response.next().await.unwrap().unwrap();
        assert_eq!(value, json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_error_attributed_to_raising_stage() {
        let chain = Chain::new()
            .push(into_dyn::<(), _>(Tag("a")))
            .push(into_dyn::<(), _>(Failing));

        let mut response = Next::start(chain).run(op(json!([])));
        let err = response.next().await.unwrap().unwrap_err();
        assert_eq!(err.stage(), Some("failing"));
        assert_eq!(err.position(), Some(1));
    }

    #[tokio::test]
    async fn test_running_past_the_end() {
        let chain = Chain::new().push(into_dyn::<(), _>(Tag("a")));

        let mut response = Next::start(chain).run(op(json!([])));
        let err = response.next().await.unwrap().unwrap_err();
        assert_eq!(err.stage(), Some("<end of chain>"));
        assert_eq!(err.position(), Some(1));
    }

    #[test]
    fn test_push_leaves_original_chain() {
        let base = Chain::new().push(into_dyn::<(), _>(Tag("a")));
        let extended = base.push(into_dyn::<(), _>(Echo));
        assert_eq!(base.names(), vec!["a"]);
        assert_eq!(extended.names(), vec!["a", "echo"]);
    }

    #[test]
    fn test_erased_flags_and_projection() {
        let input = Arc::new(ProcedureSchema::new().query("q", "()", "()"));

        let echo = into_dyn::<(), _>(Echo);
        assert_eq!(echo.flags(), TerminatedLink::FLAGS);
        assert!(Arc::ptr_eq(&echo.project(&input), &input));

        let project = into_dyn::<(), _>(Project);
        let projected = project.project(&input);
        assert!(projected.get("renamed").is_some());
        assert!(projected.get("q").is_none());
    }

    #[test]
    fn test_next_remaining() {
        let chain = Chain::new()
            .push(into_dyn::<(), _>(Tag("a")))
            .push(into_dyn::<(), _>(Echo));
        let next = Next::start(chain);
        assert_eq!(next.position(), 0);
        assert_eq!(next.remaining(), 2);
    }
}
