//! Type-level mirror of the flag algebra.
//!
//! A builder's flag set is encoded as `Flags<Built, Terminated,
//! SubscriptionsUnsupported>` where each parameter is [`Yes`] or [`No`].
//! Merging is done with the [`Bool`] combinators, so the successor type of
//! every `use_link`/`build` call is computed by the compiler and methods are
//! made available by implementing them only for matching flag states.
//!
//! ```
//! use rspc_client::flags::{FlagSet, FlagState, Flags, JoinFlags, NoFlags, TerminatedLink};
//!
//! type AfterHttp = JoinFlags<NoFlags, TerminatedLink>;
//! assert_eq!(
//!     <AfterHttp as FlagState>::FLAGS,
//!     FlagSet::from_bools(false, true, false)
//! );
//! ```

use std::marker::PhantomData;

use super::FlagSet;

/// A type-level boolean.
pub trait Bool: Send + Sync + 'static {
    const VALUE: bool;

    type Or<R: Bool>: Bool;
    type And<R: Bool>: Bool;
    type Not: Bool;
}

/// Type-level `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Yes;

/// Type-level `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct No;

impl Bool for Yes {
    const VALUE: bool = true;

    type Or<R: Bool> = Yes;
    type And<R: Bool> = R;
    type Not = No;
}

impl Bool for No {
    const VALUE: bool = false;

    type Or<R: Bool> = R;
    type And<R: Bool> = No;
    type Not = Yes;
}

/// A flag set carried in a builder's type.
pub trait FlagState: Send + Sync + 'static {
    type Built: Bool;
    type Terminated: Bool;
    type SubscriptionsUnsupported: Bool;

    /// The runtime equivalent of this state.
    const FLAGS: FlagSet;
}

/// The concrete flag-state type. Never constructed.
pub struct Flags<B, T, S>(PhantomData<fn() -> (B, T, S)>);

impl<B: Bool, T: Bool, S: Bool> FlagState for Flags<B, T, S> {
    type Built = B;
    type Terminated = T;
    type SubscriptionsUnsupported = S;

    const FLAGS: FlagSet = FlagSet::from_bools(B::VALUE, T::VALUE, S::VALUE);
}

/// The flag state of a freshly initialized builder.
pub type NoFlags = Flags<No, No, No>;

/// The flags a link contributes when attached.
pub trait LinkFlag: Send + Sync + 'static {
    type Terminated: Bool;
    type SubscriptionsUnsupported: Bool;

    const FLAGS: FlagSet = FlagSet::from_bools(
        false,
        <Self::Terminated as Bool>::VALUE,
        <Self::SubscriptionsUnsupported as Bool>::VALUE,
    );
}

/// Contributes nothing; the link forwards every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

/// The link answers operations itself and must be the last stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminatedLink;

/// The link cannot carry subscriptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionsUnsupported;

/// A terminating link without subscription support, e.g. plain HTTP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminatedWithoutSubscriptions;

impl LinkFlag for Passthrough {
    type Terminated = No;
    type SubscriptionsUnsupported = No;
}

impl LinkFlag for TerminatedLink {
    type Terminated = Yes;
    type SubscriptionsUnsupported = No;
}

impl LinkFlag for SubscriptionsUnsupported {
    type Terminated = No;
    type SubscriptionsUnsupported = Yes;
}

impl LinkFlag for TerminatedWithoutSubscriptions {
    type Terminated = Yes;
    type SubscriptionsUnsupported = Yes;
}

/// Flags of a builder `F` after attaching a link contributing `L`.
pub type JoinFlags<F, L> = Flags<
    <F as FlagState>::Built,
    <<F as FlagState>::Terminated as Bool>::Or<<L as LinkFlag>::Terminated>,
    <<F as FlagState>::SubscriptionsUnsupported as Bool>::Or<
        <L as LinkFlag>::SubscriptionsUnsupported,
    >,
>;

/// Flags of a builder `F` after `build`, where `Sub` says whether
/// subscriptions stay supported.
pub type BuiltFlags<F, Sub> = Flags<
    Yes,
    <F as FlagState>::Terminated,
    <<F as FlagState>::SubscriptionsUnsupported as Bool>::Or<<Sub as Bool>::Not>,
>;

/// Flag states in which `query` and `mutate` are available: built,
/// terminated, or both.
pub trait Operational: FlagState {}

impl<S: Bool> Operational for Flags<Yes, No, S> {}
impl<S: Bool> Operational for Flags<No, Yes, S> {}
impl<S: Bool> Operational for Flags<Yes, Yes, S> {}
