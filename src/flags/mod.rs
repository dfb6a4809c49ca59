//! Capability flags accumulated while a pipeline is composed.
//!
//! Every link contributes a (possibly empty) set of flags when it is attached
//! and `build` contributes `built`. Flags only ever accumulate along a chain:
//! there is no operation that clears one.
//!
//! The runtime [`FlagSet`] defined here is the source of truth for
//! [`DynClient`](crate::DynClient). The typed [`Client`](crate::Client)
//! tracks the same information at the type level (see [`typed`]), and each
//! type-level flag state exposes the equivalent [`FlagSet`] as a constant so
//! both views can be compared in tests and logs.

pub mod typed;

use std::fmt;
use std::str::FromStr;

use crate::errors::ComposeError;

pub use typed::{
    Bool, BuiltFlags, FlagState, Flags, JoinFlags, LinkFlag, No, NoFlags, Operational, Passthrough,
    SubscriptionsUnsupported, TerminatedLink, TerminatedWithoutSubscriptions, Yes,
};

/// A single capability marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Flag {
    /// The pipeline has been finalized with `build`.
    Built,
    /// The last attached stage answers operations itself.
    TerminatedLink,
    /// The pipeline cannot carry subscriptions.
    SubscriptionsUnsupported,
}

impl Flag {
    /// All flags, in bit order.
    pub const ALL: [Flag; 3] = [
        Flag::Built,
        Flag::TerminatedLink,
        Flag::SubscriptionsUnsupported,
    ];

    const fn bit(self) -> u8 {
        match self {
            Flag::Built => 1 << 0,
            Flag::TerminatedLink => 1 << 1,
            Flag::SubscriptionsUnsupported => 1 << 2,
        }
    }

    /// The name used for this flag in logs and configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Flag::Built => "built",
            Flag::TerminatedLink => "terminatedLink",
            Flag::SubscriptionsUnsupported => "subscriptionsUnsupported",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Flag::ALL
            .into_iter()
            .find(|flag| flag.as_str() == s)
            .ok_or_else(|| format!("unknown flag `{}`", s))
    }
}

/// A set of [`Flag`]s.
///
/// Flags are presence markers, so merging two sets is a plain union and can
/// never conflict.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlagSet(u8);

impl FlagSet {
    /// The set with no flags present.
    pub const EMPTY: FlagSet = FlagSet(0);

    /// Create an empty set.
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Build a set from one presence bit per flag.
    pub const fn from_bools(built: bool, terminated: bool, subscriptions_unsupported: bool) -> Self {
        let mut set = Self::EMPTY;
        if built {
            set = set.with(Flag::Built);
        }
        if terminated {
            set = set.with(Flag::TerminatedLink);
        }
        if subscriptions_unsupported {
            set = set.with(Flag::SubscriptionsUnsupported);
        }
        set
    }

    /// Return a copy of this set with `flag` present.
    #[must_use]
    pub const fn with(self, flag: Flag) -> Self {
        FlagSet(self.0 | flag.bit())
    }

    /// Whether `flag` is present.
    pub const fn contains(self, flag: Flag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Union of both sets.
    #[must_use]
    pub const fn union(self, other: FlagSet) -> Self {
        FlagSet(self.0 | other.0)
    }

    /// True when no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over the present flags in bit order.
    pub fn iter(self) -> impl Iterator<Item = Flag> {
        Flag::ALL.into_iter().filter(move |flag| self.contains(*flag))
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        iter.into_iter().fold(FlagSet::EMPTY, FlagSet::with)
    }
}

impl From<Flag> for FlagSet {
    fn from(flag: Flag) -> Self {
        FlagSet::EMPTY.with(flag)
    }
}

impl fmt::Debug for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, flag) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", flag)?;
        }
        f.write_str("}")
    }
}

/// True iff `flag` is present in `set`.
pub fn has_flag(set: FlagSet, flag: Flag) -> bool {
    set.contains(flag)
}

/// True iff any of `flags` is present in `set`.
pub fn has_any_flag(set: FlagSet, flags: &[Flag]) -> bool {
    flags.iter().any(|flag| set.contains(*flag))
}

/// Union of two flag sets.
pub fn merge_flags(a: FlagSet, b: FlagSet) -> FlagSet {
    a.union(b)
}

/// The composition state a flag set describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Links may be attached and the pipeline may be built.
    Open,
    /// A terminating link has been attached.
    Terminated,
    /// `build` has been called.
    Built,
    /// Both finalized and terminated.
    BuiltAndTerminated,
}

impl ClientState {
    pub fn from_flags(flags: FlagSet) -> Self {
        match (
            flags.contains(Flag::Built),
            flags.contains(Flag::TerminatedLink),
        ) {
            (false, false) => ClientState::Open,
            (false, true) => ClientState::Terminated,
            (true, false) => ClientState::Built,
            (true, true) => ClientState::BuiltAndTerminated,
        }
    }

    /// Whether `use_link` and `build` are accepted.
    pub fn is_open(self) -> bool {
        self == ClientState::Open
    }

    /// Whether `query` and `mutate` are accepted.
    pub fn is_operational(self) -> bool {
        !self.is_open()
    }
}

/// Validate attaching a link contributing `contributed` to a pipeline whose
/// flags are `current`.
///
/// On a built pipeline, a subscription conflict is reported in preference
/// to [`ComposeError::AfterBuilt`].
pub fn check_attach(current: FlagSet, contributed: FlagSet, link: &str) -> Result<(), ComposeError> {
    if current.contains(Flag::TerminatedLink) {
        return Err(ComposeError::AfterTerminated {
            link: link.to_string(),
        });
    }

    if current.contains(Flag::Built) {
        if !current.contains(Flag::SubscriptionsUnsupported)
            && contributed.contains(Flag::SubscriptionsUnsupported)
        {
            return Err(ComposeError::SubscriptionsRequired {
                link: link.to_string(),
            });
        }
        return Err(ComposeError::AfterBuilt {
            link: link.to_string(),
        });
    }

    Ok(())
}

/// Validate calling `build` on a pipeline whose flags are `current`.
pub fn check_build(current: FlagSet) -> Result<(), ComposeError> {
    if current.contains(Flag::Built) {
        return Err(ComposeError::AlreadyBuilt);
    }
    if current.contains(Flag::TerminatedLink) {
        return Err(ComposeError::BuildAfterTerminated);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn flag_set() -> impl Strategy<Value = FlagSet> {
        (any::<bool>(), any::<bool>(), any::<bool>())
            .prop_map(|(b, t, s)| FlagSet::from_bools(b, t, s))
    }

    #[test]
    fn test_empty_set_has_no_flags() {
        let set = FlagSet::new();
        assert!(set.is_empty());
        for flag in Flag::ALL {
            assert!(!has_flag(set, flag));
        }
        assert!(!has_any_flag(set, &Flag::ALL));
    }

    #[test]
    fn test_has_any_flag_with_empty_query() {
        let set = FlagSet::from(Flag::Built);
        assert!(!has_any_flag(set, &[]));
        assert!(has_any_flag(set, &[Flag::TerminatedLink, Flag::Built]));
    }

    #[test]
    fn test_display_uses_wire_names() {
        let set = FlagSet::from_bools(true, false, true);
        assert_eq!(set.to_string(), "{built, subscriptionsUnsupported}");
        assert_eq!(FlagSet::EMPTY.to_string(), "{}");
    }

    #[test]
    fn test_flag_from_str() {
        assert_eq!("terminatedLink".parse::<Flag>(), Ok(Flag::TerminatedLink));
        assert!("terminated".parse::<Flag>().is_err());
    }

    #[test]
    fn test_client_state_from_flags() {
        assert_eq!(ClientState::from_flags(FlagSet::EMPTY), ClientState::Open);
        assert_eq!(
            ClientState::from_flags(Flag::SubscriptionsUnsupported.into()),
            ClientState::Open
        );
        assert_eq!(
            ClientState::from_flags(Flag::TerminatedLink.into()),
            ClientState::Terminated
        );
        assert_eq!(
            ClientState::from_flags(FlagSet::from_bools(true, false, true)),
            ClientState::Built
        );
        assert_eq!(
            ClientState::from_flags(FlagSet::from_bools(true, true, false)),
            ClientState::BuiltAndTerminated
        );
    }

    #[test]
    fn test_check_attach_after_terminated() {
        let current = FlagSet::from(Flag::TerminatedLink);
        assert_eq!(
            check_attach(current, FlagSet::EMPTY, "logger"),
            Err(ComposeError::AfterTerminated {
                link: "logger".into()
            })
        );
    }

    #[test]
    fn test_check_attach_subscription_conflict() {
        let current = FlagSet::from(Flag::Built);
        assert_eq!(
            check_attach(current, Flag::SubscriptionsUnsupported.into(), "http"),
            Err(ComposeError::SubscriptionsRequired {
                link: "http".into()
            })
        );
    }

    #[test]
    fn test_check_attach_after_built_without_subscriptions() {
        let current = FlagSet::from_bools(true, false, true);
        assert_eq!(
            check_attach(current, Flag::SubscriptionsUnsupported.into(), "http"),
            Err(ComposeError::AfterBuilt {
                link: "http".into()
            })
        );
    }

    #[test]
    fn test_check_build() {
        assert_eq!(check_build(FlagSet::EMPTY), Ok(()));
        assert_eq!(
            check_build(Flag::Built.into()),
            Err(ComposeError::AlreadyBuilt)
        );
        assert_eq!(
            check_build(Flag::TerminatedLink.into()),
            Err(ComposeError::BuildAfterTerminated)
        );
    }

    proptest! {
        #[test]
        fn prop_merge_is_commutative(a in flag_set(), b in flag_set()) {
            prop_assert_eq!(merge_flags(a, b), merge_flags(b, a));
        }

        #[test]
        fn prop_merge_is_monotonic(a in flag_set(), b in flag_set()) {
            let merged = merge_flags(a, b);
            for flag in a.iter().chain(b.iter()) {
                prop_assert!(has_flag(merged, flag));
            }
            for flag in merged.iter() {
                prop_assert!(has_flag(a, flag) || has_flag(b, flag));
            }
        }

        #[test]
        fn prop_merge_is_idempotent(a in flag_set()) {
            prop_assert_eq!(merge_flags(a, a), a);
        }

        #[test]
        fn prop_open_sets_accept_any_link(s in any::<bool>(), contributed in flag_set()) {
            let current = FlagSet::from_bools(false, false, s);
            prop_assert!(check_attach(current, contributed, "link").is_ok());
        }

        #[test]
        fn prop_closed_sets_reject_every_link(
            b in any::<bool>(),
            t in any::<bool>(),
            s in any::<bool>(),
            contributed in flag_set(),
        ) {
            prop_assume!(b || t);
            let current = FlagSet::from_bools(b, t, s);
            prop_assert!(check_attach(current, contributed, "link").is_err());
        }
    }
}
