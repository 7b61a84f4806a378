//! Path state
//!
//! Which variables have been updated along the current control-flow path, and
//! which of them no longer have a single known value. Branching constructs
//! walk each alternative on a clone and join the results with
//! [`PogState::combine`].
//!
//! Block scopes are linked: a child owns its parent through `outer`. Updates
//! to names declared local to a scope are recorded there; everything else is
//! forwarded outwards until it reaches the scope that declared it, or the
//! root.

use std::collections::{BTreeMap, BTreeSet};
use vdm_core::span::Span;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PogState {
    /// Name -> span of its latest update
    updated: BTreeMap<String, Span>,
    /// Name -> span since which its value is ambiguous
    ambiguous: BTreeMap<String, Span>,
    /// Names declared in this scope
    locals: BTreeSet<String>,
    /// Span of an opaque operation call, if one happened in this scope
    op_call: Option<Span>,
    outer: Option<Box<PogState>>,
}

impl PogState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a child scope owning `self`
    pub fn link(self) -> PogState {
        PogState {
            outer: Some(Box::new(self)),
            ..PogState::default()
        }
    }

    /// Leave this scope, returning the parent (or `self` at the root)
    pub fn unlink(self) -> PogState {
        match self.outer {
            Some(outer) => *outer,
            None => self,
        }
    }

    pub fn declare_local(&mut self, name: impl Into<String>) {
        self.locals.insert(name.into());
    }

    /// Is `name` declared local in this scope or an enclosing one?
    pub fn is_local(&self, name: &str) -> bool {
        self.locals.contains(name) || self.outer.as_ref().is_some_and(|o| o.is_local(name))
    }

    /// The scope that records updates of `name`
    fn owner(&self, name: &str) -> &PogState {
        if self.locals.contains(name) {
            return self;
        }
        match &self.outer {
            Some(outer) => outer.owner(name),
            None => self,
        }
    }

    /// Run `f` on the scope that records updates of `name`
    fn with_owner<R>(&mut self, name: &str, f: impl FnOnce(&mut PogState) -> R) -> R {
        if !self.locals.contains(name) {
            if let Some(outer) = self.outer.as_deref_mut() {
                return outer.with_owner(name, f);
            }
        }
        f(self)
    }

    fn root(&self) -> &PogState {
        match &self.outer {
            Some(outer) => outer.root(),
            None => self,
        }
    }

    /// Record an update of `name` at `span`
    ///
    /// An unambiguous update gives the variable a known value again.
    pub fn did_update_state(&mut self, name: &str, span: Span, ambiguous: bool) {
        self.with_owner(name, |owner| {
            owner.updated.insert(name.to_string(), span);
            if ambiguous {
                owner.ambiguous.entry(name.to_string()).or_insert(span);
            } else {
                owner.ambiguous.remove(name);
            }
        });
    }

    /// Record an opaque call after which any state may have changed
    ///
    /// Callers also mark each state variable they know of as ambiguous.
    pub fn did_update_all_state(&mut self, span: Span) {
        match self.outer {
            Some(ref mut outer) => outer.did_update_all_state(span),
            None => self.op_call = Some(self.op_call.map_or(span, |s| s.min(span))),
        }
    }

    pub fn is_updated(&self, name: &str) -> bool {
        self.owner(name).updated.contains_key(name)
    }

    pub fn is_ambiguous(&self, name: &str) -> bool {
        self.owner(name).ambiguous.contains_key(name)
    }

    pub fn not_ambiguous(&self, name: &str) -> bool {
        !self.is_ambiguous(name)
    }

    /// Span since which `name` is ambiguous
    pub fn ambiguous_since(&self, name: &str) -> Option<Span> {
        self.owner(name).ambiguous.get(name).copied()
    }

    pub fn has_ambiguous_state<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> bool {
        names.into_iter().any(|n| self.is_ambiguous(n))
    }

    /// Has any non-local variable been updated, or an opaque call happened?
    pub fn has_updated_state(&self) -> bool {
        let root = self.root();
        root.op_call.is_some() || !root.updated.is_empty()
    }

    pub fn opaque_call(&self) -> Option<Span> {
        self.root().op_call
    }

    /// All ambiguous names visible from this scope
    pub fn ambiguous_names(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self
            .outer
            .as_ref()
            .map(|o| o.ambiguous_names())
            .unwrap_or_default();
        names.extend(self.ambiguous.keys().cloned());
        names
    }

    /// Join `other` into `self`
    ///
    /// A variable is ambiguous afterwards iff it is ambiguous on either side
    /// or its update status differs between the sides. Spans merge by
    /// minimum, so the join is associative and commutative.
    pub fn combine_with(&mut self, other: &PogState) {
        let names: BTreeSet<String> = self
            .updated
            .keys()
            .chain(self.ambiguous.keys())
            .chain(other.updated.keys())
            .chain(other.ambiguous.keys())
            .cloned()
            .collect();

        for name in names {
            let mine = self.updated.get(&name).copied();
            let theirs = other.updated.get(&name).copied();
            let was_ambiguous =
                self.ambiguous.contains_key(&name) || other.ambiguous.contains_key(&name);

            let differs = mine != theirs;
            if was_ambiguous || differs {
                let (a, b) = if differs { (mine, theirs) } else { (None, None) };
                let since = [
                    self.ambiguous.get(&name).copied(),
                    other.ambiguous.get(&name).copied(),
                    a,
                    b,
                ]
                .into_iter()
                .flatten()
                .min();
                if let Some(since) = since {
                    self.ambiguous.insert(name.clone(), since);
                }
            }

            let latest = [mine, theirs].into_iter().flatten().min();
            if let Some(latest) = latest {
                self.updated.insert(name, latest);
            }
        }

        self.locals.extend(other.locals.iter().cloned());
        self.op_call = match (self.op_call, other.op_call) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        if self.outer.is_none() {
            self.outer = other.outer.clone();
        } else if let (Some(mine), Some(theirs)) =
            (self.outer.as_deref_mut(), other.outer.as_deref())
        {
            mine.combine_with(theirs);
        }
    }

    /// Join a set of alternative states
    pub fn combine(states: impl IntoIterator<Item = PogState>) -> PogState {
        let mut iter = states.into_iter();
        match iter.next() {
            Some(mut first) => {
                for state in iter {
                    first.combine_with(&state);
                }
                first
            }
            None => PogState::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdm_core::span::FileId;

    fn at(line: u32) -> Span {
        Span::point(FileId(0), line, 1)
    }

    #[test]
    fn test_unambiguous_update_clears_ambiguity() {
        let mut s = PogState::new();
        s.did_update_state("x", at(1), true);
        assert!(s.is_ambiguous("x"));
        s.did_update_state("x", at(2), false);
        assert!(s.not_ambiguous("x"));
        assert!(s.is_updated("x"));
    }

    #[test]
    fn test_one_sided_update_is_ambiguous() {
        let base = PogState::new();
        let mut then = base.clone();
        then.did_update_state("x", at(3), false);
        let joined = PogState::combine([then, base]);
        assert!(joined.is_ambiguous("x"));
        assert_eq!(joined.ambiguous_since("x"), Some(at(3)));
    }

    #[test]
    fn test_same_update_on_both_sides_stays_known() {
        let mut base = PogState::new();
        base.did_update_state("x", at(1), false);
        let joined = PogState::combine([base.clone(), base]);
        assert!(joined.not_ambiguous("x"));
    }

    #[test]
    fn test_ambiguity_survives_join() {
        let mut before = PogState::new();
        before.did_update_state("x", at(1), true);
        let mut then = before.clone();
        then.did_update_state("y", at(2), false);
        let joined = PogState::combine([then, before]);
        assert!(joined.is_ambiguous("x"));
    }

    #[test]
    fn test_locals_are_recorded_in_their_scope() {
        let mut outer = PogState::new();
        outer.did_update_state("s", at(1), false);
        let mut inner = outer.link();
        inner.declare_local("tmp");
        inner.did_update_state("tmp", at(2), false);
        inner.did_update_state("s", at(3), true);
        assert!(inner.is_local("tmp"));
        assert!(inner.is_ambiguous("s"));

        let outer = inner.unlink();
        assert!(!outer.is_updated("tmp"));
        assert!(outer.is_ambiguous("s"));
        assert!(outer.has_updated_state());
    }

    #[test]
    fn test_opaque_call_reaches_root() {
        let mut inner = PogState::new().link();
        inner.did_update_all_state(at(4));
        assert!(inner.has_updated_state());
        assert_eq!(inner.unlink().opaque_call(), Some(at(4)));
    }

    #[test]
    fn test_update_reaches_declaring_scope_through_nesting() {
        let mut middle = PogState::new().link();
        middle.declare_local("i");
        let mut inner = middle.link();
        inner.did_update_state("i", at(5), false);
        inner.did_update_state("s", at(6), true);
        assert!(inner.has_updated_state());

        let middle = inner.unlink();
        assert!(middle.is_updated("i"));
        let root = middle.unlink();
        assert!(!root.is_updated("i"));
        assert_eq!(root.ambiguous_since("s"), Some(at(6)));
    }
}
