//! Property-based tests for path-state joins
//!
//! The join of alternative paths must not depend on the order in which the
//! alternatives are visited.

use proptest::prelude::*;
use vdm_core::span::{FileId, Span};
use vdm_pog::PogState;

// ============================================================================
// Helper functions
// ============================================================================

const NAMES: [&str; 3] = ["x", "y", "z"];

/// Build a path state from a sequence of (name, line, ambiguous) updates
fn state_from(updates: &[(usize, u32, bool)]) -> PogState {
    let mut state = PogState::new();
    for &(name, line, ambiguous) in updates {
        state.did_update_state(NAMES[name], Span::point(FileId(0), line, 1), ambiguous);
    }
    state
}

fn updates() -> impl Strategy<Value = Vec<(usize, u32, bool)>> {
    proptest::collection::vec((0..NAMES.len(), 1u32..6, any::<bool>()), 0..6)
}

// ============================================================================
// Join laws
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_join_commutative(a in updates(), b in updates()) {
        let (a, b) = (state_from(&a), state_from(&b));
        let ab = PogState::combine([a.clone(), b.clone()]);
        let ba = PogState::combine([b, a]);
        prop_assert_eq!(ab, ba);
    }

    #[test]
    fn prop_join_associative(a in updates(), b in updates(), c in updates()) {
        let (a, b, c) = (state_from(&a), state_from(&b), state_from(&c));
        let left = PogState::combine([PogState::combine([a.clone(), b.clone()]), c.clone()]);
        let right = PogState::combine([a, PogState::combine([b, c])]);
        prop_assert_eq!(left, right);
    }

    #[test]
    fn prop_join_never_loses_ambiguity(a in updates(), b in updates()) {
        let (a, b) = (state_from(&a), state_from(&b));
        let joined = PogState::combine([a.clone(), b.clone()]);
        for name in NAMES {
            if a.is_ambiguous(name) || b.is_ambiguous(name) {
                prop_assert!(joined.is_ambiguous(name));
            }
        }
    }

    #[test]
    fn prop_join_with_self_is_identity(a in updates()) {
        let a = state_from(&a);
        prop_assert_eq!(PogState::combine([a.clone(), a.clone()]), a);
    }
}
