//! Assignment targets

use super::Walker;
use crate::context::ContextStack;
use crate::obligation::ObligationKind;
use crate::state::PogState;
use std::collections::BTreeSet;
use vdm_core::ast::Designator;
use vdm_core::pretty::{pretty_designator, pretty_expr};

impl Walker<'_> {
    /// Index obligations of a designator, outermost object first
    pub(super) fn designator_obligations(
        &mut self,
        ctx: &mut ContextStack,
        state: &PogState,
        designator: &Designator,
    ) {
        match designator {
            Designator::Name(_) => {}
            Designator::Field { object, .. } => self.designator_obligations(ctx, state, object),
            Designator::MapSeq {
                object,
                index,
                object_ty,
            } => {
                self.designator_obligations(ctx, state, object);
                self.expr_obligations(ctx, state, index);
                if object_ty.is_seq() {
                    let predicate = format!(
                        "{} in set inds {}",
                        pretty_expr(index),
                        pretty_designator(object)
                    );
                    let mut reads = designator_reads(designator);
                    reads.insert(designator.root().to_string());
                    self.emit(
                        ctx,
                        state,
                        ObligationKind::SeqApply,
                        &predicate,
                        reads,
                        index.span,
                    );
                }
            }
        }
    }
}

/// Variables whose current value an update through `designator` depends on
pub(super) fn designator_reads(designator: &Designator) -> BTreeSet<String> {
    let mut reads = BTreeSet::new();
    collect_reads(designator, &mut reads);
    if !matches!(designator, Designator::Name(_)) {
        reads.insert(designator.root().to_string());
    }
    reads
}

fn collect_reads(designator: &Designator, reads: &mut BTreeSet<String>) {
    match designator {
        Designator::Name(_) => {}
        Designator::Field { object, .. } => collect_reads(object, reads),
        Designator::MapSeq { object, index, .. } => {
            collect_reads(object, reads);
            reads.extend(index.free_vars());
        }
    }
}

/// New value of the root variable after `designator := value`
///
/// `base` is the current text of the root, normally its name.
pub(super) fn update_value(designator: &Designator, value: &str, base: &str) -> String {
    match designator {
        Designator::Name(_) => value.to_string(),
        Designator::Field { object, field } => {
            let current = designator_text(object, base);
            update_value(
                object,
                &format!("mu({}, {} |-> {})", current, field, value),
                base,
            )
        }
        Designator::MapSeq { object, index, .. } => {
            let current = designator_text(object, base);
            update_value(
                object,
                &format!("{} ++ {{{} |-> {}}}", parenthesize(&current), pretty_expr(index), value),
                base,
            )
        }
    }
}

/// Text of the value `designator` denotes, with its root replaced by `base`
pub(super) fn designator_text(designator: &Designator, base: &str) -> String {
    match designator {
        Designator::Name(_) => base.to_string(),
        Designator::Field { object, field } => {
            format!("{}.{}", parenthesize(&designator_text(object, base)), field)
        }
        Designator::MapSeq { object, index, .. } => format!(
            "{}({})",
            parenthesize(&designator_text(object, base)),
            pretty_expr(index)
        ),
    }
}

fn parenthesize(text: &str) -> String {
    if text.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '`' | '$' | '.' | '(' | ')')) {
        text.to_string()
    } else {
        format!("({})", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdm_core::ast::{Expr, ExprKind};
    use vdm_core::span::Span;
    use vdm_core::types::Type;

    fn name(n: &str) -> Box<Designator> {
        Box::new(Designator::Name(n.into()))
    }

    fn var(n: &str) -> Box<Expr> {
        Box::new(Expr::new(ExprKind::Var(n.into()), Type::Nat, Span::dummy()))
    }

    #[test]
    fn test_field_update_becomes_mu() {
        let d = Designator::Field {
            object: name("r"),
            field: "f".into(),
        };
        assert_eq!(update_value(&d, "1", "r"), "mu(r, f |-> 1)");
    }

    #[test]
    fn test_nested_map_update() {
        let d = Designator::MapSeq {
            object: Box::new(Designator::Field {
                object: name("r"),
                field: "m".into(),
            }),
            index: var("k"),
            object_ty: Type::map_of(Type::Nat, Type::Nat),
        };
        assert_eq!(
            update_value(&d, "v", "r"),
            "mu(r, m |-> r.m ++ {k |-> v})"
        );
        assert_eq!(designator_reads(&d), ["k", "r"].map(String::from).into());
    }
}
