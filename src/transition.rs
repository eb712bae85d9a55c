//! Cost-labelled transition relations.
//!
//! A relation only mentions the facts its operators change: for every
//! effect fact `i` it constrains the successor variable `2i+2`, and all other
//! facts keep their pre-state variable during image computation. Relations
//! with different effect sets are merged by adding frame axioms for the
//! facts only one side changes.

use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use log::debug;

use crate::error::Result;
use crate::reference::Ref;
use crate::task::{Operator, OperatorId};
use crate::vars::{SwapMapping, SymVariables};

#[derive(Clone)]
pub struct TransitionRelation {
    vars: Rc<SymVariables>,
    cost: u32,
    tr: Ref,
    ops_ids: BTreeSet<OperatorId>,
    eff_facts: BTreeSet<usize>,
    exists_pre: Ref,
    exists_succ: Ref,
    swap: SwapMapping,
}

impl Debug for TransitionRelation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionRelation")
            .field("cost", &self.cost)
            .field("tr", &self.tr)
            .field("ops", &self.ops_ids)
            .field("eff_facts", &self.eff_facts)
            .finish()
    }
}

impl TransitionRelation {
    pub fn from_operator(vars: Rc<SymVariables>, id: OperatorId, op: &Operator) -> Self {
        let bdd = vars.bdd();
        let pre = vars.partial_state_bdd(&op.preconditions);
        let eff = bdd.apply_and_many(op.effects.iter().map(|&e| vars.succ_fact_bdd(e)));
        let tr = bdd.apply_and(pre, eff);
        let eff_facts: BTreeSet<usize> = op.effects.iter().map(|e| e.var).collect();
        debug!(
            "TR for '{}' (cost {}): {} nodes, {} effect facts",
            op.name,
            op.cost,
            bdd.size(tr),
            eff_facts.len()
        );
        Self::new(vars, op.cost, tr, BTreeSet::from([id]), eff_facts)
    }

    fn new(
        vars: Rc<SymVariables>,
        cost: u32,
        tr: Ref,
        ops_ids: BTreeSet<OperatorId>,
        eff_facts: BTreeSet<usize>,
    ) -> Self {
        let exists_pre = vars.pre_cube(eff_facts.iter().copied());
        let exists_succ = vars.succ_cube(eff_facts.iter().copied());
        let swap = vars.swap_mapping(eff_facts.iter().copied());
        Self {
            vars,
            cost,
            tr,
            ops_ids,
            eff_facts,
            exists_pre,
            exists_succ,
            swap,
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn tr(&self) -> Ref {
        self.tr
    }

    pub fn ops_ids(&self) -> &BTreeSet<OperatorId> {
        &self.ops_ids
    }

    pub fn eff_facts(&self) -> &BTreeSet<usize> {
        &self.eff_facts
    }

    /// Representative operator of the relation.
    pub fn first_op(&self) -> Option<OperatorId> {
        self.ops_ids.iter().next().copied()
    }

    pub fn size(&self) -> u64 {
        self.vars.bdd().size(self.tr)
    }

    /// Successors of `from`, failing with `Error::NodeLimit` above `max_nodes` new nodes.
    pub fn image(&self, from: Ref, max_nodes: usize) -> Result<Ref> {
        let bdd = self.vars.bdd();
        let aux = bdd.and_exists(from, self.tr, self.exists_pre, max_nodes)?;
        Ok(self.vars.swap_succ_to_pre(aux, &self.swap))
    }

    /// Predecessors of `to`, failing with `Error::NodeLimit` above `max_nodes` new nodes.
    pub fn preimage(&self, to: Ref, max_nodes: usize) -> Result<Ref> {
        let bdd = self.vars.bdd();
        let swapped = self.vars.swap_pre_to_succ(to, &self.swap);
        bdd.and_exists(swapped, self.tr, self.exists_succ, max_nodes)
    }

    /// Disjunction with `other`, keeping `self` unchanged if the result exceeds `max_nodes`.
    pub fn merge(&mut self, other: &TransitionRelation, max_nodes: usize) -> Result<()> {
        assert_eq!(self.cost, other.cost, "Only relations of equal cost can be merged");
        let bdd = self.vars.bdd();

        let only_other: Vec<usize> = other.eff_facts.difference(&self.eff_facts).copied().collect();
        let only_self: Vec<usize> = self.eff_facts.difference(&other.eff_facts).copied().collect();

        let tr1 = bdd.apply_and(self.tr, self.vars.frame_axioms(only_other));
        let tr2 = bdd.apply_and(other.tr, self.vars.frame_axioms(only_self));
        let tr = bdd.apply_or_limited(tr1, tr2, max_nodes)?;

        let eff_facts = self.eff_facts.union(&other.eff_facts).copied().collect();
        let ops_ids = self.ops_ids.union(&other.ops_ids).copied().collect();
        *self = Self::new(self.vars.clone(), self.cost, tr, ops_ids, eff_facts);
        Ok(())
    }

    /// Add the operators of a relation with the same semantics.
    pub fn absorb_ops(&mut self, other: &TransitionRelation) {
        self.ops_ids.extend(other.ops_ids.iter().copied());
    }

    /// Whether both relations denote the same transitions over the same effect facts.
    pub fn same_transitions(&self, other: &TransitionRelation) -> bool {
        self.cost == other.cost && self.tr == other.tr && self.eff_facts == other.eff_facts
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::error::Error;
    use crate::task::Fact;

    fn setup() -> Rc<SymVariables> {
        Rc::new(SymVariables::new(vec!["a".into(), "b".into(), "c".into()], 10))
    }

    #[test]
    fn test_image_and_preimage() {
        let vars = setup();
        // a ∧ ¬b  ->  b
        let op = Operator::new("o", 1).pre(Fact::pos(0)).pre(Fact::neg(1)).eff(Fact::pos(1));
        let tr = TransitionRelation::from_operator(vars.clone(), OperatorId(0), &op);

        let s = vars.state_bdd(&[true, false, true]);
        let t = tr.image(s, usize::MAX).unwrap();
        assert_eq!(t, vars.state_bdd(&[true, true, true]));

        let back = tr.preimage(t, usize::MAX).unwrap();
        assert_eq!(back, vars.state_bdd(&[true, false, true]));

        // Not applicable
        let s = vars.state_bdd(&[false, false, true]);
        assert_eq!(tr.image(s, usize::MAX).unwrap(), vars.zero());
    }

    #[test]
    fn test_preimage_of_set() {
        let vars = setup();
        // ¬c -> c, from any state with ¬c
        let op = Operator::new("set-c", 2).pre(Fact::neg(2)).eff(Fact::pos(2));
        let tr = TransitionRelation::from_operator(vars.clone(), OperatorId(0), &op);

        let goal = vars.partial_state_bdd(&[Fact::pos(2)]);
        let pre = tr.preimage(goal, usize::MAX).unwrap();
        assert_eq!(pre, vars.partial_state_bdd(&[Fact::neg(2)]));
    }

    #[test]
    fn test_merge_adds_frame() {
        let vars = setup();
        let op_a = Operator::new("set-a", 1).eff(Fact::pos(0));
        let op_b = Operator::new("set-b", 1).eff(Fact::pos(1));
        let mut tr = TransitionRelation::from_operator(vars.clone(), OperatorId(0), &op_a);
        let tr_b = TransitionRelation::from_operator(vars.clone(), OperatorId(1), &op_b);
        tr.merge(&tr_b, usize::MAX).unwrap();

        assert_eq!(tr.ops_ids().len(), 2);
        let s = vars.state_bdd(&[false, false, false]);
        let t = tr.image(s, usize::MAX).unwrap();
        let expected = vars.bdd().apply_or(
            vars.state_bdd(&[true, false, false]),
            vars.state_bdd(&[false, true, false]),
        );
        assert_eq!(t, expected);
    }

    #[test]
    fn test_merge_refused_over_budget() {
        let vars = setup();
        let op_a = Operator::new("set-a", 1).pre(Fact::pos(2)).eff(Fact::pos(0));
        let op_b = Operator::new("set-b", 1).pre(Fact::neg(2)).eff(Fact::pos(1));
        let mut tr = TransitionRelation::from_operator(vars.clone(), OperatorId(0), &op_a);
        let before = tr.tr();
        let tr_b = TransitionRelation::from_operator(vars.clone(), OperatorId(1), &op_b);
        assert!(matches!(tr.merge(&tr_b, 2), Err(Error::NodeLimit { limit: 2 })));
        assert_eq!(tr.tr(), before);
        assert_eq!(tr.ops_ids().len(), 1);
    }

    #[test]
    fn test_image_node_limit() {
        let vars = setup();
        let op = Operator::new("set-a", 1).pre(Fact::neg(0)).eff(Fact::pos(0));
        let tr = TransitionRelation::from_operator(vars.clone(), OperatorId(0), &op);
        let s = vars.bdd().apply_or(
            vars.state_bdd(&[false, true, true]),
            vars.state_bdd(&[false, false, false]),
        );
        assert!(matches!(tr.image(s, 0), Err(Error::NodeLimit { limit: 0 })));
        let t = tr.image(s, usize::MAX).unwrap();
        assert_eq!(
            t,
            vars.bdd().apply_or(
                vars.state_bdd(&[true, true, true]),
                vars.state_bdd(&[true, false, false]),
            )
        );
    }
}
