//! The symbolic state space of a planning task.

use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, info};

use crate::config::SearchParams;
use crate::error::Result;
use crate::reference::Ref;
use crate::task::{OperatorId, PlanningTask};
use crate::transition::TransitionRelation;
use crate::vars::SymVariables;

/// Initial state, goal and transition relations grouped by cost.
///
/// Search uses the merged relations; plan reconstruction uses the individual
/// ones, where operators with identical transitions share one relation.
#[derive(Debug)]
pub struct StateSpace {
    vars: Rc<SymVariables>,
    initial: Ref,
    goal: Ref,
    transitions: BTreeMap<u32, Vec<TransitionRelation>>,
    individual: BTreeMap<u32, Vec<TransitionRelation>>,
    /// Operator -> (cost, index into `individual[cost]`)
    op_relation: Vec<(u32, usize)>,
}

impl StateSpace {
    pub fn from_task(vars: Rc<SymVariables>, task: &PlanningTask, params: &SearchParams) -> Result<Self> {
        task.validate()?;

        let initial = vars.state_bdd(&task.initial_state);
        let goal = vars.partial_state_bdd(&task.goal);

        let mut individual: BTreeMap<u32, Vec<TransitionRelation>> = BTreeMap::new();
        let mut op_relation = Vec::with_capacity(task.operators.len());
        for (i, op) in task.operators.iter().enumerate() {
            let tr = TransitionRelation::from_operator(vars.clone(), OperatorId(i), op);
            let group = individual.entry(op.cost).or_default();
            let index = match group.iter().position(|other| other.same_transitions(&tr)) {
                Some(index) => {
                    group[index].absorb_ops(&tr);
                    index
                }
                None => {
                    group.push(tr);
                    group.len() - 1
                }
            };
            op_relation.push((op.cost, index));
        }

        let transitions = individual
            .iter()
            .map(|(&cost, group)| (cost, merge_relations(group.clone(), params.max_tr_nodes)))
            .collect::<BTreeMap<_, _>>();

        for (cost, group) in &transitions {
            info!(
                "Cost {}: {} relations ({} operators) merged into {}",
                cost,
                individual[cost].len(),
                individual[cost].iter().map(|tr| tr.ops_ids().len()).sum::<usize>(),
                group.len()
            );
        }

        Ok(Self {
            vars,
            initial,
            goal,
            transitions,
            individual,
            op_relation,
        })
    }

    pub fn vars(&self) -> &Rc<SymVariables> {
        &self.vars
    }

    pub fn initial(&self) -> Ref {
        self.initial
    }

    pub fn goal(&self) -> Ref {
        self.goal
    }

    /// Merged relations, used for expansion.
    pub fn transitions(&self) -> &BTreeMap<u32, Vec<TransitionRelation>> {
        &self.transitions
    }

    /// One relation per distinct operator semantics, used for plan reconstruction.
    pub fn individual_transitions(&self) -> &BTreeMap<u32, Vec<TransitionRelation>> {
        &self.individual
    }

    pub fn has_zero_cost(&self) -> bool {
        self.transitions.contains_key(&0)
    }

    /// Most expensive operator cost, 0 without operators.
    pub fn max_cost(&self) -> u32 {
        self.transitions.keys().next_back().copied().unwrap_or(0)
    }

    pub fn op_cost(&self, id: OperatorId) -> u32 {
        self.op_relation[id.0].0
    }

    pub fn relation_of(&self, id: OperatorId) -> &TransitionRelation {
        let (cost, index) = self.op_relation[id.0];
        &self.individual[&cost][index]
    }

    /// States reached from `set` by applying `ops` in order.
    pub fn apply_operators(&self, set: Ref, ops: &[OperatorId]) -> Result<Ref> {
        ops.iter()
            .try_fold(set, |acc, &id| self.relation_of(id).image(acc, usize::MAX))
    }
}

/// Merge relations pairwise, round after round, until no pair fits the node budget.
fn merge_relations(mut relations: Vec<TransitionRelation>, max_nodes: usize) -> Vec<TransitionRelation> {
    loop {
        let before = relations.len();
        let mut merged = Vec::with_capacity(before / 2 + 1);
        let mut iter = relations.into_iter();
        while let Some(mut first) = iter.next() {
            match iter.next() {
                Some(second) => match first.merge(&second, max_nodes) {
                    Ok(()) => merged.push(first),
                    Err(e) => {
                        debug!("Not merging relations: {}", e);
                        merged.push(first);
                        merged.push(second);
                    }
                },
                None => merged.push(first),
            }
        }
        relations = merged;
        if relations.len() == before || relations.len() == 1 {
            return relations;
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::task::{Fact, Operator};

    fn chain_task() -> PlanningTask {
        PlanningTask {
            variables: vec!["a".into(), "b".into(), "c".into()],
            operators: vec![
                Operator::new("set-a", 1).pre(Fact::neg(0)).eff(Fact::pos(0)),
                Operator::new("set-b", 1).pre(Fact::pos(0)).eff(Fact::pos(1)),
                Operator::new("set-b-again", 1).pre(Fact::pos(0)).eff(Fact::pos(1)),
                Operator::new("set-c", 0).pre(Fact::pos(1)).eff(Fact::pos(2)),
            ],
            initial_state: vec![false, false, false],
            goal: vec![Fact::pos(2)],
            ..PlanningTask::default()
        }
    }

    #[test]
    fn test_from_task() {
        let task = chain_task();
        let vars = Rc::new(SymVariables::new(task.variables.clone(), 10));
        let space = StateSpace::from_task(vars.clone(), &task, &SearchParams::default()).unwrap();

        assert!(space.has_zero_cost());
        assert_eq!(space.transitions()[&1].len(), 1);
        // Operators 1 and 2 share one relation.
        assert_eq!(space.individual_transitions()[&1].len(), 2);
        assert_eq!(space.relation_of(OperatorId(1)).ops_ids().len(), 2);
        assert_eq!(space.op_cost(OperatorId(3)), 0);
        assert_eq!(space.max_cost(), 1);
    }

    #[test]
    fn test_apply_operators() {
        let task = chain_task();
        let vars = Rc::new(SymVariables::new(task.variables.clone(), 10));
        let space = StateSpace::from_task(vars.clone(), &task, &SearchParams::default()).unwrap();

        let end = space
            .apply_operators(space.initial(), &[OperatorId(0), OperatorId(1), OperatorId(3)])
            .unwrap();
        assert_eq!(end, vars.state_bdd(&[true, true, true]));
        assert!(vars.bdd().is_implies(end, space.goal()));

        let stuck = space.apply_operators(space.initial(), &[OperatorId(1)]).unwrap();
        assert_eq!(stuck, vars.zero());
    }

    #[test]
    fn test_merge_budget_keeps_relations_apart() {
        let task = chain_task();
        let vars = Rc::new(SymVariables::new(task.variables.clone(), 10));
        let params = SearchParams {
            max_tr_nodes: 1,
            ..SearchParams::default()
        };
        let space = StateSpace::from_task(vars, &task, &params).unwrap();
        assert_eq!(space.transitions()[&1].len(), 2);
    }
}
