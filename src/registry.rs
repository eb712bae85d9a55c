//! Bookkeeping of solution cuts and reconstructed plans.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info};

use crate::bdd::Bdd;
use crate::error::Result;
use crate::solution::{ExtractionContext, SolutionCut, SymSolution};
use crate::task::{OperatorId, Plan};

/// Distinct plans, up to a desired number.
#[derive(Debug, Clone)]
pub struct PlanDataBase {
    num_desired: usize,
    plans: Vec<Plan>,
    seen: HashSet<Vec<OperatorId>>,
}

impl PlanDataBase {
    pub fn new(num_desired: usize) -> Self {
        Self {
            num_desired,
            plans: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Store `plan` unless an identical operator sequence is already stored.
    pub fn add_plan(&mut self, plan: Plan) -> bool {
        if self.found_enough_plans() || !self.seen.insert(plan.operators.clone()) {
            return false;
        }
        self.plans.push(plan);
        true
    }

    pub fn found_enough_plans(&self) -> bool {
        self.plans.len() >= self.num_desired
    }

    pub fn num_desired(&self) -> usize {
        self.num_desired
    }

    pub fn num_plans(&self) -> usize {
        self.plans.len()
    }

    pub fn first_plan(&self) -> Option<&Plan> {
        self.plans.first()
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }
}

/// Collects cuts by plan cost and turns them into plans on demand.
///
/// The upper bound is the cost of the cheapest accepted cut; a cut is only
/// accepted while it is strictly cheaper than the current bound.
#[derive(Debug, Clone)]
pub struct SolutionRegistry {
    solutions: BTreeMap<u32, SymSolution>,
    plans: PlanDataBase,
    upper_bound: u32,
}

impl SolutionRegistry {
    pub fn new(num_desired: usize, upper_bound: u32) -> Self {
        Self {
            solutions: BTreeMap::new(),
            plans: PlanDataBase::new(num_desired),
            upper_bound,
        }
    }

    pub fn upper_bound(&self) -> u32 {
        self.upper_bound
    }

    pub fn plans(&self) -> &PlanDataBase {
        &self.plans
    }

    pub fn found_all_plans(&self) -> bool {
        self.plans.found_enough_plans()
    }

    /// Record `cut` if it improves the upper bound, and tighten the bound.
    pub fn register_solution(&mut self, bdd: &Bdd, cut: SolutionCut) -> bool {
        let f = cut.f();
        if self.found_all_plans() || f >= self.upper_bound {
            return false;
        }
        info!("New upper bound: {} -> {} (g={}, h={})", self.upper_bound, f, cut.g, cut.h);
        self.upper_bound = f;
        self.insert_cut(bdd, cut);
        true
    }

    /// Record `cut` without touching the upper bound.
    pub fn insert_cut(&mut self, bdd: &Bdd, cut: SolutionCut) {
        self.solutions.entry(cut.f()).or_default().add(bdd, cut);
    }

    /// Forget every cut and keep only `cut`.
    pub fn replace_cuts(&mut self, bdd: &Bdd, cut: SolutionCut) {
        self.solutions.clear();
        self.insert_cut(bdd, cut);
    }

    pub fn has_solutions(&self) -> bool {
        !self.solutions.is_empty()
    }

    pub fn cheapest_solution_cost_found(&self) -> Option<u32> {
        self.solutions.keys().next().copied()
    }

    /// Reconstruct plans from the cuts cheaper than `bound`, cheapest first,
    /// until enough plans are found.
    pub fn construct_cheaper_solutions(&mut self, bound: u32, ctx: &ExtractionContext) -> Result<()> {
        for (&cost, solution) in self.solutions.range(..bound) {
            if self.plans.found_enough_plans() {
                break;
            }
            debug!("Reconstructing plans of cost {}", cost);
            solution.extract(ctx, &mut self.plans)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use test_log::test;

    use super::*;
    use crate::closed::ClosedList;
    use crate::config::SearchParams;
    use crate::reference::Ref;
    use crate::state_space::StateSpace;
    use crate::task::{Fact, Operator, PlanningTask};
    use crate::vars::SymVariables;

    #[test]
    fn test_plan_database() {
        let mut db = PlanDataBase::new(2);
        let plan = |ops: &[usize]| Plan {
            operators: ops.iter().map(|&i| OperatorId(i)).collect(),
            cost: 1,
        };
        assert!(db.add_plan(plan(&[0, 1])));
        assert!(!db.add_plan(plan(&[0, 1])));
        assert!(!db.found_enough_plans());
        assert!(db.add_plan(plan(&[1])));
        assert!(db.found_enough_plans());
        assert!(!db.add_plan(plan(&[2])));
        assert_eq!(db.num_plans(), 2);
        assert_eq!(db.first_plan(), Some(&plan(&[0, 1])));
    }

    #[test]
    fn test_upper_bound() {
        let bdd = Bdd::new(8);
        let x = bdd.mk_var(1);
        let mut registry = SolutionRegistry::new(1, u32::MAX);

        assert!(registry.register_solution(&bdd, SolutionCut::new(3, 4, x)));
        assert_eq!(registry.upper_bound(), 7);
        // Equal cost does not improve the bound.
        assert!(!registry.register_solution(&bdd, SolutionCut::new(5, 2, x)));
        assert!(registry.register_solution(&bdd, SolutionCut::new(1, 1, -x)));
        assert_eq!(registry.upper_bound(), 2);
        assert_eq!(registry.cheapest_solution_cost_found(), Some(2));

        registry.replace_cuts(&bdd, SolutionCut::new(4, 0, x));
        assert_eq!(registry.cheapest_solution_cost_found(), Some(4));
        assert_eq!(registry.upper_bound(), 2);
    }

    #[test]
    fn test_bound_from_task() {
        let bdd = Bdd::new(8);
        let mut registry = SolutionRegistry::new(1, 5);
        let cut: Ref = bdd.one;
        assert!(!registry.register_solution(&bdd, SolutionCut::new(5, 0, cut)));
        assert!(registry.register_solution(&bdd, SolutionCut::new(4, 0, cut)));
        assert!(registry.has_solutions());
    }

    #[test]
    fn test_construct_respects_bound() {
        // "short" reaches g at cost 2, "long" at cost 3 and also sets p.
        let task = PlanningTask {
            variables: vec!["p".into(), "g".into()],
            operators: vec![
                Operator::new("short", 2).pre(Fact::neg(1)).eff(Fact::pos(1)),
                Operator::new("long", 3).pre(Fact::neg(1)).eff(Fact::pos(0)).eff(Fact::pos(1)),
            ],
            initial_state: vec![false, false],
            goal: vec![Fact::pos(1)],
            ..PlanningTask::default()
        };
        let vars = Rc::new(SymVariables::new(task.variables.clone(), 10));
        let space = StateSpace::from_task(vars.clone(), &task, &SearchParams::default()).unwrap();
        let bdd = vars.bdd();

        let s00 = vars.state_bdd(&[false, false]);
        let s01 = vars.state_bdd(&[false, true]);
        let s11 = vars.state_bdd(&[true, true]);
        let mut fw = ClosedList::new(vars.clone());
        fw.insert(0, s00);
        fw.insert(2, s01);
        fw.insert(3, s11);
        let bw = ClosedList::with_target(vars.clone(), space.goal());
        let ctx = ExtractionContext {
            space: &space,
            fw: &fw,
            bw: &bw,
            max_image_nodes: usize::MAX,
        };

        let mut registry = SolutionRegistry::new(5, u32::MAX);
        assert!(registry.register_solution(bdd, SolutionCut::new(3, 0, s11)));
        assert!(registry.register_solution(bdd, SolutionCut::new(2, 0, s01)));
        assert_eq!(registry.cheapest_solution_cost_found(), Some(2));

        // The bound is strict: nothing is cheaper than the cheapest cut.
        registry.construct_cheaper_solutions(2, &ctx).unwrap();
        assert_eq!(registry.plans().num_plans(), 0);

        registry.construct_cheaper_solutions(3, &ctx).unwrap();
        assert!(registry.plans().plans().iter().all(|p| p.cost < 3));
        assert_eq!(
            registry.plans().plans(),
            &[Plan {
                operators: vec![OperatorId(0)],
                cost: 2
            }]
        );

        registry.construct_cheaper_solutions(u32::MAX, &ctx).unwrap();
        assert_eq!(registry.plans().num_plans(), 2);
        assert_eq!(registry.plans().plans()[1].operators, vec![OperatorId(1)]);
    }
}
