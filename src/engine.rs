//! Search session: drives the bidirectional search, collects cuts and
//! decides termination.

use std::rc::Rc;

use log::{debug, info, warn};

use crate::config::SearchParams;
use crate::error::{Error, Result};
use crate::registry::SolutionRegistry;
use crate::search::bidirectional::BidirectionalSearch;
use crate::search::{FrontierCheck, SearchMode, TimeBudget};
use crate::solution::{ExtractionContext, SolutionCut};
use crate::state_space::StateSpace;
use crate::task::Plan;

/// What counts as a solution and when the search may stop.
pub trait SolutionPolicy {
    fn frontier_check(&self) -> FrontierCheck;

    /// Plans must cost strictly less than this.
    fn initial_upper_bound(&self) -> u32;

    /// Called once before the first expansion.
    fn on_start(&mut self, _space: &StateSpace, _registry: &mut SolutionRegistry) {}

    /// Offer a cut found by the search to the registry.
    fn new_solution(&mut self, space: &StateSpace, registry: &mut SolutionRegistry, cut: SolutionCut);

    /// Whether the search can stop before the bounds meet.
    fn is_solved(&self, _registry: &SolutionRegistry) -> bool {
        false
    }
}

/// Cost-optimal planning: every cheaper cut tightens the upper bound.
#[derive(Debug, Copy, Clone, Default)]
pub struct UniformCostPolicy;

impl SolutionPolicy for UniformCostPolicy {
    fn frontier_check(&self) -> FrontierCheck {
        FrontierCheck::AllCuts
    }

    fn initial_upper_bound(&self) -> u32 {
        u32::MAX
    }

    fn new_solution(&mut self, space: &StateSpace, registry: &mut SolutionRegistry, cut: SolutionCut) {
        registry.register_solution(space.vars().bdd(), cut);
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SearchStatus {
    InProgress,
    /// Plans were reconstructed.
    Solved,
    /// The search space is exhausted without a plan.
    Failed,
}

/// A search session over one state space.
#[derive(Debug)]
pub struct SymbolicSearch<P> {
    space: Rc<StateSpace>,
    search: BidirectionalSearch,
    registry: SolutionRegistry,
    policy: P,
    params: SearchParams,
    budget: TimeBudget,
    step_num: usize,
    status: SearchStatus,
}

impl SymbolicSearch<UniformCostPolicy> {
    /// Cost-optimal search in the given directions.
    pub fn uniform_cost(space: Rc<StateSpace>, params: SearchParams, mode: SearchMode) -> Self {
        Self::new(space, params, mode, UniformCostPolicy)
    }
}

impl<P: SolutionPolicy> SymbolicSearch<P> {
    pub fn new(space: Rc<StateSpace>, params: SearchParams, mode: SearchMode, policy: P) -> Self {
        let budget = TimeBudget::new(params.time_limit);
        let search = BidirectionalSearch::new(space.clone(), &params, mode, policy.frontier_check(), budget);
        let registry = SolutionRegistry::new(params.num_plans, policy.initial_upper_bound());
        Self {
            space,
            search,
            registry,
            policy,
            params,
            budget,
            step_num: 0,
            status: SearchStatus::InProgress,
        }
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    pub fn plans(&self) -> &[Plan] {
        self.registry.plans().plans()
    }

    pub fn registry(&self) -> &SolutionRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn lower_bound(&self) -> u32 {
        self.search.lower_bound()
    }

    pub fn upper_bound(&self) -> u32 {
        self.registry.upper_bound()
    }

    pub fn num_steps(&self) -> usize {
        self.step_num
    }

    fn check_limits(&self) -> Result<()> {
        self.budget.check()?;
        if let Some(limit) = self.params.max_alive_nodes {
            let used = self.space.vars().bdd().num_nodes();
            if used > limit {
                return Err(Error::MemoryLimit { limit, used });
            }
        }
        Ok(())
    }

    fn construct(&mut self, bound: u32) -> Result<()> {
        let ctx = ExtractionContext {
            space: &self.space,
            fw: self.search.fw_closed(),
            bw: self.search.bw_closed(),
            max_image_nodes: self.params.max_image_nodes,
        };
        self.registry.construct_cheaper_solutions(bound, &ctx)
    }

    fn finish(&mut self) -> Result<()> {
        self.construct(u32::MAX)?;
        self.status = if self.registry.plans().num_plans() > 0 {
            SearchStatus::Solved
        } else {
            SearchStatus::Failed
        };
        info!(
            "Search finished after {} steps in {:?}: {:?} with {} plans",
            self.step_num,
            self.budget.elapsed(),
            self.status,
            self.registry.plans().num_plans()
        );
        Ok(())
    }

    /// One step of the session. Does nothing once the status is final.
    pub fn step(&mut self) -> Result<SearchStatus> {
        if self.status != SearchStatus::InProgress {
            return Ok(self.status);
        }
        if let Err(e) = self.check_limits() {
            warn!("Search aborted: {}", e);
            return Err(e);
        }

        if self.step_num == 0 {
            self.policy.on_start(&self.space, &mut self.registry);
        }
        self.step_num += 1;

        let lb = self.search.lower_bound();
        let ub = self.registry.upper_bound();
        if lb >= ub || self.search.finished() || self.registry.found_all_plans() {
            debug!("Bounds met: lb={} ub={}", lb, ub);
            self.finish()?;
            return Ok(self.status);
        }
        if self.policy.is_solved(&self.registry) {
            debug!("Policy reports the task solved");
            self.finish()?;
            return Ok(self.status);
        }

        let space = self.space.clone();
        let registry = &mut self.registry;
        let policy = &mut self.policy;
        self.search
            .step(&mut |cut| policy.new_solution(&space, registry, cut))?;

        if self.search.lower_bound_increased() {
            let plans = self.registry.plans();
            info!(
                "BOUND: {} < {} [{}/{} plans]",
                self.search.lower_bound(),
                self.registry.upper_bound(),
                plans.num_plans(),
                plans.num_desired()
            );
        }
        Ok(self.status)
    }

    /// Step until the status is final.
    pub fn run(&mut self) -> Result<SearchStatus> {
        while self.step()? == SearchStatus::InProgress {}
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::task::{Fact, Operator, OperatorId, PlanningTask};
    use crate::vars::SymVariables;

    /// Two routes to q: a(1) then b(1), or c(3).
    fn task() -> PlanningTask {
        PlanningTask {
            variables: vec!["p".into(), "q".into()],
            operators: vec![
                Operator::new("a", 1).pre(Fact::neg(0)).eff(Fact::pos(0)),
                Operator::new("b", 1).pre(Fact::pos(0)).eff(Fact::pos(1)),
                Operator::new("c", 3).pre(Fact::neg(1)).eff(Fact::pos(1)),
            ],
            initial_state: vec![false, false],
            goal: vec![Fact::pos(1)],
            ..PlanningTask::default()
        }
    }

    fn space(task: &PlanningTask, params: &SearchParams) -> Rc<StateSpace> {
        let vars = Rc::new(SymVariables::new(task.variables.clone(), params.storage_bits));
        Rc::new(StateSpace::from_task(vars, task, params).unwrap())
    }

    #[test]
    fn test_optimal_plan() {
        let task = task();
        let params = SearchParams::default();
        for mode in [SearchMode::Forward, SearchMode::Backward, SearchMode::Bidirectional] {
            let mut search = SymbolicSearch::uniform_cost(space(&task, &params), params.clone(), mode);
            assert_eq!(search.run().unwrap(), SearchStatus::Solved);
            let plan = &search.plans()[0];
            assert_eq!(plan.operators, vec![OperatorId(0), OperatorId(1)], "{:?}", mode);
            assert_eq!(plan.cost, 2);
            assert_eq!(search.upper_bound(), 2);
        }
    }

    #[test]
    fn test_unsolvable() {
        let mut task = task();
        task.goal = vec![Fact::neg(0), Fact::pos(1)];
        task.operators.truncate(2);
        let params = SearchParams::default();
        let mut search = SymbolicSearch::uniform_cost(space(&task, &params), params, SearchMode::Bidirectional);
        assert_eq!(search.run().unwrap(), SearchStatus::Failed);
        assert!(search.plans().is_empty());
        // A final status is sticky.
        assert_eq!(search.step().unwrap(), SearchStatus::Failed);
    }

    #[test]
    fn test_memory_limit() {
        let task = task();
        let params = SearchParams {
            max_alive_nodes: Some(1),
            ..SearchParams::default()
        };
        let mut search = SymbolicSearch::uniform_cost(space(&task, &params), params, SearchMode::Forward);
        assert!(matches!(search.run(), Err(Error::MemoryLimit { limit: 1, .. })));
        assert_eq!(search.status(), SearchStatus::InProgress);
    }
}
