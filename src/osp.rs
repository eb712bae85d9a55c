//! Oversubscription planning: maximize the utility of the final state
//! among plans cheaper than a cost bound.

use std::rc::Rc;

use log::{info, warn};

use crate::add::AddRef;
use crate::config::{SearchParams, UtilityEvaluation};
use crate::engine::{SolutionPolicy, SymbolicSearch};
use crate::reference::Ref;
use crate::registry::SolutionRegistry;
use crate::search::{FrontierCheck, SearchMode};
use crate::solution::SolutionCut;
use crate::state_space::StateSpace;
use crate::task::{Fact, PlanningTask};
use crate::vars::SymVariables;

/// Additive utility over facts, as a diagram over pre-state variables.
#[derive(Debug)]
pub struct UtilityFunction {
    vars: Rc<SymVariables>,
    add: AddRef,
    /// `(v, states with utility >= v)`, best value first.
    layers: Vec<(f64, Ref)>,
    evaluation: UtilityEvaluation,
    max_utility: f64,
}

impl UtilityFunction {
    pub fn new(vars: Rc<SymVariables>, utilities: &[(Fact, f64)], evaluation: UtilityEvaluation) -> Self {
        let add = vars.utility_add(utilities);
        let mut layers = Vec::new();
        for value in vars.add().leaves(add).into_iter().rev() {
            if !value.is_finite() {
                warn!("Ignoring non-finite utility value {}", value);
                continue;
            }
            layers.push((value, vars.add().threshold(vars.bdd(), add, value)));
        }
        let max_utility = layers.first().map_or(0.0, |&(value, _)| value);
        info!(
            "Utility function: {} distinct values, max {}, {} nodes",
            layers.len(),
            max_utility,
            vars.add().size(add)
        );
        Self {
            vars,
            add,
            layers,
            evaluation,
            max_utility,
        }
    }

    pub fn max_utility(&self) -> f64 {
        self.max_utility
    }

    pub fn add(&self) -> AddRef {
        self.add
    }

    /// Utility of a single state.
    pub fn evaluate(&self, state: &[bool]) -> f64 {
        self.vars.add().eval(self.add, |v| {
            let i = ((v - 1) / 2) as usize;
            v % 2 == 1 && state.get(i).copied().unwrap_or(false)
        })
    }

    /// Best utility reached in `cut`, with the states of `cut` reaching it.
    pub fn best_in(&self, cut: Ref) -> Option<(f64, Ref)> {
        let bdd = self.vars.bdd();
        if bdd.is_zero(cut) {
            return None;
        }
        match self.evaluation {
            UtilityEvaluation::Direct => {
                let add = self.vars.add();
                let masked = add.times(add.from_bdd(bdd, cut, 1.0, 0.0), self.add);
                let value = add.find_max_finite(masked)?;
                let best = bdd.apply_and(add.threshold(bdd, masked, value), cut);
                Some((value, best))
            }
            UtilityEvaluation::Decomposed => self.layers.iter().find_map(|&(value, layer)| {
                let best = bdd.apply_and(cut, layer);
                (!bdd.is_zero(best)).then_some((value, best))
            }),
        }
    }
}

/// Keeps the cut of highest utility found so far, cheaper cuts winning ties.
#[derive(Debug)]
pub struct OspPolicy {
    utility: UtilityFunction,
    plan_bound: Option<u32>,
    epsilon: f64,
    best_utility: f64,
    best_cost: u32,
}

impl OspPolicy {
    pub fn new(utility: UtilityFunction, plan_bound: Option<u32>, epsilon: f64) -> Self {
        Self {
            utility,
            plan_bound,
            epsilon,
            best_utility: f64::NEG_INFINITY,
            best_cost: u32::MAX,
        }
    }

    pub fn utility(&self) -> &UtilityFunction {
        &self.utility
    }

    /// Utility of the best cut, `-inf` before any.
    pub fn best_utility(&self) -> f64 {
        self.best_utility
    }

    pub fn best_cost(&self) -> Option<u32> {
        (self.best_cost != u32::MAX).then_some(self.best_cost)
    }
}

impl SolutionPolicy for OspPolicy {
    fn frontier_check(&self) -> FrontierCheck {
        FrontierCheck::CheapestCut
    }

    fn initial_upper_bound(&self) -> u32 {
        self.plan_bound.unwrap_or(u32::MAX)
    }

    fn on_start(&mut self, space: &StateSpace, registry: &mut SolutionRegistry) {
        let bdd = space.vars().bdd();
        let cut = bdd.apply_and(space.initial(), space.goal());
        if !bdd.is_zero(cut) {
            self.new_solution(space, registry, SolutionCut::new(0, 0, cut));
        }
    }

    fn new_solution(&mut self, space: &StateSpace, registry: &mut SolutionRegistry, cut: SolutionCut) {
        let f = cut.f();
        if f >= registry.upper_bound() {
            return;
        }
        let Some((value, best)) = self.utility.best_in(cut.cut) else {
            return;
        };
        let better = value > self.best_utility + self.epsilon
            || ((value - self.best_utility).abs() <= self.epsilon && f < self.best_cost);
        if !better {
            return;
        }
        info!("Best utility: {} at cost {} (max {})", value, f, self.utility.max_utility());
        self.best_utility = value;
        self.best_cost = f;
        registry.replace_cuts(space.vars().bdd(), SolutionCut::new(cut.g, cut.h, best));
    }

    fn is_solved(&self, registry: &SolutionRegistry) -> bool {
        registry.has_solutions() && (self.utility.max_utility() - self.best_utility).abs() <= self.epsilon
    }
}

impl SymbolicSearch<OspPolicy> {
    /// Forward search for the plan of highest utility under the task's cost bound.
    pub fn osp(space: Rc<StateSpace>, params: SearchParams, task: &PlanningTask) -> Self {
        let utility = UtilityFunction::new(space.vars().clone(), &task.utilities, params.utility_evaluation);
        let policy = OspPolicy::new(utility, task.plan_bound, params.utility_epsilon);
        Self::new(space, params, SearchMode::Forward, policy)
    }
}
