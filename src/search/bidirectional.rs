use std::rc::Rc;

use log::debug;

use crate::closed::ClosedList;
use crate::config::SearchParams;
use crate::error::Result;
use crate::search::uniform::UniformCostSearch;
use crate::search::{Direction, FrontierCheck, SearchMode, TimeBudget};
use crate::solution::SolutionCut;
use crate::state_space::StateSpace;

/// Forward and backward uniform-cost searches meeting in the middle.
///
/// Either direction may be absent; its place in cut detection is then taken
/// by a closed list holding only its start set (goal or initial state).
#[derive(Debug)]
pub struct BidirectionalSearch {
    fw: Option<UniformCostSearch>,
    bw: Option<UniformCostSearch>,
    /// Stands in for the backward closed list.
    goal_target: ClosedList,
    /// Stands in for the forward closed list.
    init_target: ClosedList,
    /// Most expensive operator cost.
    max_cost: u32,
    lower_bound: u32,
    lower_bound_increased: bool,
}

impl BidirectionalSearch {
    pub fn new(
        space: Rc<StateSpace>,
        params: &SearchParams,
        mode: SearchMode,
        check: FrontierCheck,
        budget: TimeBudget,
    ) -> Self {
        let vars = space.vars().clone();
        let max_cost = space.max_cost();
        let make = |direction| {
            mode.uses(direction).then(|| {
                UniformCostSearch::new(space.clone(), direction, check, params.max_image_nodes, budget)
            })
        };
        Self {
            fw: make(Direction::Forward),
            bw: make(Direction::Backward),
            goal_target: ClosedList::with_target(vars.clone(), space.goal()),
            init_target: ClosedList::with_target(vars, space.initial()),
            max_cost,
            lower_bound: 0,
            lower_bound_increased: false,
        }
    }

    /// Forward closed list, or the initial state if there is no forward search.
    pub fn fw_closed(&self) -> &ClosedList {
        self.fw.as_ref().map_or(&self.init_target, UniformCostSearch::closed)
    }

    /// Backward closed list, or the goal if there is no backward search.
    pub fn bw_closed(&self) -> &ClosedList {
        self.bw.as_ref().map_or(&self.goal_target, UniformCostSearch::closed)
    }

    pub fn finished(&self) -> bool {
        self.fw.as_ref().map_or(true, UniformCostSearch::is_done)
            && self.bw.as_ref().map_or(true, UniformCostSearch::is_done)
    }

    /// Cost below which every plan has already been reported as a cut.
    pub fn lower_bound(&self) -> u32 {
        self.lower_bound
    }

    /// Whether the last step raised the lower bound.
    pub fn lower_bound_increased(&self) -> bool {
        self.lower_bound_increased
    }

    /// Bound implied by the next layers `G_f` and `G_b` of both searches.
    ///
    /// A plan not met yet must leave the forward closed states through some
    /// operator of cost `c` into a state at `g >= G_f` whose predecessor is
    /// at `h >= G_b`, so it costs at least `G_f + G_b - c`. Cuts are only
    /// reported against closed states, so nothing is certified until both
    /// directions have closed their start set. A finished direction has met
    /// every plan once the other one closed its start set.
    fn current_bound(&self) -> u32 {
        if self.finished() {
            return u32::MAX;
        }
        let next = |search: &UniformCostSearch| search.g().unwrap_or(u32::MAX);
        match (self.fw.as_ref().map(next), self.bw.as_ref().map(next)) {
            (Some(f), None) => f,
            (None, Some(b)) => b,
            (Some(0), Some(_)) | (Some(_), Some(0)) => 0,
            (Some(u32::MAX), Some(_)) | (Some(_), Some(u32::MAX)) => u32::MAX,
            (Some(f), Some(b)) => f.max(b).max(f.saturating_add(b).saturating_sub(self.max_cost)),
            (None, None) => u32::MAX,
        }
    }

    /// Which direction the next step advances: the one with the cheaper
    /// next layer, forward on ties.
    pub fn next_direction(&self) -> Option<Direction> {
        let fw = self.fw.as_ref().and_then(UniformCostSearch::g);
        let bw = self.bw.as_ref().and_then(UniformCostSearch::g);
        match (fw, bw) {
            (Some(f), Some(b)) if b < f => Some(Direction::Backward),
            (Some(_), _) => Some(Direction::Forward),
            (None, Some(_)) => Some(Direction::Backward),
            (None, None) => None,
        }
    }

    /// Advance one direction by one layer.
    pub fn step(&mut self, on_cut: &mut dyn FnMut(SolutionCut)) -> Result<()> {
        match self.next_direction() {
            Some(Direction::Forward) => {
                let opposite = match &self.bw {
                    Some(bw) => bw.closed(),
                    None => &self.goal_target,
                };
                if let Some(fw) = self.fw.as_mut() {
                    fw.step(opposite, on_cut)?;
                }
            }
            Some(Direction::Backward) => {
                let opposite = match &self.fw {
                    Some(fw) => fw.closed(),
                    None => &self.init_target,
                };
                if let Some(bw) = self.bw.as_mut() {
                    bw.step(opposite, on_cut)?;
                }
            }
            None => {}
        }

        let bound = self.current_bound().max(self.lower_bound);
        self.lower_bound_increased = bound > self.lower_bound;
        if self.lower_bound_increased {
            debug!("Lower bound increased: {} -> {}", self.lower_bound, bound);
        }
        self.lower_bound = bound;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::task::{Fact, Operator, PlanningTask};
    use crate::vars::SymVariables;

    /// Counter 0..=3 encoded in two bits, incremented at cost 2.
    fn counter() -> PlanningTask {
        let inc = |name: &str, from: [bool; 2], to: [bool; 2]| {
            let mut op = Operator::new(name, 2);
            for (i, (&a, &b)) in from.iter().zip(to.iter()).enumerate() {
                op = op.pre(Fact::new(i, a));
                if a != b {
                    op = op.eff(Fact::new(i, b));
                }
            }
            op
        };
        PlanningTask {
            variables: vec!["lo".into(), "hi".into()],
            operators: vec![
                inc("inc0", [false, false], [true, false]),
                inc("inc1", [true, false], [false, true]),
                inc("inc2", [false, true], [true, true]),
            ],
            initial_state: vec![false, false],
            goal: vec![Fact::pos(0), Fact::pos(1)],
            ..PlanningTask::default()
        }
    }

    fn search_task(task: &PlanningTask, mode: SearchMode) -> BidirectionalSearch {
        let params = SearchParams::default();
        let vars = Rc::new(SymVariables::new(task.variables.clone(), 10));
        let space = Rc::new(StateSpace::from_task(vars, task, &params).unwrap());
        BidirectionalSearch::new(space, &params, mode, FrontierCheck::AllCuts, TimeBudget::new(None))
    }

    fn search(mode: SearchMode) -> BidirectionalSearch {
        search_task(&counter(), mode)
    }

    #[test]
    fn test_alternation_and_bound() {
        let mut search = search(SearchMode::Bidirectional);
        assert_eq!(search.next_direction(), Some(Direction::Forward));

        let mut cuts = Vec::new();
        let mut bounds = Vec::new();
        while !search.finished() {
            search.step(&mut |cut| cuts.push(cut)).unwrap();
            bounds.push(search.lower_bound());
            if cuts.is_empty() {
                // The only plan costs 6.
                assert!(search.lower_bound() <= 6);
            }
        }

        assert!(bounds.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(search.lower_bound(), u32::MAX);
        assert!(!cuts.is_empty());
        assert!(cuts.iter().all(|cut| cut.f() == 6));
    }

    #[test]
    fn test_bound_waits_for_both_start_sets() {
        // The initial state already has lo unset.
        let mut task = counter();
        task.goal = vec![Fact::neg(0)];
        let mut search = search_task(&task, SearchMode::Bidirectional);

        let mut cuts = Vec::new();
        search.step(&mut |cut| cuts.push(cut)).unwrap();
        assert!(cuts.is_empty());
        assert_eq!(search.next_direction(), Some(Direction::Backward));
        assert_eq!(search.lower_bound(), 0);

        search.step(&mut |cut| cuts.push(cut)).unwrap();
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].f(), 0);
    }

    #[test]
    fn test_forward_only_uses_goal_target() {
        let mut search = search(SearchMode::Forward);
        assert!(search.bw.is_none());
        let mut cuts = Vec::new();
        while !search.finished() {
            search.step(&mut |cut| cuts.push(cut)).unwrap();
        }
        assert_eq!(cuts.len(), 1);
        assert_eq!((cuts[0].g, cuts[0].h), (6, 0));
        assert_eq!(search.bw_closed().closed_at(0), search.goal_target.closed_at(0));
    }

    #[test]
    fn test_backward_only_uses_initial_target() {
        let mut search = search(SearchMode::Backward);
        let mut cuts = Vec::new();
        while !search.finished() {
            search.step(&mut |cut| cuts.push(cut)).unwrap();
        }
        assert_eq!(cuts.len(), 1);
        assert_eq!((cuts[0].g, cuts[0].h), (0, 6));
    }
}
