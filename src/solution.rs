//! Solution cuts and plan reconstruction.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::bdd::Bdd;
use crate::bucket::{apply_split, bucket_union};
use crate::closed::ClosedList;
use crate::error::Result;
use crate::reference::Ref;
use crate::registry::PlanDataBase;
use crate::search::Direction;
use crate::state_space::StateSpace;
use crate::task::{OperatorId, Plan};
use crate::transition::TransitionRelation;

/// States where the forward and backward searches meet.
///
/// Every state of `cut` is reached from the initial state at cost `g` and
/// reaches the goal at cost `h`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SolutionCut {
    pub g: u32,
    pub h: u32,
    pub cut: Ref,
}

impl SolutionCut {
    pub fn new(g: u32, h: u32, cut: Ref) -> Self {
        Self { g, h, cut }
    }

    pub fn f(&self) -> u32 {
        self.g.saturating_add(self.h)
    }
}

/// What plan reconstruction needs from a finished search.
#[derive(Debug, Copy, Clone)]
pub struct ExtractionContext<'a> {
    pub space: &'a StateSpace,
    pub fw: &'a ClosedList,
    pub bw: &'a ClosedList,
    pub max_image_nodes: usize,
}

impl ExtractionContext<'_> {
    fn closed(&self, direction: Direction) -> &ClosedList {
        match direction {
            Direction::Forward => self.fw,
            Direction::Backward => self.bw,
        }
    }

    /// One step back towards the start of `direction`: predecessors for the
    /// forward closed list, successors for the backward one.
    fn step_back(&self, tr: &TransitionRelation, direction: Direction, cut: Ref) -> Result<Ref> {
        let bdd = self.space.vars().bdd();
        let pieces = apply_split(bdd, &[cut], self.max_image_nodes, |piece, max_nodes| match direction {
            Direction::Forward => tr.preimage(piece, max_nodes),
            Direction::Backward => tr.image(piece, max_nodes),
        })?;
        Ok(bucket_union(bdd, &pieces))
    }
}

/// Partial reconstruction: `cut` lies in layer `h` of the closed list of `direction`.
#[derive(Debug, Clone)]
struct Frame {
    direction: Direction,
    cut: Ref,
    h: u32,
    /// Operators found so far: last-first for forward frames, in order for backward ones.
    path: Vec<OperatorId>,
    /// Completed forward part, for backward frames.
    prefix: Vec<OperatorId>,
    /// The original cut and its backward cost.
    meet: Ref,
    meet_h: u32,
}

impl Frame {
    fn child(&self, cut: Ref, h: u32, op: OperatorId) -> Self {
        let mut path = self.path.clone();
        path.push(op);
        Self {
            cut,
            h,
            path,
            ..self.clone()
        }
    }
}

/// Cuts of one plan cost, merged by `(g, h)`.
#[derive(Debug, Clone, Default)]
pub struct SymSolution {
    cuts: BTreeMap<(u32, u32), Ref>,
}

impl SymSolution {
    pub fn add(&mut self, bdd: &Bdd, cut: SolutionCut) {
        let entry = self.cuts.entry((cut.g, cut.h)).or_insert(bdd.zero);
        *entry = bdd.apply_or(*entry, cut.cut);
    }

    pub fn cuts(&self) -> impl Iterator<Item = SolutionCut> + '_ {
        self.cuts.iter().map(|(&(g, h), &cut)| SolutionCut::new(g, h, cut))
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Reconstruct plans through the cuts until `plans` has enough of them.
    ///
    /// From each cut, the forward part is traced back to the initial state
    /// through the forward closed list. The state it reaches is then traced
    /// to the goal through the backward closed list. Every branch that
    /// reaches both ends yields one plan.
    pub fn extract(&self, ctx: &ExtractionContext, plans: &mut PlanDataBase) -> Result<()> {
        for cut in self.cuts() {
            let mut stack = vec![Frame {
                direction: Direction::Forward,
                cut: cut.cut,
                h: cut.g,
                path: Vec::new(),
                prefix: Vec::new(),
                meet: cut.cut,
                meet_h: cut.h,
            }];
            while let Some(frame) = stack.pop() {
                if plans.found_enough_plans() {
                    return Ok(());
                }
                expand_frame(ctx, frame, cut.f(), &mut stack, plans)?;
            }
        }
        Ok(())
    }
}

fn expand_frame(
    ctx: &ExtractionContext,
    frame: Frame,
    cost: u32,
    stack: &mut Vec<Frame>,
    plans: &mut PlanDataBase,
) -> Result<()> {
    let bdd = ctx.space.vars().bdd();
    let closed = ctx.closed(frame.direction);
    let h = frame.h;

    // Keep only the states of the cut in their first zero-cost sub-layer.
    let mut cut = frame.cut;
    let num_layers = closed.num_zero_layers(h);
    let steps0 = if num_layers > 0 {
        let steps0 = closed.zero_cut(h, cut);
        if steps0 == num_layers {
            debug!("{:?} cut at h={} outside the closed list", frame.direction, h);
            return Ok(());
        }
        cut = bdd.apply_and(cut, closed.zero_closed_at(h, steps0));
        steps0
    } else {
        0
    };

    if h == 0 && steps0 == 0 {
        return complete(ctx, frame, cut, cost, stack, plans);
    }

    let relations = ctx.space.individual_transitions();
    let mut children = Vec::new();

    if steps0 > 0 {
        for tr in relations.get(&0).map_or(&[][..], Vec::as_slice) {
            let Some(op) = tr.first_op() else { continue };
            let prev = ctx.step_back(tr, frame.direction, cut)?;
            if bdd.is_zero(prev) {
                continue;
            }
            for layer in (0..steps0).rev() {
                let inter = bdd.apply_and(prev, closed.zero_closed_at(h, layer));
                if !bdd.is_zero(inter) {
                    children.push(frame.child(inter, h, op));
                    break;
                }
            }
        }
    }

    if (steps0 == 0 || children.is_empty()) && h > 0 {
        for (&c, trs) in relations.range(1..=h) {
            let layer = closed.closed_at(h - c);
            if bdd.is_zero(layer) {
                continue;
            }
            for tr in trs {
                let Some(op) = tr.first_op() else { continue };
                let prev = ctx.step_back(tr, frame.direction, cut)?;
                let inter = bdd.apply_and(prev, layer);
                if !bdd.is_zero(inter) {
                    children.push(frame.child(inter, h - c, op));
                }
            }
        }
    }

    // Explore the first relation first.
    stack.extend(children.into_iter().rev());
    Ok(())
}

/// The frame reached the start of its closed list.
fn complete(
    ctx: &ExtractionContext,
    frame: Frame,
    cut: Ref,
    cost: u32,
    stack: &mut Vec<Frame>,
    plans: &mut PlanDataBase,
) -> Result<()> {
    match frame.direction {
        Direction::Forward => {
            let mut prefix = frame.path;
            prefix.reverse();
            let bdd = ctx.space.vars().bdd();
            let reached = ctx.space.apply_operators(ctx.space.initial(), &prefix)?;
            let start = bdd.apply_and(reached, frame.meet);
            if bdd.is_zero(start) {
                debug!("Forward part {:?} misses the cut", prefix);
                return Ok(());
            }
            stack.push(Frame {
                direction: Direction::Backward,
                cut: start,
                h: frame.meet_h,
                path: Vec::new(),
                prefix,
                meet: frame.meet,
                meet_h: frame.meet_h,
            });
        }
        Direction::Backward => {
            debug_assert!(!ctx.space.vars().bdd().is_zero(cut));
            let mut operators = frame.prefix;
            operators.extend(frame.path);
            let plan = Plan { operators, cost };
            if plans.add_plan(plan) {
                info!("Plan of cost {} reconstructed ({} found)", cost, plans.num_plans());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use test_log::test;

    use super::*;
    use crate::config::SearchParams;
    use crate::task::{Fact, Operator, PlanningTask};
    use crate::vars::SymVariables;

    /// Two ways from s0 to the goal: a(0) then b(5), or c(5) directly.
    fn task() -> PlanningTask {
        PlanningTask {
            variables: vec!["p".into(), "q".into()],
            operators: vec![
                Operator::new("a", 0).pre(Fact::neg(0)).eff(Fact::pos(0)),
                Operator::new("b", 5).pre(Fact::pos(0)).pre(Fact::neg(1)).eff(Fact::pos(1)),
                Operator::new("c", 5).pre(Fact::neg(0)).pre(Fact::neg(1)).eff(Fact::pos(1)),
            ],
            initial_state: vec![false, false],
            goal: vec![Fact::pos(1)],
            ..PlanningTask::default()
        }
    }

    #[test]
    fn test_forward_reconstruction() {
        let task = task();
        let vars = Rc::new(SymVariables::new(task.variables.clone(), 10));
        let space = StateSpace::from_task(vars.clone(), &task, &SearchParams::default()).unwrap();

        // Closed list of forward search, written by hand.
        let s00 = vars.state_bdd(&[false, false]);
        let s10 = vars.state_bdd(&[true, false]);
        let goal = vars.bdd().apply_or(vars.state_bdd(&[true, true]), vars.state_bdd(&[false, true]));
        let mut fw = ClosedList::new(vars.clone());
        fw.insert(0, s00);
        fw.insert_zero_layer(0, s00);
        fw.insert(0, s10);
        fw.insert_zero_layer(0, s10);
        fw.insert(5, goal);
        fw.insert_zero_layer(5, goal);
        let bw = ClosedList::with_target(vars.clone(), space.goal());

        let mut solution = SymSolution::default();
        solution.add(vars.bdd(), SolutionCut::new(5, 0, goal));

        let ctx = ExtractionContext {
            space: &space,
            fw: &fw,
            bw: &bw,
            max_image_nodes: usize::MAX,
        };
        let mut plans = PlanDataBase::new(5);
        solution.extract(&ctx, &mut plans).unwrap();

        let mut found: Vec<_> = plans.plans().iter().map(|p| p.operators.clone()).collect();
        found.sort();
        assert_eq!(
            found,
            vec![vec![OperatorId(0), OperatorId(1)], vec![OperatorId(2)]]
        );
        assert!(plans.plans().iter().all(|p| p.cost == 5));
    }

    #[test]
    fn test_quota_stops_extraction() {
        let task = task();
        let vars = Rc::new(SymVariables::new(task.variables.clone(), 10));
        let space = StateSpace::from_task(vars.clone(), &task, &SearchParams::default()).unwrap();

        let s00 = vars.state_bdd(&[false, false]);
        let s10 = vars.state_bdd(&[true, false]);
        let mut fw = ClosedList::new(vars.clone());
        fw.insert(0, s00);
        fw.insert_zero_layer(0, s00);
        fw.insert(0, s10);
        fw.insert_zero_layer(0, s10);

        // Meet in the middle at the states with cost 0 on the forward side.
        let mut solution = SymSolution::default();
        solution.add(vars.bdd(), SolutionCut::new(0, 5, s10));
        solution.add(vars.bdd(), SolutionCut::new(0, 5, s00));
        assert_eq!(solution.cuts().count(), 1);

        let mut bw_closed = ClosedList::new(vars.clone());
        bw_closed.insert(0, space.goal());
        bw_closed.insert_zero_layer(0, space.goal());
        bw_closed.insert(5, vars.bdd().apply_or(s00, s10));
        bw_closed.insert_zero_layer(5, vars.bdd().apply_or(s00, s10));

        let ctx = ExtractionContext {
            space: &space,
            fw: &fw,
            bw: &bw_closed,
            max_image_nodes: usize::MAX,
        };
        let mut plans = PlanDataBase::new(1);
        solution.extract(&ctx, &mut plans).unwrap();
        assert_eq!(plans.plans(), &[Plan { operators: vec![OperatorId(2)], cost: 5 }]);
    }

    #[test]
    fn test_empty_plan() {
        let mut task = task();
        task.initial_state = vec![false, true];
        let vars = Rc::new(SymVariables::new(task.variables.clone(), 10));
        let space = StateSpace::from_task(vars.clone(), &task, &SearchParams::default()).unwrap();

        let fw = ClosedList::with_target(vars.clone(), space.initial());
        let bw = ClosedList::with_target(vars.clone(), space.goal());
        let mut solution = SymSolution::default();
        solution.add(vars.bdd(), SolutionCut::new(0, 0, space.initial()));

        let ctx = ExtractionContext {
            space: &space,
            fw: &fw,
            bw: &bw,
            max_image_nodes: usize::MAX,
        };
        let mut plans = PlanDataBase::new(1);
        solution.extract(&ctx, &mut plans).unwrap();
        assert_eq!(plans.plans(), &[Plan { operators: vec![], cost: 0 }]);
    }
}
