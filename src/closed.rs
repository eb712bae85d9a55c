//! Per-direction record of closed states.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::reference::Ref;
use crate::search::{Direction, FrontierCheck};
use crate::solution::SolutionCut;
use crate::vars::SymVariables;

/// States proven optimally reached, by cost `g`.
///
/// When the task has zero-cost operators, each `g` layer additionally keeps
/// its zero-cost sub-layers: sub-layer `k` holds the states first reached
/// with `k` zero-cost steps after the last positive-cost step. Sub-layers of
/// one `g` are pairwise disjoint.
#[derive(Debug, Clone)]
pub struct ClosedList {
    vars: Rc<SymVariables>,
    closed: BTreeMap<u32, Ref>,
    zero_closed: BTreeMap<u32, Vec<Ref>>,
    closed_total: Ref,
}

impl ClosedList {
    pub fn new(vars: Rc<SymVariables>) -> Self {
        let closed_total = vars.zero();
        Self {
            vars,
            closed: BTreeMap::new(),
            zero_closed: BTreeMap::new(),
            closed_total,
        }
    }

    /// A list holding only `target` at cost 0.
    ///
    /// Stands in for the opposite direction of a unidirectional search:
    /// the goal for forward search, the initial state for backward search.
    pub fn with_target(vars: Rc<SymVariables>, target: Ref) -> Self {
        let mut list = Self::new(vars);
        list.insert(0, target);
        list
    }

    pub fn insert(&mut self, g: u32, set: Ref) {
        let bdd = self.vars.bdd();
        let layer = self.closed.entry(g).or_insert(bdd.zero);
        *layer = bdd.apply_or(*layer, set);
        self.closed_total = bdd.apply_or(self.closed_total, set);
    }

    /// Append the next zero-cost sub-layer of `g`. The states must also be [`insert`][Self::insert]ed.
    pub fn insert_zero_layer(&mut self, g: u32, set: Ref) {
        self.zero_closed.entry(g).or_default().push(set);
    }

    pub fn closed_at(&self, g: u32) -> Ref {
        self.closed.get(&g).copied().unwrap_or(self.vars.zero())
    }

    pub fn zero_closed_at(&self, g: u32, step: usize) -> Ref {
        self.zero_closed
            .get(&g)
            .and_then(|layers| layers.get(step))
            .copied()
            .unwrap_or(self.vars.zero())
    }

    pub fn num_zero_layers(&self, g: u32) -> usize {
        self.zero_closed.get(&g).map_or(0, Vec::len)
    }

    /// Index of the first zero-cost sub-layer of `g` intersecting `cut`,
    /// or the number of sub-layers if none does.
    pub fn zero_cut(&self, g: u32, cut: Ref) -> usize {
        let bdd = self.vars.bdd();
        let layers = self.zero_closed.get(&g).map_or(&[][..], Vec::as_slice);
        layers
            .iter()
            .position(|&layer| !bdd.is_zero(bdd.apply_and(layer, cut)))
            .unwrap_or(layers.len())
    }

    pub fn closed_total(&self) -> Ref {
        self.closed_total
    }

    /// States of `set` not closed at any cost.
    pub fn not_closed(&self, set: Ref) -> Ref {
        self.vars.bdd().apply_diff(set, self.closed_total)
    }

    pub fn is_empty(&self) -> bool {
        self.closed.is_empty()
    }

    /// Costs of the closed layers, ascending.
    pub fn layers(&self) -> impl Iterator<Item = u32> + '_ {
        self.closed.keys().copied()
    }

    /// Cuts between a frontier at cost `g` of the opposite search and this list.
    ///
    /// `direction` is the direction of the search owning the frontier.
    pub fn get_cuts(&self, frontier: Ref, g: u32, direction: Direction, check: FrontierCheck) -> Vec<SolutionCut> {
        let bdd = self.vars.bdd();
        let mut cuts = Vec::new();
        if bdd.is_zero(bdd.apply_and(frontier, self.closed_total)) {
            return cuts;
        }
        for (&h, &layer) in &self.closed {
            let cut = bdd.apply_and(frontier, layer);
            if bdd.is_zero(cut) {
                continue;
            }
            cuts.push(match direction {
                Direction::Forward => SolutionCut::new(g, h, cut),
                Direction::Backward => SolutionCut::new(h, g, cut),
            });
            if check == FrontierCheck::CheapestCut {
                break;
            }
        }
        cuts
    }
}
