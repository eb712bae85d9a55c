use std::collections::BTreeMap;
use std::rc::Rc;

use log::debug;

use crate::bucket::{apply_split, bucket_union, merge_bucket, remove_zero, Bucket};
use crate::closed::ClosedList;
use crate::error::Result;
use crate::reference::Ref;
use crate::search::{Direction, FrontierCheck, SearchPhase, TimeBudget};
use crate::solution::SolutionCut;
use crate::state_space::StateSpace;
use crate::transition::TransitionRelation;

/// Symbolic uniform-cost search in one direction.
///
/// Each [`step`][Self::step] closes the cheapest open layer: the layer is
/// matched against the opposite closed list, closed, extended to its
/// zero-cost fixpoint, and finally expanded with every positive-cost
/// relation into the open layers `g + c`.
#[derive(Debug)]
pub struct UniformCostSearch {
    space: Rc<StateSpace>,
    direction: Direction,
    check: FrontierCheck,
    max_image_nodes: usize,
    budget: TimeBudget,
    open: BTreeMap<u32, Bucket>,
    closed: ClosedList,
    phase: SearchPhase,
}

impl UniformCostSearch {
    pub fn new(
        space: Rc<StateSpace>,
        direction: Direction,
        check: FrontierCheck,
        max_image_nodes: usize,
        budget: TimeBudget,
    ) -> Self {
        let start = match direction {
            Direction::Forward => space.initial(),
            Direction::Backward => space.goal(),
        };
        let closed = ClosedList::new(space.vars().clone());
        Self {
            space,
            direction,
            check,
            max_image_nodes,
            budget,
            open: BTreeMap::from([(0, vec![start])]),
            closed,
            phase: SearchPhase::Init,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn closed(&self) -> &ClosedList {
        &self.closed
    }

    pub fn is_done(&self) -> bool {
        self.phase == SearchPhase::Done
    }

    /// Cost of the next layer to expand, `None` once the search is done.
    pub fn g(&self) -> Option<u32> {
        if self.is_done() {
            return None;
        }
        self.open.keys().next().copied()
    }

    fn apply(&self, tr: &TransitionRelation, pieces: &[Ref]) -> Result<Bucket> {
        let bdd = self.space.vars().bdd();
        let res = apply_split(bdd, pieces, self.max_image_nodes, |piece, max_nodes| match self.direction {
            Direction::Forward => tr.image(piece, max_nodes),
            Direction::Backward => tr.preimage(piece, max_nodes),
        })?;
        self.budget.check()?;
        Ok(res)
    }

    /// Expand the cheapest open layer, reporting every cut with `opposite` to `on_cut`.
    pub fn step(&mut self, opposite: &ClosedList, on_cut: &mut dyn FnMut(SolutionCut)) -> Result<()> {
        let space = self.space.clone();
        let bdd = space.vars().bdd();

        let Some((g, bucket)) = self.open.pop_first() else {
            self.phase = SearchPhase::Done;
            return Ok(());
        };

        let mut frontier: Bucket = bucket.into_iter().map(|f| self.closed.not_closed(f)).collect();
        merge_bucket(bdd, &mut frontier, self.max_image_nodes);
        if frontier.is_empty() {
            debug!("{:?} g={}: nothing new", self.direction, g);
            self.phase = if self.open.is_empty() {
                SearchPhase::Done
            } else {
                SearchPhase::Stalled
            };
            return Ok(());
        }
        self.phase = SearchPhase::Expanding(g);

        let zero_trs = space.transitions().get(&0).map_or(&[][..], Vec::as_slice);
        let has_zero = !zero_trs.is_empty();

        // Zero-cost fixpoint: one sub-layer per iteration.
        let mut expanded: Bucket = Vec::new();
        loop {
            for piece in &frontier {
                for cut in opposite.get_cuts(*piece, g, self.direction, self.check) {
                    on_cut(cut);
                }
            }

            let layer = bucket_union(bdd, &frontier);
            self.closed.insert(g, layer);
            if has_zero {
                self.closed.insert_zero_layer(g, layer);
            }
            debug!(
                "{:?} g={}: closed layer of {} nodes ({} zero-cost sub-layers)",
                self.direction,
                g,
                bdd.size(layer),
                self.closed.num_zero_layers(g)
            );

            if self.check == FrontierCheck::AllCuts {
                for piece in frontier.iter_mut() {
                    *piece = bdd.apply_diff(*piece, opposite.closed_total());
                }
                remove_zero(bdd, &mut frontier);
            }
            expanded.extend(frontier.iter().copied());

            if !has_zero || frontier.is_empty() {
                break;
            }

            let mut next = Bucket::new();
            for tr in zero_trs {
                next.extend(self.apply(tr, &frontier)?);
            }
            for piece in next.iter_mut() {
                *piece = self.closed.not_closed(*piece);
            }
            merge_bucket(bdd, &mut next, self.max_image_nodes);
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        for (&cost, trs) in space.transitions().range(1..) {
            let Some(target) = g.checked_add(cost) else {
                continue;
            };
            for tr in trs {
                let image = self.apply(tr, &expanded)?;
                if !image.is_empty() {
                    self.open.entry(target).or_default().extend(image);
                }
            }
        }

        if self.open.is_empty() {
            self.phase = SearchPhase::Done;
        }
        Ok(())
    }
}
