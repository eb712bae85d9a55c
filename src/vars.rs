//! Symbolic encoding of planning states.
//!
//! [`SymVariables`] is the diagram context of a search session: it owns the
//! BDD and ADD managers and fixes the variable order. Every component that
//! builds or combines state sets holds an `Rc<SymVariables>`; one session per
//! context.
//!
//! Fact `i` is encoded by the pre-state variable `2i+1` and the successor
//! variable `2i+2`, so each pair is adjacent in the order.

use std::collections::HashMap;

use num_bigint::BigUint;

use crate::add::{AddManager, AddRef};
use crate::bdd::Bdd;
use crate::reference::Ref;
use crate::task::Fact;

#[derive(Debug)]
pub struct SymVariables {
    bdd: Bdd,
    add: AddManager,
    names: Vec<String>,
}

impl SymVariables {
    pub fn new(names: Vec<String>, storage_bits: usize) -> Self {
        log::debug!("Encoding {} facts with {} BDD variables", names.len(), 2 * names.len());
        Self {
            bdd: Bdd::new(storage_bits),
            add: AddManager::new(storage_bits),
            names,
        }
    }

    pub fn bdd(&self) -> &Bdd {
        &self.bdd
    }

    pub fn add(&self) -> &AddManager {
        &self.add
    }

    pub fn num_facts(&self) -> usize {
        self.names.len()
    }

    pub fn zero(&self) -> Ref {
        self.bdd.zero
    }

    pub fn one(&self) -> Ref {
        self.bdd.one
    }

    pub fn pre_bdd(&self, i: usize) -> Ref {
        self.bdd.mk_var(pre_var(i))
    }

    pub fn succ_bdd(&self, i: usize) -> Ref {
        self.bdd.mk_var(succ_var(i))
    }

    /// States in which `fact` holds.
    pub fn fact_bdd(&self, fact: Fact) -> Ref {
        let v = self.pre_bdd(fact.var);
        if fact.value {
            v
        } else {
            -v
        }
    }

    /// Successor states in which `fact` holds.
    pub fn succ_fact_bdd(&self, fact: Fact) -> Ref {
        let v = self.succ_bdd(fact.var);
        if fact.value {
            v
        } else {
            -v
        }
    }

    pub fn state_bdd(&self, state: &[bool]) -> Ref {
        self.bdd.cube(
            state
                .iter()
                .enumerate()
                .map(|(i, &b)| if b { pre_var(i) as i32 } else { -(pre_var(i) as i32) }),
        )
    }

    /// States consistent with the given facts.
    pub fn partial_state_bdd(&self, facts: &[Fact]) -> Ref {
        self.bdd.apply_and_many(facts.iter().map(|&f| self.fact_bdd(f)))
    }

    pub fn pre_cube(&self, facts: impl IntoIterator<Item = usize>) -> Ref {
        self.bdd.var_cube(facts.into_iter().map(pre_var))
    }

    pub fn succ_cube(&self, facts: impl IntoIterator<Item = usize>) -> Ref {
        self.bdd.var_cube(facts.into_iter().map(succ_var))
    }

    /// Renaming between the pre-state and successor variables of the given facts.
    pub fn swap_mapping(&self, facts: impl IntoIterator<Item = usize>) -> SwapMapping {
        let mut mapping = SwapMapping::default();
        for i in facts {
            mapping.to_succ.insert(pre_var(i), succ_var(i));
            mapping.to_pre.insert(succ_var(i), pre_var(i));
        }
        mapping
    }

    /// Rename pre-state variables to successor variables.
    pub fn swap_pre_to_succ(&self, f: Ref, mapping: &SwapMapping) -> Ref {
        self.bdd.rename(f, &mapping.to_succ)
    }

    /// Rename successor variables to pre-state variables.
    pub fn swap_succ_to_pre(&self, f: Ref, mapping: &SwapMapping) -> Ref {
        self.bdd.rename(f, &mapping.to_pre)
    }

    /// `∧ (v ↔ v')` over the given facts: the listed facts keep their value.
    pub fn frame_axioms(&self, facts: impl IntoIterator<Item = usize>) -> Ref {
        self.bdd
            .apply_and_many(facts.into_iter().map(|i| self.bdd.apply_eq(self.pre_bdd(i), self.succ_bdd(i))))
    }

    /// Number of states in a set over pre-state variables.
    pub fn count_states(&self, f: Ref) -> BigUint {
        let n = self.num_facts();
        self.bdd.sat_count(f, 2 * n) >> n
    }

    /// Some state of the set, unconstrained facts set to false.
    pub fn sample_state(&self, f: Ref) -> Option<Vec<bool>> {
        let model = self.bdd.one_sat(f)?;
        let mut state = vec![false; self.num_facts()];
        for lit in model {
            let v = lit.unsigned_abs();
            if v % 2 == 1 {
                state[((v - 1) / 2) as usize] = lit > 0;
            }
        }
        Some(state)
    }

    /// Whether `state` belongs to the set.
    pub fn contains(&self, f: Ref, state: &[bool]) -> bool {
        !self.bdd.is_zero(self.bdd.apply_and(f, self.state_bdd(state)))
    }

    /// Weighted sum of fact indicators: `Σ value · [fact]`.
    pub fn utility_add(&self, utilities: &[(Fact, f64)]) -> AddRef {
        utilities.iter().fold(self.add.zero(), |acc, &(fact, value)| {
            let term = self.add.from_bdd(&self.bdd, self.fact_bdd(fact), value, 0.0);
            self.add.plus(acc, term)
        })
    }

    pub fn variable_name(&self, v: u32) -> String {
        let i = ((v - 1) / 2) as usize;
        let name = self.names.get(i).map(String::as_str).unwrap_or("?");
        if v % 2 == 1 {
            name.to_string()
        } else {
            format!("{}'", name)
        }
    }

    /// Graphviz rendering with planning variable names.
    pub fn to_dot(&self, roots: &[Ref]) -> Result<String, std::fmt::Error> {
        self.bdd.to_dot_with_labels(roots, |v| self.variable_name(v))
    }
}

/// Variable renaming restricted to a set of facts.
#[derive(Debug, Clone, Default)]
pub struct SwapMapping {
    to_succ: HashMap<u32, u32>,
    to_pre: HashMap<u32, u32>,
}

pub fn pre_var(i: usize) -> u32 {
    2 * i as u32 + 1
}

pub fn succ_var(i: usize) -> u32 {
    2 * i as u32 + 2
}
