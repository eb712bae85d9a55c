//! Boolean STRIPS-like planning tasks.
//!
//! States are vectors of booleans, one per variable. Operators have
//! conjunctive preconditions and unconditional effects.

use std::fmt::{Display, Formatter};

use crate::error::{Error, Result};

/// Assignment of one variable.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Fact {
    pub var: usize,
    pub value: bool,
}

impl Fact {
    pub const fn new(var: usize, value: bool) -> Self {
        Self { var, value }
    }

    pub const fn pos(var: usize) -> Self {
        Self::new(var, true)
    }

    pub const fn neg(var: usize) -> Self {
        Self::new(var, false)
    }

    pub fn holds_in(&self, state: &[bool]) -> bool {
        state.get(self.var) == Some(&self.value)
    }
}

impl Display for Fact {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", if self.value { "" } else { "!" }, self.var)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OperatorId(pub usize);

impl Display for OperatorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "op{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Operator {
    pub name: String,
    pub cost: u32,
    pub preconditions: Vec<Fact>,
    pub effects: Vec<Fact>,
}

impl Operator {
    pub fn new(name: impl Into<String>, cost: u32) -> Self {
        Self {
            name: name.into(),
            cost,
            preconditions: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn pre(mut self, fact: Fact) -> Self {
        self.preconditions.push(fact);
        self
    }

    pub fn eff(mut self, fact: Fact) -> Self {
        self.effects.push(fact);
        self
    }

    pub fn is_applicable(&self, state: &[bool]) -> bool {
        self.preconditions.iter().all(|p| p.holds_in(state))
    }
}

/// A sequence of operators together with its total cost.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Plan {
    pub operators: Vec<OperatorId>,
    pub cost: u32,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanningTask {
    pub variables: Vec<String>,
    pub operators: Vec<Operator>,
    pub initial_state: Vec<bool>,
    pub goal: Vec<Fact>,
    /// Utility of each fact for oversubscription planning. Empty for classical planning.
    pub utilities: Vec<(Fact, f64)>,
    /// Plans must cost strictly less than this bound.
    pub plan_bound: Option<u32>,
}

impl PlanningTask {
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn operator(&self, id: OperatorId) -> &Operator {
        &self.operators[id.0]
    }

    fn check_fact(&self, fact: &Fact, what: &str) -> Result<()> {
        if fact.var >= self.num_variables() {
            return Err(Error::InvalidTask(format!(
                "{} refers to unknown variable {}",
                what, fact.var
            )));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_state.len() != self.num_variables() {
            return Err(Error::InvalidTask(format!(
                "initial state has {} values for {} variables",
                self.initial_state.len(),
                self.num_variables()
            )));
        }
        for fact in &self.goal {
            self.check_fact(fact, "goal")?;
        }
        for op in &self.operators {
            for fact in op.preconditions.iter().chain(&op.effects) {
                self.check_fact(fact, &format!("operator '{}'", op.name))?;
            }
            for (i, a) in op.effects.iter().enumerate() {
                if op.effects[..i].iter().any(|b| b.var == a.var && b.value != a.value) {
                    return Err(Error::InvalidTask(format!(
                        "operator '{}' has contradictory effects on variable {}",
                        op.name, a.var
                    )));
                }
            }
        }
        for &(fact, value) in &self.utilities {
            self.check_fact(&fact, "utility")?;
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidUtility { fact, value });
            }
        }
        Ok(())
    }

    /// Successor of `state`, or `None` if the operator is not applicable.
    pub fn apply(&self, state: &[bool], id: OperatorId) -> Option<Vec<bool>> {
        let op = self.operator(id);
        if !op.is_applicable(state) {
            return None;
        }
        let mut next = state.to_vec();
        for e in &op.effects {
            next[e.var] = e.value;
        }
        Some(next)
    }

    pub fn is_goal(&self, state: &[bool]) -> bool {
        self.goal.iter().all(|g| g.holds_in(state))
    }

    pub fn utility(&self, state: &[bool]) -> f64 {
        self.utilities
            .iter()
            .filter(|(fact, _)| fact.holds_in(state))
            .map(|(_, value)| value)
            .sum()
    }

    pub fn plan_cost(&self, operators: &[OperatorId]) -> u32 {
        operators.iter().map(|&id| self.operator(id).cost).sum()
    }

    /// Execute the plan from the initial state and return the final state.
    pub fn simulate(&self, operators: &[OperatorId]) -> Result<Vec<bool>> {
        let mut state = self.initial_state.clone();
        for (step, &id) in operators.iter().enumerate() {
            if id.0 >= self.operators.len() {
                return Err(Error::InvalidPlan(format!("unknown operator {} at step {}", id, step)));
            }
            state = self.apply(&state, id).ok_or_else(|| {
                Error::InvalidPlan(format!(
                    "operator '{}' is not applicable at step {}",
                    self.operator(id).name,
                    step
                ))
            })?;
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn two_switches() -> PlanningTask {
        PlanningTask {
            variables: vec!["a".into(), "b".into()],
            operators: vec![
                Operator::new("set-a", 1).pre(Fact::neg(0)).eff(Fact::pos(0)),
                Operator::new("set-b", 2).pre(Fact::pos(0)).eff(Fact::pos(1)),
            ],
            initial_state: vec![false, false],
            goal: vec![Fact::pos(1)],
            utilities: vec![(Fact::pos(0), 1.5), (Fact::pos(1), 2.0)],
            plan_bound: None,
        }
    }

    #[test]
    fn test_validate() {
        let task = two_switches();
        assert!(task.validate().is_ok());

        let mut bad = two_switches();
        bad.initial_state.pop();
        assert!(matches!(bad.validate(), Err(Error::InvalidTask(_))));

        let mut bad = two_switches();
        bad.operators[0].effects.push(Fact::neg(0));
        assert!(matches!(bad.validate(), Err(Error::InvalidTask(_))));

        let mut bad = two_switches();
        bad.utilities.push((Fact::pos(1), f64::INFINITY));
        assert!(matches!(bad.validate(), Err(Error::InvalidUtility { .. })));
    }

    #[test]
    fn test_simulate() {
        let task = two_switches();
        let plan = [OperatorId(0), OperatorId(1)];
        let end = task.simulate(&plan).unwrap();
        assert!(task.is_goal(&end));
        assert_eq!(task.plan_cost(&plan), 3);
        assert_eq!(task.utility(&end), 3.5);

        assert!(matches!(task.simulate(&[OperatorId(1)]), Err(Error::InvalidPlan(_))));
        assert!(matches!(task.simulate(&[OperatorId(7)]), Err(Error::InvalidPlan(_))));
    }
}
