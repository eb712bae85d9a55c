//! # sym-search: Symbolic Bidirectional Search for Planning
//!
//! **`sym-search`** explores the state space of a planning task with **Binary Decision Diagrams (BDDs)**:
//! instead of expanding states one by one, it expands whole *sets* of states, one cost layer at a time.
//!
//! ## How it works
//!
//! States are assignments to boolean facts. Fact `i` is encoded by BDD variable `2i+1` in the current
//! state and `2i+2` in the successor state, so sets of states and transition relations share one manager.
//!
//! - **Uniform-cost search**: each step closes the cheapest open layer, runs the zero-cost operators to a
//!   fixpoint inside it, and images the result with every positive-cost relation.
//! - **Bidirectional search**: a forward search from the initial state and a backward search from the goal
//!   alternate. Where a frontier meets the opposite closed list, a *solution cut* certifies plans.
//! - **Bounds**: the cheapest cut is an upper bound on the optimal cost; the next open layers of both
//!   searches give a lower bound. The search ends when the bounds meet.
//! - **Plan reconstruction**: plans are traced back from the cuts through both closed lists.
//! - **Oversubscription planning**: with a utility per fact, the search keeps the cut of highest utility
//!   among plans cheaper than a cost bound.
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::rc::Rc;
//! use sym_search::config::SearchParams;
//! use sym_search::engine::{SearchStatus, SymbolicSearch};
//! use sym_search::search::SearchMode;
//! use sym_search::state_space::StateSpace;
//! use sym_search::task::{Fact, Operator, PlanningTask};
//! use sym_search::vars::SymVariables;
//!
//! // Switch a lamp on, at cost 1.
//! let task = PlanningTask {
//!     variables: vec!["lamp".into()],
//!     operators: vec![Operator::new("switch-on", 1).pre(Fact::neg(0)).eff(Fact::pos(0))],
//!     initial_state: vec![false],
//!     goal: vec![Fact::pos(0)],
//!     ..PlanningTask::default()
//! };
//!
//! let params = SearchParams::default();
//! let vars = Rc::new(SymVariables::new(task.variables.clone(), params.storage_bits));
//! let space = Rc::new(StateSpace::from_task(vars, &task, &params).unwrap());
//!
//! let mut search = SymbolicSearch::uniform_cost(space, params, SearchMode::Bidirectional);
//! assert_eq!(search.run().unwrap(), SearchStatus::Solved);
//! assert_eq!(search.plans()[0].cost, 1);
//! ```
//!
//! ## Core Components
//!
//! - **[`bdd`]**: The [`Bdd`][crate::bdd::Bdd] manager with complement edges and the bounded relational product.
//! - **[`add`]**: Algebraic decision diagrams for utility functions.
//! - **[`state_space`]**: Transition relations of a [`task`][crate::task::PlanningTask], merged by cost.
//! - **[`search`]**: Uniform-cost search in one direction and the bidirectional driver.
//! - **[`engine`]**: A search session with its termination policy.
//! - **[`osp`]**: Utility evaluation and the oversubscription policy.

pub mod add;
pub mod bdd;
pub mod bucket;
pub mod cache;
pub mod closed;
pub mod config;
pub mod dot;
pub mod engine;
pub mod error;
pub mod node;
pub mod osp;
pub mod reference;
pub mod registry;
pub mod sat;
pub mod search;
pub mod solution;
pub mod state_space;
pub mod table;
pub mod task;
pub mod transition;
pub mod utils;
pub mod vars;
