//! The BDD manager.
//!
//! All diagrams live in one [`Bdd`] manager which owns the unique table and
//! the computed table. Nodes are referenced through signed [`Ref`] handles:
//! a negative handle is the complement of the node. The high edge of a stored
//! node is never complemented, which keeps the representation canonical.
//!
//! Variables are 1-indexed and ordered by index (smaller index is closer to
//! the root). The terminal node has variable `0`.
//!
//! Besides the usual boolean operations, the manager provides the two
//! quantification primitives symbolic search is built on: [`Bdd::exists`] and
//! the relational product [`Bdd::and_exists`], the latter optionally bounded
//! by a budget of freshly created nodes.

use std::cell::RefCell;
use std::cmp::min;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;

use log::debug;

use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::reference::Ref;
use crate::table::Table;

type Storage = Table<Node>;

impl Storage {
    pub fn variable(&self, index: usize) -> u32 {
        self.value(index).variable
    }
    pub fn low(&self, index: usize) -> Ref {
        self.value(index).low
    }
    pub fn high(&self, index: usize) -> Ref {
        self.value(index).high
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OpKey {
    Ite(Ref, Ref, Ref),
    Exists(Ref, Ref),
    AndExists(Ref, Ref, Ref),
}

/// Bound on the number of nodes a single operation may create.
#[derive(Debug, Copy, Clone)]
struct Budget {
    start: usize,
    limit: usize,
}

pub struct Bdd {
    storage: RefCell<Storage>,
    cache: RefCell<Cache<OpKey, Ref>>,
    size_cache: RefCell<Cache<Ref, u64>>,
    pub zero: Ref,
    pub one: Ref,
}

impl Bdd {
    pub fn new(storage_bits: usize) -> Self {
        assert!(
            storage_bits <= 31,
            "Storage bits should be in the range 0..=31"
        );

        let cache_bits = min(storage_bits, 16);

        let mut storage = Storage::new(storage_bits);

        // Allocate the terminal node:
        let one = storage.put(Node::default());
        assert_eq!(one, 1); // Make sure the terminal node is (1).
        let one = Ref::positive(one as u32);
        let zero = -one;

        Self {
            storage: RefCell::new(storage),
            cache: RefCell::new(Cache::new(cache_bits)),
            size_cache: RefCell::new(Cache::new(cache_bits)),
            zero,
            one,
        }
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new(20)
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.borrow();
        let cache = self.cache.borrow();
        f.debug_struct("Bdd")
            .field("capacity", &storage.capacity())
            .field("real_size", &storage.real_size())
            .field("cache_entries", &cache.len())
            .field("cache_hits", &cache.hits())
            .field("cache_misses", &cache.misses())
            .finish()
    }
}

impl Bdd {
    pub fn variable(&self, index: u32) -> u32 {
        self.storage.borrow().variable(index as usize)
    }
    pub fn low(&self, index: u32) -> Ref {
        self.storage.borrow().low(index as usize)
    }
    pub fn high(&self, index: u32) -> Ref {
        self.storage.borrow().high(index as usize)
    }

    /// Number of nodes ever created by this manager (terminal included).
    pub fn num_nodes(&self) -> usize {
        self.storage.borrow().real_size()
    }

    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.low(node.index());
        if node.is_negated() {
            -low
        } else {
            low
        }
    }
    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.high(node.index());
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        self.is_zero(node) || self.is_one(node)
    }

    pub fn mk_node(&self, v: u32, low: Ref, high: Ref) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");

        // Handle canonicity
        if high.is_negated() {
            return -self.mk_node(v, -low, -high);
        }

        // Handle duplicates
        if low == high {
            return low;
        }

        let i = self.storage.borrow_mut().put(Node {
            variable: v,
            low,
            high,
        });
        Ref::positive(i as u32)
    }

    pub fn mk_var(&self, v: u32) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");
        self.mk_node(v, self.zero, self.one)
    }

    /// Conjunction of the given literals (positive or negative variable indices).
    pub fn cube(&self, literals: impl IntoIterator<Item = i32>) -> Ref {
        let mut literals = literals.into_iter().collect::<Vec<_>>();
        literals.sort_by_key(|&v| v.abs());
        literals.dedup();
        literals.reverse();
        let mut current = self.one;
        for lit in literals {
            assert_ne!(lit, 0, "Variable index should not be zero");
            current = if lit < 0 {
                self.mk_node(lit.unsigned_abs(), current, self.zero)
            } else {
                self.mk_node(lit as u32, self.zero, current)
            };
        }
        current
    }

    /// Positive cube over the given variables, as used for quantification.
    pub fn var_cube(&self, variables: impl IntoIterator<Item = u32>) -> Ref {
        self.cube(variables.into_iter().map(|v| v as i32))
    }

    pub fn top_cofactors(&self, node: Ref, v: u32) -> (Ref, Ref) {
        assert_ne!(v, 0, "Variable index should not be zero");

        let i = node.index();
        if self.is_terminal(node) || v < self.variable(i) {
            return (node, node);
        }
        assert_eq!(v, self.variable(i));
        if node.is_negated() {
            (-self.low(i), -self.high(i))
        } else {
            (self.low(i), self.high(i))
        }
    }

    /// `if f then g else h`, the operation every binary connective reduces to.
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }

        // Replace operands equal to `f` or `~f` by constants.
        let g = if g == f {
            self.one
        } else if g == -f {
            self.zero
        } else {
            g
        };
        let h = if h == f {
            self.zero
        } else if h == -f {
            self.one
        } else {
            h
        };
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }

        // Cache key with regular `f` and `g`; a complemented `g` complements the result.
        let (f, g, h) = if f.is_negated() { (-f, h, g) } else { (f, g, h) };
        let (g, h, negate) = if g.is_negated() { (-g, -h, true) } else { (g, h, false) };
        let sign = |r: Ref| if negate { -r } else { r };

        let key = OpKey::Ite(f, g, h);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return sign(res);
        }

        let top = [f, g, h]
            .iter()
            .map(|r| self.variable(r.index()))
            .filter(|&v| v != 0)
            .min()
            .unwrap_or(0);

        let (f0, f1) = self.top_cofactors(f, top);
        let (g0, g1) = self.top_cofactors(g, top);
        let (h0, h1) = self.top_cofactors(h, top);
        let low = self.apply_ite(f0, g0, h0);
        let high = self.apply_ite(f1, g1, h1);
        let res = self.mk_node(top, low, high);

        self.cache.borrow_mut().insert(key, res);
        sign(res)
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.zero)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, self.one, v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, v)
    }

    pub fn apply_eq(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, -v)
    }

    /// `u ∧ ¬v`
    pub fn apply_diff(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, self.zero)
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.one;
        for node in nodes.into_iter() {
            res = self.apply_and(res, node);
            if self.is_zero(res) {
                break;
            }
        }
        res
    }

    pub fn apply_or_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.zero;
        for node in nodes.into_iter() {
            res = self.apply_or(res, node);
            if self.is_one(res) {
                break;
            }
        }
        res
    }

    /// Disjunction that fails if the result is larger than `max_nodes`.
    pub fn apply_or_limited(&self, u: Ref, v: Ref, max_nodes: usize) -> Result<Ref> {
        let res = self.apply_or(u, v);
        if self.size(res) as usize > max_nodes {
            return Err(Error::NodeLimit { limit: max_nodes });
        }
        Ok(res)
    }

    pub fn is_implies(&self, f: Ref, g: Ref) -> bool {
        self.is_zero(self.apply_diff(f, g))
    }

    /// Existential quantification of `f` over the (positive) cube of variables.
    pub fn exists(&self, f: Ref, cube: Ref) -> Ref {
        if self.is_terminal(f) || self.is_one(cube) {
            return f;
        }

        let v = self.variable(f.index());

        // Skip the quantified variables above the top of `f`:
        let mut cube = cube;
        while !self.is_one(cube) && self.variable(cube.index()) < v {
            cube = self.high_node(cube);
        }
        if self.is_one(cube) {
            return f;
        }

        let key = OpKey::Exists(f, cube);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return res;
        }

        let (f0, f1) = self.top_cofactors(f, v);
        let res = if self.variable(cube.index()) == v {
            let rest = self.high_node(cube);
            let t = self.exists(f1, rest);
            if self.is_one(t) {
                self.one
            } else {
                let e = self.exists(f0, rest);
                self.apply_or(t, e)
            }
        } else {
            let e = self.exists(f0, cube);
            let t = self.exists(f1, cube);
            self.mk_node(v, e, t)
        };

        self.cache.borrow_mut().insert(key, res);
        res
    }

    /// Relational product `∃cube. f ∧ g`.
    ///
    /// Fails with [`Error::NodeLimit`] as soon as the computation has created
    /// more than `max_nodes` new nodes. Pass `usize::MAX` for an unbounded
    /// product. Partial results computed before the abort stay cached.
    pub fn and_exists(&self, f: Ref, g: Ref, cube: Ref, max_nodes: usize) -> Result<Ref> {
        let budget = Budget {
            start: self.num_nodes(),
            limit: max_nodes,
        };
        let res = self.and_exists_(f, g, cube, budget);
        if let Err(e) = &res {
            debug!("and_exists aborted: {}", e);
        }
        res
    }

    fn check_budget(&self, budget: Budget) -> Result<()> {
        if self.num_nodes().saturating_sub(budget.start) > budget.limit {
            return Err(Error::NodeLimit {
                limit: budget.limit,
            });
        }
        Ok(())
    }

    fn and_exists_(&self, f: Ref, g: Ref, cube: Ref, budget: Budget) -> Result<Ref> {
        if self.is_zero(f) || self.is_zero(g) || f == -g {
            return Ok(self.zero);
        }
        if self.is_one(f) && self.is_one(g) {
            return Ok(self.one);
        }
        if self.is_one(f) || f == g {
            let res = self.exists(g, cube);
            self.check_budget(budget)?;
            return Ok(res);
        }
        if self.is_one(g) {
            let res = self.exists(f, cube);
            self.check_budget(budget)?;
            return Ok(res);
        }

        // Conjunction is commutative: normalize the operand order for caching.
        let (f, g) = if f > g { (g, f) } else { (f, g) };

        let top = min(self.variable(f.index()), self.variable(g.index()));

        let mut cube = cube;
        while !self.is_one(cube) && self.variable(cube.index()) < top {
            cube = self.high_node(cube);
        }
        if self.is_one(cube) {
            let res = self.apply_and(f, g);
            self.check_budget(budget)?;
            return Ok(res);
        }

        let key = OpKey::AndExists(f, g, cube);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return Ok(res);
        }

        let (f0, f1) = self.top_cofactors(f, top);
        let (g0, g1) = self.top_cofactors(g, top);

        let res = if self.variable(cube.index()) == top {
            let rest = self.high_node(cube);
            let t = self.and_exists_(f1, g1, rest, budget)?;
            if self.is_one(t) {
                self.one
            } else {
                let e = self.and_exists_(f0, g0, rest, budget)?;
                self.apply_or(t, e)
            }
        } else {
            let e = self.and_exists_(f0, g0, cube, budget)?;
            let t = self.and_exists_(f1, g1, cube, budget)?;
            self.mk_node(top, e, t)
        };
        self.check_budget(budget)?;

        self.cache.borrow_mut().insert(key, res);
        Ok(res)
    }

    /// Rename the variables of `f` according to `mapping`.
    ///
    /// Variables absent from the mapping are kept. The mapping does not have
    /// to preserve the variable order.
    pub fn rename(&self, f: Ref, mapping: &HashMap<u32, u32>) -> Ref {
        let mut cache = HashMap::new();
        self.rename_(f, mapping, &mut cache)
    }

    fn rename_(&self, f: Ref, mapping: &HashMap<u32, u32>, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }
        if f.is_negated() {
            return -self.rename_(-f, mapping, cache);
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let i = f.index();
        let v = self.variable(i);
        let low = self.rename_(self.low(i), mapping, cache);
        let high = self.rename_(self.high(i), mapping, cache);
        let w = mapping.get(&v).copied().unwrap_or(v);
        let res = self.apply_ite(self.mk_var(w), high, low);

        cache.insert(f, res);
        res
    }

    pub fn descendants(&self, nodes: impl IntoIterator<Item = Ref>) -> HashSet<u32> {
        let mut visited = HashSet::new();
        visited.insert(self.one.index());
        let mut queue = VecDeque::from_iter(nodes);

        while let Some(node) = queue.pop_front() {
            let i = node.index();
            if visited.insert(i) {
                queue.push_back(self.low(i));
                queue.push_back(self.high(i));
            }
        }

        visited
    }

    /// Number of nodes in `f`, terminal included.
    pub fn size(&self, f: Ref) -> u64 {
        if let Some(&size) = self.size_cache.borrow().get(&f) {
            return size;
        }
        let size = self.descendants([f]).len() as u64;
        self.size_cache.borrow_mut().insert(f, size);
        size
    }
}
