//! Algebraic decision diagrams: real-valued functions over boolean variables.
//!
//! An [`AddManager`] keeps its own unique table; variable indices are shared
//! with the [`Bdd`] manager so the two kinds of diagrams can be converted into
//! each other. There are no complemented edges here: every node is referenced
//! directly by its table index wrapped in [`AddRef`].

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::{Debug, Display, Formatter};

use crate::bdd::Bdd;
use crate::cache::Cache;
use crate::reference::Ref;
use crate::table::Table;
use crate::utils::{pairing2, pairing3, MyHash};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AddRef(u32);

impl AddRef {
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl Display for AddRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Internal ADD node. Terminals have variable `0` and carry the bits of their value.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
struct AddNode {
    variable: u32,
    low: u32,
    high: u32,
    value: u64,
}

impl MyHash for AddNode {
    fn hash(&self) -> u64 {
        pairing2(
            pairing3(self.variable as u64, self.low as u64, self.high as u64),
            self.value,
        )
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AddOp {
    Plus,
    Times,
    Maximum,
}

impl AddOp {
    fn eval(self, a: f64, b: f64) -> f64 {
        match self {
            AddOp::Plus => a + b,
            AddOp::Times => {
                // Zero annihilates, infinities included.
                if a == 0.0 || b == 0.0 {
                    0.0
                } else {
                    a * b
                }
            }
            AddOp::Maximum => a.max(b),
        }
    }
}

/// Canonical bit pattern of a terminal value: `-0.0` is `0.0`, all NaNs are equal.
fn value_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

pub struct AddManager {
    storage: RefCell<Table<AddNode>>,
    cache: RefCell<Cache<(AddOp, AddRef, AddRef), AddRef>>,
}

impl AddManager {
    pub fn new(storage_bits: usize) -> Self {
        Self {
            storage: RefCell::new(Table::new(storage_bits)),
            cache: RefCell::new(Cache::new(storage_bits.min(16))),
        }
    }
}

impl Default for AddManager {
    fn default() -> Self {
        AddManager::new(16)
    }
}

impl Debug for AddManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.borrow();
        f.debug_struct("AddManager")
            .field("capacity", &storage.capacity())
            .field("real_size", &storage.real_size())
            .finish()
    }
}

impl AddManager {
    fn node(&self, f: AddRef) -> AddNode {
        *self.storage.borrow().value(f.0 as usize)
    }

    pub fn constant(&self, value: f64) -> AddRef {
        let i = self.storage.borrow_mut().put(AddNode {
            variable: 0,
            low: 0,
            high: 0,
            value: value_bits(value),
        });
        AddRef(i as u32)
    }

    pub fn zero(&self) -> AddRef {
        self.constant(0.0)
    }

    pub fn is_terminal(&self, f: AddRef) -> bool {
        self.node(f).variable == 0
    }

    /// Value of a terminal, `None` for decision nodes.
    pub fn value(&self, f: AddRef) -> Option<f64> {
        let node = self.node(f);
        (node.variable == 0).then(|| f64::from_bits(node.value))
    }

    pub fn variable(&self, f: AddRef) -> u32 {
        self.node(f).variable
    }

    pub fn mk_node(&self, v: u32, low: AddRef, high: AddRef) -> AddRef {
        assert_ne!(v, 0, "Variable index should not be zero");
        if low == high {
            return low;
        }
        let i = self.storage.borrow_mut().put(AddNode {
            variable: v,
            low: low.0,
            high: high.0,
            value: 0,
        });
        AddRef(i as u32)
    }

    /// Cofactors of `f` with respect to variable `v` (which must be at or above the top of `f`).
    fn top_cofactors(&self, f: AddRef, v: u32) -> (AddRef, AddRef) {
        let node = self.node(f);
        if node.variable == 0 || v < node.variable {
            return (f, f);
        }
        debug_assert_eq!(node.variable, v);
        (AddRef(node.low), AddRef(node.high))
    }

    /// Indicator of a BDD, taking `one` where `f` holds and `zero` elsewhere.
    pub fn from_bdd(&self, bdd: &Bdd, f: Ref, one: f64, zero: f64) -> AddRef {
        let mut cache = HashMap::new();
        let one = self.constant(one);
        let zero = self.constant(zero);
        self.from_bdd_(bdd, f, one, zero, &mut cache)
    }

    fn from_bdd_(
        &self,
        bdd: &Bdd,
        f: Ref,
        one: AddRef,
        zero: AddRef,
        cache: &mut HashMap<Ref, AddRef>,
    ) -> AddRef {
        if bdd.is_one(f) {
            return one;
        }
        if bdd.is_zero(f) {
            return zero;
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }
        let v = bdd.variable(f.index());
        let low = self.from_bdd_(bdd, bdd.low_node(f), one, zero, cache);
        let high = self.from_bdd_(bdd, bdd.high_node(f), one, zero, cache);
        let res = self.mk_node(v, low, high);
        cache.insert(f, res);
        res
    }

    pub fn apply(&self, op: AddOp, f: AddRef, g: AddRef) -> AddRef {
        let (vf, vg) = (self.value(f), self.value(g));
        if let (Some(a), Some(b)) = (vf, vg) {
            return self.constant(op.eval(a, b));
        }
        match op {
            AddOp::Times if vf == Some(0.0) || vg == Some(0.0) => return self.zero(),
            AddOp::Times if vf == Some(1.0) => return g,
            AddOp::Times if vg == Some(1.0) => return f,
            AddOp::Plus if vf == Some(0.0) => return g,
            AddOp::Plus if vg == Some(0.0) => return f,
            AddOp::Maximum if f == g => return f,
            _ => {}
        }

        // All operations are commutative.
        let (f, g) = if f > g { (g, f) } else { (f, g) };
        let key = (op, f, g);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return res;
        }

        let (i, j) = (self.variable(f), self.variable(g));
        let m = match (i, j) {
            (0, j) => j,
            (i, 0) => i,
            (i, j) => i.min(j),
        };
        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let low = self.apply(op, f0, g0);
        let high = self.apply(op, f1, g1);
        let res = self.mk_node(m, low, high);

        self.cache.borrow_mut().insert(key, res);
        res
    }

    pub fn plus(&self, f: AddRef, g: AddRef) -> AddRef {
        self.apply(AddOp::Plus, f, g)
    }

    pub fn times(&self, f: AddRef, g: AddRef) -> AddRef {
        self.apply(AddOp::Times, f, g)
    }

    pub fn maximum(&self, f: AddRef, g: AddRef) -> AddRef {
        self.apply(AddOp::Maximum, f, g)
    }

    fn descendants(&self, f: AddRef) -> HashSet<AddRef> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([f]);
        while let Some(node) = queue.pop_front() {
            if visited.insert(node) {
                let n = self.node(node);
                if n.variable != 0 {
                    queue.push_back(AddRef(n.low));
                    queue.push_back(AddRef(n.high));
                }
            }
        }
        visited
    }

    /// Distinct terminal values reachable from `f`, NaN excluded, in ascending order.
    pub fn leaves(&self, f: AddRef) -> Vec<f64> {
        let values: BTreeSet<u64> = self
            .descendants(f)
            .into_iter()
            .filter_map(|r| self.value(r))
            .filter(|v| !v.is_nan())
            .map(value_bits)
            .collect();
        let mut values: Vec<f64> = values.into_iter().map(f64::from_bits).collect();
        values.sort_by(f64::total_cmp);
        values
    }

    pub fn find_max(&self, f: AddRef) -> f64 {
        self.leaves(f).last().copied().unwrap_or(f64::NAN)
    }

    pub fn find_min(&self, f: AddRef) -> f64 {
        self.leaves(f).first().copied().unwrap_or(f64::NAN)
    }

    /// Largest finite terminal value, if any.
    pub fn find_max_finite(&self, f: AddRef) -> Option<f64> {
        self.leaves(f).into_iter().rev().find(|v| v.is_finite())
    }

    /// BDD of the assignments where `f` is at least `t`.
    pub fn threshold(&self, bdd: &Bdd, f: AddRef, t: f64) -> Ref {
        self.to_bdd_by(bdd, f, &|v| v >= t)
    }

    /// BDD of the assignments where `lo <= f <= hi`.
    pub fn interval(&self, bdd: &Bdd, f: AddRef, lo: f64, hi: f64) -> Ref {
        self.to_bdd_by(bdd, f, &|v| lo <= v && v <= hi)
    }

    fn to_bdd_by(&self, bdd: &Bdd, f: AddRef, pred: &dyn Fn(f64) -> bool) -> Ref {
        let mut cache = HashMap::new();
        self.to_bdd_by_(bdd, f, pred, &mut cache)
    }

    fn to_bdd_by_(
        &self,
        bdd: &Bdd,
        f: AddRef,
        pred: &dyn Fn(f64) -> bool,
        cache: &mut HashMap<AddRef, Ref>,
    ) -> Ref {
        let node = self.node(f);
        if node.variable == 0 {
            return if pred(f64::from_bits(node.value)) {
                bdd.one
            } else {
                bdd.zero
            };
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }
        let low = self.to_bdd_by_(bdd, AddRef(node.low), pred, cache);
        let high = self.to_bdd_by_(bdd, AddRef(node.high), pred, cache);
        let res = bdd.mk_node(node.variable, low, high);
        cache.insert(f, res);
        res
    }

    /// Evaluate `f` under a full assignment of the variables.
    pub fn eval(&self, f: AddRef, assignment: impl Fn(u32) -> bool) -> f64 {
        let mut current = f;
        loop {
            let node = self.node(current);
            if node.variable == 0 {
                return f64::from_bits(node.value);
            }
            current = AddRef(if assignment(node.variable) {
                node.high
            } else {
                node.low
            });
        }
    }

    pub fn size(&self, f: AddRef) -> usize {
        self.descendants(f).len()
    }
}
