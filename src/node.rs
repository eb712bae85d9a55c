use crate::reference::Ref;
use crate::utils::{pairing3, MyHash};

/// Internal BDD node. Variable `0` is reserved for the terminal.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Node {
    pub variable: u32,
    pub low: Ref,
    pub high: Ref,
}

#[allow(clippy::derivable_impls)]
impl Default for Node {
    fn default() -> Self {
        Self {
            variable: 0,
            low: Ref::negative(1),
            high: Ref::negative(1),
        }
    }
}

impl MyHash for Node {
    fn hash(&self) -> u64 {
        pairing3(
            self.variable as u64,
            self.low.unsigned() as u64,
            self.high.unsigned() as u64,
        )
    }
}
