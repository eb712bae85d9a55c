//! BDD to DOT (Graphviz) conversion.
//!
//! Terminals are squares at the bottom, decision nodes are grouped by
//! variable, high edges are solid, low edges dashed and complemented edges
//! dotted with a hollow circle. Labels are supplied by the caller so that
//! planning variables can be shown by name (see
//! [`SymVariables::to_dot`][crate::vars::SymVariables::to_dot]).

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::bdd::Bdd;
use crate::reference::Ref;

impl Bdd {
    /// Converts the diagrams rooted at `roots` to DOT format, labelling nodes `x<var>`.
    ///
    /// ```
    /// use sym_search::bdd::Bdd;
    ///
    /// let bdd = Bdd::default();
    /// let f = bdd.apply_and(bdd.mk_var(1), bdd.mk_var(2));
    /// let dot = bdd.to_dot(&[f]).unwrap();
    /// assert!(dot.starts_with("graph {"));
    /// ```
    pub fn to_dot(&self, roots: &[Ref]) -> Result<String, std::fmt::Error> {
        self.to_dot_with_labels(roots, |v| format!("x{}", v))
    }

    /// Converts the diagrams rooted at `roots` to DOT format, with custom variable labels.
    pub fn to_dot_with_labels(
        &self,
        roots: &[Ref],
        label: impl Fn(u32) -> String,
    ) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "graph {{")?;
        writeln!(dot, "node [shape=circle];")?;

        writeln!(dot, "{{ rank=sink")?;
        writeln!(dot, "0 [shape=square, label=\"0\"];")?;
        writeln!(dot, "1 [shape=square, label=\"1\"];")?;
        writeln!(dot, "}}")?;

        let all_nodes = self.descendants(roots.iter().copied());

        let mut levels = BTreeMap::<u32, Vec<u32>>::new();
        for &id in all_nodes.iter() {
            if id == 1 {
                continue;
            }
            levels.entry(self.variable(id)).or_default().push(id);
        }

        for (&v, ids) in levels.iter() {
            writeln!(dot, "{{ rank=same")?;
            let text = label(v).replace('"', "\\\"");
            for id in ids {
                writeln!(dot, "{} [label=\"{}\"];", id, text)?;
            }
            writeln!(dot, "}}")?;
        }

        for ids in levels.values() {
            for &id in ids {
                // High edges are never complemented.
                let high = self.high(id);
                writeln!(dot, "{} -- {} [style=solid];", id, high.index())?;

                let low = self.low(id);
                if low == self.zero {
                    writeln!(dot, "{} -- 0 [style=dashed];", id)?;
                } else if low.is_negated() {
                    writeln!(
                        dot,
                        "{} -- {} [style=dotted, dir=forward, arrowhead=odot];",
                        id,
                        low.index()
                    )?;
                } else {
                    writeln!(dot, "{} -- {} [style=dashed];", id, low.index())?;
                }
            }
        }

        writeln!(dot, "{{ rank=source")?;
        for (i, root) in roots.iter().enumerate() {
            writeln!(dot, "r{} [shape=rect, label=\"{}\"];", i, root)?;
        }
        writeln!(dot, "}}")?;

        for (i, &root) in roots.iter().enumerate() {
            if root == self.zero {
                writeln!(dot, "r{} -- 0;", i)?;
            } else if root.is_negated() {
                writeln!(dot, "r{} -- {} [dir=forward, arrowhead=odot];", i, root.index())?;
            } else {
                writeln!(dot, "r{} -- {};", i, root.index())?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_dot_basic() {
        let bdd = Bdd::default();
        let f = bdd.cube([-1, 2, 3]);

        let dot = bdd.to_dot(&[f]).unwrap();
        assert!(dot.starts_with("graph {"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("label=\"x2\""));
    }

    #[test]
    fn test_to_dot_custom_labels() {
        let bdd = Bdd::default();
        let f = bdd.apply_xor(bdd.mk_var(1), bdd.mk_var(2));

        let dot = bdd
            .to_dot_with_labels(&[f, bdd.zero], |v| if v == 1 { "p".into() } else { "q".into() })
            .unwrap();
        assert!(dot.contains("label=\"p\""));
        assert!(dot.contains("label=\"q\""));
        assert!(dot.contains("arrowhead=odot"));
        assert!(dot.contains("r1 -- 0;"));
    }
}
