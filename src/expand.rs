//! Edit-set expansion
//!
//! Turns a validated sweep declaration into the ordered sequence of concrete
//! edit sets, one per element of the cross-product of all value lists. The
//! sequence is produced lazily by an odometer over the rule slots, so memory
//! stays proportional to the number of rules rather than the number of
//! combinations.
//!
//! Enumeration order is fixed and reproducible: the last declared rule
//! varies fastest. `[a, b] x [1, 2]` enumerates as `a1, a2, b1, b2`.

use crate::sweep_file::{ConfigError, LiteralValue, SweepConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One concrete substitution: replace the value assigned to `variable` on
/// `line_number` of `path` with `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit {
    pub path: PathBuf,
    pub line_number: usize,
    pub variable: String,
    pub value: LiteralValue,
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={} ({}:{})",
            self.variable,
            self.value,
            self.path.display(),
            self.line_number
        )
    }
}

/// One fully-resolved combination: exactly one [`Edit`] per declared rule,
/// in declaration order. Pure data, created per iteration and discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSet {
    pub edits: Vec<Edit>,
}

impl EditSet {
    /// Human-readable rendering, used for progress lines and as the first
    /// line of each run log.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self.edits.iter().map(|e| e.to_string()).collect();
        parts.join(", ")
    }

    /// Edits grouped by target path, preserving declaration order of both
    /// the paths and the edits within each path.
    pub fn by_path(&self) -> Vec<(&Path, Vec<&Edit>)> {
        let mut groups: Vec<(&Path, Vec<&Edit>)> = Vec::new();
        for edit in &self.edits {
            match groups.iter_mut().find(|(p, _)| *p == edit.path.as_path()) {
                Some((_, edits)) => edits.push(edit),
                None => groups.push((edit.path.as_path(), vec![edit])),
            }
        }
        groups
    }
}

impl fmt::Display for EditSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// One rule flattened out of the declaration, with its candidate values.
#[derive(Debug, Clone)]
struct Slot {
    path: PathBuf,
    line_number: usize,
    variable: String,
    values: Vec<LiteralValue>,
}

/// Lazy, restartable enumeration of every edit set in a sweep.
///
/// Created by [`expand`]; yields exactly `product(len(values))` edit sets in
/// a deterministic order (last rule varies fastest).
#[derive(Debug, Clone)]
pub struct EditSets {
    slots: Vec<Slot>,
    indices: Vec<usize>,
    produced: usize,
    total: usize,
}

impl EditSets {
    /// Total number of combinations this enumeration yields.
    pub fn total(&self) -> usize {
        self.total
    }

    fn current(&self) -> EditSet {
        let edits = self
            .slots
            .iter()
            .zip(&self.indices)
            .map(|(slot, &i)| Edit {
                path: slot.path.clone(),
                line_number: slot.line_number,
                variable: slot.variable.clone(),
                value: slot.values[i].clone(),
            })
            .collect();
        EditSet { edits }
    }

    /// Advance the odometer; the last slot ticks fastest.
    fn advance(&mut self) {
        for i in (0..self.indices.len()).rev() {
            self.indices[i] += 1;
            if self.indices[i] < self.slots[i].values.len() {
                return;
            }
            self.indices[i] = 0;
        }
    }
}

impl Iterator for EditSets {
    type Item = EditSet;

    fn next(&mut self) -> Option<EditSet> {
        if self.produced >= self.total {
            return None;
        }
        let set = self.current();
        self.advance();
        self.produced += 1;
        Some(set)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.produced;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for EditSets {}

/// Expand a sweep declaration into its edit-set enumeration.
///
/// Validates the declaration first: an empty declaration or a rule with no
/// values is a [`ConfigError`], never a zero-length valid sequence.
pub fn expand(config: &SweepConfig) -> Result<EditSets, ConfigError> {
    config.validate()?;

    let slots: Vec<Slot> = config
        .targets
        .iter()
        .flat_map(|target| {
            target.configurations.iter().map(|rule| Slot {
                path: target.path.clone(),
                line_number: rule.line_number,
                variable: rule.variable.clone(),
                values: rule.value.as_slice().to_vec(),
            })
        })
        .collect();

    let total = slots.iter().map(|s| s.values.len()).product();
    let indices = vec![0; slots.len()];

    Ok(EditSets {
        slots,
        indices,
        produced: 0,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep_file::parse_sweep_file;

    fn values(set: &EditSet) -> Vec<LiteralValue> {
        set.edits.iter().map(|e| e.value.clone()).collect()
    }

    #[test]
    fn test_single_rule_expansion() {
        let config = parse_sweep_file(
            "path: add.py\nconfigurations:\n  - line_number: 1\n    variable: PARAM\n    value: [1, 2, 3]\n",
        )
        .unwrap();

        let sets: Vec<EditSet> = expand(&config).unwrap().collect();
        assert_eq!(sets.len(), 3);
        for (set, expected) in sets.iter().zip([1, 2, 3]) {
            assert_eq!(set.edits.len(), 1);
            assert_eq!(set.edits[0].line_number, 1);
            assert_eq!(set.edits[0].variable, "PARAM");
            assert_eq!(set.edits[0].value, LiteralValue::Int(expected));
        }
    }

    #[test]
    fn test_two_rules_cover_all_pairings() {
        let config = parse_sweep_file(
            "path: t.py\nconfigurations:\n  - line_number: 1\n    variable: A\n    value: [1, 2]\n  - line_number: 2\n    variable: B\n    value: [10, 20, 30]\n",
        )
        .unwrap();

        let sets: Vec<EditSet> = expand(&config).unwrap().collect();
        assert_eq!(sets.len(), 6);

        // No duplicates
        for (i, a) in sets.iter().enumerate() {
            for b in &sets[i + 1..] {
                assert_ne!(values(a), values(b));
            }
        }
    }

    #[test]
    fn test_last_rule_varies_fastest() {
        let config = parse_sweep_file(
            "path: t.py\nconfigurations:\n  - line_number: 1\n    variable: A\n    value: [1, 2]\n  - line_number: 2\n    variable: B\n    value: [10, 20]\n",
        )
        .unwrap();

        let sets: Vec<EditSet> = expand(&config).unwrap().collect();
        let pairs: Vec<(LiteralValue, LiteralValue)> = sets
            .iter()
            .map(|s| (s.edits[0].value.clone(), s.edits[1].value.clone()))
            .collect();

        use LiteralValue::Int;
        assert_eq!(
            pairs,
            vec![
                (Int(1), Int(10)),
                (Int(1), Int(20)),
                (Int(2), Int(10)),
                (Int(2), Int(20)),
            ]
        );
    }

    #[test]
    fn test_expansion_spans_targets() {
        let config = parse_sweep_file(
            "path: a.py\nconfigurations:\n  - line_number: 1\n    variable: X\n    value: [1, 2]\n---\npath: b.py\nconfigurations:\n  - line_number: 1\n    variable: Y\n    value: 9\n",
        )
        .unwrap();

        let sets: Vec<EditSet> = expand(&config).unwrap().collect();
        assert_eq!(sets.len(), 2);
        for set in &sets {
            assert_eq!(set.edits.len(), 2);
            assert_eq!(set.edits[1].value, LiteralValue::Int(9));
        }
        let groups = sets[0].by_path();
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_exact_size_and_restart() {
        let config = parse_sweep_file(
            "path: t.py\nconfigurations:\n  - line_number: 1\n    variable: A\n    value: [1, 2, 3]\n  - line_number: 2\n    variable: B\n    value: [1, 2]\n",
        )
        .unwrap();

        let sets = expand(&config).unwrap();
        assert_eq!(sets.total(), 6);
        assert_eq!(sets.len(), 6);

        // Two independent expansions enumerate identically
        let first: Vec<EditSet> = expand(&config).unwrap().collect();
        let second: Vec<EditSet> = expand(&config).unwrap().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_declaration_is_error() {
        let config = SweepConfig { targets: vec![] };
        assert!(expand(&config).is_err());
    }

    #[test]
    fn test_describe_names_every_edit() {
        let config = parse_sweep_file(
            "path: t.py\nconfigurations:\n  - line_number: 3\n    variable: RATE\n    value: [0.5]\n",
        )
        .unwrap();
        let set = expand(&config).unwrap().next().unwrap();
        assert_eq!(set.describe(), "RATE=0.5 (t.py:3)");
    }
}
