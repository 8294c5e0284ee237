//! Search configuration: named axes of candidate values expanded against a
//! base run configuration.
//!
//! Expansion follows broadcast semantics: the sweep length N is the longest
//! axis, single-value axes repeat for every run, and any other axis must
//! already have length N. Axis values take precedence over base keys; keys
//! the axes do not mention are inherited from the base unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ExperimentConfig;

/// Mapping from configuration key to the list of values it takes across the
/// sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchGrid {
    pub axes: BTreeMap<String, Vec<Value>>,
}

impl SearchGrid {
    /// Single-axis grid, mostly for tests and programmatic sweeps.
    pub fn single(key: impl Into<String>, values: Vec<Value>) -> Self {
        let mut axes = BTreeMap::new();
        axes.insert(key.into(), values);
        Self { axes }
    }

    /// Number of runs the grid expands to. An empty grid is a single run of
    /// the base configuration.
    pub fn num_runs(&self) -> Result<usize, SweepError> {
        let mut runs = 1;
        for (axis, values) in &self.axes {
            if values.is_empty() {
                return Err(SweepError::EmptyAxis { axis: axis.clone() });
            }
            if values.len() > 1 {
                if runs > 1 && values.len() != runs {
                    return Err(SweepError::AxisLengthMismatch {
                        axis: axis.clone(),
                        len: values.len(),
                        expected: runs,
                    });
                }
                runs = values.len();
            }
        }
        Ok(runs)
    }

    /// Expand against a base configuration into one JSON object per run.
    ///
    /// The result is raw JSON on purpose: a value that does not fit the
    /// typed configuration must fail the affected run, not the whole sweep.
    pub fn resolve(&self, base: &ExperimentConfig) -> Result<Vec<Map<String, Value>>, SweepError> {
        let runs = self.num_runs()?;

        let base_value = serde_json::to_value(base)?;
        let Value::Object(base_map) = base_value else {
            // ExperimentConfig always serializes to an object.
            return Err(SweepError::BaseNotAnObject);
        };

        let mut resolved = Vec::with_capacity(runs);
        for i in 0..runs {
            let mut run_map = base_map.clone();
            for (axis, values) in &self.axes {
                let value = if values.len() == 1 {
                    &values[0]
                } else {
                    &values[i]
                };
                run_map.insert(axis.clone(), value.clone());
            }
            resolved.push(run_map);
        }
        Ok(resolved)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("Search axis `{axis}` has no values")]
    EmptyAxis { axis: String },
    #[error("Search axis `{axis}` has {len} values, expected 1 or {expected}")]
    AxisLengthMismatch {
        axis: String,
        len: usize,
        expected: usize,
    },
    #[error("Base configuration did not serialize to an object")]
    BaseNotAnObject,
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_grid_is_single_run() {
        let grid = SearchGrid::default();
        assert_eq!(grid.num_runs().unwrap(), 1);
        let resolved = grid.resolve(&ExperimentConfig::default()).unwrap();
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_five_by_one_expansion() {
        let values = vec![json!(0.1), json!(0.2), json!(0.3), json!(0.4), json!(0.5)];
        let mut grid = SearchGrid::single("mutation_rate", values.clone());
        grid.axes.insert("pop_size".to_string(), vec![json!(20)]);

        let resolved = grid.resolve(&ExperimentConfig::default()).unwrap();
        assert_eq!(resolved.len(), 5);

        for (i, run) in resolved.iter().enumerate() {
            // The swept axis varies, the singleton broadcasts.
            assert_eq!(run["mutation_rate"], values[i]);
            assert_eq!(run["pop_size"], json!(20));
        }

        // Runs differ only in the swept axis.
        let mut first = resolved[0].clone();
        let mut last = resolved[4].clone();
        first.remove("mutation_rate");
        last.remove("mutation_rate");
        assert_eq!(first, last);
    }

    #[test]
    fn test_axis_length_mismatch() {
        let mut grid = SearchGrid::single("mutation_rate", vec![json!(0.1), json!(0.2)]);
        grid.axes
            .insert("pop_size".to_string(), vec![json!(10), json!(20), json!(30)]);

        assert!(matches!(
            grid.num_runs(),
            Err(SweepError::AxisLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_axis_rejected() {
        let grid = SearchGrid::single("seed", vec![]);
        assert!(matches!(grid.num_runs(), Err(SweepError::EmptyAxis { .. })));
    }

    #[test]
    fn test_axis_overrides_base_and_inherits_rest() {
        let base = ExperimentConfig {
            code_dim: 8,
            ..ExperimentConfig::default()
        };
        let grid = SearchGrid::single("num_generations", vec![json!(5), json!(10)]);

        let resolved = grid.resolve(&base).unwrap();
        assert_eq!(resolved[0]["num_generations"], json!(5));
        assert_eq!(resolved[1]["num_generations"], json!(10));
        assert_eq!(resolved[0]["code_dim"], json!(8));
        assert_eq!(resolved[1]["code_dim"], json!(8));
    }

    #[test]
    fn test_unknown_axis_lands_in_extra() {
        let grid = SearchGrid::single("weights_root", vec![json!("/tmp/a"), json!("/tmp/b")]);
        let resolved = grid.resolve(&ExperimentConfig::default()).unwrap();

        let config: ExperimentConfig =
            serde_json::from_value(Value::Object(resolved[1].clone())).unwrap();
        assert_eq!(config.extra["weights_root"], json!("/tmp/b"));
    }
}
