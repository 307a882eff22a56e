//! Gradient-boosted tree ensemble loaded from an XGBoost model document
//!
//! Only inference is implemented: the trees are read from the saved model
//! (`save_model` in JSON or UBJSON form) and evaluated exactly the way the
//! XGBoost predictor walks them. Features and split thresholds are compared
//! in single precision, as XGBoost stores them.

use std::path::Path;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ModelError, ModelResult};
use super::ubjson;

/// Output transform applied to the summed tree margins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    SoftProb,
    SoftMax,
    Logistic,
}

impl Objective {
    pub fn parse(name: &str) -> ModelResult<Self> {
        match name {
            "multi:softprob" => Ok(Objective::SoftProb),
            "multi:softmax" => Ok(Objective::SoftMax),
            "binary:logistic" => Ok(Objective::Logistic),
            other => Err(ModelError::UnsupportedObjective(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Objective::SoftProb => "multi:softprob",
            Objective::SoftMax => "multi:softmax",
            Objective::Logistic => "binary:logistic",
        }
    }
}

/// One regression tree in XGBoost's flat array layout
#[derive(Debug, Clone)]
pub struct Tree {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<u32>,
    split_conditions: Vec<f32>,
    default_left: Vec<bool>,
}

impl Tree {
    fn from_value(tree: &Value, num_feature: usize, position: usize) -> ModelResult<Self> {
        let context = format!("tree {}", position);

        if let Some(split_type) = tree.get("split_type") {
            if int_array(split_type, &context)?.iter().any(|t| *t != 0) {
                return Err(ModelError::InvalidBooster(format!(
                    "{} uses categorical splits, which are not supported",
                    context
                )));
            }
        }

        let left = int_array(field(tree, "left_children", &context)?, &context)?;
        let right = int_array(field(tree, "right_children", &context)?, &context)?;
        let indices = int_array(field(tree, "split_indices", &context)?, &context)?;
        let conditions = float_array(field(tree, "split_conditions", &context)?, &context)?;
        let default_left = bool_array(field(tree, "default_left", &context)?, &context)?;

        let num_nodes = left.len();
        if num_nodes == 0 {
            return Err(ModelError::InvalidBooster(format!("{} has no nodes", context)));
        }
        if [right.len(), indices.len(), conditions.len(), default_left.len()]
            .iter()
            .any(|len| *len != num_nodes)
        {
            return Err(ModelError::InvalidBooster(format!(
                "{} has node arrays of different lengths",
                context
            )));
        }

        let mut left_children = Vec::with_capacity(num_nodes);
        let mut right_children = Vec::with_capacity(num_nodes);
        let mut split_indices = Vec::with_capacity(num_nodes);

        for node in 0..num_nodes {
            let (l, r) = (left[node], right[node]);
            let is_leaf = l == -1;

            if !is_leaf {
                let in_range = |child: i64| child > node as i64 && (child as usize) < num_nodes;
                if !in_range(l) || !in_range(r) {
                    return Err(ModelError::InvalidBooster(format!(
                        "{} node {} has child index out of range",
                        context, node
                    )));
                }
                if indices[node] < 0 || indices[node] as usize >= num_feature {
                    return Err(ModelError::InvalidBooster(format!(
                        "{} node {} splits on feature {} but the model has {} features",
                        context, node, indices[node], num_feature
                    )));
                }
            }

            left_children.push(l as i32);
            right_children.push(r as i32);
            split_indices.push(if is_leaf { 0 } else { indices[node] as u32 });
        }

        Ok(Self {
            left_children,
            right_children,
            split_indices,
            split_conditions: conditions,
            default_left,
        })
    }

    /// Walk from the root to a leaf and return the leaf weight.
    pub fn leaf_value(&self, features: &[f32]) -> f32 {
        let mut node = 0usize;
        loop {
            let left = self.left_children[node];
            if left == -1 {
                return self.split_conditions[node];
            }

            let value = features[self.split_indices[node] as usize];
            let go_left = if value.is_nan() {
                self.default_left[node]
            } else {
                value < self.split_conditions[node]
            };

            node = if go_left {
                left as usize
            } else {
                self.right_children[node] as usize
            };
        }
    }
}

#[derive(Debug, Clone)]
pub struct Booster {
    trees: Vec<Tree>,
    tree_groups: Vec<usize>,
    num_feature: usize,
    num_groups: usize,
    base_margin: Vec<f32>,
    objective: Objective,
    tree_limit: usize,
    best_iteration: Option<usize>,
    version: Option<String>,
}

impl Booster {
    /// Load a booster file; `.ubj` is read as UBJSON, anything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|source| ModelError::Io {
            path: shown.clone(),
            source,
        })?;

        let is_ubj = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("ubj"))
            .unwrap_or(false);

        let document = if is_ubj {
            ubjson::from_slice(&bytes)?
        } else {
            serde_json::from_slice(&bytes).map_err(|e| ModelError::Parse {
                path: shown.clone(),
                reason: e.to_string(),
            })?
        };

        let booster = Self::from_document(&document)?;
        info!(
            "🌲 Loaded booster from {}: {} trees, {} classes, {} features ({})",
            shown,
            booster.trees.len(),
            booster.num_classes(),
            booster.num_feature,
            booster.objective.name()
        );
        Ok(booster)
    }

    pub fn from_document(document: &Value) -> ModelResult<Self> {
        let learner = field(document, "learner", "model")?;
        let params = field(learner, "learner_model_param", "learner")?;

        let num_feature = lenient_usize(field(params, "num_feature", "learner_model_param")?)
            .ok_or_else(|| ModelError::InvalidBooster("num_feature is not an integer".into()))?;
        let num_class = params
            .get("num_class")
            .and_then(lenient_usize)
            .unwrap_or(0);

        let objective_name = learner
            .get("objective")
            .and_then(|o| o.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| ModelError::InvalidBooster("objective name missing".into()))?;
        let objective = Objective::parse(objective_name)?;

        let num_groups = match objective {
            Objective::Logistic => 1,
            Objective::SoftProb | Objective::SoftMax => {
                if num_class < 2 {
                    return Err(ModelError::InvalidBooster(format!(
                        "{} requires num_class >= 2, found {}",
                        objective_name, num_class
                    )));
                }
                num_class
            }
        };

        let base_scores = parse_base_score(params.get("base_score"))?;
        let base_margin = match objective {
            Objective::Logistic => {
                let p = base_scores.first().copied().unwrap_or(0.5);
                if !(p > 0.0 && p < 1.0) {
                    return Err(ModelError::InvalidBooster(format!(
                        "base_score {} is outside (0, 1) for binary:logistic",
                        p
                    )));
                }
                vec![(p / (1.0 - p)).ln()]
            }
            _ => match base_scores.len() {
                0 => vec![0.5; num_groups],
                1 => vec![base_scores[0]; num_groups],
                n if n == num_groups => base_scores,
                n => {
                    return Err(ModelError::InvalidBooster(format!(
                        "base_score has {} entries for {} classes",
                        n, num_groups
                    )))
                }
            },
        };

        let gbm = field(learner, "gradient_booster", "learner")?;
        if let Some(name) = gbm.get("name").and_then(Value::as_str) {
            if name != "gbtree" {
                return Err(ModelError::InvalidBooster(format!(
                    "booster type '{}' is not supported",
                    name
                )));
            }
        }
        let model = field(gbm, "model", "gradient_booster")?;

        let trees = field(model, "trees", "gbtree model")?
            .as_array()
            .ok_or_else(|| ModelError::InvalidBooster("trees is not an array".into()))?
            .iter()
            .enumerate()
            .map(|(i, tree)| Tree::from_value(tree, num_feature, i))
            .collect::<ModelResult<Vec<_>>>()?;

        let tree_groups = int_array(field(model, "tree_info", "gbtree model")?, "tree_info")?
            .into_iter()
            .map(|g| {
                if g < 0 || g as usize >= num_groups {
                    Err(ModelError::InvalidBooster(format!(
                        "tree_info entry {} out of range for {} output groups",
                        g, num_groups
                    )))
                } else {
                    Ok(g as usize)
                }
            })
            .collect::<ModelResult<Vec<_>>>()?;

        if tree_groups.len() != trees.len() {
            return Err(ModelError::InvalidBooster(format!(
                "tree_info has {} entries for {} trees",
                tree_groups.len(),
                trees.len()
            )));
        }

        let best_iteration = learner
            .get("attributes")
            .and_then(|a| a.get("best_iteration"))
            .and_then(lenient_usize);

        let tree_limit = match best_iteration {
            Some(best) => {
                let rounds = best + 1;
                let limit = match model.get("iteration_indptr") {
                    Some(indptr) => {
                        let indptr = int_array(indptr, "iteration_indptr")?;
                        indptr.get(rounds).map(|v| *v as usize)
                    }
                    None => {
                        let parallel = model
                            .get("gbtree_model_param")
                            .and_then(|p| p.get("num_parallel_tree"))
                            .and_then(lenient_usize)
                            .unwrap_or(1)
                            .max(1);
                        Some(rounds * num_groups * parallel)
                    }
                };
                limit.unwrap_or(trees.len()).min(trees.len())
            }
            None => trees.len(),
        };

        let version = document.get("version").and_then(Value::as_array).map(|parts| {
            parts
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(".")
        });

        debug!(
            "Booster uses {} of {} trees (best_iteration: {:?})",
            tree_limit,
            trees.len(),
            best_iteration
        );

        Ok(Self {
            trees,
            tree_groups,
            num_feature,
            num_groups,
            base_margin,
            objective,
            tree_limit,
            best_iteration,
            version,
        })
    }

    /// Raw per-group margins for one row. NaN marks a missing value.
    pub fn predict_margin(&self, row: &[f64]) -> ModelResult<Vec<f32>> {
        if row.len() != self.num_feature {
            return Err(ModelError::BundleMismatch(format!(
                "row has {} values, booster expects {}",
                row.len(),
                self.num_feature
            )));
        }

        let features: Vec<f32> = row.iter().map(|v| *v as f32).collect();
        let mut margins = self.base_margin.clone();

        for (tree, group) in self.trees[..self.tree_limit]
            .iter()
            .zip(self.tree_groups.iter())
        {
            margins[*group] += tree.leaf_value(&features);
        }

        Ok(margins)
    }

    /// Class probabilities for one row.
    pub fn predict_proba(&self, row: &[f64]) -> ModelResult<Vec<f64>> {
        let margins = self.predict_margin(row)?;

        let probabilities = match self.objective {
            Objective::Logistic => {
                let p = sigmoid(margins[0] as f64);
                vec![1.0 - p, p]
            }
            Objective::SoftProb | Objective::SoftMax => softmax(&margins),
        };

        Ok(probabilities)
    }

    pub fn num_classes(&self) -> usize {
        match self.objective {
            Objective::Logistic => 2,
            _ => self.num_groups,
        }
    }

    pub fn num_feature(&self) -> usize {
        self.num_feature
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees_used(&self) -> usize {
        self.tree_limit
    }

    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(margins: &[f32]) -> Vec<f64> {
    let max = margins
        .iter()
        .fold(f64::NEG_INFINITY, |acc, m| acc.max(*m as f64));
    let exps: Vec<f64> = margins.iter().map(|m| (*m as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn field<'v>(value: &'v Value, name: &str, context: &str) -> ModelResult<&'v Value> {
    value
        .get(name)
        .ok_or_else(|| ModelError::InvalidBooster(format!("{} is missing '{}'", context, name)))
}

/// XGBoost stores most scalar parameters as strings ("6", "5E-1").
fn lenient_usize(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|v| v as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `base_score` is a scalar string in 1.x/2.x and a bracketed list in 3.x.
fn parse_base_score(value: Option<&Value>) -> ModelResult<Vec<f32>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };

    match value {
        Value::Number(n) => Ok(vec![n.as_f64().unwrap_or(0.5) as f32]),
        Value::String(s) => s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<f32>().map_err(|_| {
                    ModelError::InvalidBooster(format!("invalid base_score '{}'", s))
                })
            })
            .collect(),
        Value::Array(_) => float_array(value, "base_score"),
        other => Err(ModelError::InvalidBooster(format!(
            "invalid base_score {}",
            other
        ))),
    }
}

fn array<'v>(value: &'v Value, context: &str) -> ModelResult<&'v Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| ModelError::InvalidBooster(format!("{}: expected an array", context)))
}

fn int_array(value: &Value, context: &str) -> ModelResult<Vec<i64>> {
    array(value, context)?
        .iter()
        .map(|v| {
            v.as_i64().ok_or_else(|| {
                ModelError::InvalidBooster(format!("{}: expected integer, found {}", context, v))
            })
        })
        .collect()
}

fn float_array(value: &Value, context: &str) -> ModelResult<Vec<f32>> {
    array(value, context)?
        .iter()
        .map(|v| match v {
            Value::Number(n) => n.as_f64().map(|f| f as f32).ok_or_else(|| {
                ModelError::InvalidBooster(format!("{}: invalid number {}", context, n))
            }),
            // Serialised NaN
            Value::Null => Ok(f32::NAN),
            other => Err(ModelError::InvalidBooster(format!(
                "{}: expected number, found {}",
                context, other
            ))),
        })
        .collect()
}

fn bool_array(value: &Value, context: &str) -> ModelResult<Vec<bool>> {
    array(value, context)?
        .iter()
        .map(|v| match v {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(n.as_i64().unwrap_or(0) != 0),
            other => Err(ModelError::InvalidBooster(format!(
                "{}: expected boolean, found {}",
                context, other
            ))),
        })
        .collect()
}
