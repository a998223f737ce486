//! The classifier roster and its hyperparameter grids.
//!
//! [`ModelFamily`] names a family and knows its search grid; [`Model`] is a
//! configured or fitted instance of one family. Hyperparameters travel as JSON
//! values keyed by their scikit-learn-style names.

use std::collections::BTreeMap;
use std::fmt;

use faer::Mat;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    AdaBoost, Classifier, Criterion, DecisionTree, GradientBoosting, KNearestNeighbors, LogisticRegression,
    MlError, NeighborWeights, RandomForest, XgBoost,
};

/// One hyperparameter assignment
pub type Params = BTreeMap<String, Value>;

/// Candidate values per hyperparameter
pub type ParamGrid = BTreeMap<String, Vec<Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    DecisionTree,
    RandomForest,
    GradientBoosting,
    LogisticRegression,
    AdaBoost,
    XgBoost,
    KNearestNeighbors,
}

impl ModelFamily {
    /// Every family, in evaluation order
    pub const ROSTER: [ModelFamily; 7] = [
        ModelFamily::DecisionTree,
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::LogisticRegression,
        ModelFamily::AdaBoost,
        ModelFamily::XgBoost,
        ModelFamily::KNearestNeighbors,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::DecisionTree => "Decision Tree",
            ModelFamily::RandomForest => "Random Forest",
            ModelFamily::GradientBoosting => "Gradient Boosting",
            ModelFamily::LogisticRegression => "Logistic Regression",
            ModelFamily::AdaBoost => "AdaBoost",
            ModelFamily::XgBoost => "XGBoost",
            ModelFamily::KNearestNeighbors => "KNN",
        }
    }

    /// Search grid for this family
    pub fn param_grid(&self) -> ParamGrid {
        let mut grid = ParamGrid::new();
        let mut put = |name: &str, values: Vec<Value>| {
            grid.insert(name.to_string(), values);
        };
        match self {
            ModelFamily::DecisionTree => {
                put("criterion", vec![json!("gini"), json!("entropy"), json!("log_loss")]);
            }
            ModelFamily::RandomForest => {
                put("n_estimators", vec![json!(8), json!(16), json!(32), json!(64)]);
            }
            ModelFamily::GradientBoosting => {
                put("learning_rate", vec![json!(0.1), json!(0.05), json!(0.01)]);
                put("subsample", vec![json!(0.7), json!(0.85), json!(1.0)]);
                put("n_estimators", vec![json!(16), json!(32), json!(64)]);
            }
            ModelFamily::LogisticRegression => {}
            ModelFamily::AdaBoost => {
                put("learning_rate", vec![json!(0.1), json!(0.01), json!(1.0)]);
                put("n_estimators", vec![json!(16), json!(32), json!(64)]);
            }
            ModelFamily::XgBoost => {
                put("learning_rate", vec![json!(0.1), json!(0.3)]);
                put("max_depth", vec![json!(3), json!(6)]);
                put("n_estimators", vec![json!(32), json!(64)]);
            }
            ModelFamily::KNearestNeighbors => {
                put("n_neighbors", vec![json!(3), json!(5), json!(7)]);
                put("weights", vec![json!("uniform"), json!("distance")]);
            }
        }
        grid
    }

    /// Build an unfitted model from a parameter assignment.
    ///
    /// Parameters not named here keep their defaults; unknown names are rejected.
    pub fn build(&self, params: &Params, random_state: u64) -> Result<Model, MlError> {
        let allowed: Vec<&str> = match self {
            ModelFamily::DecisionTree => vec!["criterion", "max_depth"],
            ModelFamily::RandomForest => vec!["n_estimators", "criterion", "max_depth"],
            ModelFamily::GradientBoosting => vec!["learning_rate", "subsample", "n_estimators", "max_depth"],
            ModelFamily::LogisticRegression => vec!["C", "max_iter"],
            ModelFamily::AdaBoost => vec!["learning_rate", "n_estimators"],
            ModelFamily::XgBoost => vec!["learning_rate", "max_depth", "n_estimators"],
            ModelFamily::KNearestNeighbors => vec!["n_neighbors", "weights"],
        };
        if let Some(unknown) = params.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(MlError::InvalidParam {
                name: unknown.clone(),
                reason: format!("not a hyperparameter of {}", self.name()),
            });
        }

        let model = match self {
            ModelFamily::DecisionTree => {
                let mut m = DecisionTree::new(get_criterion(params)?.unwrap_or(Criterion::Gini), None);
                m.max_depth = get_usize(params, "max_depth")?;
                m.random_state = random_state;
                Model::DecisionTree(m)
            }
            ModelFamily::RandomForest => {
                let mut m = RandomForest::new(get_usize(params, "n_estimators")?.unwrap_or(100), random_state);
                if let Some(c) = get_criterion(params)? {
                    m.criterion = c;
                }
                m.max_depth = get_usize(params, "max_depth")?;
                Model::RandomForest(m)
            }
            ModelFamily::GradientBoosting => {
                let d = GradientBoosting::default();
                let mut m = GradientBoosting::new(
                    get_f64(params, "learning_rate")?.unwrap_or(d.learning_rate),
                    get_usize(params, "n_estimators")?.unwrap_or(d.n_estimators),
                    get_f64(params, "subsample")?.unwrap_or(d.subsample),
                );
                m.max_depth = get_usize(params, "max_depth")?.unwrap_or(d.max_depth);
                m.random_state = random_state;
                Model::GradientBoosting(m)
            }
            ModelFamily::LogisticRegression => {
                let mut m = LogisticRegression::default();
                m.c = get_f64(params, "C")?.unwrap_or(m.c);
                m.max_iter = get_usize(params, "max_iter")?.unwrap_or(m.max_iter);
                Model::LogisticRegression(m)
            }
            ModelFamily::AdaBoost => {
                let d = AdaBoost::default();
                Model::AdaBoost(AdaBoost::new(
                    get_f64(params, "learning_rate")?.unwrap_or(d.learning_rate),
                    get_usize(params, "n_estimators")?.unwrap_or(d.n_estimators),
                ))
            }
            ModelFamily::XgBoost => {
                let d = XgBoost::default();
                Model::XgBoost(XgBoost::new(
                    get_f64(params, "learning_rate")?.unwrap_or(d.learning_rate),
                    get_usize(params, "max_depth")?.unwrap_or(d.max_depth),
                    get_usize(params, "n_estimators")?.unwrap_or(d.n_estimators),
                ))
            }
            ModelFamily::KNearestNeighbors => {
                let weights = match params.get("weights") {
                    Some(v) => NeighborWeights::parse(expect_str(v, "weights")?)?,
                    None => NeighborWeights::Uniform,
                };
                Model::KNearestNeighbors(KNearestNeighbors::new(
                    get_usize(params, "n_neighbors")?.unwrap_or(5),
                    weights,
                ))
            }
        };
        Ok(model)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn bad_type(name: &str, expected: &str, value: &Value) -> MlError {
    MlError::InvalidParam {
        name: name.to_string(),
        reason: format!("expected {}, got {}", expected, value),
    }
}

fn expect_str<'a>(value: &'a Value, name: &str) -> Result<&'a str, MlError> {
    value.as_str().ok_or_else(|| bad_type(name, "a string", value))
}

fn get_f64(params: &Params, name: &str) -> Result<Option<f64>, MlError> {
    params
        .get(name)
        .map(|v| v.as_f64().ok_or_else(|| bad_type(name, "a number", v)))
        .transpose()
}

fn get_usize(params: &Params, name: &str) -> Result<Option<usize>, MlError> {
    params
        .get(name)
        .filter(|v| !v.is_null())
        .map(|v| {
            v.as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| bad_type(name, "a non-negative integer", v))
        })
        .transpose()
}

fn get_criterion(params: &Params) -> Result<Option<Criterion>, MlError> {
    params
        .get("criterion")
        .map(|v| Criterion::parse(expect_str(v, "criterion")?))
        .transpose()
}

/// A classifier of any family, tagged by family when serialized
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Model {
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    LogisticRegression(LogisticRegression),
    AdaBoost(AdaBoost),
    XgBoost(XgBoost),
    KNearestNeighbors(KNearestNeighbors),
}

impl Model {
    pub fn family(&self) -> ModelFamily {
        match self {
            Model::DecisionTree(_) => ModelFamily::DecisionTree,
            Model::RandomForest(_) => ModelFamily::RandomForest,
            Model::GradientBoosting(_) => ModelFamily::GradientBoosting,
            Model::LogisticRegression(_) => ModelFamily::LogisticRegression,
            Model::AdaBoost(_) => ModelFamily::AdaBoost,
            Model::XgBoost(_) => ModelFamily::XgBoost,
            Model::KNearestNeighbors(_) => ModelFamily::KNearestNeighbors,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            Model::DecisionTree(m) => m,
            Model::RandomForest(m) => m,
            Model::GradientBoosting(m) => m,
            Model::LogisticRegression(m) => m,
            Model::AdaBoost(m) => m,
            Model::XgBoost(m) => m,
            Model::KNearestNeighbors(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            Model::DecisionTree(m) => m,
            Model::RandomForest(m) => m,
            Model::GradientBoosting(m) => m,
            Model::LogisticRegression(m) => m,
            Model::AdaBoost(m) => m,
            Model::XgBoost(m) => m,
            Model::KNearestNeighbors(m) => m,
        }
    }
}

impl Classifier for Model {
    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<(), MlError> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>, MlError> {
        self.inner().predict(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_order_and_names() {
        let names: Vec<&str> = ModelFamily::ROSTER.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            [
                "Decision Tree",
                "Random Forest",
                "Gradient Boosting",
                "Logistic Regression",
                "AdaBoost",
                "XGBoost",
                "KNN"
            ]
        );
    }

    #[test]
    fn test_logistic_regression_grid_is_empty() {
        assert!(ModelFamily::LogisticRegression.param_grid().is_empty());
        assert_eq!(ModelFamily::GradientBoosting.param_grid().len(), 3);
    }

    #[test]
    fn test_build_applies_params() {
        let mut params = Params::new();
        params.insert("n_neighbors".to_string(), json!(7));
        params.insert("weights".to_string(), json!("distance"));

        match ModelFamily::KNearestNeighbors.build(&params, 0).unwrap() {
            Model::KNearestNeighbors(m) => {
                assert_eq!(m.n_neighbors, 7);
                assert_eq!(m.weights, NeighborWeights::Distance);
            }
            other => panic!("wrong family {:?}", other.family()),
        }
    }

    #[test]
    fn test_build_rejects_unknown_param() {
        let mut params = Params::new();
        params.insert("depth".to_string(), json!(3));
        assert!(ModelFamily::DecisionTree.build(&params, 0).is_err());
    }

    #[test]
    fn test_serialized_model_carries_family_tag() {
        let model = ModelFamily::AdaBoost.build(&Params::new(), 0).unwrap();
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["family"], "ada_boost");

        let back: Model = serde_json::from_value(json).unwrap();
        assert_eq!(back.family(), ModelFamily::AdaBoost);
    }
}
