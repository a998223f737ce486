//! Exhaustive hyperparameter search with stratified cross-validation.

use faer::Mat;
use rayon::prelude::*;
use serde::Serialize;

use super::model::{Model, ModelFamily, ParamGrid, Params};
use super::{accuracy, check_training_data, take_rows, Classifier, MlError};

/// Every combination of a grid's values.
///
/// Keys are taken in sorted order and the last key varies fastest. An empty
/// grid yields one empty assignment.
pub fn expand_grid(grid: &ParamGrid) -> Vec<Params> {
    let mut combos = vec![Params::new()];
    for (name, values) in grid {
        let mut next = Vec::with_capacity(combos.len() * values.len());
        for combo in &combos {
            for value in values {
                let mut c = combo.clone();
                c.insert(name.clone(), value.clone());
                next.push(c);
            }
        }
        combos = next;
    }
    combos
}

/// Test-row indices of `k` stratified folds, without shuffling.
///
/// Each class's rows, in their original order, are cut into `k` contiguous
/// chunks whose sizes differ by at most one; fold `f` is the union of every
/// class's chunk `f`.
pub fn stratified_folds(y: &[f64], k: usize) -> Result<Vec<Vec<usize>>, MlError> {
    if k < 2 {
        return Err(MlError::InvalidParam {
            name: "cv".to_string(),
            reason: format!("need at least 2 folds, got {}", k),
        });
    }
    if y.len() < k {
        return Err(MlError::InvalidParam {
            name: "cv".to_string(),
            reason: format!("{} folds but only {} samples", k, y.len()),
        });
    }

    let mut folds = vec![Vec::new(); k];
    for class in [0.0, 1.0] {
        let members: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
        let (base, extra) = (members.len() / k, members.len() % k);
        let mut start = 0;
        for (f, fold) in folds.iter_mut().enumerate() {
            let size = base + usize::from(f < extra);
            fold.extend_from_slice(&members[start..start + size]);
            start += size;
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Mean cross-validated accuracy of one parameter assignment
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    pub params: Params,
    pub mean_score: f64,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best_params: Params,
    pub best_score: f64,
    pub candidates: Vec<CandidateScore>,
}

/// Grid search over one model family
#[derive(Debug, Clone)]
pub struct GridSearch {
    pub family: ModelFamily,
    pub grid: ParamGrid,
    pub cv: usize,
    pub random_state: u64,
}

impl GridSearch {
    pub fn new(family: ModelFamily, cv: usize, random_state: u64) -> Self {
        Self {
            family,
            grid: family.param_grid(),
            cv,
            random_state,
        }
    }

    pub fn with_grid(mut self, grid: ParamGrid) -> Self {
        self.grid = grid;
        self
    }

    fn cross_validate(&self, params: &Params, x: &Mat<f64>, y: &[f64], folds: &[Vec<usize>]) -> Result<f64, MlError> {
        let mut total = 0.0;
        for test_rows in folds {
            let train_rows: Vec<usize> = (0..y.len()).filter(|i| test_rows.binary_search(i).is_err()).collect();
            let y_train: Vec<f64> = train_rows.iter().map(|&i| y[i]).collect();
            let y_test: Vec<f64> = test_rows.iter().map(|&i| y[i]).collect();

            let mut model = self.family.build(params, self.random_state)?;
            model.fit(&take_rows(x, &train_rows), &y_train)?;
            let pred = model.predict(&take_rows(x, test_rows))?;
            total += accuracy(&y_test, &pred);
        }
        Ok(total / folds.len() as f64)
    }

    /// Score every candidate; the best is the first with the highest mean accuracy.
    ///
    /// A candidate whose fit fails on some fold scores NaN and cannot win.
    /// Data every candidate would reject fails the search itself.
    pub fn search(&self, x: &Mat<f64>, y: &[f64]) -> Result<SearchResult, MlError> {
        check_training_data(x, y)?;
        let folds = stratified_folds(y, self.cv)?;
        let candidates: Vec<CandidateScore> = expand_grid(&self.grid)
            .into_par_iter()
            .map(|params| {
                let mean_score = match self.cross_validate(&params, x, y, &folds) {
                    Ok(score) => score,
                    Err(e) => {
                        tracing::warn!(family = %self.family, ?params, "candidate failed: {}", e);
                        f64::NAN
                    }
                };
                CandidateScore { params, mean_score }
            })
            .collect();

        let mut best: Option<usize> = None;
        for (i, c) in candidates.iter().enumerate() {
            if c.mean_score.is_nan() {
                continue;
            }
            if best.map_or(true, |b| c.mean_score > candidates[b].mean_score) {
                best = Some(i);
            }
        }
        let Some(best) = best else {
            return Err(MlError::Numeric(format!(
                "no {} candidate could be fitted",
                self.family
            )));
        };

        Ok(SearchResult {
            best_params: candidates[best].params.clone(),
            best_score: candidates[best].mean_score,
            candidates,
        })
    }

    /// Search, then refit the best assignment on all of `x`
    pub fn fit_best(&self, x: &Mat<f64>, y: &[f64]) -> Result<(Model, SearchResult), MlError> {
        let result = self.search(x, y)?;
        let mut model = self.family.build(&result.best_params, self.random_state)?;
        model.fit(x, y)?;
        Ok((model, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expand_grid_order() {
        let mut grid = ParamGrid::new();
        grid.insert("b".to_string(), vec![json!(1), json!(2)]);
        grid.insert("a".to_string(), vec![json!("x"), json!("y")]);

        let combos = expand_grid(&grid);
        assert_eq!(combos.len(), 4);
        assert_eq!(combos[0]["a"], json!("x"));
        assert_eq!(combos[0]["b"], json!(1));
        assert_eq!(combos[1]["b"], json!(2), "last key varies fastest");
        assert_eq!(combos[2]["a"], json!("y"));
    }

    #[test]
    fn test_search_rejects_non_binary_labels() {
        let x = Mat::from_fn(12, 2, |i, j| (i * (j + 1)) as f64);
        let mut y: Vec<f64> = (0..12).map(|i| (i % 2) as f64).collect();
        y[5] = 2.0;

        let search = GridSearch::new(ModelFamily::DecisionTree, 3, 0);
        assert!(matches!(search.search(&x, &y), Err(MlError::NonBinaryLabels(v)) if v == 2.0));
    }

    #[test]
    fn test_empty_grid_has_one_candidate() {
        let combos = expand_grid(&ParamGrid::new());
        assert_eq!(combos, vec![Params::new()]);
    }

    #[test]
    fn test_stratified_folds_partition_rows() {
        let y = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0];
        let folds = stratified_folds(&y, 3).unwrap();

        let mut all: Vec<usize> = folds.iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..9).collect::<Vec<_>>());
        for fold in &folds {
            assert!(fold.iter().any(|&i| y[i] == 1.0));
            assert!(fold.iter().any(|&i| y[i] == 0.0));
        }
    }

    #[test]
    fn test_search_picks_first_of_equal_scores() {
        let x = Mat::from_fn(12, 1, |i, _| i as f64);
        let y: Vec<f64> = (0..12).map(|i| if i >= 6 { 1.0 } else { 0.0 }).collect();

        // every criterion finds the same split
        let search = GridSearch::new(ModelFamily::DecisionTree, 3, 0);
        let result = search.search(&x, &y).unwrap();
        assert_eq!(result.candidates.len(), 3);
        assert_eq!(result.best_params["criterion"], json!("gini"));
    }
}
