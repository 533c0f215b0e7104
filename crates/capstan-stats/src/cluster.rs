//! K-means clustering of stocks on their return moments.
//!
//! Features are z-scored column by column (population standard deviation)
//! before clustering, so no single moment dominates the distance.
//!
//! The algorithm is Lloyd's iteration:
//! 1. assign each row to its nearest centroid (ties go to the lowest index)
//! 2. move every empty centroid onto the row farthest from its nearest live centroid
//! 3. recompute centroids as member means
//!
//! It stops once assignments no longer change or after `max_iterations`.
//! Given the same rows and configuration the result is bit-identical.

use crate::error::{Result, StatsError};
use crate::moments::StockFeatureVector;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// How initial centroids are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Initialization {
    /// k-means++ seeding drawn from a seeded RNG
    #[default]
    #[serde(rename = "kmeans++")]
    KMeansPlusPlus,
    /// Row nearest the column means, then repeatedly the row farthest from
    /// the centroids chosen so far
    #[serde(rename = "farthest")]
    FarthestPoint,
}

impl fmt::Display for Initialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KMeansPlusPlus => write!(f, "kmeans++"),
            Self::FarthestPoint => write!(f, "farthest"),
        }
    }
}

impl FromStr for Initialization {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kmeans++" | "kmeans-plus-plus" | "k-means++" => Ok(Self::KMeansPlusPlus),
            "farthest" | "farthest-point" => Ok(Self::FarthestPoint),
            other => Err(format!("unknown initialization '{other}'")),
        }
    }
}

/// Configuration for [`StockClusterer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of clusters (default: 3)
    pub k: usize,
    /// Iteration cap for Lloyd's loop (default: 300)
    pub max_iterations: usize,
    /// Seed for k-means++ (default: 42)
    pub seed: u64,
    /// Centroid initialization
    pub init: Initialization,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            k: 3,
            max_iterations: 300,
            seed: 42,
            init: Initialization::default(),
        }
    }
}

/// Cluster id of every ticker, in input order.
///
/// Ids lie in `[0, k)` and carry no meaning across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    k: usize,
    labels: Vec<(String, usize)>,
}

impl ClusterAssignment {
    /// Number of clusters.
    pub const fn k(&self) -> usize {
        self.k
    }

    /// `(ticker, cluster)` pairs in input order.
    pub fn labels(&self) -> &[(String, usize)] {
        &self.labels
    }

    /// Number of tickers.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no ticker was clustered.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Cluster of a ticker.
    pub fn get(&self, ticker: &str) -> Option<usize> {
        self.labels
            .iter()
            .find(|(t, _)| t == ticker)
            .map(|(_, c)| *c)
    }

    /// Tickers in a cluster, in input order.
    pub fn members(&self, cluster: usize) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|(_, c)| *c == cluster)
            .map(|(t, _)| t.as_str())
            .collect()
    }

    /// Member count of each cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for (_, c) in &self.labels {
            sizes[*c] += 1;
        }
        sizes
    }
}

/// Full result of a clustering run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteringOutcome {
    /// Ticker to cluster mapping
    pub assignment: ClusterAssignment,
    /// Centroids in standardized feature space, one row per cluster
    pub centroids: Vec<Vec<f64>>,
    /// Within-cluster sum of squared distances
    pub inertia: f64,
    /// Lloyd iterations performed
    pub iterations: usize,
    /// Whether assignments stabilized before the iteration cap
    pub converged: bool,
}

/// Z-score every column with its population standard deviation.
///
/// A column with zero variance becomes all zeros.
pub fn standardize(matrix: &Array2<f64>) -> Array2<f64> {
    let mut out = matrix.clone();
    let n = matrix.nrows();
    if n == 0 {
        return out;
    }

    for mut column in out.axis_iter_mut(Axis(1)) {
        let mean = column.sum() / n as f64;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let std = variance.sqrt();
        let scale = column.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if std > scale * 1e-12 {
            column.mapv_inplace(|v| (v - mean) / std);
        } else {
            column.fill(0.0);
        }
    }

    out
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index of the nearest of `centroids` rows, limited to `live` ones; ties go to the lowest index.
fn nearest(row: ArrayView1<'_, f64>, centroids: &Array2<f64>, live: &[bool]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
        if !live[c] {
            continue;
        }
        let d = squared_distance(row, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

fn distinct_rows(data: &Array2<f64>) -> usize {
    data.axis_iter(Axis(0))
        .map(|row| row.iter().map(|v| (v + 0.0).to_bits()).collect::<Vec<u64>>())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Index of the row farthest from its nearest live centroid; ties go to the lowest row.
fn farthest_row(data: &Array2<f64>, centroids: &Array2<f64>, live: &[bool]) -> usize {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, row) in data.axis_iter(Axis(0)).enumerate() {
        let (_, d) = nearest(row, centroids, live);
        if d > best.1 {
            best = (i, d);
        }
    }
    best.0
}

/// K-means clusterer over [`StockFeatureVector`]s.
#[derive(Debug, Clone, Default)]
pub struct StockClusterer {
    config: ClusterConfig,
}

impl StockClusterer {
    /// Create a clusterer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clusterer with custom settings.
    pub const fn with_config(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub const fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Cluster the feature vectors.
    ///
    /// # Errors
    /// - [`StatsError::NonFiniteFeature`] for NaN or infinite inputs
    /// - [`StatsError::InvalidClusterCount`] unless `2 <= k <= rows`
    /// - [`StatsError::TooFewDistinctRows`] when fewer than `k` rows differ
    pub fn fit(&self, features: &[StockFeatureVector]) -> Result<ClusteringOutcome> {
        let rows = features.len();
        let k = self.config.k;

        let mut matrix = Array2::<f64>::zeros((rows, StockFeatureVector::FEATURE_NAMES.len()));
        for (i, fv) in features.iter().enumerate() {
            let values = fv.features();
            if values.iter().any(|v| !v.is_finite()) {
                return Err(StatsError::NonFiniteFeature {
                    ticker: fv.ticker.clone(),
                });
            }
            for (j, v) in values.into_iter().enumerate() {
                matrix[[i, j]] = v;
            }
        }

        if k < 2 || k > rows {
            return Err(StatsError::InvalidClusterCount { k, rows });
        }

        let data = standardize(&matrix);
        let distinct = distinct_rows(&data);
        if distinct < k {
            return Err(StatsError::TooFewDistinctRows { k, distinct });
        }

        let mut centroids = match self.config.init {
            Initialization::KMeansPlusPlus => self.kmeans_plus_plus(&data),
            Initialization::FarthestPoint => Self::farthest_point(&data, k),
        };

        let all_live = vec![true; k];
        let mut labels: Vec<usize> = Vec::new();
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let mut next: Vec<usize> = data
                .axis_iter(Axis(0))
                .map(|row| nearest(row, &centroids, &all_live).0)
                .collect();
            Self::reseed_empty(&data, &mut centroids, &mut next, k);

            let changed = next != labels;
            labels = next;
            centroids = Self::means(&data, &labels, k, &centroids);

            if !changed {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                max_iterations = self.config.max_iterations,
                "k-means stopped before assignments stabilized"
            );
        }

        let inertia = data
            .axis_iter(Axis(0))
            .zip(&labels)
            .map(|(row, &c)| squared_distance(row, centroids.row(c)))
            .sum();

        debug!(k, rows, iterations, converged, inertia, "k-means finished");

        Ok(ClusteringOutcome {
            assignment: ClusterAssignment {
                k,
                labels: features
                    .iter()
                    .map(|fv| fv.ticker.clone())
                    .zip(labels)
                    .collect(),
            },
            centroids: centroids.outer_iter().map(|row| row.to_vec()).collect(),
            inertia,
            iterations,
            converged,
        })
    }

    fn kmeans_plus_plus(&self, data: &Array2<f64>) -> Array2<f64> {
        let (rows, cols) = data.dim();
        let k = self.config.k;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut centroids = Array2::<f64>::zeros((k, cols));
        let mut live = vec![false; k];

        let first = rng.gen_range(0..rows);
        centroids.row_mut(0).assign(&data.row(first));
        live[0] = true;

        for c in 1..k {
            let weights: Vec<f64> = data
                .axis_iter(Axis(0))
                .map(|row| nearest(row, &centroids, &live).1)
                .collect();
            let total: f64 = weights.iter().sum();

            let target = rng.r#gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = None;
            for (i, &w) in weights.iter().enumerate() {
                if w <= 0.0 {
                    continue;
                }
                cumulative += w;
                chosen = Some(i);
                if cumulative > target {
                    break;
                }
            }

            // With at least k distinct rows some weight is positive
            let chosen = chosen.unwrap_or_else(|| farthest_row(data, &centroids, &live));
            centroids.row_mut(c).assign(&data.row(chosen));
            live[c] = true;
        }

        centroids
    }

    fn farthest_point(data: &Array2<f64>, k: usize) -> Array2<f64> {
        let cols = data.ncols();
        let mut centroids = Array2::<f64>::zeros((k, cols));
        let mut live = vec![false; k];

        let column_means = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(cols));
        let mut first = (0, f64::INFINITY);
        for (i, row) in data.axis_iter(Axis(0)).enumerate() {
            let d = squared_distance(row, column_means.view());
            if d < first.1 {
                first = (i, d);
            }
        }
        centroids.row_mut(0).assign(&data.row(first.0));
        live[0] = true;

        for c in 1..k {
            let row = farthest_row(data, &centroids, &live);
            centroids.row_mut(c).assign(&data.row(row));
            live[c] = true;
        }

        centroids
    }

    /// Move each empty centroid onto the row farthest from its nearest live centroid.
    fn reseed_empty(
        data: &Array2<f64>,
        centroids: &mut Array2<f64>,
        labels: &mut [usize],
        k: usize,
    ) {
        // Each pass fills at least one cluster; a stolen singleton can empty another
        for _ in 0..=data.nrows() {
            let mut sizes = vec![0_usize; k];
            for &c in labels.iter() {
                sizes[c] += 1;
            }
            let Some(empty) = sizes.iter().position(|&s| s == 0) else {
                return;
            };

            let live: Vec<bool> = sizes.iter().map(|&s| s > 0).collect();
            let row = farthest_row(data, centroids, &live);
            warn!(cluster = empty, row, "re-seeding empty cluster");
            centroids.row_mut(empty).assign(&data.row(row));
            labels[row] = empty;
        }
    }

    fn means(
        data: &Array2<f64>,
        labels: &[usize],
        k: usize,
        previous: &Array2<f64>,
    ) -> Array2<f64> {
        let mut sums = Array2::<f64>::zeros((k, data.ncols()));
        let mut counts = vec![0_usize; k];
        for (row, &c) in data.axis_iter(Axis(0)).zip(labels) {
            let mut target = sums.row_mut(c);
            target += &row;
            counts[c] += 1;
        }

        for (c, mut row) in sums.axis_iter_mut(Axis(0)).enumerate() {
            if counts[c] == 0 {
                row.assign(&previous.row(c));
            } else {
                row.mapv_inplace(|v| v / counts[c] as f64);
            }
        }
        sums
    }
}

/// Inertia of the clustering for each candidate `k`.
///
/// Every other setting comes from `config`. Useful for picking `k` at the
/// point where adding clusters stops paying off.
///
/// # Errors
/// Any error [`StockClusterer::fit`] raises for one of the `ks`.
pub fn elbow(
    features: &[StockFeatureVector],
    ks: &[usize],
    config: &ClusterConfig,
) -> Result<Vec<(usize, f64)>> {
    ks.iter()
        .map(|&k| {
            let clusterer = StockClusterer::with_config(ClusterConfig {
                k,
                ..config.clone()
            });
            Ok((k, clusterer.fit(features)?.inertia))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rstest::rstest;

    fn fv(ticker: &str, values: [f64; 4]) -> StockFeatureVector {
        StockFeatureVector {
            ticker: ticker.to_string(),
            mean: values[0],
            std_dev: values[1],
            skewness: values[2],
            kurtosis: values[3],
            observations: 250,
        }
    }

    /// Three well separated groups of three.
    fn grouped() -> Vec<StockFeatureVector> {
        vec![
            fv("A1", [0.001, 0.010, 0.1, 0.5]),
            fv("A2", [0.0011, 0.011, 0.12, 0.45]),
            fv("A3", [0.0009, 0.0105, 0.09, 0.55]),
            fv("B1", [0.002, 0.030, -0.8, 3.0]),
            fv("B2", [0.0021, 0.031, -0.75, 3.2]),
            fv("B3", [0.0019, 0.029, -0.85, 2.9]),
            fv("C1", [-0.001, 0.020, 1.5, 8.0]),
            fv("C2", [-0.0011, 0.021, 1.45, 8.3]),
            fv("C3", [-0.0009, 0.019, 1.55, 7.8]),
        ]
    }

    fn config(k: usize, init: Initialization) -> ClusterConfig {
        ClusterConfig {
            k,
            init,
            ..ClusterConfig::default()
        }
    }

    #[test]
    fn test_standardize_columns() {
        let m = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let z = standardize(&m);

        let std = (2.0_f64 / 3.0).sqrt();
        assert_abs_diff_eq!(z[[0, 0]], -1.0 / std, epsilon = 1e-12);
        assert_abs_diff_eq!(z[[1, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[[2, 0]], 1.0 / std, epsilon = 1e-12);
        // Zero-variance column
        assert!(z.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_standardize_constant_column_with_rounding() {
        // 0.1 has no exact binary form, so the computed mean need not equal it
        let m = Array2::from_shape_fn((7, 2), |(i, j)| if j == 0 { i as f64 } else { 0.1 });
        let z = standardize(&m);

        assert!(z.column(1).iter().all(|&v| v == 0.0));
    }

    #[rstest]
    #[case(Initialization::KMeansPlusPlus)]
    #[case(Initialization::FarthestPoint)]
    fn test_recovers_separated_groups(#[case] init: Initialization) {
        let outcome = StockClusterer::with_config(config(3, init))
            .fit(&grouped())
            .unwrap();
        let a = &outcome.assignment;

        for group in ["A", "B", "C"] {
            let ids: BTreeSet<usize> = (1..=3)
                .map(|i| a.get(&format!("{group}{i}")).unwrap())
                .collect();
            assert_eq!(ids.len(), 1, "group {group} was split");
        }
        assert_eq!(a.cluster_sizes(), vec![3, 3, 3]);
        assert!(outcome.converged);
        assert_eq!(outcome.centroids.len(), 3);
    }

    #[rstest]
    #[case(Initialization::KMeansPlusPlus)]
    #[case(Initialization::FarthestPoint)]
    fn test_k_equals_rows_gives_singletons(#[case] init: Initialization) {
        let features = grouped();
        let outcome = StockClusterer::with_config(config(features.len(), init))
            .fit(&features)
            .unwrap();

        assert!(outcome.assignment.cluster_sizes().iter().all(|&s| s == 1));
        assert_abs_diff_eq!(outcome.inertia, 0.0, epsilon = 1e-20);
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let clusterer = StockClusterer::with_config(config(4, Initialization::KMeansPlusPlus));
        let first = clusterer.fit(&grouped()).unwrap();
        let second = clusterer.fit(&grouped()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.inertia.to_bits(), second.inertia.to_bits());
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(10)]
    fn test_invalid_cluster_count(#[case] k: usize) {
        let result =
            StockClusterer::with_config(config(k, Initialization::default())).fit(&grouped());
        assert!(matches!(
            result,
            Err(StatsError::InvalidClusterCount { k: got, rows: 9 }) if got == k
        ));
    }

    #[test]
    fn test_too_few_distinct_rows() {
        let features = vec![
            fv("A", [0.001, 0.01, 0.1, 0.5]),
            fv("B", [0.001, 0.01, 0.1, 0.5]),
            fv("C", [0.002, 0.02, 0.2, 0.6]),
        ];
        let result =
            StockClusterer::with_config(config(3, Initialization::default())).fit(&features);
        assert!(matches!(
            result,
            Err(StatsError::TooFewDistinctRows { k: 3, distinct: 2 })
        ));
    }

    #[test]
    fn test_non_finite_feature() {
        let mut features = grouped();
        features[4].kurtosis = f64::NAN;
        let result = StockClusterer::new().fit(&features);
        assert!(matches!(result, Err(StatsError::NonFiniteFeature { ticker }) if ticker == "B2"));
    }

    #[test]
    fn test_reseed_moves_empty_centroid_to_farthest_row() {
        let data = array![[0.0, 0.0], [0.1, 0.0], [5.0, 5.0]];
        let mut centroids = array![[0.0, 0.0], [100.0, 100.0]];
        let mut labels = vec![0, 0, 0];

        StockClusterer::reseed_empty(&data, &mut centroids, &mut labels, 2);

        assert_eq!(labels, vec![0, 0, 1]);
        assert_eq!(centroids.row(1).to_vec(), vec![5.0, 5.0]);
    }

    #[test]
    fn test_assignment_ties_go_to_lowest_centroid() {
        let centroids = array![[-1.0, 0.0], [1.0, 0.0]];
        let row = array![0.0, 0.0];
        let (c, d) = nearest(row.view(), &centroids, &[true, true]);

        assert_eq!(c, 0);
        assert_abs_diff_eq!(d, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_elbow_inertia_decreases() {
        let features = grouped();
        let curve = elbow(
            &features,
            &[2, 3, 9],
            &config(0, Initialization::FarthestPoint),
        )
        .unwrap();

        assert_eq!(curve.iter().map(|(k, _)| *k).collect::<Vec<_>>(), vec![2, 3, 9]);
        assert!(curve[0].1 > curve[1].1);
        assert!(curve[1].1 > curve[2].1);
    }

    #[rstest]
    #[case("kmeans++", Initialization::KMeansPlusPlus)]
    #[case("farthest", Initialization::FarthestPoint)]
    #[case("Farthest-Point", Initialization::FarthestPoint)]
    fn test_parse_initialization(#[case] input: &str, #[case] expected: Initialization) {
        assert_eq!(input.parse::<Initialization>().unwrap(), expected);
        assert_eq!(expected.to_string().parse::<Initialization>().unwrap(), expected);
    }

    #[test]
    fn test_assignment_accessors() {
        let outcome = StockClusterer::with_config(config(3, Initialization::FarthestPoint))
            .fit(&grouped())
            .unwrap();
        let a = &outcome.assignment;

        assert_eq!(a.k(), 3);
        assert_eq!(a.len(), 9);
        assert_eq!(a.labels()[0].0, "A1");
        let cluster = a.get("B2").unwrap();
        assert_eq!(a.members(cluster), vec!["B1", "B2", "B3"]);
        assert_eq!(a.get("ZZZ"), None);
    }
}
