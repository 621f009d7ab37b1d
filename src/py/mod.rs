use std::sync::Arc;

use log::debug;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::{pyclass, pymethods, pymodule, types::PyModule, PyAny, PyErr, PyResult, Python};

use crate::base::{CustomerId, LeaderboardItem, Rank, Score};
use crate::error::LeaderboardError;
use crate::index::IndexOptions;
use crate::store::ScoreStore;

impl From<LeaderboardError> for PyErr {
    fn from(err: LeaderboardError) -> PyErr {
        if err.is_invalid_argument() {
            PyValueError::new_err(err.to_string())
        } else {
            PyRuntimeError::new_err(err.to_string())
        }
    }
}

#[pyclass(name = "LeaderboardItem")]
#[derive(Clone)]
pub struct PyLeaderboardItem {
    #[pyo3(get)]
    customer_id: CustomerId,

    #[pyo3(get)]
    score: Score,

    #[pyo3(get)]
    rank: Rank,
}

#[pymethods]
impl PyLeaderboardItem {
    fn __repr__(&self) -> String {
        format!(
            "LeaderboardItem(customer_id={}, score={}, rank={})",
            self.customer_id, self.score, self.rank
        )
    }
}

impl From<LeaderboardItem> for PyLeaderboardItem {
    fn from(item: LeaderboardItem) -> Self {
        Self {
            customer_id: item.customer_id,
            score: item.score,
            rank: item.rank,
        }
    }
}

fn to_py_items(items: Vec<LeaderboardItem>) -> Vec<PyLeaderboardItem> {
    items.into_iter().map(PyLeaderboardItem::from).collect()
}

#[pyclass(name = "Leaderboard")]
pub struct PyLeaderboard {
    store: Arc<ScoreStore>,
}

#[pymethods]
impl PyLeaderboard {
    #[new]
    #[pyo3(signature = (split_threshold=None))]
    fn new(split_threshold: Option<usize>) -> Self {
        let mut options = IndexOptions::default();
        if let Some(threshold) = split_threshold {
            options.split_threshold = threshold;
        }
        Self {
            store: Arc::new(ScoreStore::new(&options)),
        }
    }

    /// Adds delta to the customer score, and returns the new score
    fn update_score(&self, py: Python<'_>, id: CustomerId, delta: Score) -> PyResult<Score> {
        let store = self.store.clone();
        Ok(py.allow_threads(move || store.update_score(id, delta))?)
    }

    fn rank_range(&self, py: Python<'_>, start: Rank, end: Rank) -> Vec<PyLeaderboardItem> {
        let store = self.store.clone();
        to_py_items(py.allow_threads(move || store.rank_range(start, end)))
    }

    #[pyo3(signature = (id, high=0, low=0))]
    fn customer_rank(
        &self,
        py: Python<'_>,
        id: CustomerId,
        high: Rank,
        low: Rank,
    ) -> PyResult<Vec<PyLeaderboardItem>> {
        let store = self.store.clone();
        let items = py.allow_threads(move || store.customer_rank_by_id(id, high, low))?;
        Ok(to_py_items(items))
    }

    fn aio_rank_range<'a>(&self, py: Python<'a>, start: Rank, end: Rank) -> PyResult<&'a PyAny> {
        let store = self.store.clone();
        pyo3_asyncio::tokio::future_into_py(py, async move {
            let items = tokio::task::spawn_blocking(move || store.rank_range(start, end))
                .await
                .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
            Ok(to_py_items(items))
        })
    }

    #[pyo3(signature = (id, high=0, low=0))]
    fn aio_customer_rank<'a>(
        &self,
        py: Python<'a>,
        id: CustomerId,
        high: Rank,
        low: Rank,
    ) -> PyResult<&'a PyAny> {
        let store = self.store.clone();
        pyo3_asyncio::tokio::future_into_py(py, async move {
            let items = tokio::task::spawn_blocking(move || store.customer_rank_by_id(id, high, low))
                .await
                .map_err(|e| PyRuntimeError::new_err(e.to_string()))??;
            Ok(to_py_items(items))
        })
    }

    fn score(&self, id: CustomerId) -> Option<Score> {
        self.store.score(id)
    }

    fn partition_count(&self) -> usize {
        self.store.partition_count()
    }

    fn __len__(&self) -> usize {
        self.store.index().len()
    }

    fn clear(&self) {
        self.store.clear()
    }
}

/// A Python module implemented in Rust.
#[pymodule]
fn leaderboard_index(_py: Python, module: &PyModule) -> PyResult<()> {
    // Init logging
    pyo3_log::init();
    debug!("Loading leaderboard-index extension");

    module.add_class::<PyLeaderboard>()?;
    module.add_class::<PyLeaderboardItem>()?;

    Ok(())
}
