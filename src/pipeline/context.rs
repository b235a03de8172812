use crate::result_tree::ResultData;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// State shared by every stage of one pipeline run.
///
/// Cloning the context yields another handle onto the same store. Writes are
/// last-writer-wins; stages namespace their keys with their own name.
#[derive(Debug, Clone)]
pub struct SampleContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    working_dir: PathBuf,
    data: RwLock<HashMap<String, ResultData>>,
}

impl SampleContext {
    /// Create a context whose temporary artifacts live under `working_dir`
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                working_dir: working_dir.into(),
                data: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.inner.working_dir
    }

    /// Store a value, returning the one it replaced
    pub fn put_data(&self, key: impl Into<String>, value: ResultData) -> Option<ResultData> {
        self.inner.data.write().insert(key.into(), value)
    }

    pub fn get_data(&self, key: &str) -> Option<ResultData> {
        self.inner.data.read().get(key).cloned()
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.data.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}
