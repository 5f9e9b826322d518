use std::sync::{Mutex, MutexGuard};

/// Append-only record storage behind the metrics accumulators.
///
/// Reports are computed from [`snapshot`](EventLog::snapshot), a copy taken
/// under the lock, so recording never blocks on (or corrupts) report math.
pub trait EventLog<T>: Send + Sync {
    fn append(&self, item: T);

    fn snapshot(&self) -> Vec<T>;

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct InMemoryLog<T> {
    items: Mutex<Vec<T>>,
}

impl<T> InMemoryLog<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        match self.items.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<T> Default for InMemoryLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> EventLog<T> for InMemoryLog<T> {
    fn append(&self, item: T) {
        self.lock().push(item);
    }

    fn snapshot(&self) -> Vec<T> {
        self.lock().clone()
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
