use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn map<T, R, F>(&self, items: &[T], task: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        if items.is_empty() {
            return Vec::new();
        }
        let workers = self.size.min(items.len());
        if workers == 1 {
            return items.iter().map(&task).collect();
        }

        let cursor = AtomicUsize::new(0);
        let slots: Vec<Mutex<Option<R>>> = items.iter().map(|_| Mutex::new(None)).collect();
        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        let index = cursor.fetch_add(1, Ordering::SeqCst);
                        let Some(item) = items.get(index) else {
                            break;
                        };
                        let result = task(item);
                        if let Ok(mut slot) = slots[index].lock() {
                            *slot = Some(result);
                        }
                    }
                });
            }
        });

        slots
            .into_iter()
            .filter_map(|slot| slot.into_inner().ok().flatten())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn results_keep_input_order() {
        let pool = WorkerPool::new(4);
        let items: Vec<u32> = (0..50).collect();
        let doubled = pool.map(&items, |value| value * 2);
        assert_eq!(doubled, items.iter().map(|value| value * 2).collect::<Vec<_>>());
    }

    #[test]
    fn uses_several_threads() {
        let pool = WorkerPool::new(3);
        let seen = Mutex::new(HashSet::new());
        let items: Vec<u32> = (0..30).collect();
        pool.map(&items, |_| {
            seen.lock().unwrap().insert(thread::current().id());
            thread::sleep(std::time::Duration::from_millis(5));
        });
        assert!(seen.lock().unwrap().len() > 1);
    }

    #[test]
    fn zero_size_is_clamped() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.map(&[1, 2], |value| value + 1), vec![2, 3]);
    }
}
