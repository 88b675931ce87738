use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Fixed set of reusable resources (one per worker). `acquire` blocks until
/// one is free; the guard hands it back on drop.
pub struct ResourcePool<T> {
    state: Arc<PoolState<T>>,
    capacity: usize,
}

struct PoolState<T> {
    idle: Mutex<Vec<T>>,
    condition: Condvar,
}

pub struct PoolGuard<T> {
    state: Arc<PoolState<T>>,
    item: Option<T>,
}

impl<T> ResourcePool<T> {
    pub fn new(items: Vec<T>) -> Self {
        let capacity = items.len();
        Self {
            state: Arc::new(PoolState {
                idle: Mutex::new(items),
                condition: Condvar::new(),
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.state.idle.lock().len()
    }

    /// Blocks forever on an empty pool.
    pub fn acquire(&self) -> PoolGuard<T> {
        let mut idle = self.state.idle.lock();
        self.state.condition.wait_while(&mut idle, |items| items.is_empty());
        let item = idle.pop();
        PoolGuard {
            state: Arc::clone(&self.state),
            item,
        }
    }
}

impl<T> PoolGuard<T> {
    fn release(&mut self) {
        if let Some(item) = self.item.take() {
            self.state.idle.lock().push(item);
            self.state.condition.notify_one();
        }
    }
}

impl<T> Deref for PoolGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // only `release` empties the slot, and it runs in `drop`
        self.item.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T> DerefMut for PoolGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T> Drop for PoolGuard<T> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_guard_returns_item() {
        let pool = ResourcePool::new(vec![1, 2]);
        assert_eq!(pool.capacity(), 2);
        {
            let mut a = pool.acquire();
            *a += 10;
            assert_eq!(pool.available(), 1);
        }
        assert_eq!(pool.available(), 2);
        let guards: Vec<_> = (0..2).map(|_| pool.acquire()).collect();
        let mut values: Vec<i32> = guards.iter().map(|g| **g).collect();
        values.sort();
        assert_eq!(values, vec![1, 12]);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_concurrency_never_exceeds_capacity() {
        let pool = Arc::new(ResourcePool::new(vec![(), ()]));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    let _guard = pool.acquire();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }
}
