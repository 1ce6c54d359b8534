use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
///
/// Port state must stay reachable for teardown even after a component hook
/// panics, so poisoning is stripped everywhere.
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A counting semaphore.
pub(crate) struct Semaphore {
    count: Mutex<u32>,
    cond: Condvar,
}

impl Semaphore {
    /// Create a semaphore holding `count` permits.
    pub(crate) fn new(count: u32) -> Self {
        Self {
            count: Mutex::new(count),
            cond: Condvar::new(),
        }
    }

    /// Take a permit, blocking until one is available.
    pub(crate) fn wait(&self) {
        let mut count = lock(&self.count);

        while *count == 0 {
            count = self
                .cond
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }

        *count -= 1;
    }

    /// Return a permit, waking one waiter.
    pub(crate) fn post(&self) {
        let mut count = lock(&self.count);
        *count += 1;
        self.cond.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::Semaphore;

    #[test]
    fn initial_permit_is_consumed() {
        let sema = Semaphore::new(1);
        sema.wait();
        sema.post();
        sema.wait();
    }

    #[test]
    fn wait_blocks_until_post() {
        let sema = Arc::new(Semaphore::new(0));
        let (tx, rx) = mpsc::channel();

        let waiter = thread::spawn({
            let sema = Arc::clone(&sema);
            move || {
                sema.wait();
                tx.send(()).ok();
            }
        });

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        sema.post();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }
}
