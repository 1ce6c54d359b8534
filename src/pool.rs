use std::sync::{Arc, Mutex, Weak};

use bittle::{Bits, BitsMut};
use slab::Slab;

use crate::buffer::{Buffer, BufferHeader, Payload};
use crate::error::{ErrorKind, Result};
use crate::port::Port;
use crate::sync::lock;

/// Invoked when a buffer completes its journey and re-enters the pool.
///
/// Returns `true` if the pool should keep the buffer, `false` if the
/// callback consumed it and the pool should consider it out again.
pub type PoolReleaseCb = Arc<dyn Fn(&Arc<Pool>, &Buffer) -> bool + Send + Sync>;

/// The widest available-set a pool can track.
const MAX_BUFFERS: usize = 128;

/// A bounded, restartable source of buffer headers.
///
/// Headers drawn with [`queue_get`][Pool::queue_get] come back on their
/// last [`release`][BufferHeader::release], which runs the release callback
/// if one is set.
pub struct Pool {
    inner: Mutex<PoolInner>,
}

struct PoolInner {
    buffers: Slab<Buffer>,
    /// The headers currently resident in the pool.
    available: u128,
    callback: Option<PoolReleaseCb>,
}

impl Pool {
    /// Create a pool of `num` headers, each backed by `payload_size` bytes
    /// of heap memory. A payload size of zero creates headers without
    /// payload.
    pub fn new(num: u32, payload_size: u32) -> Result<Arc<Pool>> {
        let mut payloads = Vec::with_capacity(num as usize);

        for _ in 0..num {
            payloads.push((payload_size != 0).then(|| {
                Payload::new(vec![0u8; payload_size as usize].into_boxed_slice(), None)
            }));
        }

        Self::build(payload_size, payloads)
    }

    /// Create a pool for a port, allocating every payload through the
    /// port's payload allocation path.
    ///
    /// Takes the port lock per payload when the component supplies an
    /// allocator, so it must not be called with that lock held.
    pub fn for_port(port: &Arc<Port>, num: u32, payload_size: u32) -> Result<Arc<Pool>> {
        let mut payloads = Vec::with_capacity(num as usize);

        for _ in 0..num {
            if payload_size == 0 {
                payloads.push(None);
            } else {
                payloads.push(Some(port.payload_alloc(payload_size)?));
            }
        }

        Self::build(payload_size, payloads)
    }

    fn build(alloc_size: u32, payloads: Vec<Option<Payload>>) -> Result<Arc<Pool>> {
        if payloads.len() > MAX_BUFFERS {
            tracing::error!(num = payloads.len(), max = MAX_BUFFERS, "pool too large");
            return Err(ErrorKind::Invalid.into());
        }

        Ok(Arc::new_cyclic(|pool: &Weak<Pool>| {
            let mut buffers = Slab::with_capacity(payloads.len());
            let mut available = 0u128;

            for payload in payloads {
                let slot = buffers.vacant_key();
                buffers.insert(Arc::new(BufferHeader::new(
                    alloc_size,
                    payload,
                    pool.clone(),
                    slot,
                )));
                available.set_bit(slot as u32);
            }

            Pool {
                inner: Mutex::new(PoolInner {
                    buffers,
                    available,
                    callback: None,
                }),
            }
        }))
    }

    /// Draw a buffer header from the pool, or `None` if all are out.
    pub fn queue_get(self: &Arc<Self>) -> Option<Buffer> {
        let mut inner = lock(&self.inner);
        let slot = inner.available.iter_ones().next()?;
        inner.available.clear_bit(slot);

        let buffer = inner.buffers[slot as usize].clone();
        buffer.arm(1);
        Some(buffer)
    }

    /// Install or clear the release callback.
    pub fn callback_set(&self, callback: Option<PoolReleaseCb>) {
        lock(&self.inner).callback = callback;
    }

    /// The number of headers currently resident in the pool.
    pub fn available(&self) -> u32 {
        lock(&self.inner).available.count_ones()
    }

    /// The total number of headers managed by the pool.
    pub fn capacity(&self) -> usize {
        lock(&self.inner).buffers.len()
    }

    /// A buffer lost its last reference and is back at its home pool.
    pub(crate) fn buffer_released(self: &Arc<Self>, buffer: &Buffer) {
        // Hand the callback a live reference: a callback that recycles the
        // buffer sends it straight back out.
        buffer.arm(1);

        // The callback runs without the pool lock held; it may release
        // other buffers of this pool synchronously.
        let callback = lock(&self.inner).callback.clone();

        let keep = match &callback {
            Some(callback) => callback(self, buffer),
            None => true,
        };

        if keep {
            buffer.arm(0);
            lock(&self.inner).available.set_bit(buffer.slot() as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::Pool;

    #[test]
    fn queue_get_exhausts() {
        let pool = Pool::new(2, 16).unwrap();

        let a = pool.queue_get().unwrap();
        let b = pool.queue_get().unwrap();
        assert!(pool.queue_get().is_none());
        assert_eq!(pool.available(), 0);

        a.release();
        assert_eq!(pool.available(), 1);
        assert!(pool.queue_get().is_some());

        b.release();
    }

    #[test]
    fn release_runs_callback() {
        let pool = Pool::new(1, 16).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        pool.callback_set(Some(Arc::new({
            let hits = Arc::clone(&hits);
            move |_, _| {
                hits.fetch_add(1, Ordering::SeqCst);
                true
            }
        })));

        let buffer = pool.queue_get().unwrap();
        buffer.release();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn callback_can_keep_buffer_out() {
        let pool = Pool::new(1, 16).unwrap();
        pool.callback_set(Some(Arc::new(|_, _| false)));

        let buffer = pool.queue_get().unwrap();
        buffer.release();

        // The callback consumed the buffer; it never re-entered the pool.
        assert_eq!(pool.available(), 0);
        assert!(pool.queue_get().is_none());

        // A later genuine release puts it back once the callback is gone.
        pool.callback_set(None);
        buffer.release();
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn passthrough_pool_has_no_payload() {
        let pool = Pool::new(1, 0).unwrap();
        let buffer = pool.queue_get().unwrap();
        assert!(!buffer.has_payload());
        assert_eq!(buffer.alloc_size(), 0);
        buffer.release();
    }
}
