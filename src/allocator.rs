//! Sample buffers and the pool that supplies them.
//!
//! A [`MediaSample`] drawn from a [`MemoryAllocator`] returns its memory to
//! the pool when dropped, so a downstream consumer that holds on to samples
//! throttles the producer instead of letting it allocate without bound.

use crate::errors::{PinError, Result};
use crate::timing::ReferenceTime;
use crate::types::AllocatorProperties;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

/// One frame's worth of memory plus its presentation metadata.
pub struct MediaSample {
    data: Vec<u8>,
    actual_len: usize,
    times: Option<(ReferenceTime, ReferenceTime)>,
    sync_point: bool,
    origin: Option<(Arc<Pool>, u64)>,
}

impl MediaSample {
    /// A standalone sample of `size` zeroed bytes, not tied to any pool.
    pub fn new(size: usize) -> Self {
        Self::from_vec(vec![0u8; size])
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data,
            actual_len: 0,
            times: None,
            sync_point: false,
            origin: None,
        }
    }

    /// Writable memory; its length is the buffer capacity.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The valid payload.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.actual_len.min(self.data.len())]
    }

    pub fn actual_len(&self) -> usize {
        self.actual_len
    }

    pub fn set_actual_len(&mut self, len: usize) -> Result<()> {
        if len > self.data.len() {
            return Err(PinError::invalid_buffer(format!(
                "payload of {} bytes exceeds buffer of {}",
                len,
                self.data.len()
            )));
        }
        self.actual_len = len;
        Ok(())
    }

    pub fn times(&self) -> Option<(ReferenceTime, ReferenceTime)> {
        self.times
    }

    pub fn set_times(&mut self, start: ReferenceTime, end: ReferenceTime) {
        self.times = Some((start, end));
    }

    pub fn clear_times(&mut self) {
        self.times = None;
    }

    pub fn is_sync_point(&self) -> bool {
        self.sync_point
    }

    pub fn set_sync_point(&mut self, sync_point: bool) {
        self.sync_point = sync_point;
    }

    /// Copy out the payload; the buffer itself goes back to its pool.
    pub fn into_data(self) -> Vec<u8> {
        self.data().to_vec()
    }
}

impl fmt::Debug for MediaSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSample")
            .field("capacity", &self.data.len())
            .field("actual_len", &self.actual_len)
            .field("times", &self.times)
            .field("sync_point", &self.sync_point)
            .field("pooled", &self.origin.is_some())
            .finish()
    }
}

impl Drop for MediaSample {
    fn drop(&mut self) {
        if let Some((pool, generation)) = self.origin.take() {
            pool.release(std::mem::take(&mut self.data), generation);
        }
    }
}

/// Source of sample memory, as seen by the pin.
pub trait Allocator: Send + Sync {
    /// Request a pool layout. Returns what was actually granted, which may be
    /// smaller than requested.
    fn set_properties(&self, request: &AllocatorProperties) -> Result<AllocatorProperties>;

    fn properties(&self) -> AllocatorProperties;

    /// Allocate the pool. `get_buffer` fails until this is called.
    fn commit(&self) -> Result<()>;

    /// Release the pool and wake any caller blocked in `get_buffer`.
    fn decommit(&self);

    /// Next free sample, blocking while every buffer is in use.
    fn get_buffer(&self) -> Result<MediaSample>;
}

struct PoolInner {
    properties: AllocatorProperties,
    free: Vec<Vec<u8>>,
    committed: bool,
    generation: u64,
    max_buffer_size: Option<usize>,
}

struct Pool {
    inner: Mutex<PoolInner>,
    cv: Condvar,
}

impl Pool {
    fn release(&self, buffer: Vec<u8>, generation: u64) {
        let Ok(mut g) = self.inner.lock() else {
            return;
        };
        // Buffers from a previous commit are simply dropped
        if g.committed && g.generation == generation {
            g.free.push(buffer);
            self.cv.notify_one();
        }
    }
}

/// Fixed-size in-memory buffer pool.
#[derive(Clone)]
pub struct MemoryAllocator {
    pool: Arc<Pool>,
}

impl MemoryAllocator {
    pub fn new() -> Self {
        Self {
            pool: Arc::new(Pool {
                inner: Mutex::new(PoolInner {
                    properties: AllocatorProperties::default(),
                    free: Vec::new(),
                    committed: false,
                    generation: 0,
                    max_buffer_size: None,
                }),
                cv: Condvar::new(),
            }),
        }
    }

    /// An allocator that never grants buffers larger than `max` bytes.
    pub fn with_max_buffer_size(max: usize) -> Self {
        let allocator = Self::new();
        if let Ok(mut g) = allocator.pool.inner.lock() {
            g.max_buffer_size = Some(max);
        }
        allocator
    }

    /// Number of buffers currently idle in the pool.
    pub fn free_buffers(&self) -> usize {
        self.pool.inner.lock().map(|g| g.free.len()).unwrap_or(0)
    }

    pub fn is_committed(&self) -> bool {
        self.pool.inner.lock().map(|g| g.committed).unwrap_or(false)
    }
}

impl Default for MemoryAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for MemoryAllocator {
    fn set_properties(&self, request: &AllocatorProperties) -> Result<AllocatorProperties> {
        let mut g = self.pool.inner.lock()?;
        if g.committed {
            return Err(PinError::Allocator(
                "cannot change properties while committed".to_string(),
            ));
        }

        let alignment = request.alignment.max(1);
        let mut buffer_size = request.buffer_size.div_ceil(alignment) * alignment;
        if let Some(max) = g.max_buffer_size {
            buffer_size = buffer_size.min(max);
        }

        g.properties = AllocatorProperties {
            buffer_count: request.buffer_count.max(1),
            buffer_size,
            alignment,
            prefix: request.prefix,
        };
        log::debug!("Allocator granted {:?}", g.properties);
        Ok(g.properties)
    }

    fn properties(&self) -> AllocatorProperties {
        self.pool
            .inner
            .lock()
            .map(|g| g.properties)
            .unwrap_or_default()
    }

    fn commit(&self) -> Result<()> {
        let mut g = self.pool.inner.lock()?;
        if g.committed {
            return Ok(());
        }
        if g.properties.buffer_size == 0 {
            return Err(PinError::Allocator("no properties set".to_string()));
        }

        let size = g.properties.buffer_size;
        g.free = (0..g.properties.buffer_count).map(|_| vec![0u8; size]).collect();
        g.generation = g.generation.wrapping_add(1);
        g.committed = true;
        Ok(())
    }

    fn decommit(&self) {
        if let Ok(mut g) = self.pool.inner.lock() {
            g.committed = false;
            g.free.clear();
            self.pool.cv.notify_all();
        }
    }

    fn get_buffer(&self) -> Result<MediaSample> {
        let mut g = self.pool.inner.lock()?;
        loop {
            if !g.committed {
                return Err(PinError::Allocator("allocator is decommitted".to_string()));
            }
            if let Some(data) = g.free.pop() {
                let generation = g.generation;
                return Ok(MediaSample {
                    data,
                    actual_len: 0,
                    times: None,
                    sync_point: false,
                    origin: Some((Arc::clone(&self.pool), generation)),
                });
            }
            g = self.pool.cv.wait(g)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_grant_rounds_to_alignment() {
        let allocator = MemoryAllocator::new();
        let request = AllocatorProperties {
            buffer_count: 2,
            buffer_size: 1001,
            alignment: 16,
            prefix: 0,
        };
        let granted = allocator.set_properties(&request).unwrap();
        assert_eq!(granted.buffer_size, 1008);
        assert_eq!(granted.buffer_count, 2);
    }

    #[test]
    fn test_capped_allocator_grants_less() {
        let allocator = MemoryAllocator::with_max_buffer_size(100);
        let granted = allocator
            .set_properties(&AllocatorProperties::new(2, 4096))
            .unwrap();
        assert_eq!(granted.buffer_size, 100);
    }

    #[test]
    fn test_get_buffer_requires_commit() {
        let allocator = MemoryAllocator::new();
        allocator.set_properties(&AllocatorProperties::new(1, 64)).unwrap();
        assert!(allocator.get_buffer().is_err());
        allocator.commit().unwrap();
        let sample = allocator.get_buffer().unwrap();
        assert_eq!(sample.capacity(), 64);
    }

    #[test]
    fn test_dropped_sample_returns_to_pool() {
        let allocator = MemoryAllocator::new();
        allocator.set_properties(&AllocatorProperties::new(2, 64)).unwrap();
        allocator.commit().unwrap();

        let a = allocator.get_buffer().unwrap();
        let _b = allocator.get_buffer().unwrap();
        assert_eq!(allocator.free_buffers(), 0);
        drop(a);
        assert_eq!(allocator.free_buffers(), 1);
    }

    #[test]
    fn test_decommit_wakes_blocked_caller() {
        let allocator = MemoryAllocator::new();
        allocator.set_properties(&AllocatorProperties::new(1, 64)).unwrap();
        allocator.commit().unwrap();
        let _held = allocator.get_buffer().unwrap();

        let waiter = {
            let allocator = allocator.clone();
            thread::spawn(move || allocator.get_buffer().map(|_| ()))
        };
        thread::sleep(Duration::from_millis(20));
        allocator.decommit();

        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(PinError::Allocator(_))));
    }

    #[test]
    fn test_properties_locked_while_committed() {
        let allocator = MemoryAllocator::new();
        allocator.set_properties(&AllocatorProperties::new(1, 64)).unwrap();
        allocator.commit().unwrap();
        assert!(allocator
            .set_properties(&AllocatorProperties::new(1, 128))
            .is_err());
    }

    #[test]
    fn test_sample_payload() {
        let mut sample = MediaSample::new(8);
        sample.buffer_mut().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        sample.set_actual_len(4).unwrap();
        assert_eq!(sample.data(), &[1, 2, 3, 4]);
        assert!(sample.set_actual_len(9).is_err());
        assert_eq!(sample.into_data(), vec![1, 2, 3, 4]);
    }
}
