use core::fmt;
use core::ops::{Deref, DerefMut};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use bitflags::bitflags;
use format::FourCc;

use crate::component::Component;
use crate::events::EventData;
use crate::pool::Pool;
use crate::sync::lock;

bitflags! {
    /// Flags describing the contents of a buffer.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct BufferFlags: u32 {
        /// End of the stream.
        const EOS = 1 << 0;
        /// Start of a frame.
        const FRAME_START = 1 << 1;
        /// End of a frame.
        const FRAME_END = 1 << 2;
        /// The frame can be decoded without references.
        const KEYFRAME = 1 << 3;
        /// Discontinuity in the stream.
        const DISCONTINUITY = 1 << 4;
        /// Codec configuration data rather than media.
        const CONFIG = 1 << 5;
        /// The payload is known to be corrupted.
        const CORRUPTED = 1 << 9;
        /// The payload failed to be transmitted.
        const TRANSMISSION_FAILED = 1 << 10;
    }
}

/// Payload memory attached to a buffer header.
///
/// Holds a reference to the component the memory came from, so the
/// component outlives every payload allocated through it.
pub struct Payload {
    bytes: Box<[u8]>,
    component: Option<Arc<Component>>,
}

impl Payload {
    #[inline]
    pub(crate) fn new(bytes: Box<[u8]>, component: Option<Arc<Component>>) -> Self {
        Self { bytes, component }
    }

    #[inline]
    pub(crate) fn into_parts(self) -> (Box<[u8]>, Option<Arc<Component>>) {
        (self.bytes, self.component)
    }
}

impl Deref for Payload {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for Payload {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl fmt::Debug for Payload {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// The mutable descriptor fields of a buffer header.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct BufferFields {
    pub(crate) cmd: Option<FourCc>,
    pub(crate) offset: u32,
    pub(crate) length: u32,
    pub(crate) flags: BufferFlags,
    pub(crate) pts: i64,
    pub(crate) dts: i64,
}

/// A reference counted descriptor for a unit of media travelling between
/// ports.
///
/// A header with a command code carries an event; a header without one
/// carries data. On the last release the header returns to the pool it was
/// allocated from, which may recycle it through the pool release callback.
pub struct BufferHeader {
    alloc_size: u32,
    refs: AtomicUsize,
    fields: Mutex<BufferFields>,
    payload: Mutex<Option<Payload>>,
    event: Mutex<Option<EventData>>,
    home: Weak<Pool>,
    slot: usize,
}

/// A shared handle to a buffer header.
pub type Buffer = Arc<BufferHeader>;

impl BufferHeader {
    pub(crate) fn new(alloc_size: u32, payload: Option<Payload>, home: Weak<Pool>, slot: usize) -> Self {
        Self {
            alloc_size,
            refs: AtomicUsize::new(0),
            fields: Mutex::new(BufferFields::default()),
            payload: Mutex::new(payload),
            event: Mutex::new(None),
            home,
            slot,
        }
    }

    /// The allocated payload capacity in bytes.
    #[inline]
    pub fn alloc_size(&self) -> u32 {
        self.alloc_size
    }

    /// The command code, if this header carries an event.
    #[inline]
    pub fn cmd(&self) -> Option<FourCc> {
        lock(&self.fields).cmd
    }

    #[inline]
    pub fn set_cmd(&self, cmd: Option<FourCc>) {
        lock(&self.fields).cmd = cmd;
    }

    /// The number of payload bytes in use.
    #[inline]
    pub fn length(&self) -> u32 {
        lock(&self.fields).length
    }

    #[inline]
    pub fn set_length(&self, length: u32) {
        lock(&self.fields).length = length;
    }

    /// The offset of the first payload byte in use.
    #[inline]
    pub fn offset(&self) -> u32 {
        lock(&self.fields).offset
    }

    #[inline]
    pub fn set_offset(&self, offset: u32) {
        lock(&self.fields).offset = offset;
    }

    #[inline]
    pub fn flags(&self) -> BufferFlags {
        lock(&self.fields).flags
    }

    #[inline]
    pub fn set_flags(&self, flags: BufferFlags) {
        lock(&self.fields).flags = flags;
    }

    /// Presentation timestamp in microseconds.
    #[inline]
    pub fn pts(&self) -> i64 {
        lock(&self.fields).pts
    }

    #[inline]
    pub fn set_pts(&self, pts: i64) {
        lock(&self.fields).pts = pts;
    }

    /// Decode timestamp in microseconds.
    #[inline]
    pub fn dts(&self) -> i64 {
        lock(&self.fields).dts
    }

    #[inline]
    pub fn set_dts(&self, dts: i64) {
        lock(&self.fields).dts = dts;
    }

    /// Whether payload memory is attached.
    #[inline]
    pub fn has_payload(&self) -> bool {
        lock(&self.payload).is_some()
    }

    /// Access the payload memory.
    #[inline]
    pub fn payload(&self) -> MutexGuard<'_, Option<Payload>> {
        lock(&self.payload)
    }

    /// The structured event payload, if any.
    #[inline]
    pub fn event(&self) -> Option<EventData> {
        lock(&self.event).clone()
    }

    #[inline]
    pub fn set_event(&self, event: Option<EventData>) {
        *lock(&self.event) = event;
    }

    /// Clear the descriptor back to an empty data buffer.
    pub(crate) fn reset(&self) {
        *lock(&self.fields) = BufferFields::default();
        *lock(&self.event) = None;
    }

    /// Take an additional reference on the header.
    #[inline]
    pub fn acquire(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
    }

    /// Give up one reference.
    ///
    /// The last reference sends the header back to its pool, which runs the
    /// pool release callback.
    pub fn release(self: &Arc<Self>) {
        if self.refs.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        if let Some(pool) = self.home.upgrade() {
            pool.buffer_released(self);
        }
    }

    #[inline]
    pub(crate) fn arm(&self, refs: usize) {
        self.refs.store(refs, Ordering::Release);
    }

    #[inline]
    pub(crate) fn slot(&self) -> usize {
        self.slot
    }
}

impl fmt::Debug for BufferHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = lock(&self.fields);

        f.debug_struct("BufferHeader")
            .field("cmd", &fields.cmd)
            .field("offset", &fields.offset)
            .field("length", &fields.length)
            .field("flags", &fields.flags)
            .field("alloc_size", &self.alloc_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use format::FourCc;

    use super::{BufferFlags, BufferHeader, Payload};

    #[test]
    fn reset_clears_descriptor() {
        let payload = Payload::new(vec![0u8; 64].into_boxed_slice(), None);
        let buffer = BufferHeader::new(64, Some(payload), Weak::new(), 0);

        buffer.set_cmd(Some(FourCc::new(*b"EEOS")));
        buffer.set_length(32);
        buffer.set_offset(4);
        buffer.set_flags(BufferFlags::EOS | BufferFlags::KEYFRAME);
        buffer.set_pts(90_000);
        buffer.set_dts(90_000);

        buffer.reset();

        assert_eq!(buffer.cmd(), None);
        assert_eq!(buffer.length(), 0);
        assert_eq!(buffer.offset(), 0);
        assert_eq!(buffer.flags(), BufferFlags::empty());
        assert_eq!(buffer.pts(), 0);
        assert_eq!(buffer.dts(), 0);
        assert_eq!(buffer.alloc_size(), 64);
        assert!(buffer.has_payload());
    }
}
