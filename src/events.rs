//! Event identifiers and event buffer payloads.

use core::mem;

use format::{EsFormat, EsSpecific, FourCc};

use crate::buffer::Buffer;
use crate::error::ErrorKind;

/// The format of an elementary stream changed mid-flow.
pub const FORMAT_CHANGED: FourCc = FourCc::new(*b"EFCH");

/// A parameter changed on a port.
pub const PARAMETER_CHANGED: FourCc = FourCc::new(*b"EPCH");

/// An asynchronous component error.
pub const ERROR: FourCc = FourCc::new(*b"ERRO");

/// End of stream reached.
pub const EOS: FourCc = FourCc::new(*b"EEOS");

/// The payload capacity an event buffer needs to carry a format-changed
/// event: the event descriptor plus one format object plus one type
/// specific format.
pub const FORMAT_CHANGED_EVENT_SIZE: u32 = (mem::size_of::<FormatChangedEvent>()
    + mem::size_of::<EsFormat>()
    + mem::size_of::<EsSpecific>()) as u32;

/// Structured payload carried by an event buffer.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum EventData {
    FormatChanged(FormatChangedEvent),
    Error(ErrorKind),
}

/// The contents of a [`FORMAT_CHANGED`] event.
#[derive(Debug, Default, Clone)]
#[non_exhaustive]
pub struct FormatChangedEvent {
    pub buffer_num_min: u32,
    pub buffer_size_min: u32,
    pub buffer_num_recommended: u32,
    pub buffer_size_recommended: u32,
    pub format: EsFormat,
}

impl FormatChangedEvent {
    /// An event announcing the given format, with no buffer requirements.
    #[inline]
    pub fn new(format: EsFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }
}

/// Extract the format-changed event from a buffer, if it carries one.
pub fn format_changed_get(buffer: &Buffer) -> Option<FormatChangedEvent> {
    if buffer.cmd() != Some(FORMAT_CHANGED) {
        return None;
    }

    match buffer.event() {
        Some(EventData::FormatChanged(event)) => Some(event),
        _ => None,
    }
}
