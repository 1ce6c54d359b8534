use alloc::vec::Vec;

use crate::{FourCc, Fraction};

/// The kind of elementary stream a format describes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EsType {
    #[default]
    Unknown,
    Control,
    Audio,
    Video,
    Subpicture,
}

/// Video frame geometry and timing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Fraction,
    pub par: Fraction,
    pub color_space: Option<FourCc>,
}

/// Audio sample layout.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct AudioFormat {
    pub channels: u32,
    pub sample_rate: u32,
    pub bits_per_sample: u32,
    pub block_align: u32,
}

/// Subpicture placement.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct SubpictureFormat {
    pub x_offset: u32,
    pub y_offset: u32,
}

/// Type specific format information.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EsSpecific {
    #[default]
    None,
    Video(VideoFormat),
    Audio(AudioFormat),
    Subpicture(SubpictureFormat),
}

/// Description of one elementary stream.
///
/// The structure is deliberately open: component code fills it in before a
/// format commit and reads it back after negotiation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct EsFormat {
    pub es_type: EsType,
    pub encoding: Option<FourCc>,
    pub encoding_variant: Option<FourCc>,
    pub bitrate: u32,
    /// Format flags. The only defined bit is [`EsFormat::FLAG_FRAMED`].
    pub flags: u32,
    pub es: EsSpecific,
    pub extradata: Vec<u8>,
}

impl EsFormat {
    /// The stream is already framed.
    pub const FLAG_FRAMED: u32 = 1;

    /// Construct an empty format of the given type.
    #[inline]
    pub fn new(es_type: EsType) -> Self {
        Self {
            es_type,
            ..Self::default()
        }
    }

    /// Overwrite this format with a complete copy of `other`, extradata
    /// included.
    pub fn full_copy(&mut self, other: &EsFormat) {
        self.es_type = other.es_type;
        self.encoding = other.encoding;
        self.encoding_variant = other.encoding_variant;
        self.bitrate = other.bitrate;
        self.flags = other.flags;
        self.es = other.es;
        self.extradata.clear();
        self.extradata.extend_from_slice(&other.extradata);
    }
}
