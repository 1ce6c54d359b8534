use core::fmt;

/// A four character code identifying an encoding or an event.
///
/// # Examples
///
/// ```
/// use format::FourCc;
///
/// let h264 = FourCc::new(*b"H264");
/// assert_eq!(h264.to_string(), "H264");
/// assert_ne!(h264, FourCc::new(*b"MJPG"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FourCc(u32);

impl FourCc {
    /// Construct a four character code from its character bytes.
    #[inline]
    pub const fn new(code: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(code))
    }

    /// Construct a four character code from its packed representation.
    #[inline]
    pub const fn from_u32(code: u32) -> Self {
        Self(code)
    }

    /// The packed representation of the code.
    #[inline]
    pub const fn to_u32(self) -> u32 {
        self.0
    }

    /// The character bytes of the code.
    #[inline]
    pub const fn bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.bytes() {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            };

            write!(f, "{c}")?;
        }

        Ok(())
    }
}

impl fmt::Debug for FourCc {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({self})")
    }
}
