#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod fourcc;
pub use self::fourcc::FourCc;

mod fraction;
pub use self::fraction::Fraction;

#[cfg(feature = "alloc")]
mod es;
#[cfg(feature = "alloc")]
pub use self::es::{AudioFormat, EsFormat, EsSpecific, EsType, SubpictureFormat, VideoFormat};
