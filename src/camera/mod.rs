//! Frame producers consumed by the capture core.
//!
//! A [`VideoSource`] is asked for one still frame at each cadence boundary.
//! Sources that are not ready, or that fail to deliver, return `None`; the
//! capture core treats that as a skipped sample and never as a fault.

#[cfg(feature = "v4l2")]
pub mod v4l2;

#[cfg(feature = "v4l2")]
pub use v4l2::{Camera, CameraSession};

use image::{DynamicImage, ImageBuffer, Rgb};

/// Live stream that can hand out a snapshot on demand.
pub trait VideoSource {
    type Frame;

    /// Grab one frame, or `None` when the stream is not ready or produced nothing.
    fn try_snapshot(&mut self) -> Option<Self::Frame>;
}

/// A source slot that may not be attached yet.
impl<S: VideoSource> VideoSource for Option<S> {
    type Frame = S::Frame;

    fn try_snapshot(&mut self) -> Option<Self::Frame> {
        self.as_mut().and_then(VideoSource::try_snapshot)
    }
}

impl<S: VideoSource + ?Sized> VideoSource for &mut S {
    type Frame = S::Frame;

    fn try_snapshot(&mut self) -> Option<Self::Frame> {
        (**self).try_snapshot()
    }
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    type Frame = S::Frame;

    fn try_snapshot(&mut self) -> Option<Self::Frame> {
        (**self).try_snapshot()
    }
}

/// Adapter turning a closure into a source.
pub struct FnSource<F>(F);

pub fn from_fn<F, T>(f: F) -> FnSource<F>
where
    F: FnMut() -> Option<T>,
{
    FnSource(f)
}

impl<F, T> VideoSource for FnSource<F>
where
    F: FnMut() -> Option<T>,
{
    type Frame = T;

    fn try_snapshot(&mut self) -> Option<T> {
        (self.0)()
    }
}

/// Camera stand-in producing a moving gradient, one distinct image per call.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    produced: u32,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            produced: 0,
        }
    }

    pub fn produced(&self) -> u32 {
        self.produced
    }
}

impl VideoSource for SyntheticSource {
    type Frame = DynamicImage;

    fn try_snapshot(&mut self) -> Option<DynamicImage> {
        let shift = self.produced.wrapping_mul(7);
        let (w, h) = (self.width, self.height);
        let buffer = ImageBuffer::from_fn(w, h, |x, y| {
            let r = ((x * 255 / w + shift) % 256) as u8;
            let g = ((y * 255 / h) % 256) as u8;
            let b = (shift % 256) as u8;
            Rgb([r, g, b])
        });
        self.produced += 1;
        Some(DynamicImage::ImageRgb8(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_slot_yields_nothing() {
        let mut slot: Option<SyntheticSource> = None;
        assert!(slot.try_snapshot().is_none());

        slot = Some(SyntheticSource::new(4, 4));
        assert!(slot.try_snapshot().is_some());
    }

    #[test]
    fn synthetic_frames_differ() {
        let mut source = SyntheticSource::new(8, 6);
        let a = source.try_snapshot().unwrap();
        let b = source.try_snapshot().unwrap();
        assert_eq!((a.width(), a.height()), (8, 6));
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_eq!(source.produced(), 2);
    }

    #[test]
    fn closure_source_counts() {
        let mut n = 0;
        let mut source = from_fn(|| {
            n += 1;
            (n % 2 == 0).then_some(n)
        });
        assert_eq!(source.try_snapshot(), None);
        assert_eq!(source.try_snapshot(), Some(2));
    }
}
