//! Dense float rasters, borrowed views and image-level operations.
//!
//! `Image` owns a contiguous row-major `f32` buffer with interleaved
//! channels; cloning duplicates the buffer and moving transfers it.
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit
//! stride, used to ingest caller-owned pixels without copying. The stride
//! counts elements between the starts of consecutive rows, so a stride larger
//! than the width represents padded rows.

use crate::util::{KeyMatchError, KeyMatchResult};

pub mod border;
#[cfg(feature = "image-io")]
pub mod io;
pub mod ops;
pub mod pyramid;

pub use border::Border;

/// Owned dense raster of `height × width × channels` floats.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    data: Vec<f32>,
    width: usize,
    height: usize,
    channels: usize,
}

impl Image {
    /// Creates a zero-filled image.
    pub fn new(height: usize, width: usize, channels: usize) -> KeyMatchResult<Self> {
        let len = raster_len(height, width, channels)?;
        Ok(Self {
            data: vec![0.0; len],
            width,
            height,
            channels,
        })
    }

    /// Wraps an existing buffer; its length must match the dimensions exactly.
    pub fn from_vec(
        data: Vec<f32>,
        height: usize,
        width: usize,
        channels: usize,
    ) -> KeyMatchResult<Self> {
        let needed = raster_len(height, width, channels)?;
        if data.len() < needed {
            return Err(KeyMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(KeyMatchError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// Builds a single-channel image by evaluating `f(row, col)` per pixel.
    pub fn from_fn<F>(height: usize, width: usize, mut f: F) -> KeyMatchResult<Self>
    where
        F: FnMut(usize, usize) -> f32,
    {
        let len = raster_len(height, width, 1)?;
        let mut data = Vec::with_capacity(len);
        for row in 0..height {
            for col in 0..width {
                data.push(f(row, col));
            }
        }
        Self::from_vec(data, height, width, 1)
    }

    /// Copies an 8-bit grayscale view, scaling intensities to `[0, 1]`.
    pub fn from_view_u8(view: ImageView<'_, u8>) -> KeyMatchResult<Self> {
        Self::copy_view(view, |v| f32::from(v) / 255.0)
    }

    /// Copies a float grayscale view.
    pub fn from_view_f32(view: ImageView<'_, f32>) -> KeyMatchResult<Self> {
        Self::copy_view(view, |v| v)
    }

    fn copy_view<T: Copy>(view: ImageView<'_, T>, convert: impl Fn(T) -> f32) -> KeyMatchResult<Self> {
        let width = view.width();
        let height = view.height();
        let mut data = Vec::with_capacity(raster_len(height, width, 1)?);
        for y in 0..height {
            let row = view.row(y).ok_or(KeyMatchError::BufferTooSmall {
                needed: (y + 1) * view.stride(),
                got: view.as_slice().len(),
            })?;
            data.extend(row.iter().map(|&v| convert(v)));
        }
        Self::from_vec(data, height, width, 1)
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the number of interleaved channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the number of elements per row (`width · channels`).
    pub fn stride(&self) -> usize {
        self.width * self.channels
    }

    /// Returns `(height, width)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Returns the backing buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consumes the image and returns its buffer.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Returns the value of `channel` at `(row, col)` if it is within bounds.
    pub fn get(&self, row: usize, col: usize, channel: usize) -> Option<f32> {
        if row >= self.height || col >= self.width || channel >= self.channels {
            return None;
        }
        self.data
            .get(row * self.stride() + col * self.channels + channel)
            .copied()
    }

    /// Returns the first-channel value at an in-bounds `(row, col)`.
    ///
    /// Callers guarantee bounds; out-of-range access panics.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f32 {
        debug_assert!(row < self.height && col < self.width);
        self.data[row * self.stride() + col * self.channels]
    }

    #[inline]
    pub(crate) fn set(&mut self, row: usize, col: usize, value: f32) {
        let idx = row * self.stride() + col * self.channels;
        self.data[idx] = value;
    }

    /// Returns the interleaved samples of row `row`.
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.height {
            return None;
        }
        let start = row * self.stride();
        self.data.get(start..start + self.stride())
    }

    /// Fails unless the image has exactly one channel.
    pub fn ensure_gray(&self) -> KeyMatchResult<()> {
        if self.channels != 1 {
            return Err(KeyMatchError::InvalidChannels {
                expected: 1,
                got: self.channels,
            });
        }
        Ok(())
    }

    /// Extracts a single channel as a new grayscale image.
    pub fn channel(&self, channel: usize) -> KeyMatchResult<Self> {
        if channel >= self.channels {
            return Err(KeyMatchError::IndexOutOfBounds {
                index: channel,
                len: self.channels,
                context: "channel",
            });
        }
        let data = self
            .data
            .iter()
            .skip(channel)
            .step_by(self.channels)
            .copied()
            .collect();
        Self::from_vec(data, self.height, self.width, 1)
    }

    /// Applies `f` to every sample.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            data: self.data.iter().map(|&v| f(v)).collect(),
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }

    /// Combines two same-shaped images sample by sample.
    pub fn zip_map(&self, other: &Self, f: impl Fn(f32, f32) -> f32) -> KeyMatchResult<Self> {
        if self.dims() != other.dims() {
            return Err(KeyMatchError::InvalidDimensions {
                width: other.width,
                height: other.height,
            });
        }
        if self.channels != other.channels {
            return Err(KeyMatchError::InvalidChannels {
                expected: self.channels,
                got: other.channels,
            });
        }
        Ok(Self {
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
            width: self.width,
            height: self.height,
            channels: self.channels,
        })
    }

    /// Returns a borrowed grayscale view; requires a single channel.
    pub fn view(&self) -> KeyMatchResult<ImageView<'_, f32>> {
        self.ensure_gray()?;
        ImageView::from_slice(&self.data, self.width, self.height)
    }
}

fn raster_len(height: usize, width: usize, channels: usize) -> KeyMatchResult<usize> {
    if width == 0 || height == 0 || channels == 0 {
        return Err(KeyMatchError::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(channels))
        .ok_or(KeyMatchError::InvalidDimensions { width, height })
}

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> KeyMatchResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> KeyMatchResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(KeyMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns the element at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y.checked_mul(self.stride)?.checked_add(x)?;
        self.data.get(idx)
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width)?;
        self.data.get(start..end)
    }
}

fn required_len(width: usize, height: usize, stride: usize) -> KeyMatchResult<usize> {
    if width == 0 || height == 0 {
        return Err(KeyMatchError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(KeyMatchError::InvalidStride { width, stride });
    }
    (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(KeyMatchError::InvalidDimensions { width, height })
}
