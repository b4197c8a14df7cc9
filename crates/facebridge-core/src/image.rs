//! Image decoding and pixel-format marshalling.
//!
//! Files are decoded by an [`ImageLoader`] into a [`DecodedImage`], which is
//! then packed into the engine's [`PixelBuffer`] layout. Both objects are
//! owned by the calling operation and dropped before it returns.

use crate::error::FaceError;
use image::DynamicImage;
use std::fmt;
use std::path::Path;

/// Packed pixel layouts understood by engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PixelFormat {
    /// 8-bit blue, green, red per pixel, rows packed without padding.
    Bgr24,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgr24 => 3,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Bgr24 => f.write_str("BGR24"),
        }
    }
}

/// Engine-ready pixels.
///
/// Invariant: `data.len() == width * height * format.bytes_per_pixel()`.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl PixelBuffer {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self, FaceError> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(FaceError::FormatConversion {
                format,
                reason: format!(
                    "buffer holds {} bytes, {width}x{height} needs {expected}",
                    data.len()
                ),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Width rounded down to a multiple of 4, height to a multiple of 2.
pub fn aligned_dimensions(width: u32, height: u32) -> (u32, u32) {
    (width & !3, height & !1)
}

/// A decoded image file, not yet in engine layout.
pub trait DecodedImage: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Crop to aligned dimensions and pack into `format`.
    fn to_pixel_buffer(&self, format: PixelFormat) -> Result<PixelBuffer, FaceError>;
}

/// Source of decoded images.
pub trait ImageLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn DecodedImage>, FaceError>;
}

/// Decodes image files with the `image` crate, sniffing the format from content.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileImageLoader;

impl ImageLoader for FileImageLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn DecodedImage>, FaceError> {
        let load_err = |reason: String| FaceError::ImageLoad {
            path: path.to_path_buf(),
            reason,
        };

        let reader = image::ImageReader::open(path)
            .map_err(|e| load_err(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| load_err(e.to_string()))?;
        let img = reader.decode().map_err(|e| load_err(e.to_string()))?;

        tracing::debug!(
            path = %path.display(),
            width = img.width(),
            height = img.height(),
            color = ?img.color(),
            "image decoded"
        );

        Ok(Box::new(img))
    }
}

impl DecodedImage for DynamicImage {
    fn width(&self) -> u32 {
        DynamicImage::width(self)
    }

    fn height(&self) -> u32 {
        DynamicImage::height(self)
    }

    fn to_pixel_buffer(&self, format: PixelFormat) -> Result<PixelBuffer, FaceError> {
        let (width, height) = (DynamicImage::width(self), DynamicImage::height(self));
        let (aligned_w, aligned_h) = aligned_dimensions(width, height);
        if aligned_w == 0 || aligned_h == 0 {
            return Err(FaceError::FormatConversion {
                format,
                reason: format!("image {width}x{height} is too small to align"),
            });
        }

        let data = match format {
            PixelFormat::Bgr24 => {
                let rgb = self.to_rgb8();
                pack_bgr24(rgb.as_raw(), width, aligned_w, aligned_h)
            }
        };

        PixelBuffer::new(data, aligned_w, aligned_h, format)
    }
}

/// Pack the top-left `out_w`×`out_h` region of a packed RGB image as BGR24.
fn pack_bgr24(rgb: &[u8], src_width: u32, out_w: u32, out_h: u32) -> Vec<u8> {
    let src_stride = src_width as usize * 3;
    let row_len = out_w as usize * 3;
    let mut out = Vec::with_capacity(row_len * out_h as usize);

    for row in 0..out_h as usize {
        let start = row * src_stride;
        for px in rgb[start..start + row_len].chunks_exact(3) {
            out.extend_from_slice(&[px[2], px[1], px[0]]);
        }
    }

    out
}
