use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::camera::CameraError;

/// A captured video frame, packed RGB8.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    /// Wrap raw RGB8 bytes, checking the buffer matches the dimensions.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CameraError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CameraError::Capture(format!(
                "frame buffer is {} bytes, expected {expected} for {width}x{height} RGB",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Mean luma in `[0, 255]`. Used to flag dark frames in logs.
    pub fn mean_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self
            .data
            .chunks_exact(3)
            .map(|px| (299 * px[0] as u64 + 587 * px[1] as u64 + 114 * px[2] as u64) / 1000)
            .sum();
        sum as f32 / (self.data.len() / 3) as f32
    }

    /// Encode this frame as a JPEG still. `quality` is clamped to 1..=100.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, CameraError> {
        let img = RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            CameraError::Encode(format!(
                "buffer does not match {}x{} RGB",
                self.width, self.height
            ))
        })?;

        let mut out = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        img.write_with_encoder(encoder)
            .map_err(|e| CameraError::Encode(e.to_string()))?;
        Ok(out.into_inner())
    }
}
