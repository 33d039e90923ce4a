// Copyright (C) 2025 Joshua Kesler
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::Context;
use nokhwa::{Camera, pixel_format::RgbFormat, utils::{CameraIndex, RequestedFormat, RequestedFormatType}};

use super::CaptureSource;
use super::types::{CaptureError, PixelLayout, RawFrame};

/// Local webcam addressed as `device://<index>`.
pub struct DeviceSource {
    camera: Camera,
    index: u32,
    fps: f64,
    streaming: bool
}

pub fn parse_device_index(spec: &str) -> Option<u32> {
    spec.trim().trim_end_matches('/').parse().ok()
}

impl DeviceSource {
    pub fn open(spec: &str) -> Result<Self, CaptureError> {
        let index = parse_device_index(spec).ok_or_else(|| CaptureError::Unsupported(format!("device://{}", spec)))?;
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested).with_context(|| format!("initialize camera {}", index))?;
        camera.open_stream().with_context(|| format!("open stream on camera {}", index))?;
        let fps = camera.frame_rate() as f64;
        log::info!("camera {} streaming at {} fps", index, fps);
        Ok(Self { camera, index, fps, streaming: true })
    }
}

impl CaptureSource for DeviceSource {
    fn read_frame(&mut self) -> Result<RawFrame, CaptureError> {
        if !self.streaming {
            return Err(CaptureError::EndOfStream);
        }
        let frame = self.camera.frame().context("capture camera frame")?;
        let decoded = frame.decode_image::<RgbFormat>().context("decode camera frame")?;
        let (width, height) = decoded.dimensions();
        Ok(RawFrame::packed(decoded.into_raw(), width, height, PixelLayout::Rgb8))
    }

    fn nominal_frame_rate(&self) -> f64 {
        self.fps
    }

    fn release(&mut self) {
        if !self.streaming {
            return;
        }
        self.streaming = false;
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("camera {} did not stop cleanly: {}", self.index, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_index_parsing() {
        assert_eq!(parse_device_index("0"), Some(0));
        assert_eq!(parse_device_index(" 2/"), Some(2));
        assert_eq!(parse_device_index("front"), None);
        assert_eq!(parse_device_index(""), None);
    }
}
