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

use anyhow::{Context, anyhow};
use opencv::{core::{Mat, Vector}, prelude::*, videoio};

use super::CaptureSource;
use super::types::{CaptureError, CaptureOptions, PixelLayout, RawFrame};

/// RTSP streams and container files decoded by OpenCV's videoio.
pub struct OpenCvSource {
    capture: videoio::VideoCapture,
    address: String,
    fps: f64,
    open: bool
}

impl OpenCvSource {
    pub fn open(address: &str, options: &CaptureOptions) -> Result<Self, CaptureError> {
        let capture = match options.read_timeout {
            Some(timeout) => {
                let ms = timeout.as_millis().min(i32::MAX as u128) as i32;
                let params = Vector::<i32>::from_slice(&[videoio::CAP_PROP_OPEN_TIMEOUT_MSEC, ms, videoio::CAP_PROP_READ_TIMEOUT_MSEC, ms]);
                videoio::VideoCapture::from_file_with_params(address, videoio::CAP_ANY, &params)
            }
            None => videoio::VideoCapture::from_file(address, videoio::CAP_ANY)
        }.with_context(|| format!("create capture for {}", address))?;

        if !capture.is_opened().context("query capture state")? {
            return Err(anyhow!("capture backend refused {}", address).into());
        }
        let fps = capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        log::info!("opened {} via opencv ({} fps)", address, fps);
        Ok(Self { capture, address: address.to_string(), fps, open: true })
    }
}

impl CaptureSource for OpenCvSource {
    fn read_frame(&mut self) -> Result<RawFrame, CaptureError> {
        if !self.open {
            return Err(CaptureError::EndOfStream);
        }
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame).context("read frame")? {
            return Err(CaptureError::EndOfStream);
        }
        let frame = if frame.is_continuous() { frame } else { frame.try_clone().context("copy frame")? };
        let layout = match frame.channels() {
            1 => PixelLayout::Gray8,
            4 => PixelLayout::Bgra8,
            _ => PixelLayout::Bgr8
        };
        let data = frame.data_bytes().context("frame bytes")?.to_vec();
        Ok(RawFrame::packed(data, frame.cols() as u32, frame.rows() as u32, layout))
    }

    fn nominal_frame_rate(&self) -> f64 {
        self.fps
    }

    fn release(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(e) = self.capture.release() {
            log::warn!("releasing {} failed: {}", self.address, e);
        }
    }
}
