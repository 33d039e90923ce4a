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

pub mod types;
mod device;
#[cfg(not(feature = "capture-opencv"))]
mod ffmpeg;
mod mjpeg;
#[cfg(feature = "capture-opencv")]
mod opencv_video;
#[cfg(test)]
pub mod fake;

use std::path::Path;

use types::{CaptureError, CaptureOptions, RawFrame};

/// A handle on an open video stream. Owned by exactly one acquisition loop.
pub trait CaptureSource {
    fn read_frame(&mut self) -> Result<RawFrame, CaptureError>;

    /// Frames per second reported by the source, `0.0` when unknown.
    fn nominal_frame_rate(&self) -> f64;

    fn release(&mut self) {}
}

pub trait SourceOpener: Send + Sync {
    fn open(&self, address: &str) -> Result<Box<dyn CaptureSource>, CaptureError>;
}

/// Picks a backend from the address scheme.
pub struct BackendOpener {
    options: CaptureOptions
}

impl BackendOpener {
    pub fn new(options: CaptureOptions) -> Self {
        Self { options }
    }
}

impl SourceOpener for BackendOpener {
    fn open(&self, address: &str) -> Result<Box<dyn CaptureSource>, CaptureError> {
        let lower = address.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return mjpeg::open_http(address, &self.options);
        }
        if lower.starts_with("device://") {
            let source = device::DeviceSource::open(&address["device://".len()..])?;
            return Ok(Box::new(source));
        }
        if lower.starts_with("file://") {
            return self.open_file(&address["file://".len()..]);
        }
        if lower.starts_with("rtsp://") {
            return self.open_video(address);
        }
        if Path::new(address).exists() {
            return self.open_file(address);
        }
        Err(CaptureError::Unsupported(address.to_string()))
    }
}

impl BackendOpener {
    fn open_file(&self, path: &str) -> Result<Box<dyn CaptureSource>, CaptureError> {
        if is_mjpeg_file(path) {
            return Ok(Box::new(mjpeg::MjpegSource::open_file(Path::new(path))?));
        }
        self.open_video(path)
    }

    #[cfg(feature = "capture-opencv")]
    fn open_video(&self, address: &str) -> Result<Box<dyn CaptureSource>, CaptureError> {
        Ok(Box::new(opencv_video::OpenCvSource::open(address, &self.options)?))
    }

    #[cfg(not(feature = "capture-opencv"))]
    fn open_video(&self, address: &str) -> Result<Box<dyn CaptureSource>, CaptureError> {
        Ok(Box::new(ffmpeg::FfmpegSource::open(address, &self.options)?))
    }
}

fn is_mjpeg_file(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "mjpg" | "mjpeg"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mjpeg_extension_is_case_insensitive() {
        assert!(is_mjpeg_file("/tmp/court.MJPG"));
        assert!(is_mjpeg_file("clip.mjpeg"));
        assert!(!is_mjpeg_file("clip.mp4"));
        assert!(!is_mjpeg_file("noext"));
    }

    #[test]
    fn unknown_address_is_unsupported() {
        let opener = BackendOpener::new(CaptureOptions::default());
        match opener.open("gopher://nowhere/feed") {
            Err(CaptureError::Unsupported(a)) => assert_eq!(a, "gopher://nowhere/feed"),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("gopher should not open")
        }
    }

    #[test]
    fn missing_mjpeg_file_fails_to_open() {
        let opener = BackendOpener::new(CaptureOptions::default());
        assert!(opener.open("file:///definitely/not/here.mjpg").is_err());
    }

    #[test]
    fn missing_container_file_fails_to_open() {
        let opener = BackendOpener::new(CaptureOptions::default());
        match opener.open("file:///definitely/not/here.mp4") {
            Err(CaptureError::Backend(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("missing file should not open")
        }
    }
}
