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

use std::{fmt, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Gray8
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb8 | PixelLayout::Bgr8 => 3,
            PixelLayout::Rgba8 | PixelLayout::Bgra8 => 4,
            PixelLayout::Gray8 => 1
        }
    }
}

impl fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelLayout::Rgb8 => write!(f, "RGB8"),
            PixelLayout::Bgr8 => write!(f, "BGR8"),
            PixelLayout::Rgba8 => write!(f, "RGBA8"),
            PixelLayout::Bgra8 => write!(f, "BGRA8"),
            PixelLayout::Gray8 => write!(f, "GRAY8")
        }
    }
}

/// Frame as handed over by a capture backend, before layout conversion.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub layout: PixelLayout
}

impl RawFrame {
    pub fn packed(data: Vec<u8>, width: u32, height: u32, layout: PixelLayout) -> Self {
        let stride = width as usize * layout.bytes_per_pixel();
        Self { data, width, height, stride, layout }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no capture backend for '{0}'")]
    Unsupported(String),
    #[error("end of stream")]
    EndOfStream,
    #[error("read timed out")]
    Timeout,
    #[error(transparent)]
    Backend(#[from] anyhow::Error)
}

#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// `None` blocks on reads for as long as the backend does.
    pub read_timeout: Option<Duration>
}
