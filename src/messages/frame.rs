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

use std::fmt;

/// A decoded image for one slot: packed RGB8, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub slot: usize,
    pub sequence: u64,
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: usize
}

impl Frame {
    pub fn size(&self) -> [usize; 2] {
        [self.width as usize, self.height as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    SourceOpenFailed,
    SourceReadFailed
}

impl fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamErrorKind::SourceOpenFailed => write!(f, "source open failed"),
            StreamErrorKind::SourceReadFailed => write!(f, "source read failed")
        }
    }
}

/// Terminal failure of one slot's acquisition loop.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct StreamError {
    pub slot: usize,
    pub kind: StreamErrorKind,
    pub message: String
}

impl StreamError {
    pub fn new(slot: usize, kind: StreamErrorKind, message: impl Into<String>) -> Self {
        Self { slot, kind, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotEvent {
    Frame(Frame),
    Error(StreamError)
}

impl SlotEvent {
    pub fn slot(&self) -> usize {
        match self {
            SlotEvent::Frame(f) => f.slot,
            SlotEvent::Error(e) => e.slot
        }
    }
}
