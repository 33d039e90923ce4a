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

use crate::messages::{Frame, SlotEvent, StreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    NoSource,
    Streaming,
    Error
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
    NoSignal,
    EmptyAddress,
    Stopped
}

/// What one grid cell shows: the newest frame, an error, or an idle caption.
/// Frames are handed to the renderer once through `take_pending`.
#[derive(Debug)]
pub struct DisplaySurface {
    index: usize,
    state: SurfaceState,
    caption: String,
    pending: Option<Frame>,
    image_size: Option<[u32; 2]>,
    last_error: Option<String>,
    frames_shown: u64
}

impl DisplaySurface {
    pub fn new(index: usize) -> Self {
        let mut surface = Self {
            index,
            state: SurfaceState::NoSource,
            caption: String::new(),
            pending: None,
            image_size: None,
            last_error: None,
            frames_shown: 0
        };
        surface.reset(IdleReason::NoSignal);
        surface
    }

    pub fn reset(&mut self, reason: IdleReason) {
        let detail = match reason {
            IdleReason::NoSignal => "(no signal)",
            IdleReason::EmptyAddress => "(empty URL)",
            IdleReason::Stopped => "(stopped)"
        };
        self.state = SurfaceState::NoSource;
        self.caption = format!("Camera {}\n{}", self.index + 1, detail);
        self.pending = None;
        self.image_size = None;
        self.last_error = None;
        self.frames_shown = 0;
    }

    pub fn apply(&mut self, event: SlotEvent) -> bool {
        match event {
            SlotEvent::Frame(frame) => self.show_frame(frame),
            SlotEvent::Error(err) => {
                self.show_error(&err);
                true
            }
        }
    }

    /// Replaces the current image. Ignored once the slot has failed.
    pub fn show_frame(&mut self, frame: Frame) -> bool {
        if self.state == SurfaceState::Error {
            return false;
        }
        self.state = SurfaceState::Streaming;
        self.image_size = Some([frame.width, frame.height]);
        self.pending = Some(frame);
        self.frames_shown += 1;
        true
    }

    pub fn show_error(&mut self, err: &StreamError) {
        self.state = SurfaceState::Error;
        self.caption = format!("Camera {}\nError", self.index + 1);
        self.pending = None;
        self.image_size = None;
        self.last_error = Some(err.message.clone());
    }

    pub fn take_pending(&mut self) -> Option<Frame> {
        self.pending.take()
    }

    pub fn state(&self) -> SurfaceState { self.state }
    pub fn caption(&self) -> &str { &self.caption }
    pub fn image_size(&self) -> Option<[u32; 2]> { self.image_size }
    pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }
    pub fn frames_shown(&self) -> u64 { self.frames_shown }

    pub fn has_image(&self) -> bool {
        self.image_size.is_some()
    }
}

/// Largest size with the content's aspect ratio that fits in `available`.
pub fn fit_within(content: [f32; 2], available: [f32; 2]) -> [f32; 2] {
    let [cw, ch] = content;
    let [aw, ah] = available;
    if cw <= 0.0 || ch <= 0.0 || aw <= 0.0 || ah <= 0.0 {
        return [0.0, 0.0];
    }
    let aspect = cw / ch;
    if aw / aspect <= ah {
        [aw, aw / aspect]
    } else {
        [ah * aspect, ah]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::StreamErrorKind;

    fn frame(sequence: u64) -> Frame {
        Frame { slot: 1, sequence, pixels: vec![0; 4 * 2 * 3], width: 4, height: 2, stride: 12 }
    }

    #[test]
    fn starts_idle_without_signal() {
        let surface = DisplaySurface::new(1);
        assert_eq!(surface.state(), SurfaceState::NoSource);
        assert_eq!(surface.caption(), "Camera 2\n(no signal)");
        assert!(!surface.has_image());
    }

    #[test]
    fn first_frame_starts_streaming_and_newer_frames_replace_it() {
        let mut surface = DisplaySurface::new(1);
        assert!(surface.show_frame(frame(0)));
        assert!(surface.show_frame(frame(1)));
        assert_eq!(surface.state(), SurfaceState::Streaming);
        assert_eq!(surface.take_pending().map(|f| f.sequence), Some(1));
        assert!(surface.take_pending().is_none());
        assert_eq!(surface.image_size(), Some([4, 2]));
    }

    #[test]
    fn frame_counter_starts_over_after_reset() {
        let mut surface = DisplaySurface::new(0);
        surface.show_frame(frame(0));
        surface.show_frame(frame(1));
        assert_eq!(surface.frames_shown(), 2);

        surface.reset(IdleReason::Stopped);
        assert_eq!(surface.frames_shown(), 0);
        surface.show_frame(frame(2));
        assert_eq!(surface.frames_shown(), 1);
    }

    #[test]
    fn error_clears_the_image_and_sticks() {
        let mut surface = DisplaySurface::new(1);
        surface.show_frame(frame(0));
        surface.apply(SlotEvent::Error(StreamError::new(1, StreamErrorKind::SourceReadFailed, "[X] Cannot read frame from: x")));
        assert_eq!(surface.state(), SurfaceState::Error);
        assert!(!surface.has_image());
        assert!(surface.take_pending().is_none());
        assert_eq!(surface.caption(), "Camera 2\nError");
        assert_eq!(surface.last_error(), Some("[X] Cannot read frame from: x"));

        assert!(!surface.show_frame(frame(5)));
        assert_eq!(surface.state(), SurfaceState::Error);
    }

    #[test]
    fn reset_returns_to_no_source_from_any_state() {
        let mut surface = DisplaySurface::new(3);
        surface.show_error(&StreamError::new(3, StreamErrorKind::SourceOpenFailed, "nope"));
        surface.reset(IdleReason::Stopped);
        assert_eq!(surface.state(), SurfaceState::NoSource);
        assert_eq!(surface.caption(), "Camera 4\n(stopped)");
        assert!(surface.last_error().is_none());

        surface.show_frame(frame(0));
        surface.reset(IdleReason::EmptyAddress);
        assert_eq!(surface.state(), SurfaceState::NoSource);
        assert!(!surface.has_image());
    }

    #[test]
    fn fit_keeps_aspect_ratio() {
        assert_eq!(fit_within([1600.0, 800.0], [800.0, 800.0]), [800.0, 400.0]);
        assert_eq!(fit_within([400.0, 800.0], [800.0, 800.0]), [400.0, 800.0]);
        assert_eq!(fit_within([300.0, 150.0], [600.0, 400.0]), [600.0, 300.0]);
        assert_eq!(fit_within([0.0, 10.0], [640.0, 360.0]), [0.0, 0.0]);
    }
}
