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

use crate::camera::{AcquisitionHandle, LoopSettings, start_acquisition_thread};
use crate::capture::SourceOpener;
use crate::display::{DisplaySurface, IdleReason};
use crate::mailbox::{MailboxReader, Waker, mailbox};
use crate::messages::{CameraSlot, SLOT_COUNT, SlotEvent, StreamError, StreamErrorKind, slot::slots_from_addresses};
use chrono::Local;
use std::{sync::Arc, time::{Duration, Instant}};

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub loop_settings: LoopSettings,
    pub stop_timeout: Duration
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { loop_settings: LoopSettings::default(), stop_timeout: Duration::from_millis(500) }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopReport {
    pub stopped: Vec<usize>,
    pub stuck: Vec<usize>
}

impl StopReport {
    pub fn is_clean(&self) -> bool {
        self.stuck.is_empty()
    }
}

struct ActiveLoop {
    handle: AcquisitionHandle,
    inbox: MailboxReader
}

/// Owns every acquisition loop and the display surface of each slot.
/// Lives on the UI thread; loops only ever reach it through their mailbox.
pub struct SessionController {
    opener: Arc<dyn SourceOpener>,
    settings: SessionSettings,
    waker: Option<Waker>,
    slots: [CameraSlot; SLOT_COUNT],
    active: Vec<ActiveLoop>,
    surfaces: [DisplaySurface; SLOT_COUNT],
    status: String,
    streaming: bool
}

impl SessionController {
    pub fn new(opener: Arc<dyn SourceOpener>, settings: SessionSettings) -> Self {
        Self {
            opener,
            settings,
            waker: None,
            slots: std::array::from_fn(|i| CameraSlot::new(i, "")),
            active: Vec::new(),
            surfaces: std::array::from_fn(DisplaySurface::new),
            status: String::from("Ready"),
            streaming: false
        }
    }

    /// Called by every loop after it publishes, from the loop's thread.
    pub fn with_waker(mut self, waker: Waker) -> Self {
        self.waker = Some(waker);
        self
    }

    pub fn start_session(&mut self, addresses: &[String; SLOT_COUNT]) -> usize {
        self.stop_session();
        self.slots = slots_from_addresses(addresses);
        self.streaming = true;
        self.status = String::from("Streaming...");

        for slot in self.slots.clone() {
            if slot.is_empty() {
                self.surfaces[slot.index].reset(IdleReason::EmptyAddress);
                continue;
            }
            self.surfaces[slot.index].reset(IdleReason::NoSignal);
            log::debug!("starting {}", slot);
            let (tx, inbox) = mailbox(self.waker.clone());
            match start_acquisition_thread(slot.index, slot.address.clone(), self.opener.clone(), tx, self.settings.loop_settings) {
                Ok(handle) => self.active.push(ActiveLoop { handle, inbox }),
                Err(e) => {
                    let message = format!("[X] Cannot start {}: {}", slot.label(), e);
                    self.route(SlotEvent::Error(StreamError::new(slot.index, StreamErrorKind::SourceOpenFailed, message)));
                }
            }
        }

        log::info!("session started with {} camera(s)", self.active.len());
        self.active.len()
    }

    pub fn stop_session(&mut self) -> StopReport {
        if !self.streaming && self.active.is_empty() {
            return StopReport::default();
        }
        for active in &mut self.active {
            active.handle.request_stop();
        }

        let deadline = Instant::now() + self.settings.stop_timeout;
        let mut report = StopReport::default();
        for active in self.active.drain(..) {
            let slot = active.handle.slot();
            let wait = deadline.saturating_duration_since(Instant::now());
            if active.handle.join_within(wait) {
                report.stopped.push(slot);
            } else {
                report.stuck.push(slot);
            }
        }

        for surface in &mut self.surfaces {
            surface.reset(IdleReason::Stopped);
        }
        self.streaming = false;
        if report.is_clean() {
            self.status = String::from("Stopped");
        } else {
            self.status = format!("Stopped ({} camera(s) did not shut down)", report.stuck.len());
            log::warn!("cameras {:?} still running after stop", report.stuck.iter().map(|s| s + 1).collect::<Vec<_>>());
        }
        if !report.stopped.is_empty() {
            log::info!("session stopped, {} camera(s) released", report.stopped.len());
        }
        report
    }

    /// Moves whatever the loops published since the last call onto the
    /// surfaces. Returns how many events were routed.
    pub fn pump(&mut self) -> usize {
        let events: Vec<SlotEvent> = self.active.iter().filter_map(|a| a.inbox.take()).collect();
        let count = events.len();
        for event in events {
            self.route(event);
        }
        count
    }

    pub fn route(&mut self, event: SlotEvent) -> bool {
        let index = event.slot();
        if index >= SLOT_COUNT {
            log::debug!("dropping event for unknown slot {}", index);
            return false;
        }
        if let SlotEvent::Error(err) = &event {
            log::warn!("camera {} {}: {}", index + 1, err.kind, err.message);
            self.status = format!("{} {}", Local::now().format("%H:%M:%S"), err.message);
        }
        self.surfaces[index].apply(event)
    }

    pub fn surfaces(&self) -> &[DisplaySurface; SLOT_COUNT] {
        &self.surfaces
    }

    pub fn surface_mut(&mut self, index: usize) -> Option<&mut DisplaySurface> {
        self.surfaces.get_mut(index)
    }

    pub fn slots(&self) -> &[CameraSlot; SLOT_COUNT] {
        &self.slots
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn active_loops(&self) -> usize {
        self.active.len()
    }

    /// Loops that have not yet ended on their own.
    pub fn running_loops(&self) -> usize {
        self.active.iter().filter(|a| !a.handle.is_finished()).count()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if !self.active.is_empty() {
            self.stop_session();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::normalize_all;
    use crate::capture::fake::{Script, ScriptedOpener};
    use crate::display::SurfaceState;
    use std::thread;

    fn settings() -> SessionSettings {
        SessionSettings {
            loop_settings: LoopSettings { fallback_interval: Duration::from_millis(1) },
            stop_timeout: Duration::from_millis(500)
        }
    }

    fn addresses(list: [&str; SLOT_COUNT]) -> [String; SLOT_COUNT] {
        list.map(String::from)
    }

    fn pump_until(ctrl: &mut SessionController, mut done: impl FnMut(&SessionController) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            ctrl.pump();
            if done(ctrl) {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn wait_for_opens(opener: &ScriptedOpener, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while opener.opened().len() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        let mut opened = opener.opened();
        opened.sort();
        opened
    }

    #[test]
    fn one_loop_per_non_empty_slot() {
        let opener = Arc::new(ScriptedOpener::new(Script::Endless { fps: 50.0 }));
        let mut ctrl = SessionController::new(opener.clone(), settings());

        let started = ctrl.start_session(&addresses(["http://h1/video", "", "rtsp://h3/stream", ""]));
        assert_eq!(started, 2);
        assert_eq!(ctrl.active_loops(), 2);
        assert!(ctrl.is_streaming());
        assert_eq!(ctrl.status(), "Streaming...");
        for empty in [1, 3] {
            assert_eq!(ctrl.surfaces()[empty].state(), SurfaceState::NoSource);
            assert!(ctrl.surfaces()[empty].caption().ends_with("(empty URL)"));
        }
        assert_eq!(wait_for_opens(&opener, 2), vec!["http://h1/video", "rtsp://h3/stream"]);

        assert!(pump_until(&mut ctrl, |c| c.surfaces()[0].state() == SurfaceState::Streaming && c.surfaces()[2].state() == SurfaceState::Streaming));
        assert_eq!(ctrl.running_loops(), 2);
        assert!(ctrl.stop_session().is_clean());
    }

    #[test]
    fn bare_entry_is_rewritten_before_the_loop_opens_it() {
        let opener = Arc::new(ScriptedOpener::new(Script::FramesThenFail(0)));
        let mut ctrl = SessionController::new(opener.clone(), settings());

        ctrl.start_session(&normalize_all(&addresses(["10.0.0.5:8080", "", "", ""])));
        assert_eq!(wait_for_opens(&opener, 1), vec!["http://10.0.0.5:8080/video"]);
        ctrl.stop_session();
    }

    #[test]
    fn stop_resets_streaming_and_failed_surfaces() {
        let opener = Arc::new(ScriptedOpener::new(Script::Endless { fps: 100.0 }).with("bad://cam", Script::FailOpen));
        let mut ctrl = SessionController::new(opener.clone(), settings());
        ctrl.start_session(&addresses(["good://cam", "bad://cam", "", ""]));

        assert!(pump_until(&mut ctrl, |c| c.surfaces()[0].state() == SurfaceState::Streaming && c.surfaces()[1].state() == SurfaceState::Error));
        assert!(ctrl.status().contains("Cannot open video: bad://cam"));

        let mut report = ctrl.stop_session();
        report.stopped.sort();
        assert_eq!(report.stopped, vec![0, 1]);
        assert!(report.stuck.is_empty());
        for surface in ctrl.surfaces() {
            assert_eq!(surface.state(), SurfaceState::NoSource);
            assert!(!surface.has_image());
        }
        assert_eq!(ctrl.status(), "Stopped");
        assert_eq!(opener.released(), 1);
        assert!(!ctrl.is_streaming());
    }

    #[test]
    fn failed_slot_leaves_others_streaming() {
        let opener = Arc::new(ScriptedOpener::new(Script::Endless { fps: 100.0 }).with("dead", Script::FramesThenFail(2)));
        let mut ctrl = SessionController::new(opener, settings());
        ctrl.start_session(&addresses(["dead", "live", "", ""]));

        assert!(pump_until(&mut ctrl, |c| c.surfaces()[0].state() == SurfaceState::Error && c.surfaces()[1].state() == SurfaceState::Streaming));
        assert!(ctrl.surfaces()[0].last_error().unwrap().contains("Cannot read frame from: dead"));
        let shown = ctrl.surfaces()[1].frames_shown();
        assert!(pump_until(&mut ctrl, |c| c.surfaces()[1].frames_shown() > shown));
        assert_eq!(ctrl.surfaces()[0].state(), SurfaceState::Error);
    }

    #[test]
    fn stopping_twice_is_a_no_op() {
        let opener = Arc::new(ScriptedOpener::new(Script::Endless { fps: 30.0 }));
        let mut ctrl = SessionController::new(opener, settings());
        assert_eq!(ctrl.stop_session(), StopReport::default());

        ctrl.start_session(&addresses(["a", "b", "c", "d"]));
        assert_eq!(ctrl.stop_session().stopped.len(), 4);
        assert_eq!(ctrl.stop_session(), StopReport::default());
        assert_eq!(ctrl.status(), "Stopped");
        assert_eq!(ctrl.active_loops(), 0);
    }

    #[test]
    fn stop_before_any_start_keeps_the_idle_view() {
        let opener = Arc::new(ScriptedOpener::new(Script::Endless { fps: 30.0 }));
        let mut ctrl = SessionController::new(opener, settings());
        assert_eq!(ctrl.stop_session(), StopReport::default());
        assert_eq!(ctrl.status(), "Ready");
        for (i, surface) in ctrl.surfaces().iter().enumerate() {
            assert_eq!(surface.state(), SurfaceState::NoSource);
            assert_eq!(surface.caption(), format!("Camera {}\n(no signal)", i + 1));
        }
    }

    #[test]
    fn restart_never_shows_frames_from_the_previous_session() {
        let opener = Arc::new(ScriptedOpener::new(Script::Endless { fps: 200.0 }));
        let mut ctrl = SessionController::new(opener.clone(), settings());

        ctrl.start_session(&addresses(["alpha", "", "", ""]));
        assert!(pump_until(&mut ctrl, |c| c.surfaces()[0].state() == SurfaceState::Streaming));

        ctrl.start_session(&addresses(["bravo", "", "", ""]));
        assert_eq!(opener.released(), 1);
        assert_eq!(ctrl.active_loops(), 1);

        let mut seen = 0;
        let deadline = Instant::now() + Duration::from_millis(200);
        while Instant::now() < deadline {
            ctrl.pump();
            if let Some(frame) = ctrl.surface_mut(0).and_then(|s| s.take_pending()) {
                assert!(frame.pixels.iter().all(|&b| b == b'b'));
                seen += 1;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert!(seen > 0);
        ctrl.stop_session();
    }

    #[test]
    fn events_for_unknown_slots_are_discarded() {
        let mut ctrl = SessionController::new(Arc::new(ScriptedOpener::new(Script::FailOpen)), settings());
        let routed = ctrl.route(SlotEvent::Error(StreamError::new(SLOT_COUNT, StreamErrorKind::SourceReadFailed, "ghost")));
        assert!(!routed);
        assert_eq!(ctrl.status(), "Ready");
        assert!(ctrl.surfaces().iter().all(|s| s.state() == SurfaceState::NoSource));
    }

    #[test]
    fn stuck_loop_is_reported() {
        let opener = Arc::new(ScriptedOpener::new(Script::Stall(Duration::from_millis(300))));
        let mut ctrl = SessionController::new(opener.clone(), SessionSettings { stop_timeout: Duration::from_millis(20), ..settings() });
        ctrl.start_session(&addresses(["slow", "", "", ""]));
        wait_for_opens(&opener, 1);

        let report = ctrl.stop_session();
        assert_eq!(report.stuck, vec![0]);
        assert!(ctrl.status().contains("did not shut down"));
        assert_eq!(ctrl.surfaces()[0].state(), SurfaceState::NoSource);
    }
}
