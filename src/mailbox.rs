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

use crate::camera::FrameSink;
use crate::messages::SlotEvent;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::{Arc, Weak};

pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Producer half of a one-element mailbox. Publishing evicts whatever the
/// UI thread has not picked up yet, so only the newest event is kept.
pub struct SlotMailbox {
    tx: Sender<SlotEvent>,
    evict: Receiver<SlotEvent>,
    reader: Weak<()>,
    waker: Option<Waker>
}

pub struct MailboxReader {
    rx: Receiver<SlotEvent>,
    // the producer holds a receiver too, so channel disconnection never
    // reports a dropped reader; this token does
    _alive: Arc<()>
}

pub fn mailbox(waker: Option<Waker>) -> (SlotMailbox, MailboxReader) {
    let (tx, rx) = bounded(1);
    let alive = Arc::new(());
    let reader = Arc::downgrade(&alive);
    (SlotMailbox { tx, evict: rx.clone(), reader, waker }, MailboxReader { rx, _alive: alive })
}

impl FrameSink for SlotMailbox {
    fn publish(&self, event: SlotEvent) {
        if self.reader.strong_count() == 0 {
            return;
        }
        let mut pending = event;
        while let Err(full) = self.tx.try_send(pending) {
            let _ = self.evict.try_recv();
            pending = full.into_inner();
        }
        if let Some(wake) = &self.waker {
            wake();
        }
    }
}

impl MailboxReader {
    pub fn take(&self) -> Option<SlotEvent> {
        self.rx.try_recv().ok()
    }
}
