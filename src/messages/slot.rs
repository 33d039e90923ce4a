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

pub const SLOT_COUNT: usize = 4;

/// One position in the 2x2 grid and the address bound to it. An empty
/// address means the slot has no source.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSlot {
    pub index: usize,
    pub address: String
}

impl CameraSlot {
    pub fn new(index: usize, address: impl Into<String>) -> Self {
        Self { index, address: address.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_empty()
    }

    pub fn label(&self) -> String {
        format!("Camera {}", self.index + 1)
    }
}

impl fmt::Display for CameraSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "{} (no source)", self.label())
        } else {
            write!(f, "{} ({})", self.label(), self.address)
        }
    }
}

pub fn slots_from_addresses(addresses: &[String; SLOT_COUNT]) -> [CameraSlot; SLOT_COUNT] {
    std::array::from_fn(|i| CameraSlot::new(i, addresses[i].clone()))
}
