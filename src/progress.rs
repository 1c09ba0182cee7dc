// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use indicatif::{ProgressBar, ProgressStyle};

/// Observes a transfer. Nothing reported here influences the bytes on the wire.
pub trait Progress {
    fn begin(&mut self, total: usize);

    /// Called after chunk `current` (1-indexed) of `total` has been written.
    fn advance(&mut self, current: usize, total: usize);

    fn finish(&mut self);
}

/// Renders `current/total` on a single line, refreshed in place.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        bar.set_style(ProgressStyle::with_template("{pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()));
        ConsoleProgress { bar }
    }
}

impl Progress for ConsoleProgress {
    fn begin(&mut self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    fn advance(&mut self, current: usize, _total: usize) {
        self.bar.set_position(current as u64);
    }

    fn finish(&mut self) {
        self.bar.finish();
    }
}

/// Used with --quiet
pub struct NoProgress;

impl Progress for NoProgress {
    fn begin(&mut self, _total: usize) {}
    fn advance(&mut self, _current: usize, _total: usize) {}
    fn finish(&mut self) {}
}

#[cfg(test)]
pub struct RecordingProgress {
    pub total: Option<usize>,
    pub updates: Vec<(usize, usize)>,
    pub finished: bool,
}

#[cfg(test)]
impl RecordingProgress {
    pub fn new() -> Self {
        RecordingProgress { total: None, updates: Vec::new(), finished: false }
    }
}

#[cfg(test)]
impl Progress for RecordingProgress {
    fn begin(&mut self, total: usize) {
        self.total = Some(total);
    }

    fn advance(&mut self, current: usize, total: usize) {
        self.updates.push((current, total));
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}
