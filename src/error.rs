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

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Every failure is terminal: the transfer is aborted and reported, never retried.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Insufficient arguments: missing {0}")]
    MissingArgument(&'static str),

    #[error("Invalid {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("Cannot open device {device}: {source}")]
    TransportOpen {
        device: String,
        #[source]
        source: serialport::Error,
    },

    #[error("File not found: {}: {source}", path.display())]
    ImageNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image too large: {0} bytes does not fit the 32-bit size field")]
    ImageTooLarge(u64),

    #[error("Write failed (in state: {state}): {source}")]
    TransportWrite {
        state: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, LoadError::MissingArgument(_) | LoadError::InvalidArgument { .. })
    }
}
