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
use std::time::Duration;
use crate::error::LoadError;
use crate::protocol::{CHUNK_SIZE, DEFAULT_BAUD_RATE, DEFAULT_LOAD_ADDRESS};
use crate::serial::LineSettings;

/// Inputs as the caller supplied them; anything may be absent.
#[derive(Debug, Clone, Default)]
pub struct LoadConfig {
    pub device: Option<String>,
    pub baud_rate: Option<u32>,
    pub image_path: Option<PathBuf>,
    pub load_address: Option<String>,
    pub chunk_size: Option<usize>,
    pub chunk_delay_ms: u64,
    pub line: LineSettings,
}

/// Validated inputs for one transfer
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSettings {
    pub device: String,
    pub baud_rate: u32,
    pub image_path: PathBuf,
    pub load_address: String,
    pub chunk_size: usize,
    pub chunk_delay: Duration,
    pub line: LineSettings,
}

impl LoadConfig {
    pub fn validate(self) -> Result<LoadSettings, LoadError> {
        let device = self.device.ok_or(LoadError::MissingArgument("--dev"))?;
        let image_path = self.image_path.ok_or(LoadError::MissingArgument("--kernel"))?;

        let baud_rate = self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE);
        if baud_rate == 0 {
            return Err(LoadError::InvalidArgument {
                name: "baud rate",
                reason: "must be a positive integer".to_string(),
            });
        }

        let chunk_size = self.chunk_size.unwrap_or(CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(LoadError::InvalidArgument {
                name: "chunk size",
                reason: "must be a positive integer".to_string(),
            });
        }

        Ok(LoadSettings {
            device,
            baud_rate,
            image_path,
            load_address: self.load_address.unwrap_or_else(|| DEFAULT_LOAD_ADDRESS.to_string()),
            chunk_size,
            chunk_delay: Duration::from_millis(self.chunk_delay_ms),
            line: self.line,
        })
    }
}
