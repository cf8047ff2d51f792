// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Player status state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayerStatus {
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
    NoData,
}

impl PlayerStatus {
    /// Terminal states are left only through `Reset`.
    pub fn is_terminal(self) -> bool {
        matches!(self, PlayerStatus::Error | PlayerStatus::NoData)
    }

    /// States with a live replay engine.
    pub fn has_engine(self) -> bool {
        matches!(self, PlayerStatus::Playing | PlayerStatus::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlayerStatus::Idle => "idle",
            PlayerStatus::Loading => "loading",
            PlayerStatus::Playing => "playing",
            PlayerStatus::Paused => "paused",
            PlayerStatus::Error => "error",
            PlayerStatus::NoData => "no-data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    Load,
    Ready { autoplay: bool },
    Play,
    Pause,
    Restart,
    Fail,
    Insufficient,
    Reset,
}

#[derive(Debug, Error)]
#[error("Invalid transition: {current:?} -> {event:?}")]
pub struct InvalidTransition {
    pub current: PlayerStatus,
    pub event: PlayerEvent,
}

impl PlayerStatus {
    pub fn transition(self, event: PlayerEvent) -> Result<PlayerStatus, InvalidTransition> {
        use PlayerEvent::*;
        use PlayerStatus::*;

        let next = match (self, event) {
            (_, Reset) => Idle,
            (Idle, Load) => Loading,
            (Loading, Ready { autoplay: true }) => Playing,
            (Loading, Ready { autoplay: false }) => Paused,
            (Loading, Insufficient) => NoData,
            (Paused, Play) => Playing,
            (Playing, Pause) => Paused,
            (Playing, Play) => Playing,
            (Paused, Pause) => Paused,
            (s, Restart) if s.has_engine() => Playing,
            (s, Fail) if !s.is_terminal() => Error,
            _ => {
                return Err(InvalidTransition {
                    current: self,
                    event,
                })
            }
        };

        Ok(next)
    }
}
