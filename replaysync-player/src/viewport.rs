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

//! Scale of the replayed viewport inside its container.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Uniform scale that fits `intrinsic` into `container` without enlarging it.
///
/// Each axis contributes `container / intrinsic`; the smaller ratio wins and
/// the result never exceeds 1. Axes with no intrinsic extent are ignored.
pub fn fit_scale(container: Size, intrinsic: Size) -> f64 {
    let ratio = |outer: f64, inner: f64| {
        if inner > 0.0 && outer.is_finite() {
            Some((outer / inner).max(0.0))
        } else {
            None
        }
    };
    [
        ratio(container.width, intrinsic.width),
        ratio(container.height, intrinsic.height),
    ]
    .into_iter()
    .flatten()
    .fold(1.0, f64::min)
}
