/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! The `@duration` value type: a count paired with a time unit.

use std::time::Duration;

/// Time unit of a [`MeshDuration`]. The numeric value is the number of
/// units per second and is what goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeUnit {
    /// No unit; the duration is invalid.
    #[default]
    None,
    /// Whole seconds.
    Seconds,
    /// Milliseconds.
    Milliseconds,
    /// Microseconds.
    Microseconds,
}

impl TimeUnit {
    /// Wire encoding: units per second, 0 for `None`.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Seconds => 1,
            Self::Milliseconds => 1_000,
            Self::Microseconds => 1_000_000,
        }
    }

    /// Decodes a wire value; anything unrecognized becomes `None`.
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::Seconds,
            1_000 => Self::Milliseconds,
            1_000_000 => Self::Microseconds,
            _ => Self::None,
        }
    }
}

/// A relative time span carried in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshDuration {
    /// Unit of `count`.
    pub unit: TimeUnit,
    /// Number of units.
    pub count: u32,
}

impl MeshDuration {
    /// A duration of `count` whole seconds.
    #[must_use]
    pub const fn from_secs(count: u32) -> Self {
        Self { unit: TimeUnit::Seconds, count }
    }

    /// A duration of `count` milliseconds.
    #[must_use]
    pub const fn from_millis(count: u32) -> Self {
        Self { unit: TimeUnit::Milliseconds, count }
    }

    /// A duration of `count` microseconds.
    #[must_use]
    pub const fn from_micros(count: u32) -> Self {
        Self { unit: TimeUnit::Microseconds, count }
    }

    /// `true` when the unit is [`TimeUnit::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self.unit, TimeUnit::None)
    }
}

impl From<MeshDuration> for Duration {
    fn from(d: MeshDuration) -> Self {
        match d.unit {
            TimeUnit::None => Self::ZERO,
            TimeUnit::Seconds => Self::from_secs(u64::from(d.count)),
            TimeUnit::Milliseconds => Self::from_millis(u64::from(d.count)),
            TimeUnit::Microseconds => Self::from_micros(u64::from(d.count)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_codes_round_trip() {
        for unit in [TimeUnit::None, TimeUnit::Seconds, TimeUnit::Milliseconds, TimeUnit::Microseconds] {
            assert_eq!(TimeUnit::from_u32(unit.as_u32()), unit);
        }
        assert_eq!(TimeUnit::from_u32(42), TimeUnit::None);
    }

    #[test]
    fn test_std_conversion() {
        assert_eq!(Duration::from(MeshDuration::from_millis(1500)), Duration::from_millis(1500));
        assert_eq!(Duration::from(MeshDuration::default()), Duration::ZERO);
    }
}
