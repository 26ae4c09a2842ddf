//! Restore delay computation.
//!
//! Every regeneration task waits
//!
//! ```text
//! delay = max(min_delay, base(classification) * speed_factor(speed)
//!                        + height * per_level_delay
//!                        + jitter)
//! ```
//!
//! where `height` is the cell's elevation above its event's lowest
//! destroyed cell and `jitter` is drawn uniformly from
//! `[0, max_jitter]` per task.
//!
//! The speed factor follows `1 - sqrt(speed / 10)`, so each step up in
//! speed shortens the base delay by a smaller amount than the previous
//! step. It is stored as a permille table to keep the hot path in
//! integer arithmetic:
//!
//! | speed | factor (‰) |
//! |-------|------------|
//! | 0     | 1000       |
//! | 1     | 684        |
//! | 2     | 553        |
//! | 3     | 452        |
//! | 4     | 368        |
//! | 5     | 293        |
//! | 6     | 225        |
//! | 7     | 163        |
//! | 8     | 106        |
//! | 9     | 51         |
//! | 10    | 0          |

use rand::Rng;
use regrowth_types::Classification;

use crate::config::{MAX_SPEED, RegenerationConfig};

/// `round(1000 * (1 - sqrt(speed / 10)))` for speed 0 through 10.
const SPEED_FACTOR_PERMILLE: [u64; 11] = [1000, 684, 553, 452, 368, 293, 225, 163, 106, 51, 0];

/// Return the base-delay multiplier for `speed`, in permille.
///
/// Speeds above [`MAX_SPEED`] are treated as [`MAX_SPEED`].
pub fn speed_factor_permille(speed: u8) -> u64 {
    let idx = usize::from(speed.min(MAX_SPEED));
    SPEED_FACTOR_PERMILLE.get(idx).copied().unwrap_or(0)
}

/// The pacing function, holding the configured constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingFunction {
    speed: u8,
    natural_base_delay: u64,
    placed_base_delay: u64,
    per_level_delay: u64,
    max_jitter: u64,
    min_delay: u64,
}

impl PacingFunction {
    /// Build the pacing function from configuration.
    ///
    /// `min_delay_ticks` is clamped to at least 1 so no task can fire on the
    /// tick it was scheduled.
    pub fn from_config(config: &RegenerationConfig) -> Self {
        Self {
            speed: config.speed.min(MAX_SPEED),
            natural_base_delay: u64::from(config.natural_base_delay_ticks),
            placed_base_delay: u64::from(config.placed_base_delay_ticks),
            per_level_delay: u64::from(config.per_level_delay_ticks),
            max_jitter: u64::from(config.max_jitter_ticks),
            min_delay: u64::from(config.min_delay_ticks.max(1)),
        }
    }

    /// Current speed setting.
    pub const fn speed(&self) -> u8 {
        self.speed
    }

    /// Change the speed, clamped to [`MAX_SPEED`].
    pub fn set_speed(&mut self, speed: u8) {
        self.speed = speed.min(MAX_SPEED);
    }

    /// Whether regeneration is switched off (speed 0).
    pub const fn is_disabled(&self) -> bool {
        self.speed == 0
    }

    /// The delay floor in ticks.
    pub const fn min_delay(&self) -> u64 {
        self.min_delay
    }

    /// Unscaled base delay for a classification.
    pub const fn classification_base_delay(&self, classification: Classification) -> u64 {
        match classification {
            Classification::Natural => self.natural_base_delay,
            Classification::Placed => self.placed_base_delay,
        }
    }

    /// Base delay after the speed factor is applied.
    pub fn scaled_base_delay(&self, classification: Classification) -> u64 {
        self.classification_base_delay(classification)
            .saturating_mul(speed_factor_permille(self.speed))
            .checked_div(1000)
            .unwrap_or(0)
    }

    /// Delay contributed by a cell's height above its event's lowest cell.
    pub fn height_delay(&self, height: u32) -> u64 {
        u64::from(height).saturating_mul(self.per_level_delay)
    }

    /// Draw one jitter value uniformly from `[0, max_jitter]`.
    pub fn draw_jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        if self.max_jitter == 0 {
            return 0;
        }
        rng.random_range(0..=self.max_jitter)
    }

    /// Total delay for one task, never below the delay floor.
    pub fn delay_ticks(&self, classification: Classification, height: u32, jitter: u64) -> u64 {
        self.scaled_base_delay(classification)
            .saturating_add(self.height_delay(height))
            .saturating_add(jitter)
            .max(self.min_delay)
    }
}
