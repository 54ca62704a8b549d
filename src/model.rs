use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SrsError};
use crate::inference::Parameters;
use crate::memory::{D_MAX, D_MIN, LearningState, MemoryModel, Rating, S_MAX, S_MIN};
use crate::parameter_clipper::check_parameters;

const SECONDS_PER_DAY: f32 = 86_400.0;
const MAX_INTERVAL_DAYS: f32 = 365.0;

/// Fixed offsets and graduation rules that sit outside the weight vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Offset after any `Again` answer.
    pub again_step_minutes: i64,
    /// Offset after a first-ever `Hard` answer.
    pub new_hard_step_minutes: i64,
    /// Offset after `Hard` while learning or relearning.
    pub learning_hard_step_minutes: i64,
    pub good_graduation_factor: f32,
    pub good_graduation_floor: f32,
    pub easy_graduation_factor: f32,
    pub easy_graduation_floor: f32,
    /// Minimum stability growth in days for Hard, Good and Easy answers in review.
    pub min_review_growth: [f32; 3],
    pub max_interval_days: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            again_step_minutes: 1,
            new_hard_step_minutes: 5,
            learning_hard_step_minutes: 10,
            good_graduation_factor: 2.5,
            good_graduation_floor: 1.0,
            easy_graduation_factor: 3.5,
            easy_graduation_floor: 2.0,
            min_review_growth: [0.5, 1.0, 2.0],
            max_interval_days: MAX_INTERVAL_DAYS,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(SrsError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if [
            self.again_step_minutes,
            self.new_hard_step_minutes,
            self.learning_hard_step_minutes,
        ]
        .iter()
        .any(|&minutes| minutes <= 0)
        {
            return invalid("learning steps must be positive");
        }
        let longest_step = (f64::from(self.max_interval_days) * 1440.0) as i64;
        if [
            self.again_step_minutes,
            self.new_hard_step_minutes,
            self.learning_hard_step_minutes,
        ]
        .iter()
        .any(|&minutes| minutes > longest_step)
        {
            return invalid("learning steps must not exceed the maximum interval");
        }
        if self.good_graduation_factor < 1.0 || self.easy_graduation_factor < 1.0 {
            return invalid("graduation factors must not shrink stability");
        }
        if self.good_graduation_floor < S_MIN || self.easy_graduation_floor < S_MIN {
            return invalid("graduation floors must be at least the minimum stability");
        }
        if self.min_review_growth.iter().any(|&g| g.is_nan() || g < 0.0) {
            return invalid("minimum review growth must be non-negative");
        }
        if !(S_MIN..=MAX_INTERVAL_DAYS).contains(&self.max_interval_days) {
            return invalid("maximum interval must lie between 0.5 and 365 days");
        }
        Ok(())
    }
}

enum NextDue {
    Minutes(i64),
    FromStability,
}

/// The forgetting-curve scheduler. Holds the (clipped) weight vector and step
/// configuration; scheduling itself is a pure function of its arguments.
#[derive(Debug, Clone)]
pub struct Scheduler {
    w: Vec<f32>,
    config: SchedulerConfig,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            w: crate::inference::DEFAULT_PARAMETERS.to_vec(),
            config: SchedulerConfig::default(),
        }
    }
}

impl Scheduler {
    /// - `None` or an empty slice selects the default weights.
    /// - Custom weights must be complete and finite; they are clipped to safe ranges.
    pub fn new(parameters: Option<&Parameters>) -> Result<Self> {
        let w = check_parameters(parameters.unwrap_or(&[]))?;
        Ok(Self {
            w,
            config: SchedulerConfig::default(),
        })
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn parameters(&self) -> &[f32] {
        &self.w
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Advances `model` by one review answered with `rating` at `now`.
    ///
    /// Never fails: out-of-range stability or difficulty in the input is clamped first.
    /// The returned model always has `repetition_count` one higher and
    /// `last_review_at == Some(now)`.
    pub fn schedule(&self, model: &MemoryModel, rating: Rating, now: DateTime<Utc>) -> MemoryModel {
        let w = &self.w;
        let config = &self.config;
        let current = model.sanitized();
        let mut next = current.clone();

        let due = match current.state {
            LearningState::New => {
                next.stability = init_s(w, rating);
                next.difficulty = init_d(w, rating);
                match rating {
                    Rating::Again => {
                        next.state = LearningState::Learning;
                        NextDue::Minutes(config.again_step_minutes)
                    }
                    Rating::Hard => {
                        next.state = LearningState::Learning;
                        NextDue::Minutes(config.new_hard_step_minutes)
                    }
                    Rating::Good => {
                        next.state = LearningState::Learning;
                        NextDue::FromStability
                    }
                    Rating::Easy => {
                        next.state = LearningState::Review;
                        NextDue::FromStability
                    }
                }
            }
            LearningState::Learning | LearningState::Relearning => match rating {
                Rating::Again => {
                    next.stability = current.stability * 0.5;
                    next.difficulty = current.difficulty + w[6];
                    next.lapse_count = current.lapse_count.saturating_add(1);
                    NextDue::Minutes(config.again_step_minutes)
                }
                Rating::Hard => {
                    next.stability = current.stability * w[17];
                    NextDue::Minutes(config.learning_hard_step_minutes)
                }
                Rating::Good => {
                    next.stability = (current.stability * config.good_graduation_factor)
                        .max(config.good_graduation_floor);
                    next.state = LearningState::Review;
                    NextDue::FromStability
                }
                Rating::Easy => {
                    next.stability = (current.stability * config.easy_graduation_factor)
                        .max(config.easy_graduation_floor);
                    next.difficulty = next_d(w, current.difficulty, Rating::Easy);
                    next.state = LearningState::Review;
                    NextDue::FromStability
                }
            },
            LearningState::Review => {
                let elapsed = elapsed_days(current.last_review_at, now);
                let r = power_forgetting_curve(elapsed, current.stability);
                match rating {
                    Rating::Again => {
                        next.lapse_count = current.lapse_count.saturating_add(1);
                        next.difficulty = next_d(w, current.difficulty, rating);
                        next.stability =
                            stability_after_failure(w, current.stability, r, current.difficulty);
                        next.state = LearningState::Relearning;
                        NextDue::Minutes(config.again_step_minutes)
                    }
                    Rating::Hard | Rating::Good | Rating::Easy => {
                        let min_growth = config.min_review_growth[rating.ordinal() as usize - 2];
                        next.stability = stability_after_success(
                            w,
                            current.stability,
                            r,
                            current.difficulty,
                            rating,
                        )
                        .max(current.stability + min_growth);
                        next.difficulty = next_d(w, current.difficulty, rating);
                        NextDue::FromStability
                    }
                }
            }
        };

        next.stability = next.stability.clamp(S_MIN, S_MAX);
        next.difficulty = next.difficulty.clamp(D_MIN, D_MAX);
        next.next_review_at = Some(match due {
            NextDue::Minutes(minutes) => now + Duration::minutes(minutes),
            NextDue::FromStability => now + self.interval(next.stability),
        });
        next.last_review_at = Some(now);
        next.repetition_count = current.repetition_count.saturating_add(1);
        next
    }

    /// Forgetting-curve estimate of recall probability at `now`.
    pub fn retrievability(&self, model: &MemoryModel, now: DateTime<Utc>) -> f32 {
        if model.last_review_at.is_none() {
            return 1.0;
        }
        let model = model.sanitized();
        power_forgetting_curve(elapsed_days(model.last_review_at, now), model.stability)
    }

    pub(crate) fn interval(&self, stability: f32) -> Duration {
        let days = stability.clamp(S_MIN, self.config.max_interval_days);
        Duration::seconds((days * SECONDS_PER_DAY).round() as i64)
    }
}

fn elapsed_days(last_review_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f32 {
    last_review_at.map_or(0.0, |last| {
        (now - last).num_seconds().max(0) as f32 / SECONDS_PER_DAY
    })
}

pub(crate) fn power_forgetting_curve(t: f32, s: f32) -> f32 {
    debug_assert!(t >= 0.);
    (t / (9.0 * s) + 1.0).powi(-1)
}

fn init_s(w: &[f32], rating: Rating) -> f32 {
    w[rating.ordinal() as usize - 1]
}

fn init_d(w: &[f32], rating: Rating) -> f32 {
    (w[4] - w[5] * (rating.ordinal() as f32 - 1.0)).clamp(D_MIN, D_MAX)
}

/// The success and lapse formulas are calibrated on a 1-10 difficulty scale.
fn difficulty_scale(d: f32) -> f32 {
    9.0f32.mul_add(d, 1.0)
}

fn linear_damping(delta_d: f32, old_d: f32) -> f32 {
    (1.0 - old_d) * delta_d
}

fn mean_reversion(w: &[f32], init: f32, current: f32) -> f32 {
    w[7] * init + (1.0 - w[7]) * current
}

fn next_d(w: &[f32], d: f32, rating: Rating) -> f32 {
    let delta_d = -w[6] * (rating.ordinal() as f32 - 3.0);
    let new_d = d + linear_damping(delta_d, d);
    mean_reversion(w, init_d(w, Rating::Easy), new_d).clamp(D_MIN, D_MAX)
}

fn stability_after_success(w: &[f32], s: f32, r: f32, d: f32, rating: Rating) -> f32 {
    let hard_penalty = if rating == Rating::Hard { w[15] } else { 1.0 };
    let easy_bonus = if rating == Rating::Easy { w[16] } else { 1.0 };
    (s * (f32::exp(w[8])
        * (11.0 - difficulty_scale(d))
        * s.powf(-w[9])
        * (f32::exp((1.0 - r) * w[10]) - 1.0)
        * hard_penalty)
        .mul_add(easy_bonus, 1.0))
    .clamp(S_MIN, S_MAX)
}

fn stability_after_failure(w: &[f32], s: f32, r: f32, d: f32) -> f32 {
    let new_s = w[11]
        * difficulty_scale(d).powf(-w[12])
        * ((s + 1.0).powf(w[13]) - 1.0)
        * f32::exp((1.0 - r) * w[14]);
    new_s.min(s).clamp(S_MIN, S_MAX)
}
