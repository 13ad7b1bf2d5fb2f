use std::time::Duration;

/// Fixed-timestep loop parameters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LoopConfig {
    /// Simulation step passed to every update.
    pub fixed_step: Duration,

    /// Upper bound on one iteration's measured wall-clock delta, so a stall
    /// (debugger, minimized window) does not turn into a burst of updates.
    pub max_elapsed: Duration,

    /// Upper bound on the accumulator.
    pub max_accumulated: Duration,

    /// Dispatch input on iterations that run no update.
    ///
    /// Off by default: those iterations skip straight to the next one and
    /// the queued input is handled together with the next update batch.
    pub poll_input_every_iteration: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            fixed_step: Duration::from_secs_f64(1.0 / 60.0),
            max_elapsed: Duration::from_secs_f64(8.0 / 60.0),
            max_accumulated: Duration::from_millis(500),
            poll_input_every_iteration: false,
        }
    }
}

impl LoopConfig {
    pub fn clamp_elapsed(&self, elapsed: Duration) -> Duration {
        elapsed.min(self.max_elapsed)
    }

    pub fn clamp_accumulated(&self, accumulated: Duration) -> Duration {
        accumulated.min(self.max_accumulated)
    }
}

/// Time snapshot handed to update and draw callbacks.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct LoopTime {
    /// Simulated time: the sum of every fixed step run so far.
    pub total: Duration,

    /// The fixed step for updates; wall-clock time since the previous draw
    /// for draws.
    pub elapsed: Duration,

    /// Unconsumed fraction of a fixed step, in `[0, 1)`. Zero for updates.
    pub alpha: f32,
}

impl LoopTime {
    pub fn total_secs(&self) -> f32 {
        self.total.as_secs_f32()
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }
}

/// Result of draining an accumulator.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct StepPlan {
    /// Whole fixed steps to run.
    pub steps: u32,
    /// Time left over, always below one fixed step.
    pub residue: Duration,
}

impl StepPlan {
    /// Interpolation factor of the residue.
    pub fn alpha(&self, fixed_step: Duration) -> f32 {
        alpha(self.residue, fixed_step)
    }
}

/// Splits `accumulated` into whole fixed steps and a residue.
///
/// A zero `fixed_step` yields no steps and keeps everything as residue.
pub fn drain(accumulated: Duration, fixed_step: Duration) -> StepPlan {
    let step = fixed_step.as_nanos();
    if step == 0 {
        return StepPlan {
            steps: 0,
            residue: accumulated,
        };
    }
    let total = accumulated.as_nanos();
    let steps = u32::try_from(total / step).unwrap_or(u32::MAX);
    let consumed = fixed_step.saturating_mul(steps);
    StepPlan {
        steps,
        residue: accumulated.saturating_sub(consumed),
    }
}

/// Adds `elapsed` to `accumulated` and drains the sum.
pub fn accumulate(accumulated: Duration, elapsed: Duration, fixed_step: Duration) -> StepPlan {
    drain(accumulated.saturating_add(elapsed), fixed_step)
}

/// `residue / fixed_step`, clamped below 1.
pub fn alpha(residue: Duration, fixed_step: Duration) -> f32 {
    if fixed_step.is_zero() {
        return 0.0;
    }
    let a = residue.as_secs_f64() / fixed_step.as_secs_f64();
    (a as f32).clamp(0.0, 1.0 - f32::EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn drain_splits_whole_steps() {
        let plan = drain(ms(35), ms(10));
        assert_eq!(plan.steps, 3);
        assert_eq!(plan.residue, ms(5));
        assert!((plan.alpha(ms(10)) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn under_one_step_is_all_residue() {
        let plan = drain(ms(9), ms(10));
        assert_eq!(plan.steps, 0);
        assert_eq!(plan.residue, ms(9));
    }

    #[test]
    fn exact_multiple_leaves_no_residue() {
        let plan = accumulate(ms(10), ms(20), ms(10));
        assert_eq!(plan.steps, 3);
        assert_eq!(plan.residue, Duration::ZERO);
        assert_eq!(plan.alpha(ms(10)), 0.0);
    }

    #[test]
    fn zero_step_never_runs() {
        let plan = drain(ms(100), Duration::ZERO);
        assert_eq!(plan.steps, 0);
        assert_eq!(plan.residue, ms(100));
    }

    #[test]
    fn residue_carries_across_iterations() {
        let step = ms(16);
        let a = accumulate(Duration::ZERO, ms(10), step);
        assert_eq!(a.steps, 0);
        let b = accumulate(a.residue, ms(10), step);
        assert_eq!(b.steps, 1);
        assert_eq!(b.residue, ms(4));
    }

    #[test]
    fn defaults_clamp_stalls() {
        let cfg = LoopConfig::default();
        assert_eq!(cfg.clamp_elapsed(Duration::from_secs(3)), cfg.max_elapsed);
        assert_eq!(cfg.clamp_accumulated(Duration::from_secs(3)), ms(500));
        assert!(!cfg.poll_input_every_iteration);
        assert!(drain(cfg.max_elapsed, cfg.fixed_step).steps <= 8);
    }

    #[test]
    fn alpha_stays_below_one() {
        assert!(alpha(ms(10), ms(10)) < 1.0);
        assert_eq!(alpha(ms(5), Duration::ZERO), 0.0);
    }
}
