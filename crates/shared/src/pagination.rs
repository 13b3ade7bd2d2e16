//! Step arithmetic for chunked exports.
//!
//! A job of `count` rows processed `per_step` rows at a time needs
//! `ceil(count / per_step)` steps; step `n` reads rows starting at
//! `n * per_step`.

/// Number of steps required to process `count` rows.
///
/// A zero `per_step` yields zero steps rather than dividing by zero.
pub fn total_steps(count: u64, per_step: u64) -> u64 {
    if per_step == 0 {
        return 0;
    }
    count.div_ceil(per_step)
}

/// Row offset of the given zero-based step.
pub fn step_offset(step: u64, per_step: u64) -> u64 {
    step.saturating_mul(per_step)
}
