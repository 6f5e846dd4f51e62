use crate::quat;
use crate::types::{AxisLock, EulerAngles};
use glam::DQuat;

/// Deviation (degrees) of a locked axis that counts as unintended movement.
pub const UNINTENDED_THRESHOLD_DEG: f64 = 1.5;

/// Result of pulling an orientation toward its locked axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockOutcome {
    /// Orientation to write back into the estimator.
    pub corrected: DQuat,
    /// Per axis (pitch, yaw, roll): locked and off target before correction.
    pub unintended: [bool; 3],
}

/// Soft-correct `q` toward the lock targets of its untracked axes.
///
/// Tracked axes keep their live angle in the target. With every axis
/// tracked the orientation is returned unchanged.
pub fn apply(q: DQuat, lock: &AxisLock) -> LockOutcome {
    if !lock.is_active() {
        return LockOutcome {
            corrected: q,
            unintended: [false; 3],
        };
    }

    let live = quat::quaternion_to_euler(q);
    let pick = |tracked: bool, live: f64, locked: f64| if tracked { live } else { locked };
    let target_angles = EulerAngles::new(
        pick(lock.track_pitch, live.pitch, lock.lock_to.pitch),
        pick(lock.track_yaw, live.yaw, lock.lock_to.yaw),
        pick(lock.track_roll, live.roll, lock.lock_to.roll),
    );
    let target = quat::euler_to_quaternion(target_angles);
    let strength = lock.strength.clamp(0.0, 1.0);
    let corrected = quat::try_normalize(quat::slerp(q, target, strength)).unwrap_or(q);

    let off = |tracked: bool, live: f64, locked: f64| {
        !tracked && wrapped_difference(live, locked).abs() > UNINTENDED_THRESHOLD_DEG
    };
    let unintended = [
        off(lock.track_pitch, live.pitch, lock.lock_to.pitch),
        off(lock.track_yaw, live.yaw, lock.lock_to.yaw),
        off(lock.track_roll, live.roll, lock.lock_to.roll),
    ];

    LockOutcome {
        corrected,
        unintended,
    }
}

/// `a - b` wrapped into (-180, 180].
fn wrapped_difference(a: f64, b: f64) -> f64 {
    let mut d = (a - b) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}
