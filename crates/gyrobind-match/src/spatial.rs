use crate::position::SavedPosition;
use glam::DVec3;

/// Index of the first position, in stored order, that matches the sample.
///
/// First match wins even if a later position is a closer fit.
pub fn find_matching_position<'a, I>(gyro: DVec3, accel: DVec3, positions: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a SavedPosition>,
{
    positions
        .into_iter()
        .position(|position| position.matches(gyro, accel))
}
