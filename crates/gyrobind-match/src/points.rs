use crate::types::{vec3_serde, GroupId, PointId};
use crate::EditError;
use glam::{DQuat, DVec3};
use gyrobind_imu::quat;
use gyrobind_input::{descriptor_serde, Action};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

fn active_by_default() -> bool {
    true
}

/// A target the controller tip can touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub id: PointId,
    #[serde(with = "vec3_serde")]
    pub position: DVec3,
    /// Only hittable while the parent is in the hit history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_parent: Option<PointId>,
    #[serde(skip)]
    pub hit: bool,
    #[serde(skip, default = "active_by_default")]
    pub is_active: bool,
}

impl ReferencePoint {
    pub fn new(id: PointId, position: DVec3) -> Self {
        Self {
            id,
            position,
            chain_parent: None,
            hit: false,
            is_active: true,
        }
    }
}

/// Points that must all be hit within the grace period to fire an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub point_ids: BTreeSet<PointId>,
    #[serde(default, with = "descriptor_serde", skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(skip)]
    pub last_triggered: Option<Duration>,
}

/// When group completion is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupEvaluation {
    /// Only on ticks where some point was newly hit.
    #[default]
    OnNewHit,
    EveryTick,
}

/// Per-tick tunables for hit detection and groups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickParams {
    /// Tip-to-point distance below which a point counts as hit.
    pub hit_tolerance: f64,
    pub grace_period: Duration,
    pub group_cooldown: Duration,
    pub evaluation: GroupEvaluation,
}

impl Default for TickParams {
    fn default() -> Self {
        Self {
            hit_tolerance: 0.15,
            grace_period: Duration::from_secs(2),
            group_cooldown: Duration::from_millis(500),
            evaluation: GroupEvaluation::OnNewHit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupCompletion {
    pub group: GroupId,
    pub name: String,
    pub action: Option<Action>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointTick {
    pub newly_hit: Vec<PointId>,
    pub completed: Vec<GroupCompletion>,
}

/// Reference points, their groups and the shared hit history.
#[derive(Debug, Clone, Default)]
pub struct PointField {
    points: Vec<ReferencePoint>,
    groups: Vec<PointGroup>,
    hit_history: HashMap<PointId, Duration>,
}

impl PointField {
    pub fn new(points: Vec<ReferencePoint>, groups: Vec<PointGroup>) -> Self {
        Self {
            points,
            groups,
            hit_history: HashMap::new(),
        }
    }

    pub fn points(&self) -> &[ReferencePoint] {
        &self.points
    }

    pub fn groups(&self) -> &[PointGroup] {
        &self.groups
    }

    pub fn point(&self, id: &PointId) -> Option<&ReferencePoint> {
        self.points.iter().find(|p| &p.id == id)
    }

    pub fn group(&self, id: &GroupId) -> Option<&PointGroup> {
        self.groups.iter().find(|g| &g.id == id)
    }

    pub fn hit_time(&self, id: &PointId) -> Option<Duration> {
        self.hit_history.get(id).copied()
    }

    pub fn clear_hits(&mut self) {
        self.hit_history.clear();
        for point in &mut self.points {
            point.hit = false;
        }
    }

    pub fn tick(&mut self, tip: DVec3, params: &TickParams, now: Duration) -> PointTick {
        let grace = params.grace_period;
        self.hit_history
            .retain(|_, hit_at| now.saturating_sub(*hit_at) <= grace);

        let mut newly_hit = Vec::new();
        for point in &mut self.points {
            point.is_active = point
                .chain_parent
                .as_ref()
                .map_or(true, |parent| self.hit_history.contains_key(parent));
            point.hit = point.is_active && tip.distance(point.position) < params.hit_tolerance;

            if point.hit && !self.hit_history.contains_key(&point.id) {
                debug!(point = %point.id, "Reference point hit");
                self.hit_history.insert(point.id.clone(), now);
                newly_hit.push(point.id.clone());
            }
        }

        let evaluate = match params.evaluation {
            GroupEvaluation::OnNewHit => !newly_hit.is_empty(),
            GroupEvaluation::EveryTick => true,
        };
        let mut completed = Vec::new();
        if evaluate {
            completed = self.check_groups(&newly_hit, params, now);
        }

        PointTick {
            newly_hit,
            completed,
        }
    }

    fn check_groups(
        &mut self,
        newly_hit: &[PointId],
        params: &TickParams,
        now: Duration,
    ) -> Vec<GroupCompletion> {
        let existing: HashSet<&PointId> = self.points.iter().map(|p| &p.id).collect();
        let mut consumed: Vec<PointId> = Vec::new();
        let mut completed = Vec::new();

        for group in &mut self.groups {
            let members: Vec<&PointId> = group
                .point_ids
                .iter()
                .filter(|id| existing.contains(id))
                .collect();
            if members.is_empty() {
                continue;
            }
            if params.evaluation == GroupEvaluation::OnNewHit
                && !members.iter().any(|id| newly_hit.contains(id))
            {
                continue;
            }

            let Some(times) = members
                .iter()
                .map(|id| self.hit_history.get(*id).copied())
                .collect::<Option<Vec<Duration>>>()
            else {
                continue;
            };
            let (Some(first), Some(last)) = (times.iter().min(), times.iter().max()) else {
                continue;
            };
            let span = *last - *first;
            if span > params.grace_period {
                debug!(group = %group.name, span_ms = span.as_millis() as u64, "Group hits too far apart");
                continue;
            }

            let cooled_down = group
                .last_triggered
                .map_or(true, |at| now.saturating_sub(at) > params.group_cooldown);
            if !cooled_down {
                debug!(group = %group.name, "Group completed during cooldown");
                continue;
            }

            info!(group = %group.name, points = members.len(), span_ms = span.as_millis() as u64, "Group completed");
            group.last_triggered = Some(now);
            consumed.extend(members.into_iter().cloned());
            completed.push(GroupCompletion {
                group: group.id.clone(),
                name: group.name.clone(),
                action: group.action,
            });
        }

        for id in &consumed {
            self.hit_history.remove(id);
        }
        completed
    }

    fn point_mut(&mut self, id: &PointId) -> Result<&mut ReferencePoint, EditError> {
        self.points
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| EditError::UnknownPoint(id.clone()))
    }

    fn group_mut(&mut self, id: &GroupId) -> Result<&mut PointGroup, EditError> {
        self.groups
            .iter_mut()
            .find(|g| &g.id == id)
            .ok_or_else(|| EditError::UnknownGroup(id.clone()))
    }

    /// New point with a fresh random id.
    pub fn add_point(&mut self, position: DVec3) -> PointId {
        let mut id = PointId::random();
        while self.point(&id).is_some() {
            id = PointId::random();
        }
        self.points.push(ReferencePoint::new(id.clone(), position));
        id
    }

    pub fn add_point_with_id(&mut self, id: PointId, position: DVec3) -> Result<(), EditError> {
        if self.point(&id).is_some() {
            return Err(EditError::DuplicatePointId(id));
        }
        self.points.push(ReferencePoint::new(id, position));
        Ok(())
    }

    pub fn set_point_position(&mut self, id: &PointId, position: DVec3) -> Result<(), EditError> {
        self.point_mut(id)?.position = position;
        Ok(())
    }

    /// Change a point's id everywhere it is referenced.
    pub fn rename_point(&mut self, id: &PointId, new_id: PointId) -> Result<(), EditError> {
        if id == &new_id {
            return self.point_mut(id).map(|_| ());
        }
        if self.point(&new_id).is_some() {
            return Err(EditError::DuplicatePointId(new_id));
        }
        self.point_mut(id)?.id = new_id.clone();

        for point in &mut self.points {
            if point.chain_parent.as_ref() == Some(id) {
                point.chain_parent = Some(new_id.clone());
            }
        }
        for group in &mut self.groups {
            if group.point_ids.remove(id) {
                group.point_ids.insert(new_id.clone());
            }
        }
        if let Some(hit_at) = self.hit_history.remove(id) {
            self.hit_history.insert(new_id, hit_at);
        }
        Ok(())
    }

    /// Chain `id` behind `parent`, or unchain with `None`.
    pub fn set_chain_parent(
        &mut self,
        id: &PointId,
        parent: Option<PointId>,
    ) -> Result<(), EditError> {
        self.point_mut(id)?;
        if let Some(parent) = &parent {
            if self.point(parent).is_none() {
                return Err(EditError::UnknownPoint(parent.clone()));
            }
            // Walk up from the new parent; reaching `id` means a loop.
            let mut cursor = Some(parent.clone());
            let mut steps = 0;
            while let Some(current) = cursor {
                if &current == id || steps > self.points.len() {
                    return Err(EditError::ChainCycle {
                        point: id.clone(),
                        parent: parent.clone(),
                    });
                }
                cursor = self.point(&current).and_then(|p| p.chain_parent.clone());
                steps += 1;
            }
        }
        self.point_mut(id)?.chain_parent = parent;
        Ok(())
    }

    pub fn remove_point(&mut self, id: &PointId) -> Result<ReferencePoint, EditError> {
        let index = self
            .points
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| EditError::UnknownPoint(id.clone()))?;
        let removed = self.points.remove(index);

        for point in &mut self.points {
            if point.chain_parent.as_ref() == Some(id) {
                point.chain_parent = None;
            }
        }
        self.hit_history.remove(id);
        for group in &mut self.groups {
            group.point_ids.remove(id);
        }
        info!(point = %id, "Deleted reference point");
        Ok(removed)
    }

    /// New empty group named `New Group`, `New Group (2)`, ...
    pub fn create_group(&mut self) -> GroupId {
        const BASE: &str = "New Group";
        let names: HashSet<&str> = self.groups.iter().map(|g| g.name.as_str()).collect();
        let mut name = BASE.to_string();
        let mut counter = 2;
        while names.contains(name.as_str()) {
            name = format!("{BASE} ({counter})");
            counter += 1;
        }

        let mut id = GroupId::random();
        while self.group(&id).is_some() {
            id = GroupId::random();
        }
        self.groups.push(PointGroup {
            id: id.clone(),
            name,
            point_ids: BTreeSet::new(),
            action: None,
            last_triggered: None,
        });
        id
    }

    pub fn rename_group(&mut self, id: &GroupId, name: impl Into<String>) -> Result<(), EditError> {
        self.group_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_group_action(&mut self, id: &GroupId, action: Option<Action>) -> Result<(), EditError> {
        self.group_mut(id)?.action = action;
        Ok(())
    }

    /// Move a point into `group`, or out of every group with `None`.
    pub fn assign_point(&mut self, id: &PointId, group: Option<&GroupId>) -> Result<(), EditError> {
        if self.point(id).is_none() {
            return Err(EditError::UnknownPoint(id.clone()));
        }
        if let Some(group) = group {
            self.group_mut(group)?;
        }
        for other in &mut self.groups {
            other.point_ids.remove(id);
        }
        if let Some(group) = group {
            self.group_mut(group)?.point_ids.insert(id.clone());
        }
        Ok(())
    }

    pub fn remove_group(&mut self, id: &GroupId) -> Result<PointGroup, EditError> {
        let index = self
            .groups
            .iter()
            .position(|g| &g.id == id)
            .ok_or_else(|| EditError::UnknownGroup(id.clone()))?;
        Ok(self.groups.remove(index))
    }

    /// Rotate every point by `delta`, used when the home orientation moves.
    pub fn rebase(&mut self, delta: DQuat) {
        for point in &mut self.points {
            point.position = quat::rotate_point(point.position, delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyrobind_input::Key;

    fn secs(v: f64) -> Duration {
        Duration::from_secs_f64(v)
    }

    const P1: DVec3 = DVec3::new(1.0, 0.0, 0.0);
    const P2: DVec3 = DVec3::new(0.0, 1.0, 0.0);
    const AWAY: DVec3 = DVec3::new(0.0, 0.0, -5.0);

    fn two_point_group() -> (PointField, GroupId) {
        let mut field = PointField::default();
        field.add_point_with_id("p1".into(), P1).unwrap();
        field.add_point_with_id("p2".into(), P2).unwrap();
        let group = field.create_group();
        field.assign_point(&"p1".into(), Some(&group)).unwrap();
        field.assign_point(&"p2".into(), Some(&group)).unwrap();
        field
            .set_group_action(&group, Some(Action::KeyPress(Key::Char('g'))))
            .unwrap();
        (field, group)
    }

    #[test]
    fn group_fires_when_hits_within_grace() {
        let (mut field, group) = two_point_group();
        let params = TickParams::default();

        let first = field.tick(P1, &params, secs(0.0));
        assert_eq!(first.newly_hit, vec![PointId::from("p1")]);
        assert!(first.completed.is_empty());

        field.tick(AWAY, &params, secs(1.0));
        let second = field.tick(P2, &params, secs(1.5));
        assert_eq!(second.completed.len(), 1);
        assert_eq!(second.completed[0].group, group);
        assert_eq!(second.completed[0].action, Some(Action::KeyPress(Key::Char('g'))));
        // Hits are consumed.
        assert!(field.hit_time(&"p1".into()).is_none());
        assert!(field.hit_time(&"p2".into()).is_none());
    }

    #[test]
    fn group_does_not_fire_after_grace() {
        let (mut field, _) = two_point_group();
        let params = TickParams::default();

        field.tick(P1, &params, secs(0.0));
        let late = field.tick(P2, &params, secs(2.5));
        assert!(late.completed.is_empty());
        assert!(field.hit_time(&"p1".into()).is_none());
        assert_eq!(field.hit_time(&"p2".into()), Some(secs(2.5)));
    }

    #[test]
    fn staying_on_a_point_is_not_a_new_hit() {
        let (mut field, _) = two_point_group();
        let params = TickParams::default();
        assert_eq!(field.tick(P1, &params, secs(0.0)).newly_hit.len(), 1);
        assert!(field.tick(P1, &params, secs(0.1)).newly_hit.is_empty());
        assert_eq!(field.hit_time(&"p1".into()), Some(secs(0.0)));
    }

    #[test]
    fn cooldown_blocks_immediate_retrigger() {
        let mut field = PointField::default();
        field.add_point_with_id("solo".into(), P1).unwrap();
        let group = field.create_group();
        field.assign_point(&"solo".into(), Some(&group)).unwrap();
        let params = TickParams::default();

        assert_eq!(field.tick(P1, &params, secs(0.0)).completed.len(), 1);
        field.tick(AWAY, &params, secs(0.1));
        assert!(field.tick(P1, &params, secs(0.4)).completed.is_empty());
        field.tick(AWAY, &params, secs(0.45));
        // The suppressed hit stays in history until it expires.
        field.tick(AWAY, &params, secs(2.5));
        assert_eq!(field.tick(P1, &params, secs(2.6)).completed.len(), 1);
    }

    #[test]
    fn every_tick_evaluation_catches_late_cooldown() {
        let mut field = PointField::default();
        field.add_point_with_id("solo".into(), P1).unwrap();
        let group = field.create_group();
        field.assign_point(&"solo".into(), Some(&group)).unwrap();
        let mut params = TickParams::default();

        field.tick(P1, &params, secs(0.0));
        field.tick(AWAY, &params, secs(0.1));
        field.tick(P1, &params, secs(0.2));
        assert!(field.tick(AWAY, &params, secs(0.6)).completed.is_empty());

        params.evaluation = GroupEvaluation::EveryTick;
        assert_eq!(field.tick(AWAY, &params, secs(0.7)).completed.len(), 1);
    }

    #[test]
    fn chained_point_needs_recent_parent() {
        let mut field = PointField::default();
        field.add_point_with_id("parent".into(), P1).unwrap();
        field.add_point_with_id("child".into(), P2).unwrap();
        field
            .set_chain_parent(&"child".into(), Some("parent".into()))
            .unwrap();
        let params = TickParams::default();

        let blocked = field.tick(P2, &params, secs(0.0));
        assert!(blocked.newly_hit.is_empty());
        assert!(!field.point(&"child".into()).unwrap().is_active);

        field.tick(P1, &params, secs(0.5));
        let unlocked = field.tick(P2, &params, secs(1.0));
        assert_eq!(unlocked.newly_hit, vec![PointId::from("child")]);
        assert!(field.point(&"child".into()).unwrap().hit);
    }

    #[test]
    fn chain_cycles_are_rejected() {
        let mut field = PointField::default();
        for id in ["a", "b", "c"] {
            field.add_point_with_id(id.into(), DVec3::ZERO).unwrap();
        }
        field.set_chain_parent(&"b".into(), Some("a".into())).unwrap();
        field.set_chain_parent(&"c".into(), Some("b".into())).unwrap();

        assert!(matches!(
            field.set_chain_parent(&"a".into(), Some("c".into())),
            Err(EditError::ChainCycle { .. })
        ));
        assert!(matches!(
            field.set_chain_parent(&"a".into(), Some("a".into())),
            Err(EditError::ChainCycle { .. })
        ));
        field.set_chain_parent(&"c".into(), None).unwrap();
        field.set_chain_parent(&"a".into(), Some("c".into())).unwrap();
    }

    #[test]
    fn deleting_point_cascades() {
        let (mut field, group) = two_point_group();
        field
            .set_chain_parent(&"p2".into(), Some("p1".into()))
            .unwrap();
        field.tick(P1, &TickParams::default(), secs(0.0));

        field.remove_point(&"p1".into()).unwrap();
        assert!(field.hit_time(&"p1".into()).is_none());
        assert_eq!(field.point(&"p2".into()).unwrap().chain_parent, None);
        let members: Vec<_> = field.group(&group).unwrap().point_ids.iter().cloned().collect();
        assert_eq!(members, vec![PointId::from("p2")]);
        assert_eq!(
            field.remove_point(&"p1".into()).unwrap_err(),
            EditError::UnknownPoint("p1".into())
        );
    }

    #[test]
    fn renaming_point_updates_references() {
        let (mut field, group) = two_point_group();
        field
            .set_chain_parent(&"p2".into(), Some("p1".into()))
            .unwrap();
        field.tick(P1, &TickParams::default(), secs(0.0));

        assert_eq!(
            field.rename_point(&"p1".into(), "p2".into()),
            Err(EditError::DuplicatePointId("p2".into()))
        );
        field.rename_point(&"p1".into(), "start".into()).unwrap();
        assert_eq!(
            field.point(&"p2".into()).unwrap().chain_parent,
            Some("start".into())
        );
        assert!(field.group(&group).unwrap().point_ids.contains(&PointId::from("start")));
        assert_eq!(field.hit_time(&"start".into()), Some(secs(0.0)));
    }

    #[test]
    fn group_names_are_unique_and_membership_exclusive() {
        let mut field = PointField::default();
        field.add_point_with_id("p".into(), DVec3::ZERO).unwrap();
        let first = field.create_group();
        let second = field.create_group();
        let third = field.create_group();
        assert_eq!(field.group(&first).unwrap().name, "New Group");
        assert_eq!(field.group(&second).unwrap().name, "New Group (2)");
        assert_eq!(field.group(&third).unwrap().name, "New Group (3)");

        field.assign_point(&"p".into(), Some(&first)).unwrap();
        field.assign_point(&"p".into(), Some(&second)).unwrap();
        assert!(field.group(&first).unwrap().point_ids.is_empty());
        assert_eq!(field.group(&second).unwrap().point_ids.len(), 1);

        field.assign_point(&"p".into(), None).unwrap();
        assert!(field.groups().iter().all(|g| g.point_ids.is_empty()));
        field.remove_group(&third).unwrap();
        assert_eq!(field.groups().len(), 2);
    }

    #[test]
    fn group_without_existing_points_never_fires() {
        let mut field = PointField::default();
        field.add_point_with_id("real".into(), P1).unwrap();
        let group = field.create_group();
        field.groups[0].point_ids.insert("ghost".into());
        let params = TickParams {
            evaluation: GroupEvaluation::EveryTick,
            ..TickParams::default()
        };
        assert!(field.tick(P1, &params, secs(0.0)).completed.is_empty());
        assert!(field.group(&group).unwrap().last_triggered.is_none());
    }

    #[test]
    fn rebase_rotates_points() {
        let mut field = PointField::default();
        field.add_point_with_id("p".into(), DVec3::X).unwrap();
        field.rebase(DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2));
        let moved = field.point(&"p".into()).unwrap().position;
        assert!((moved - DVec3::Y).length() < 1e-9);
    }

    #[test]
    fn groups_persist_with_action_descriptors() {
        let (field, _) = two_point_group();
        #[derive(Serialize, Deserialize)]
        struct Saved {
            points: Vec<ReferencePoint>,
            groups: Vec<PointGroup>,
        }
        let saved = Saved {
            points: field.points().to_vec(),
            groups: field.groups().to_vec(),
        };
        let text = toml::to_string(&saved).unwrap();
        assert!(text.contains("type = \"Key Press\""));

        let back: Saved = toml::from_str(&text).unwrap();
        assert_eq!(back.groups, saved.groups);
        assert!(back.points.iter().all(|p| p.is_active));
    }
}
