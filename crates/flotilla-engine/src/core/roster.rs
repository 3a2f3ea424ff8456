use glam::Vec2;

use super::vessel::{FleetSide, Vessel, VesselId, VesselTemplate};

/// Lookup table of every vessel in a match, indexed by [`VesselId`].
///
/// The roster is owned by the match; orders and tactical assignments refer to
/// vessels only through identifiers resolved here.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    vessels: Vec<Vessel>,
}

impl Roster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vessel built from `template` and returns its identifier.
    ///
    /// # Panics
    ///
    /// Panics if the roster already holds `u16::MAX + 1` vessels.
    pub fn spawn(
        &mut self,
        side: FleetSide,
        template: &VesselTemplate,
        position: Vec2,
        heading: f32,
        confidence_decay_rate: f32,
    ) -> VesselId {
        assert!(
            self.vessels.len() <= usize::from(u16::MAX),
            "roster holds at most {} vessels",
            usize::from(u16::MAX) + 1
        );
        #[expect(clippy::cast_possible_truncation)]
        let id = VesselId(self.vessels.len() as u16);
        self.vessels.push(Vessel::new(
            id,
            side,
            template,
            position,
            heading,
            confidence_decay_rate,
        ));
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: VesselId) -> Option<&Vessel> {
        self.vessels.get(id.index())
    }

    pub fn get_mut(&mut self, id: VesselId) -> Option<&mut Vessel> {
        self.vessels.get_mut(id.index())
    }

    /// Returns the vessel if it exists and is still alive.
    #[must_use]
    pub fn living(&self, id: VesselId) -> Option<&Vessel> {
        self.get(id).filter(|v| v.is_alive())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vessel> + '_ {
        self.vessels.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vessel> + '_ {
        self.vessels.iter_mut()
    }

    /// Living vessels of one side, in identifier order.
    pub fn fleet(&self, side: FleetSide) -> impl Iterator<Item = &Vessel> + '_ {
        self.vessels
            .iter()
            .filter(move |v| v.side() == side && v.is_alive())
    }

    #[must_use]
    pub fn living_count(&self, side: FleetSide) -> usize {
        self.fleet(side).count()
    }

    /// Nearest living enemy of `vessel`; equal distances resolve to the lower identifier.
    #[must_use]
    pub fn nearest_enemy(&self, vessel: &Vessel) -> Option<&Vessel> {
        self.fleet(vessel.side().opponent())
            .min_by(|a, b| {
                vessel
                    .distance_to(a)
                    .total_cmp(&vessel.distance_to(b))
                    .then(a.id().cmp(&b.id()))
            })
    }

    /// Mean position of the living vessels of one side.
    #[must_use]
    pub fn centroid(&self, side: FleetSide) -> Option<Vec2> {
        let (sum, count) = self
            .fleet(side)
            .fold((Vec2::ZERO, 0_u16), |(sum, n), v| (sum + v.position(), n + 1));
        (count > 0).then(|| sum / f32::from(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_dense_indices() {
        let mut roster = Roster::new();
        let a = roster.spawn(FleetSide::Alpha, &VesselTemplate::FIGHTER, Vec2::ZERO, 0.0, 0.1);
        let b = roster.spawn(
            FleetSide::Beta,
            &VesselTemplate::FIGHTER,
            Vec2::new(10.0, 0.0),
            0.0,
            0.1,
        );
        assert_eq!(a, VesselId(0));
        assert_eq!(b, VesselId(1));
        assert_eq!(roster.get(b).map(Vessel::side), Some(FleetSide::Beta));
    }

    #[test]
    fn test_last_id_is_u16_max() {
        let mut roster = Roster::new();
        let mut last = None;
        for _ in 0..=u16::MAX {
            last = Some(roster.spawn(
                FleetSide::Alpha,
                &VesselTemplate::FIGHTER,
                Vec2::ZERO,
                0.0,
                0.1,
            ));
        }
        assert_eq!(last, Some(VesselId(u16::MAX)));
    }

    #[test]
    #[should_panic(expected = "roster holds at most 65536 vessels")]
    fn test_spawn_past_id_space_panics() {
        let mut roster = Roster::new();
        for _ in 0..=u32::from(u16::MAX) + 1 {
            let _id = roster.spawn(
                FleetSide::Alpha,
                &VesselTemplate::FIGHTER,
                Vec2::ZERO,
                0.0,
                0.1,
            );
        }
    }

    #[test]
    fn test_nearest_enemy_tie_breaks_on_lower_id() {
        let mut roster = Roster::new();
        let me = roster.spawn(FleetSide::Alpha, &VesselTemplate::FIGHTER, Vec2::ZERO, 0.0, 0.1);
        let far = roster.spawn(
            FleetSide::Beta,
            &VesselTemplate::FIGHTER,
            Vec2::new(0.0, 10.0),
            0.0,
            0.1,
        );
        let near = roster.spawn(
            FleetSide::Beta,
            &VesselTemplate::FIGHTER,
            Vec2::new(0.0, -10.0),
            0.0,
            0.1,
        );
        let me = roster.get(me).unwrap().clone();
        assert_eq!(roster.nearest_enemy(&me).map(Vessel::id), Some(far));

        roster.get_mut(far).unwrap().take_damage(1000.0);
        assert_eq!(roster.nearest_enemy(&me).map(Vessel::id), Some(near));
    }
}
