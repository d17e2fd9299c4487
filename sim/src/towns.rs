//! Towns, their buildings, food stock and upgrade levels.
//!
//! Agents reference towns by index; a town never owns agents. Raider camps
//! are ordinary towns with the raider faction.

use crate::components::{Faction, Position};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Highest level any single upgrade can reach.
pub const MAX_UPGRADE_LEVEL: u8 = 20;

// ============================================================================
// UPGRADES
// ============================================================================

/// Purchasable town upgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeKind {
    GuardHealth,
    GuardAttack,
    GuardRange,
    GuardSize,
    GuardAttackSpeed,
    GuardMoveSpeed,
    AlertRadius,
    FarmYield,
    FarmerHealth,
    HealingRate,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 10] = [
        UpgradeKind::GuardHealth,
        UpgradeKind::GuardAttack,
        UpgradeKind::GuardRange,
        UpgradeKind::GuardSize,
        UpgradeKind::GuardAttackSpeed,
        UpgradeKind::GuardMoveSpeed,
        UpgradeKind::AlertRadius,
        UpgradeKind::FarmYield,
        UpgradeKind::FarmerHealth,
        UpgradeKind::HealingRate,
    ];

    /// Fractional bonus granted per level.
    pub fn pct_per_level(self) -> f32 {
        match self {
            UpgradeKind::GuardHealth => 0.10,
            UpgradeKind::GuardAttack => 0.10,
            UpgradeKind::GuardRange => 0.05,
            UpgradeKind::GuardSize => 0.05,
            UpgradeKind::GuardAttackSpeed => 0.08,
            UpgradeKind::GuardMoveSpeed => 0.05,
            UpgradeKind::AlertRadius => 0.10,
            UpgradeKind::FarmYield => 0.15,
            UpgradeKind::FarmerHealth => 0.20,
            UpgradeKind::HealingRate => 0.20,
        }
    }

    /// Whether the bonus only applies to guards.
    pub fn guard_only(self) -> bool {
        matches!(
            self,
            UpgradeKind::GuardHealth
                | UpgradeKind::GuardAttack
                | UpgradeKind::GuardRange
                | UpgradeKind::GuardSize
                | UpgradeKind::GuardAttackSpeed
                | UpgradeKind::GuardMoveSpeed
        )
    }
}

/// Upgrade levels of one town, one named field per upgrade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownUpgrades {
    pub guard_health: u8,
    pub guard_attack: u8,
    pub guard_range: u8,
    pub guard_size: u8,
    pub guard_attack_speed: u8,
    pub guard_move_speed: u8,
    pub alert_radius: u8,
    pub farm_yield: u8,
    pub farmer_health: u8,
    pub healing_rate: u8,
}

impl TownUpgrades {
    pub fn level(&self, kind: UpgradeKind) -> u8 {
        match kind {
            UpgradeKind::GuardHealth => self.guard_health,
            UpgradeKind::GuardAttack => self.guard_attack,
            UpgradeKind::GuardRange => self.guard_range,
            UpgradeKind::GuardSize => self.guard_size,
            UpgradeKind::GuardAttackSpeed => self.guard_attack_speed,
            UpgradeKind::GuardMoveSpeed => self.guard_move_speed,
            UpgradeKind::AlertRadius => self.alert_radius,
            UpgradeKind::FarmYield => self.farm_yield,
            UpgradeKind::FarmerHealth => self.farmer_health,
            UpgradeKind::HealingRate => self.healing_rate,
        }
    }

    /// Set a level, clamped to [`MAX_UPGRADE_LEVEL`]. Returns the stored level.
    pub fn set_level(&mut self, kind: UpgradeKind, level: u8) -> u8 {
        let level = level.min(MAX_UPGRADE_LEVEL);
        let slot = match kind {
            UpgradeKind::GuardHealth => &mut self.guard_health,
            UpgradeKind::GuardAttack => &mut self.guard_attack,
            UpgradeKind::GuardRange => &mut self.guard_range,
            UpgradeKind::GuardSize => &mut self.guard_size,
            UpgradeKind::GuardAttackSpeed => &mut self.guard_attack_speed,
            UpgradeKind::GuardMoveSpeed => &mut self.guard_move_speed,
            UpgradeKind::AlertRadius => &mut self.alert_radius,
            UpgradeKind::FarmYield => &mut self.farm_yield,
            UpgradeKind::FarmerHealth => &mut self.farmer_health,
            UpgradeKind::HealingRate => &mut self.healing_rate,
        };
        *slot = level;
        level
    }

    /// `1 + level * pct` for additive-percentage upgrades.
    pub fn multiplier(&self, kind: UpgradeKind) -> f32 {
        1.0 + self.level(kind) as f32 * kind.pct_per_level()
    }

    /// Attack speed shortens the cooldown rather than scaling a stat up.
    pub fn cooldown_multiplier(&self) -> f32 {
        1.0 / self.multiplier(UpgradeKind::GuardAttackSpeed)
    }
}

// ============================================================================
// BUILDINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    Fountain,
    Farm,
    Bed,
    GuardPost,
}

impl BuildingKind {
    /// Farms and beds hold one occupant; fountains and posts are shared.
    pub fn reservable(self) -> bool {
        matches!(self, BuildingKind::Farm | BuildingKind::Bed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    pub kind: BuildingKind,
    pub position: Position,
    pub reserved: bool,
    /// Agent slot holding the reservation, if it was made for an agent.
    pub occupant: Option<usize>,
}

impl Building {
    fn new(kind: BuildingKind, position: Position) -> Self {
        Self {
            kind,
            position,
            reserved: false,
            occupant: None,
        }
    }
}

// ============================================================================
// TOWN
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Town {
    pub name: String,
    pub center: Position,
    pub faction: Faction,
    /// Building 0 is always the fountain at `center`.
    pub buildings: Vec<Building>,
    pub food: u32,
    /// Fractional harvest not yet banked as food.
    pub harvest_progress: f32,
    pub upgrades: TownUpgrades,
}

impl Town {
    pub fn new(name: impl Into<String>, center: Position, faction: Faction) -> Self {
        Self {
            name: name.into(),
            center,
            faction,
            buildings: vec![Building::new(BuildingKind::Fountain, center)],
            food: 0,
            harvest_progress: 0.0,
            upgrades: TownUpgrades::default(),
        }
    }

    pub fn add_building(&mut self, kind: BuildingKind, position: Position) -> usize {
        self.buildings.push(Building::new(kind, position));
        self.buildings.len() - 1
    }

    pub fn building(&self, index: usize) -> Option<&Building> {
        self.buildings.get(index)
    }

    pub fn count(&self, kind: BuildingKind) -> usize {
        self.buildings.iter().filter(|b| b.kind == kind).count()
    }

    pub fn free_count(&self, kind: BuildingKind) -> usize {
        self.buildings
            .iter()
            .filter(|b| b.kind == kind && !b.reserved)
            .count()
    }

    /// Guard posts in insertion order; patrols walk this ring.
    pub fn guard_posts(&self) -> impl Iterator<Item = &Building> {
        self.buildings
            .iter()
            .filter(|b| b.kind == BuildingKind::GuardPost)
    }

    /// Position of patrol stop `index`, wrapping around the ring.
    pub fn patrol_post(&self, index: usize) -> Option<Position> {
        let count = self.count(BuildingKind::GuardPost);
        if count == 0 {
            return None;
        }
        self.guard_posts().nth(index % count).map(|b| b.position)
    }

    pub fn nearest(&self, kind: BuildingKind, from: Position) -> Option<(usize, Position)> {
        self.buildings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.kind == kind)
            .min_by(|(_, a), (_, b)| {
                from.distance_sq_to(&a.position)
                    .total_cmp(&from.distance_sq_to(&b.position))
            })
            .map(|(i, b)| (i, b.position))
    }

    /// Reserve the free building of `kind` closest to `near`.
    pub fn reserve(
        &mut self,
        kind: BuildingKind,
        near: Position,
        occupant: Option<usize>,
    ) -> Option<usize> {
        if !kind.reservable() {
            return None;
        }
        let index = self
            .buildings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.kind == kind && !b.reserved)
            .min_by(|(_, a), (_, b)| {
                near.distance_sq_to(&a.position)
                    .total_cmp(&near.distance_sq_to(&b.position))
            })
            .map(|(i, _)| i)?;
        let building = &mut self.buildings[index];
        building.reserved = true;
        building.occupant = occupant;
        Some(index)
    }

    /// Release a reservation. Returns false if the building was not reserved.
    pub fn release(&mut self, index: usize) -> bool {
        match self.buildings.get_mut(index) {
            Some(b) if b.reserved => {
                b.reserved = false;
                b.occupant = None;
                true
            }
            _ => false,
        }
    }

    /// Release everything held by `slot`. Returns how many were released.
    pub fn release_occupant(&mut self, slot: usize) -> usize {
        let mut released = 0;
        for building in self.buildings.iter_mut() {
            if building.occupant == Some(slot) {
                building.reserved = false;
                building.occupant = None;
                released += 1;
            }
        }
        released
    }

    /// Take one unit of food if any is stored.
    pub fn take_food(&mut self) -> bool {
        if self.food > 0 {
            self.food -= 1;
            true
        } else {
            false
        }
    }

    /// Bank fractional harvest, converting whole units into food.
    pub fn add_harvest(&mut self, amount: f32) {
        self.harvest_progress += amount.max(0.0);
        let whole = self.harvest_progress.floor();
        if whole >= 1.0 {
            self.food += whole as u32;
            self.harvest_progress -= whole;
        }
    }
}

/// All towns, indexed by position in `towns`.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct TownRegistry {
    pub towns: Vec<Town>,
}

impl TownRegistry {
    pub fn add(&mut self, town: Town) -> usize {
        self.towns.push(town);
        self.towns.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Town> {
        self.towns.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Town> {
        self.towns.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.towns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.towns.is_empty()
    }

    /// Closest farm belonging to a town of a different faction.
    pub fn nearest_enemy_farm(
        &self,
        faction: Faction,
        from: Position,
    ) -> Option<(usize, usize, Position)> {
        self.towns
            .iter()
            .enumerate()
            .filter(|(_, t)| t.faction != faction)
            .filter_map(|(ti, t)| {
                t.nearest(BuildingKind::Farm, from)
                    .map(|(bi, pos)| (ti, bi, pos))
            })
            .min_by(|a, b| from.distance_sq_to(&a.2).total_cmp(&from.distance_sq_to(&b.2)))
    }

    /// Drop every reservation held by a dead agent.
    pub fn release_occupant(&mut self, slot: usize) -> usize {
        self.towns
            .iter_mut()
            .map(|t| t.release_occupant(slot))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn town_with_beds(n: usize) -> Town {
        let mut town = Town::new("Millbrook", Position::new(0.0, 0.0), Faction::Villager);
        for i in 0..n {
            town.add_building(BuildingKind::Bed, Position::new(10.0 * i as f32, 40.0));
        }
        town
    }

    #[test]
    fn test_reserve_release_bed_counts() {
        let mut town = town_with_beds(3);
        assert_eq!(town.free_count(BuildingKind::Bed), 3);

        let bed = town.reserve(BuildingKind::Bed, Position::new(0.0, 0.0), Some(7)).unwrap();
        assert_eq!(town.free_count(BuildingKind::Bed), 2);
        assert_eq!(town.buildings[bed].occupant, Some(7));

        assert!(town.release(bed));
        assert_eq!(town.free_count(BuildingKind::Bed), 3);
        assert!(!town.release(bed), "double release is a no-op");
        assert_eq!(town.free_count(BuildingKind::Bed), 3);
    }

    #[test]
    fn test_reserve_exhaustion_returns_none() {
        let mut town = town_with_beds(1);
        assert!(town.reserve(BuildingKind::Bed, town.center, None).is_some());
        assert!(town.reserve(BuildingKind::Bed, town.center, None).is_none());
        assert!(town.reserve(BuildingKind::Fountain, town.center, None).is_none());
    }

    #[test]
    fn test_reserve_prefers_nearest() {
        let mut town = town_with_beds(3);
        let bed = town
            .reserve(BuildingKind::Bed, Position::new(21.0, 40.0), None)
            .unwrap();
        assert_eq!(town.buildings[bed].position, Position::new(20.0, 40.0));
    }

    #[test]
    fn test_release_occupant_frees_all() {
        let mut town = town_with_beds(2);
        town.add_building(BuildingKind::Farm, Position::new(100.0, 0.0));
        town.reserve(BuildingKind::Bed, town.center, Some(3));
        town.reserve(BuildingKind::Farm, town.center, Some(3));
        assert_eq!(town.release_occupant(3), 2);
        assert_eq!(town.free_count(BuildingKind::Farm), 1);
    }

    #[test]
    fn test_patrol_ring_wraps() {
        let mut town = Town::new("Ashford", Position::new(0.0, 0.0), Faction::Villager);
        assert!(town.patrol_post(0).is_none());
        town.add_building(BuildingKind::GuardPost, Position::new(100.0, 0.0));
        town.add_building(BuildingKind::Bed, Position::new(5.0, 5.0));
        town.add_building(BuildingKind::GuardPost, Position::new(0.0, 100.0));
        assert_eq!(town.patrol_post(1), Some(Position::new(0.0, 100.0)));
        assert_eq!(town.patrol_post(2), Some(Position::new(100.0, 0.0)));
    }

    #[test]
    fn test_upgrade_levels_clamp_and_scale() {
        let mut upgrades = TownUpgrades::default();
        assert_eq!(upgrades.set_level(UpgradeKind::GuardAttack, 200), MAX_UPGRADE_LEVEL);
        upgrades.set_level(UpgradeKind::GuardHealth, 5);
        assert!((upgrades.multiplier(UpgradeKind::GuardHealth) - 1.5).abs() < 1e-6);
        upgrades.set_level(UpgradeKind::GuardAttackSpeed, 10);
        assert!((upgrades.cooldown_multiplier() - 1.0 / 1.8).abs() < 1e-6);
        assert!(UpgradeKind::GuardRange.guard_only());
        assert!(!UpgradeKind::FarmYield.guard_only());
    }

    #[test]
    fn test_harvest_banks_whole_units() {
        let mut town = town_with_beds(0);
        town.add_harvest(0.6);
        assert_eq!(town.food, 0);
        town.add_harvest(0.6);
        assert_eq!(town.food, 1);
        assert!((town.harvest_progress - 0.2).abs() < 1e-5);
        assert!(town.take_food());
        assert!(!town.take_food());
    }
}
