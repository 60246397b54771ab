//! Weapon catalog and firing state.

use crate::core::fixed::{to_fixed, Fixed, FIXED_ONE};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;

use super::actor::ActorId;
use super::controller::Controller;
use super::projectile::{Projectile, ProjectileType, G12, P308_LAPUA, P556X45, P762X39, P9X19};

// =============================================================================
// WEAPON TYPES
// =============================================================================

/// Static weapon definition. Cooldowns are in ticks, spreads in radians.
#[derive(Debug, PartialEq, Eq)]
pub struct WeaponType {
    pub id: &'static str,
    pub title: &'static str,
    pub is_automatic: bool,
    pub shoot_cooldown: u32,
    pub reload_cooldown: u32,
    pub max_ammo: i32,
    pub spread_stand: Fixed,
    pub spread_walk: Fixed,
    pub spread_run: Fixed,
    pub spread_sprint: Fixed,
    pub projectile: &'static ProjectileType,
    /// Projectiles per shot.
    pub pellets: u32,
    /// Actor sprite block id.
    pub sprite: &'static str,
    /// Scales projectile damage, speed and length.
    pub length_multiplier: Fixed,
}

/// Spread selector derived from the shooter's intents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stance {
    Standing,
    Walking,
    Running,
    Sprinting,
}

impl Stance {
    /// Running is moving forward; any other movement is walking.
    pub fn of(controller: &Controller) -> Self {
        if controller.is_running() {
            if controller.is_sprinting {
                Self::Sprinting
            } else {
                Self::Running
            }
        } else if controller.is_moving() {
            Self::Walking
        } else {
            Self::Standing
        }
    }
}

impl WeaponType {
    pub fn spread(&self, stance: Stance) -> Fixed {
        match stance {
            Stance::Standing => self.spread_stand,
            Stance::Walking => self.spread_walk,
            Stance::Running => self.spread_run,
            Stance::Sprinting => self.spread_sprint,
        }
    }

    pub fn pistol() -> &'static Self {
        &PISTOL
    }
}

const SPRITE_PISTOL: &str = "actor_solider_pistol";
const SPRITE_RIFLE: &str = "actor_solider_rifle";
const SPRITE_SNIPER: &str = "actor_solider_sniper";

pub static PISTOL: WeaponType = WeaponType {
    id: "pistol",
    title: "Pistol",
    is_automatic: false,
    shoot_cooldown: 20,
    reload_cooldown: 80,
    max_ammo: 17,
    spread_stand: to_fixed(0.02),
    spread_walk: to_fixed(0.05),
    spread_run: to_fixed(0.1),
    spread_sprint: to_fixed(0.2),
    projectile: &P9X19,
    pellets: 1,
    sprite: SPRITE_PISTOL,
    length_multiplier: FIXED_ONE,
};

pub static UZI: WeaponType = WeaponType {
    id: "uzi",
    title: "Uzi",
    is_automatic: true,
    shoot_cooldown: 5,
    reload_cooldown: 100,
    max_ammo: 32,
    spread_stand: to_fixed(0.08),
    spread_walk: to_fixed(0.12),
    spread_run: to_fixed(0.18),
    spread_sprint: to_fixed(0.3),
    projectile: &P9X19,
    pellets: 1,
    sprite: SPRITE_PISTOL,
    length_multiplier: FIXED_ONE,
};

pub static MP5: WeaponType = WeaponType {
    id: "mp5",
    title: "MP5",
    is_automatic: true,
    shoot_cooldown: 6,
    reload_cooldown: 110,
    max_ammo: 30,
    spread_stand: to_fixed(0.05),
    spread_walk: to_fixed(0.08),
    spread_run: to_fixed(0.14),
    spread_sprint: to_fixed(0.25),
    projectile: &P9X19,
    pellets: 1,
    sprite: SPRITE_RIFLE,
    length_multiplier: FIXED_ONE,
};

pub static SHOTGUN: WeaponType = WeaponType {
    id: "shotgun",
    title: "Shotgun",
    is_automatic: false,
    shoot_cooldown: 45,
    reload_cooldown: 150,
    max_ammo: 8,
    spread_stand: to_fixed(0.3),
    spread_walk: to_fixed(0.35),
    spread_run: to_fixed(0.4),
    spread_sprint: to_fixed(0.5),
    projectile: &G12,
    pellets: 8,
    sprite: SPRITE_RIFLE,
    length_multiplier: FIXED_ONE,
};

pub static M4: WeaponType = WeaponType {
    id: "m4",
    title: "M4",
    is_automatic: true,
    shoot_cooldown: 7,
    reload_cooldown: 130,
    max_ammo: 30,
    spread_stand: to_fixed(0.03),
    spread_walk: to_fixed(0.06),
    spread_run: to_fixed(0.12),
    spread_sprint: to_fixed(0.22),
    projectile: &P556X45,
    pellets: 1,
    sprite: SPRITE_RIFLE,
    length_multiplier: FIXED_ONE,
};

pub static AK47: WeaponType = WeaponType {
    id: "ak47",
    title: "AK-47",
    is_automatic: true,
    shoot_cooldown: 8,
    reload_cooldown: 140,
    max_ammo: 30,
    spread_stand: to_fixed(0.04),
    spread_walk: to_fixed(0.08),
    spread_run: to_fixed(0.15),
    spread_sprint: to_fixed(0.28),
    projectile: &P762X39,
    pellets: 1,
    sprite: SPRITE_RIFLE,
    length_multiplier: FIXED_ONE,
};

pub static SNIPER: WeaponType = WeaponType {
    id: "sniper",
    title: "Sniper rifle",
    is_automatic: false,
    shoot_cooldown: 90,
    reload_cooldown: 180,
    max_ammo: 5,
    spread_stand: to_fixed(0.005),
    spread_walk: to_fixed(0.05),
    spread_run: to_fixed(0.15),
    spread_sprint: to_fixed(0.3),
    projectile: &P308_LAPUA,
    pellets: 1,
    sprite: SPRITE_SNIPER,
    length_multiplier: to_fixed(1.25),
};

/// Every weapon, in menu order.
pub static WEAPON_TYPES: [&WeaponType; 7] = [&PISTOL, &UZI, &MP5, &SHOTGUN, &M4, &AK47, &SNIPER];

/// Look up a weapon type by id.
pub fn weapon_type(id: &str) -> Option<&'static WeaponType> {
    WEAPON_TYPES.iter().copied().find(|w| w.id == id)
}

// =============================================================================
// WEAPON
// =============================================================================

/// Where and how a shot leaves the weapon.
#[derive(Clone, Copy, Debug)]
pub struct Muzzle {
    pub owner: ActorId,
    /// Projectile spawn point (the shooter's centre).
    pub origin: FixedVec2,
    pub rotation: Fixed,
    pub stance: Stance,
}

/// One actor's weapon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Weapon {
    pub kind: &'static WeaponType,
    pub ammo: i32,
    pub is_ready_to_fire: bool,
    pub is_reloaded: bool,
    /// Ticks until the next shot.
    pub cooldown: u32,
    /// Ticks until the reload completes.
    pub reload_cooldown: u32,
}

impl Weapon {
    /// Fully loaded weapon.
    pub fn new(kind: &'static WeaponType) -> Self {
        Self {
            kind,
            ammo: kind.max_ammo,
            is_ready_to_fire: true,
            is_reloaded: true,
            cooldown: 0,
            reload_cooldown: 0,
        }
    }

    /// Is a reload in progress.
    #[inline]
    pub fn is_reloading(&self) -> bool {
        !self.is_reloaded
    }

    /// Fire one shot.
    ///
    /// Does nothing with an empty magazine, during a reload or during the
    /// post-shot cooldown. Otherwise spends one round and returns one
    /// projectile per pellet, each rotated randomly within the stance spread.
    pub fn fire(&mut self, muzzle: &Muzzle, rng: &mut DeterministicRng) -> Vec<Projectile> {
        if self.ammo <= 0 || !self.is_reloaded || !self.is_ready_to_fire {
            return Vec::new();
        }

        self.is_ready_to_fire = false;
        self.cooldown = self.kind.shoot_cooldown;
        self.ammo -= 1;

        let spread = self.kind.spread(muzzle.stance);
        let kind = self.kind.projectile;
        (0..self.kind.pellets)
            .map(|_| {
                let rotation = muzzle.rotation - spread / 2 + rng.next_fixed(spread);
                let speed = kind.speed + rng.next_fixed(kind.speed_rnd);
                Projectile::new(kind, muzzle.origin, rotation, speed)
                    .scaled(self.kind.length_multiplier)
                    .owned_by(muzzle.owner)
            })
            .collect()
    }

    /// Start a reload unless one is already running.
    pub fn reload(&mut self) {
        if self.is_reloaded {
            self.is_reloaded = false;
            self.reload_cooldown = self.kind.reload_cooldown;
        }
    }

    /// Advance cooldowns by one tick.
    ///
    /// The magazine refills on the tick the reload counter goes from 1 to 0;
    /// the weapon counts as reloaded from the following tick.
    pub fn tick_cooldown(&mut self) {
        if self.cooldown > 0 {
            self.cooldown -= 1;
        } else {
            self.is_ready_to_fire = true;
        }

        match self.reload_cooldown {
            0 => self.is_reloaded = true,
            1 => {
                self.ammo = self.kind.max_ammo;
                self.reload_cooldown = 0;
            }
            _ => self.reload_cooldown -= 1,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn muzzle(stance: Stance) -> Muzzle {
        Muzzle {
            owner: ActorId(Uuid::from_u128(7)),
            origin: FixedVec2::from_ints(16, 16),
            rotation: 0,
            stance,
        }
    }

    /// Fire, then tick until ready again.
    fn fire_and_recover(weapon: &mut Weapon, rng: &mut DeterministicRng) -> usize {
        let shots = weapon.fire(&muzzle(Stance::Standing), rng).len();
        for _ in 0..=weapon.kind.shoot_cooldown {
            weapon.tick_cooldown();
        }
        shots
    }

    #[test]
    fn test_catalog() {
        assert_eq!(WEAPON_TYPES.len(), 7);
        assert_eq!(weapon_type("shotgun").unwrap().pellets, 8);
        assert_eq!(weapon_type("m4").unwrap().max_ammo, 30);
        assert!(weapon_type("railgun").is_none());
        for w in WEAPON_TYPES {
            assert!(w.spread_stand < w.spread_walk);
            assert!(w.spread_walk < w.spread_run);
            assert!(w.spread_run < w.spread_sprint);
        }
    }

    #[test]
    fn test_stance_from_controller() {
        let mut c = Controller::default();
        assert_eq!(Stance::of(&c), Stance::Standing);
        c.is_moving_left = true;
        assert_eq!(Stance::of(&c), Stance::Walking);
        c.is_sprinting = true;
        assert_eq!(Stance::of(&c), Stance::Walking);
        c.is_moving_forward = true;
        assert_eq!(Stance::of(&c), Stance::Sprinting);
        c.is_sprinting = false;
        assert_eq!(Stance::of(&c), Stance::Running);
    }

    #[test]
    fn test_magazine_empties_then_fire_is_noop() {
        let mut rng = DeterministicRng::new(1);
        let mut weapon = Weapon::new(&M4);
        for _ in 0..30 {
            assert_eq!(fire_and_recover(&mut weapon, &mut rng), 1);
        }
        assert_eq!(weapon.ammo, 0);
        for _ in 0..5 {
            assert_eq!(fire_and_recover(&mut weapon, &mut rng), 0);
        }
        assert_eq!(weapon.ammo, 0);
    }

    #[test]
    fn test_cooldown_blocks_second_shot() {
        let mut rng = DeterministicRng::new(2);
        let mut weapon = Weapon::new(&PISTOL);
        assert_eq!(weapon.fire(&muzzle(Stance::Standing), &mut rng).len(), 1);
        assert!(weapon.fire(&muzzle(Stance::Standing), &mut rng).is_empty());
        assert_eq!(weapon.ammo, 16);
    }

    #[test]
    fn test_reload_refills_on_last_cooldown_tick() {
        let mut rng = DeterministicRng::new(3);
        let mut weapon = Weapon::new(&M4);
        weapon.fire(&muzzle(Stance::Standing), &mut rng);
        weapon.ammo = 0;

        weapon.reload();
        assert!(weapon.is_reloading());
        for _ in 0..M4.reload_cooldown - 1 {
            weapon.tick_cooldown();
            assert_eq!(weapon.ammo, 0);
        }
        assert_eq!(weapon.reload_cooldown, 1);

        weapon.tick_cooldown();
        assert_eq!(weapon.ammo, 30);
        assert!(weapon.is_reloading());

        weapon.tick_cooldown();
        assert!(!weapon.is_reloading());
    }

    #[test]
    fn test_reload_while_reloading_is_noop() {
        let mut weapon = Weapon::new(&PISTOL);
        weapon.reload();
        weapon.tick_cooldown();
        weapon.tick_cooldown();
        let remaining = weapon.reload_cooldown;
        weapon.reload();
        assert_eq!(weapon.reload_cooldown, remaining);
    }

    #[test]
    fn test_fire_during_reload_is_noop() {
        let mut rng = DeterministicRng::new(4);
        let mut weapon = Weapon::new(&PISTOL);
        weapon.reload();
        assert!(weapon.fire(&muzzle(Stance::Standing), &mut rng).is_empty());
        assert_eq!(weapon.ammo, 17);
    }

    #[test]
    fn test_shotgun_pellets_within_spread() {
        let mut rng = DeterministicRng::new(5);
        let mut weapon = Weapon::new(&SHOTGUN);
        let m = muzzle(Stance::Sprinting);
        let pellets = weapon.fire(&m, &mut rng);
        assert_eq!(pellets.len(), 8);
        assert_eq!(weapon.ammo, 7);

        let half = SHOTGUN.spread_sprint / 2;
        for p in &pellets {
            assert!(p.rotation >= -half && p.rotation < half);
            assert!(p.speed >= G12.speed && p.speed < G12.speed + G12.speed_rnd);
            assert_eq!(p.owner, Some(m.owner));
            assert_eq!(p.position, m.origin);
        }
    }

    #[test]
    fn test_length_multiplier_applies() {
        let mut rng = DeterministicRng::new(6);
        let mut weapon = Weapon::new(&SNIPER);
        let shot = weapon.fire(&muzzle(Stance::Standing), &mut rng);
        assert_eq!(shot[0].damage, 10);
        assert_eq!(shot[0].length, to_fixed(60.0));
    }
}
