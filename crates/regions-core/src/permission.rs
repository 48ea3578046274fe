//! Permission and protection kinds, and the flag sets holding them.
//!
//! Permissions are per-user capabilities granted through roles. Protections
//! are environmental flags on an area that apply to everyone.
//!
//! Each kind is a variant of a plain enum (what commands and callers name)
//! and a single bit of a `bitflags` set (what roles and areas store):
//!
//! ```text
//! Permission::Build ──flag()──► PermissionSet::BUILD  (1 << 2)
//!        ▲                              │
//!        └──────── from_key("build") ◄──┘ from_name("BUILD")
//! ```
//!
//! The bit of a kind is its discriminant, so a 33rd kind overflows the
//! `u32` shift and fails to compile.

use std::fmt;

use bitflags::bitflags;

macro_rules! kinds {
    (
        $(#[$meta:meta])*
        pub enum $name:ident in $set:ident {
            $($(#[$variant_meta:meta])* $variant:ident = $flag:ident => $key:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$variant_meta])* $variant,)+
        }

        bitflags! {
            #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
            pub struct $set: u32 {
                $(const $flag = 1 << ($name::$variant as u32);)+
            }
        }

        impl $name {
            /// Every kind, in bit order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Stable lowercase key used for persistence and command input.
            #[must_use]
            pub const fn key(self) -> &'static str {
                match self {
                    $(Self::$variant => $key,)+
                }
            }

            #[must_use]
            pub const fn flag(self) -> $set {
                match self {
                    $(Self::$variant => $set::$flag,)+
                }
            }

            /// Look up a kind by key, ignoring ASCII case.
            #[must_use]
            pub fn from_key(key: &str) -> Option<Self> {
                $set::from_name(&key.to_ascii_uppercase()).and_then(Self::from_flag)
            }

            fn from_flag(flag: $set) -> Option<Self> {
                Self::ALL.iter().copied().find(|kind| kind.flag() == flag)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.key())
            }
        }

        impl From<$name> for $set {
            fn from(kind: $name) -> Self {
                kind.flag()
            }
        }

        impl FromIterator<$name> for $set {
            fn from_iter<I: IntoIterator<Item = $name>>(iter: I) -> Self {
                iter.into_iter().map($name::flag).collect()
            }
        }

        impl $set {
            #[must_use]
            pub const fn has(self, kind: $name) -> bool {
                self.contains(kind.flag())
            }

            /// Insert every kind. Returns `true` if the set changed.
            pub fn insert_kinds(&mut self, kinds: impl IntoIterator<Item = $name>) -> bool {
                let before = *self;
                self.insert(kinds.into_iter().collect());
                *self != before
            }

            /// Remove every kind. Returns `true` if the set changed.
            pub fn remove_kinds(&mut self, kinds: impl IntoIterator<Item = $name>) -> bool {
                let before = *self;
                self.remove(kinds.into_iter().collect());
                *self != before
            }

            /// Members in bit order.
            pub fn kinds(self) -> impl Iterator<Item = $name> {
                self.iter_names().filter_map(|(_, flag)| $name::from_flag(flag))
            }
        }

        impl fmt::Display for $set {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("[")?;
                for (i, kind) in self.kinds().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(kind.key())?;
                }
                f.write_str("]")
            }
        }
    };
}

kinds! {
    /// A per-user action checked against the roles of an area.
    pub enum Permission in PermissionSet {
        /// Move into the area.
        Entrance = ENTRANCE => "entrance",
        /// Move out of the area.
        Exit = EXIT => "exit",
        /// Place blocks.
        Build = BUILD => "build",
        /// Break blocks.
        Break = BREAK => "break",
        /// Use doors, buttons, containers.
        Interaction = INTERACTION => "interaction",
        EntityInteraction = ENTITY_INTERACTION => "entity_interaction",
        AttackEntity = ATTACK_ENTITY => "attack_entity",
        AttackPlayer = ATTACK_PLAYER => "attack_player",
        ProjectileLaunch = PROJECTILE_LAUNCH => "projectile_launch",
        ItemDrop = ITEM_DROP => "item_drop",
        ItemPickup = ITEM_PICKUP => "item_pickup",
        BucketFill = BUCKET_FILL => "bucket_fill",
        BucketEmpty = BUCKET_EMPTY => "bucket_empty",
        Vehicle = VEHICLE => "vehicle",
    }
}

kinds! {
    /// An environmental flag that applies regardless of who is involved.
    pub enum Protection in ProtectionSet {
        Damage = DAMAGE => "damage",
        Pvp = PVP => "pvp",
        ExplosionDamage = EXPLOSION_DAMAGE => "explosion_damage",
        /// Blocks are not destroyed by block explosions (beds, respawn anchors).
        BlockExplosion = BLOCK_EXPLOSION => "block_explosion",
        /// Blocks are not destroyed by entity explosions (creepers, tnt).
        EntityExplosion = ENTITY_EXPLOSION => "entity_explosion",
        FireSpread = FIRE_SPREAD => "fire_spread",
        BlockBurn = BLOCK_BURN => "block_burn",
        BlockFade = BLOCK_FADE => "block_fade",
        BlockForm = BLOCK_FORM => "block_form",
        BlockGrow = BLOCK_GROW => "block_grow",
        BlockSpread = BLOCK_SPREAD => "block_spread",
        LeavesDecay = LEAVES_DECAY => "leaves_decay",
        LiquidFlow = LIQUID_FLOW => "liquid_flow",
        /// Mobs do not spawn naturally.
        CreatureSpawn = CREATURE_SPAWN => "creature_spawn",
        MobGriefing = MOB_GRIEFING => "mob_griefing",
    }
}
