//! Users, identities and the online/offline user registry.
//!
//! Connected players are held strongly for as long as they are online.
//! Everyone else (offline users referenced by a membership, or looked up by
//! a command) lives in a weak cache: the entry survives while something
//! still holds the [`Arc<User>`], and is recreated on demand afterwards.

use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;
use uuid::Uuid;

use crate::id::WorldId;

/// A stable identity as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
}

impl Profile {
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Resolves user-typed names and stored ids to profiles.
pub trait IdentityResolver {
    /// Look up a player by name. `None` if no such identity exists.
    fn resolve_name(&self, name: &str) -> Option<Profile>;

    /// Look up a player by id.
    fn resolve_id(&self, id: Uuid) -> Option<Profile>;
}

/// A user known to the manager.
#[derive(Debug)]
pub struct User {
    id: Uuid,
    /// Last display name seen; players can rename between sessions.
    name: RwLock<String>,
}

impl User {
    fn new(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            name: RwLock::new(profile.name.clone()),
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    fn refresh_name(&self, name: &str) {
        if *self.name.read() != name {
            *self.name.write() = name.to_owned();
        }
    }
}

/// A position in a world, with facing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub world: WorldId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Location {
    #[must_use]
    pub const fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self {
            world,
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Block coordinates containing this location.
    #[must_use]
    pub fn block(&self) -> (i32, i32, i32) {
        (
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    /// This location with another location's facing.
    #[must_use]
    pub const fn with_facing_of(self, other: &Self) -> Self {
        Self {
            yaw: other.yaw,
            pitch: other.pitch,
            ..self
        }
    }
}

/// Per-session state of a connected user.
#[derive(Debug)]
pub struct OnlineUser {
    user: Arc<User>,
    /// Where the user was at the end of the last accepted tick.
    pub previous_location: Option<Location>,
}

impl OnlineUser {
    #[must_use]
    pub fn user(&self) -> &Arc<User> {
        &self.user
    }
}

/// Cache size below which dead entries are left alone.
const PURGE_FLOOR: usize = 64;

/// Registry of every user the manager knows about.
#[derive(Debug, Default)]
pub struct UserRegistry {
    cache: HashMap<Uuid, Weak<User>, FxBuildHasher>,
    online: HashMap<Uuid, OnlineUser, FxBuildHasher>,
    /// Cache length that triggers the next purge on a miss.
    purge_at: usize,
}

impl UserRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The user for a profile, reusing a live cached instance when there is one.
    ///
    /// The same id always yields the same `User` while any holder keeps it alive.
    pub fn get_user(&mut self, profile: &Profile) -> Arc<User> {
        if let Some(user) = self.cache.get(&profile.id).and_then(Weak::upgrade) {
            user.refresh_name(&profile.name);
            return user;
        }

        if self.cache.len() >= self.purge_at {
            self.purge();
            self.purge_at = (self.cache.len() * 2).max(PURGE_FLOOR);
        }

        let user = Arc::new(User::new(profile));
        self.cache.insert(profile.id, Arc::downgrade(&user));
        user
    }

    /// A cached user by id, if still alive.
    #[must_use]
    pub fn cached_user(&self, id: Uuid) -> Option<Arc<User>> {
        self.cache.get(&id).and_then(Weak::upgrade)
    }

    /// Find a user by id, consulting the identity provider on a cache miss.
    pub fn find_user(
        &mut self,
        id: Uuid,
        resolver: &dyn IdentityResolver,
    ) -> Option<Arc<User>> {
        if let Some(user) = self.cached_user(id) {
            return Some(user);
        }
        let profile = resolver.resolve_id(id)?;
        Some(self.get_user(&profile))
    }

    /// Resolve a user-typed name to a user.
    pub fn find_user_by_name(
        &mut self,
        name: &str,
        resolver: &dyn IdentityResolver,
    ) -> Option<Arc<User>> {
        let profile = resolver.resolve_name(name)?;
        Some(self.get_user(&profile))
    }

    /// Register a connected player.
    pub fn connect(&mut self, profile: &Profile) -> Arc<User> {
        let user = self.get_user(profile);
        self.online.insert(
            profile.id,
            OnlineUser {
                user: Arc::clone(&user),
                previous_location: None,
            },
        );
        tracing::debug!("user {} ({}) connected", profile.name, profile.id);
        user
    }

    /// Forget a disconnected player. The user stays cached while referenced.
    pub fn disconnect(&mut self, id: Uuid) -> Option<Arc<User>> {
        let online = self.online.remove(&id)?;
        self.purge();
        Some(online.user)
    }

    #[must_use]
    pub fn online_user(&self, id: Uuid) -> Option<&OnlineUser> {
        self.online.get(&id)
    }

    pub fn online_user_mut(&mut self, id: Uuid) -> Option<&mut OnlineUser> {
        self.online.get_mut(&id)
    }

    pub fn online_users(&self) -> impl Iterator<Item = &OnlineUser> {
        self.online.values()
    }

    /// Every cached user that is still alive.
    #[must_use]
    pub fn cached_users(&self) -> Vec<Arc<User>> {
        self.cache.values().filter_map(Weak::upgrade).collect()
    }

    /// Drop cache entries nobody holds anymore.
    pub fn purge(&mut self) -> usize {
        let before = self.cache.len();
        self.cache.retain(|_, user| user.strong_count() > 0);
        before - self.cache.len()
    }
}
