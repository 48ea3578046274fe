//! Simulated players and offline-mode identities.

use hashbrown::HashMap;
use regions_core::{IdentityResolver, Location, PlayerHandle, Profile};
use tracing::info;
use uuid::Uuid;

/// A connected player driven from the console.
#[derive(Clone, Debug)]
pub struct SimPlayer {
    pub profile: Profile,
    pub location: Location,
    pub master_key: bool,
}

impl SimPlayer {
    #[must_use]
    pub const fn new(profile: Profile, location: Location) -> Self {
        Self {
            profile,
            location,
            master_key: false,
        }
    }
}

impl PlayerHandle for SimPlayer {
    fn user_id(&self) -> Uuid {
        self.profile.id
    }

    fn location(&self) -> Location {
        self.location
    }

    fn has_master_key(&self) -> bool {
        self.master_key
    }

    fn teleport(&mut self, to: Location) {
        info!(
            "{} may not go there; sent back to ({:.1}, {:.1}, {:.1})",
            self.profile.name, to.x, to.y, to.z
        );
        self.location = to;
    }
}

/// Offline-mode identity provider.
///
/// Ids are derived from the player name, and a name only resolves once that
/// player has joined at least once.
#[derive(Debug, Default)]
pub struct OfflineIdentities {
    /// Lowercased name to profile.
    known: HashMap<String, Profile>,
}

impl OfflineIdentities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic id for a player name.
    #[must_use]
    pub fn offline_id(name: &str) -> Uuid {
        Uuid::new_v3(&Uuid::NAMESPACE_OID, format!("OfflinePlayer:{name}").as_bytes())
    }

    /// Record a joining player, returning their profile.
    pub fn issue(&mut self, name: &str) -> Profile {
        self.known
            .entry(name.to_ascii_lowercase())
            .or_insert_with(|| Profile::new(Self::offline_id(name), name))
            .clone()
    }

    /// Remember a profile seen elsewhere, e.g. in a loaded membership.
    pub fn remember(&mut self, profile: Profile) {
        self.known.insert(profile.name.to_ascii_lowercase(), profile);
    }
}

impl IdentityResolver for OfflineIdentities {
    fn resolve_name(&self, name: &str) -> Option<Profile> {
        self.known.get(&name.to_ascii_lowercase()).cloned()
    }

    fn resolve_id(&self, id: Uuid) -> Option<Profile> {
        self.known.values().find(|p| p.id == id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_stable_per_name() {
        let mut identities = OfflineIdentities::new();
        let first = identities.issue("Steve");
        let again = identities.issue("steve");

        assert_eq!(first, again);
        assert_eq!(first.id, OfflineIdentities::offline_id("Steve"));
        assert_ne!(first.id, OfflineIdentities::offline_id("Alex"));
    }

    #[test]
    fn test_unknown_names_do_not_resolve() {
        let mut identities = OfflineIdentities::new();
        assert!(identities.resolve_name("nobody").is_none());

        let steve = identities.issue("Steve");
        assert_eq!(identities.resolve_name("STEVE"), Some(steve.clone()));
        assert_eq!(identities.resolve_id(steve.id), Some(steve));
    }
}
