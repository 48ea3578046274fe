//! Per-tick movement enforcement.
//!
//! Once per tick every online player's current position is compared with
//! the last accepted one. Crossing from one area into another needs `exit`
//! on the area being left and `entrance` on the area being entered. A
//! denied crossing teleports the player back, keeping the facing they have
//! now, and the accepted position stays where it was.

use uuid::Uuid;

use crate::manager::RegionManager;
use crate::permission::Permission;
use crate::user::Location;

/// A connected player as seen by the host.
pub trait PlayerHandle {
    fn user_id(&self) -> Uuid;

    fn location(&self) -> Location;

    /// Administrative override: skips every check.
    fn has_master_key(&self) -> bool;

    fn teleport(&mut self, to: Location);
}

/// What one enforcement pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Players whose movement was evaluated.
    pub checked: usize,
    /// Players sent back to their previous location.
    pub denied: usize,
}

/// Run one enforcement pass over `players`.
///
/// Players not registered as online in the manager are skipped.
pub fn tick<P: PlayerHandle>(manager: &mut RegionManager, players: &mut [P]) -> TickReport {
    let mut report = TickReport::default();

    for player in players.iter_mut() {
        let id = player.user_id();
        let Some(previous) = manager
            .users()
            .online_user(id)
            .map(|online| online.previous_location)
        else {
            tracing::trace!("skipping {id}: not online");
            continue;
        };
        report.checked += 1;

        let current = player.location();
        let accepted = match previous {
            Some(previous) if !player.has_master_key() => {
                crossing_allowed(manager, id, &previous, &current)
            }
            _ => true,
        };

        if accepted {
            if let Some(online) = manager.users_mut().online_user_mut(id) {
                online.previous_location = Some(current);
            }
        } else if let Some(previous) = previous {
            player.teleport(previous.with_facing_of(&current));
            report.denied += 1;
        }
    }

    report
}

fn crossing_allowed(manager: &RegionManager, user: Uuid, from: &Location, to: &Location) -> bool {
    let (fx, fy, fz) = from.block();
    let (tx, ty, tz) = to.block();
    let (Some(from_area), Some(to_area)) = (
        manager.area_at(from.world, fx, fy, fz),
        manager.area_at(to.world, tx, ty, tz),
    ) else {
        // Worlds the manager does not know are not enforced.
        return true;
    };

    if from_area == to_area {
        return true;
    }

    let allowed = manager.permits(from_area, user, Permission::Exit)
        && manager.permits(to_area, user, Permission::Entrance);
    if !allowed {
        tracing::debug!(
            "denied {user} crossing {} -> {}",
            manager.area_label(from_area),
            manager.area_label(to_area)
        );
    }
    allowed
}
