//! Command execution against the live manager.

use eyre::{bail, eyre};
use regions_core::{
    AreaId, DocumentStore, Location, RegionBox, RegionId, RegionManager, TickReport, WorldId,
};
use tracing::{debug, info, warn};

use crate::commands::{AreaAction, AreaTarget, Candidates, Change, Command, HELP};
use crate::players::{OfflineIdentities, SimPlayer};

/// Regions shown per page of `region list`.
pub const REGIONS_PER_PAGE: usize = 20;

/// What the tick loop should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The manager together with everything the console drives.
pub struct Server<S: DocumentStore> {
    manager: RegionManager,
    store: S,
    identities: OfflineIdentities,
    players: Vec<SimPlayer>,
}

impl<S: DocumentStore> Server<S> {
    pub fn new(manager: RegionManager, store: S) -> Self {
        let mut identities = OfflineIdentities::new();
        for user in manager.users().cached_users() {
            identities.remember(regions_core::Profile::new(user.id(), user.name()));
        }

        Self {
            manager,
            store,
            identities,
            players: Vec::new(),
        }
    }

    #[must_use]
    pub const fn manager(&self) -> &RegionManager {
        &self.manager
    }

    #[must_use]
    pub fn players(&self) -> &[SimPlayer] {
        &self.players
    }

    /// One enforcement pass over the connected players.
    pub fn tick(&mut self) -> TickReport {
        regions_core::tick(&mut self.manager, &mut self.players)
    }

    /// Write areas changed since the last save.
    pub fn save_dirty(&mut self) -> eyre::Result<usize> {
        Ok(self.manager.save_dirty(&mut self.store)?)
    }

    /// Names offered by console completion.
    #[must_use]
    pub fn candidates(&self) -> Candidates {
        Candidates {
            worlds: self.manager.worlds().map(|w| w.name().to_owned()).collect(),
            regions: self.manager.regions().map(|r| r.name().to_owned()).collect(),
            players: self.players.iter().map(|p| p.profile.name.clone()).collect(),
        }
    }

    /// Run a command, returning the lines to show.
    pub fn execute(&mut self, command: Command) -> eyre::Result<(Flow, Vec<String>)> {
        let lines = match command {
            Command::Area { target, action } => {
                let area = self.resolve_target(&target)?;
                self.area_action(area, action)?
            }
            Command::RegionAdd {
                name,
                world,
                corners: [a, b],
            } => {
                let world = self.resolve_world(&world)?;
                let bounds = RegionBox::from_corners(a, b);
                self.manager.register_new_region(&name, world, bounds)?;
                vec![format!("Region {name} created at {bounds}")]
            }
            Command::RegionRemove { name } => match self.manager.remove_region(&name) {
                Some(region) => vec![format!("Region {} removed", region.name())],
                None => bail!("no region named {name}"),
            },
            Command::RegionRelocate {
                name,
                world,
                corners: [a, b],
            } => {
                let id = self.resolve_region(&name)?;
                let world = self.resolve_world(&world)?;
                let bounds = RegionBox::from_corners(a, b);
                self.manager.relocate_region(id, world, bounds)?;
                vec![format!("Region {name} moved to {bounds}")]
            }
            Command::RegionParent {
                name,
                change,
                parent,
            } => {
                let child = self.resolve_region(&name)?;
                let parent_id = self.resolve_region(&parent)?;
                let changed = match change {
                    Change::Add => self.manager.add_parent(child, parent_id)?,
                    Change::Remove => self.manager.remove_parent(child, parent_id)?,
                };
                vec![if changed {
                    format!("Updated parents of {name}")
                } else {
                    format!("Parents of {name} unchanged")
                }]
            }
            Command::RegionList { page } => self.region_list(page),
            Command::Join {
                player,
                world,
                position: (x, y, z),
            } => {
                let world = self.resolve_world(&world)?;
                if self.find_player(&player).is_some() {
                    bail!("{player} is already online");
                }
                let profile = self.identities.issue(&player);
                self.manager.users_mut().connect(&profile);
                let name = profile.name.clone();
                self.players
                    .push(SimPlayer::new(profile, Location::new(world, x, y, z)));
                vec![format!("{name} joined")]
            }
            Command::Leave { player } => {
                let index = self.player_index(&player)?;
                let left = self.players.swap_remove(index);
                self.manager.users_mut().disconnect(left.profile.id);
                vec![format!("{} left", left.profile.name)]
            }
            Command::Move {
                player,
                position: (x, y, z),
            } => {
                let index = self.player_index(&player)?;
                let p = &mut self.players[index];
                p.location = Location {
                    x,
                    y,
                    z,
                    ..p.location
                };
                vec![format!("{} is moving to ({x}, {y}, {z})", p.profile.name)]
            }
            Command::Op { player } => {
                let index = self.player_index(&player)?;
                let p = &mut self.players[index];
                p.master_key = !p.master_key;
                vec![format!(
                    "{} {} the master key",
                    p.profile.name,
                    if p.master_key { "now holds" } else { "no longer holds" }
                )]
            }
            Command::Save => {
                let written = self.manager.save_all(&mut self.store)?;
                vec![format!("Saved {written} documents")]
            }
            Command::Help => {
                let mut lines = vec!["Commands:".to_owned()];
                lines.extend(HELP.iter().map(|h| format!("  {h}")));
                lines
            }
            Command::Quit => return Ok((Flow::Quit, vec!["Shutting down...".to_owned()])),
        };

        Ok((Flow::Continue, lines))
    }

    fn area_action(&mut self, area: AreaId, action: AreaAction) -> eyre::Result<Vec<String>> {
        let label = self.manager.area_label(area);

        let line = match action {
            AreaAction::Info => {
                let doc = self.manager.area_document(area)?;
                return Ok(serde_json::to_string_pretty(&doc)?
                    .lines()
                    .map(str::to_owned)
                    .collect());
            }
            AreaAction::Protection(change, protection) => {
                let target = self.manager.area_mut(area)?;
                let changed = match change {
                    Change::Add => target.add_protections([protection]),
                    Change::Remove => target.remove_protections([protection]),
                };
                outcome(changed, &label, format_args!("protection {protection}"))
            }
            AreaAction::Role(Change::Add, role) => {
                self.manager.area_mut(area)?.register_new_role(&role)?;
                format!("{label}: role {role} created")
            }
            AreaAction::Role(Change::Remove, role) => {
                match self.manager.area_mut(area)?.remove_role(&role)? {
                    Some(_) => format!("{label}: role {role} deleted"),
                    None => bail!("{label} has no role {role}"),
                }
            }
            AreaAction::RolePermission {
                role,
                change,
                permission,
            } => {
                let target = self.manager.area_mut(area)?;
                let changed = match change {
                    Change::Add => target.add_permissions_to_role(&role, [permission])?,
                    Change::Remove => target.remove_permissions_from_role(&role, [permission])?,
                };
                outcome(changed, &label, format_args!("role {role} permission {permission}"))
            }
            AreaAction::Member(Change::Add, name) => {
                let user = self
                    .manager
                    .users_mut()
                    .find_user_by_name(&name, &self.identities)
                    .ok_or_else(|| eyre!("unknown player {name}"))?;
                let member = self.manager.area_mut(area)?.add_member(user)?;
                format!("{label}: {} is now a member", member.name())
            }
            AreaAction::Member(Change::Remove, name) => {
                let target = self.manager.area_mut(area)?;
                let id = target
                    .find_member_by_name(&name)
                    .map(regions_core::Member::id)
                    .ok_or_else(|| eyre!("{name} is not a member of {label}"))?;
                target.remove_member(id);
                format!("{label}: {name} is no longer a member")
            }
            AreaAction::MemberRole { user, change, role } => {
                let target = self.manager.area_mut(area)?;
                let id = target
                    .find_member_by_name(&user)
                    .map(regions_core::Member::id)
                    .ok_or_else(|| eyre!("{user} is not a member of {label}"))?;
                let changed = match change {
                    Change::Add => target.add_role_to_member(id, &role)?,
                    Change::Remove => target.remove_role_from_member(id, &role)?,
                };
                outcome(changed, &label, format_args!("{user} role {role}"))
            }
        };

        debug!("{line}");
        Ok(vec![line])
    }

    fn region_list(&self, page: usize) -> Vec<String> {
        let listing = self.manager.list_regions(page, REGIONS_PER_PAGE);
        let mut lines = vec![format!(
            "Regions ({} total) page {}/{}",
            listing.total, listing.page, listing.pages
        )];
        for region in listing.regions {
            let world = self
                .manager
                .world(region.world())
                .map_or("?", |w| w.name());
            lines.push(format!("  {} [{world}] {}", region.name(), region.bounds()));
        }
        lines
    }

    fn resolve_target(&self, target: &AreaTarget) -> eyre::Result<AreaId> {
        Ok(match target {
            AreaTarget::World(name) => AreaId::World(self.resolve_world(name)?),
            AreaTarget::Region(name) => AreaId::Region(self.resolve_region(name)?),
        })
    }

    fn resolve_world(&self, name: &str) -> eyre::Result<WorldId> {
        self.manager
            .get_region_world(name)
            .ok_or_else(|| eyre!("no world named {name}"))
    }

    fn resolve_region(&self, name: &str) -> eyre::Result<RegionId> {
        self.manager
            .get_region(name)
            .ok_or_else(|| eyre!("no region named {name}"))
    }

    fn find_player(&self, name: &str) -> Option<usize> {
        self.players
            .iter()
            .position(|p| p.profile.name.eq_ignore_ascii_case(name))
    }

    fn player_index(&self, name: &str) -> eyre::Result<usize> {
        self.find_player(name)
            .ok_or_else(|| eyre!("{name} is not online"))
    }

    /// Save everything before shutdown, logging rather than failing.
    pub fn shutdown(&mut self) {
        match self.manager.save_all(&mut self.store) {
            Ok(written) => info!("Saved {written} documents"),
            Err(e) => warn!("Failed to save on shutdown: {e}"),
        }
    }
}

fn outcome(changed: bool, label: &str, what: std::fmt::Arguments<'_>) -> String {
    if changed {
        format!("{label}: updated {what}")
    } else {
        format!("{label}: {what} unchanged")
    }
}
