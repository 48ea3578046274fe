//! Console command parsing and completion.
//!
//! Parsing turns a line into a typed [`Command`] or a [`ParseError`]; names
//! stay strings here and are resolved against the manager when executed.
//! Completion walks the same grammar to offer candidates for the last token.

use regions_core::{Permission, Protection};
use thiserror::Error;

/// Add or remove.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Change {
    Add,
    Remove,
}

impl Change {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// An area named on the command line: `world:<name>` or `region:<name>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AreaTarget {
    World(String),
    Region(String),
}

impl AreaTarget {
    fn parse(token: &str) -> Option<Self> {
        let (kind, name) = token.split_once(':')?;
        if name.is_empty() {
            return None;
        }
        match kind.to_ascii_lowercase().as_str() {
            "world" => Some(Self::World(name.to_owned())),
            "region" => Some(Self::Region(name.to_owned())),
            _ => None,
        }
    }
}

/// Edits and queries on one area.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AreaAction {
    Info,
    Protection(Change, Protection),
    Role(Change, String),
    RolePermission {
        role: String,
        change: Change,
        permission: Permission,
    },
    Member(Change, String),
    MemberRole {
        user: String,
        change: Change,
        role: String,
    },
}

/// A block position as typed: two corners of a box.
pub type Corners = [(i32, i32, i32); 2];

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Area {
        target: AreaTarget,
        action: AreaAction,
    },
    RegionAdd {
        name: String,
        world: String,
        corners: Corners,
    },
    RegionRemove {
        name: String,
    },
    RegionRelocate {
        name: String,
        world: String,
        corners: Corners,
    },
    RegionParent {
        name: String,
        change: Change,
        parent: String,
    },
    RegionList {
        page: usize,
    },
    Join {
        player: String,
        world: String,
        position: (f64, f64, f64),
    },
    Leave {
        player: String,
    },
    Move {
        player: String,
        position: (f64, f64, f64),
    },
    Op {
        player: String,
    },
    Save,
    Quit,
    Help,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command: '{0}'. Type 'help' for commands.")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("not an area (expected world:<name> or region:<name>): {0}")]
    Target(String),

    #[error("unknown permission: {0}")]
    Permission(String),

    #[error("unknown protection: {0}")]
    Protection(String),

    #[error("not a number: {0}")]
    Number(String),
}

pub const HELP: &[&str] = &[
    "area <world:NAME|region:NAME> info",
    "area <..> protection add|remove <protection>",
    "area <..> role add|remove <role>",
    "area <..> role permission <role> add|remove <permission>",
    "area <..> member add|remove <player>",
    "area <..> member role <player> add|remove <role>",
    "region add <name> <world> x1 y1 z1 x2 y2 z2",
    "region remove <name>",
    "region relocate <name> <world> x1 y1 z1 x2 y2 z2",
    "region parent <name> add|remove <parent>",
    "region list [page]",
    "join <player> <world> x y z",
    "leave <player>",
    "move <player> x y z",
    "op <player>",
    "save | quit | help",
];

const COMMANDS: &[&str] = &[
    "area", "region", "join", "leave", "move", "op", "save", "quit", "help",
];

/// Parse one console line.
pub fn parse(input: &str) -> Result<Command, ParseError> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    let Some((&head, rest)) = tokens.split_first() else {
        return Err(ParseError::Unknown(String::new()));
    };

    match head.to_ascii_lowercase().as_str() {
        "area" => parse_area(rest),
        "region" => parse_region(rest),
        "join" => match rest {
            [player, world, x, y, z] => Ok(Command::Join {
                player: (*player).to_owned(),
                world: (*world).to_owned(),
                position: (float(x)?, float(y)?, float(z)?),
            }),
            _ => Err(ParseError::Usage(HELP[11])),
        },
        "leave" => match rest {
            [player] => Ok(Command::Leave {
                player: (*player).to_owned(),
            }),
            _ => Err(ParseError::Usage(HELP[12])),
        },
        "move" => match rest {
            [player, x, y, z] => Ok(Command::Move {
                player: (*player).to_owned(),
                position: (float(x)?, float(y)?, float(z)?),
            }),
            _ => Err(ParseError::Usage(HELP[13])),
        },
        "op" => match rest {
            [player] => Ok(Command::Op {
                player: (*player).to_owned(),
            }),
            _ => Err(ParseError::Usage(HELP[14])),
        },
        "save" => Ok(Command::Save),
        "q" | "quit" | "exit" => Ok(Command::Quit),
        "help" | "h" | "?" => Ok(Command::Help),
        other => Err(ParseError::Unknown(other.to_owned())),
    }
}

fn parse_area(rest: &[&str]) -> Result<Command, ParseError> {
    const USAGE: &str = "area <world:NAME|region:NAME> info|protection|role|member ...";

    let [target, rest @ ..] = rest else {
        return Err(ParseError::Usage(USAGE));
    };
    let target = AreaTarget::parse(target).ok_or_else(|| ParseError::Target((*target).to_owned()))?;
    let lower: Vec<String> = rest.iter().map(|t| t.to_ascii_lowercase()).collect();
    let lower: Vec<&str> = lower.iter().map(String::as_str).collect();

    let action = match (lower.as_slice(), rest) {
        (["info"], _) => AreaAction::Info,
        (["protection", change, _], [.., key]) => AreaAction::Protection(
            Change::parse(change).ok_or(ParseError::Usage(HELP[1]))?,
            Protection::from_key(key).ok_or_else(|| ParseError::Protection((*key).to_owned()))?,
        ),
        (["role", "permission", _, change, _], [_, _, role, _, key]) => AreaAction::RolePermission {
            role: (*role).to_owned(),
            change: Change::parse(change).ok_or(ParseError::Usage(HELP[3]))?,
            permission: Permission::from_key(key)
                .ok_or_else(|| ParseError::Permission((*key).to_owned()))?,
        },
        (["role", change, _], [.., role]) => AreaAction::Role(
            Change::parse(change).ok_or(ParseError::Usage(HELP[2]))?,
            (*role).to_owned(),
        ),
        (["member", "role", _, change, _], [_, _, user, _, role]) => AreaAction::MemberRole {
            user: (*user).to_owned(),
            change: Change::parse(change).ok_or(ParseError::Usage(HELP[5]))?,
            role: (*role).to_owned(),
        },
        (["member", change, _], [.., user]) => AreaAction::Member(
            Change::parse(change).ok_or(ParseError::Usage(HELP[4]))?,
            (*user).to_owned(),
        ),
        _ => return Err(ParseError::Usage(USAGE)),
    };

    Ok(Command::Area { target, action })
}

fn parse_region(rest: &[&str]) -> Result<Command, ParseError> {
    const USAGE: &str = "region add|remove|relocate|parent|list ...";

    let Some((&sub, args)) = rest.split_first() else {
        return Err(ParseError::Usage(USAGE));
    };
    match sub.to_ascii_lowercase().as_str() {
        "add" => match args {
            [name, world, coords @ ..] if coords.len() == 6 => Ok(Command::RegionAdd {
                name: (*name).to_owned(),
                world: (*world).to_owned(),
                corners: corners(coords)?,
            }),
            _ => Err(ParseError::Usage(HELP[6])),
        },
        "remove" => match args {
            [name] => Ok(Command::RegionRemove {
                name: (*name).to_owned(),
            }),
            _ => Err(ParseError::Usage(HELP[7])),
        },
        "relocate" => match args {
            [name, world, coords @ ..] if coords.len() == 6 => Ok(Command::RegionRelocate {
                name: (*name).to_owned(),
                world: (*world).to_owned(),
                corners: corners(coords)?,
            }),
            _ => Err(ParseError::Usage(HELP[8])),
        },
        "parent" => match args {
            [name, change, parent] => Ok(Command::RegionParent {
                name: (*name).to_owned(),
                change: Change::parse(change).ok_or(ParseError::Usage(HELP[9]))?,
                parent: (*parent).to_owned(),
            }),
            _ => Err(ParseError::Usage(HELP[9])),
        },
        "list" => match args {
            [] => Ok(Command::RegionList { page: 1 }),
            [page] => Ok(Command::RegionList {
                page: page
                    .parse()
                    .map_err(|_| ParseError::Number((*page).to_owned()))?,
            }),
            _ => Err(ParseError::Usage(HELP[10])),
        },
        _ => Err(ParseError::Usage(USAGE)),
    }
}

fn corners(coords: &[&str]) -> Result<Corners, ParseError> {
    let mut v = [0i32; 6];
    for (slot, token) in v.iter_mut().zip(coords) {
        *slot = token
            .parse()
            .map_err(|_| ParseError::Number((*token).to_owned()))?;
    }
    Ok([(v[0], v[1], v[2]), (v[3], v[4], v[5])])
}

fn float(token: &str) -> Result<f64, ParseError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::Number(token.to_owned()))
}

// ==================== Completion ====================

/// Names the completer may offer. Rebuilt by the tick thread after each command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Candidates {
    pub worlds: Vec<String>,
    pub regions: Vec<String>,
    pub players: Vec<String>,
}

/// Completions for the last (possibly empty) token of `input`.
pub fn suggest(input: &str, candidates: &Candidates) -> Vec<String> {
    let mut tokens: Vec<&str> = input.split_whitespace().collect();
    let partial = if input.is_empty() || input.ends_with(char::is_whitespace) {
        ""
    } else {
        tokens.pop().unwrap_or("")
    };
    let lower: Vec<String> = tokens.iter().map(|t| t.to_ascii_lowercase()).collect();
    let lower: Vec<&str> = lower.iter().map(String::as_str).collect();

    let owned = |names: &[String]| names.to_vec();
    let fixed = |names: &[&str]| names.iter().map(|&n| n.to_owned()).collect::<Vec<_>>();
    let keys = |all: Vec<&'static str>| all.into_iter().map(str::to_owned).collect::<Vec<_>>();

    let options: Vec<String> = match lower.as_slice() {
        [] => fixed(COMMANDS),

        ["area"] => candidates
            .worlds
            .iter()
            .map(|w| format!("world:{w}"))
            .chain(candidates.regions.iter().map(|r| format!("region:{r}")))
            .collect(),
        ["area", _] => fixed(&["info", "protection", "role", "member"]),
        ["area", _, "protection"] | ["area", _, "member"] | ["area", _, "role"] => {
            let mut options = fixed(&["add", "remove"]);
            match lower[2] {
                "role" => options.push("permission".into()),
                "member" => options.push("role".into()),
                _ => {}
            }
            options
        }
        ["area", _, "protection", _] => keys(Protection::ALL.iter().map(|p| p.key()).collect()),
        ["area", _, "member", _] => owned(&candidates.players),
        ["area", _, "role", "permission", _] | ["area", _, "member", "role", _] => {
            fixed(&["add", "remove"])
        }
        ["area", _, "role", "permission", _, _] => {
            keys(Permission::ALL.iter().map(|p| p.key()).collect())
        }

        ["region"] => fixed(&["add", "remove", "relocate", "parent", "list"]),
        ["region", "remove" | "relocate" | "parent"] => owned(&candidates.regions),
        ["region", "add" | "relocate", _] => owned(&candidates.worlds),
        ["region", "parent", _] => fixed(&["add", "remove"]),
        ["region", "parent", _, _] => owned(&candidates.regions),

        ["join", _] => owned(&candidates.worlds),
        ["leave" | "move" | "op"] => owned(&candidates.players),

        _ => Vec::new(),
    };

    let prefix = partial.to_ascii_lowercase();
    let mut matches: Vec<String> = options
        .into_iter()
        .filter(|o| o.to_ascii_lowercase().starts_with(&prefix))
        .collect();
    matches.sort();
    matches.dedup();
    matches
}
