//! Per-command options forwarded to the store
//!
//! These enums carry the semantic parameters of each operation: node placement,
//! write preconditions, ordering and range exclusivity. They are passed through
//! to the store unmodified; redkit only turns them into command arguments.

use std::fmt;

/// Placement hint deciding whether a command targets the primary or a replica
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommandFlags {
    /// No preference, any node will do
    #[default]
    PreferAny,
    /// Primary if available, replica otherwise
    PreferPrimary,
    /// Primary only
    DemandPrimary,
    /// Replica if available, primary otherwise
    PreferReplica,
    /// Replica only
    DemandReplica,
}

impl CommandFlags {
    /// Default placement for read-only commands
    pub const READ: CommandFlags = CommandFlags::PreferReplica;
    /// Default placement for mutating commands
    pub const WRITE: CommandFlags = CommandFlags::DemandPrimary;

    /// Whether the command should be routed to a replica node
    pub fn targets_replica(self) -> bool {
        matches!(self, CommandFlags::PreferReplica | CommandFlags::DemandReplica)
    }
}

impl fmt::Display for CommandFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandFlags::PreferAny => "prefer-any",
            CommandFlags::PreferPrimary => "prefer-primary",
            CommandFlags::DemandPrimary => "demand-primary",
            CommandFlags::PreferReplica => "prefer-replica",
            CommandFlags::DemandReplica => "demand-replica",
        };
        f.write_str(name)
    }
}

/// Write precondition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum When {
    /// Write unconditionally
    #[default]
    Always,
    /// Write only if the key (or field) already exists
    Exists,
    /// Write only if the key (or field) does not exist
    NotExists,
}

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    /// Lowest score (or rank) first
    #[default]
    Ascending,
    /// Highest score (or rank) first
    Descending,
}

/// Which bounds of a score range are exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Exclude {
    /// Both bounds inclusive
    #[default]
    Neither,
    /// Start bound exclusive
    Start,
    /// Stop bound exclusive
    Stop,
    /// Both bounds exclusive
    Both,
}

impl Exclude {
    fn excludes_start(self) -> bool {
        matches!(self, Exclude::Start | Exclude::Both)
    }

    fn excludes_stop(self) -> bool {
        matches!(self, Exclude::Stop | Exclude::Both)
    }

    /// Store argument for the lower score bound
    pub fn start_bound(self, value: f64) -> String {
        format_bound(value, self.excludes_start())
    }

    /// Store argument for the upper score bound
    pub fn stop_bound(self, value: f64) -> String {
        format_bound(value, self.excludes_stop())
    }
}

fn format_bound(value: f64, exclusive: bool) -> String {
    if value == f64::INFINITY {
        return "+inf".to_string();
    }
    if value == f64::NEG_INFINITY {
        return "-inf".to_string();
    }
    if exclusive {
        format!("({}", value)
    } else {
        value.to_string()
    }
}

/// Score interval used by sorted-set range commands
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
    pub exclude: Exclude,
}

impl ScoreRange {
    /// Inclusive range `[min, max]`
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            exclude: Exclude::Neither,
        }
    }

    /// Every score
    pub fn all() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Same bounds with the given exclusivity
    pub fn exclude(mut self, exclude: Exclude) -> Self {
        self.exclude = exclude;
        self
    }

    /// Store argument for the lower bound
    pub fn start_arg(&self) -> String {
        self.exclude.start_bound(self.min)
    }

    /// Store argument for the upper bound
    pub fn stop_arg(&self) -> String {
        self.exclude.stop_bound(self.max)
    }
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self::all()
    }
}

/// Set algebra operation used by combine commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOperation {
    Union,
    Intersect,
    Difference,
}

impl SetOperation {
    /// Command name for plain sets
    pub fn set_command(self, store: bool) -> &'static str {
        match (self, store) {
            (SetOperation::Union, false) => "SUNION",
            (SetOperation::Union, true) => "SUNIONSTORE",
            (SetOperation::Intersect, false) => "SINTER",
            (SetOperation::Intersect, true) => "SINTERSTORE",
            (SetOperation::Difference, false) => "SDIFF",
            (SetOperation::Difference, true) => "SDIFFSTORE",
        }
    }

    /// Command name for sorted sets
    pub fn sorted_set_command(self, store: bool) -> &'static str {
        match (self, store) {
            (SetOperation::Union, false) => "ZUNION",
            (SetOperation::Union, true) => "ZUNIONSTORE",
            (SetOperation::Intersect, false) => "ZINTER",
            (SetOperation::Intersect, true) => "ZINTERSTORE",
            (SetOperation::Difference, false) => "ZDIFF",
            (SetOperation::Difference, true) => "ZDIFFSTORE",
        }
    }
}

/// Score aggregation for sorted-set union and intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Aggregate {
    #[default]
    Sum,
    Min,
    Max,
}

impl Aggregate {
    pub fn as_str(self) -> &'static str {
        match self {
            Aggregate::Sum => "SUM",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

/// End of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListSide {
    Left,
    Right,
}

impl ListSide {
    pub fn as_str(self) -> &'static str {
        match self {
            ListSide::Left => "LEFT",
            ListSide::Right => "RIGHT",
        }
    }
}

/// Data structure stored under a key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// The key does not exist
    None,
    String,
    List,
    Set,
    SortedSet,
    Hash,
    Stream,
    /// A type this crate does not model (module types and the like)
    Unknown(String),
}

impl KeyType {
    /// Parse the reply of the `TYPE` command
    pub fn from_reply(reply: &str) -> Self {
        match reply {
            "none" => KeyType::None,
            "string" => KeyType::String,
            "list" => KeyType::List,
            "set" => KeyType::Set,
            "zset" => KeyType::SortedSet,
            "hash" => KeyType::Hash,
            "stream" => KeyType::Stream,
            other => KeyType::Unknown(other.to_string()),
        }
    }
}
