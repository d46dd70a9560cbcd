use std::{fmt::Display, hash::Hash, path::PathBuf};

/// A competitor program known to the dealer.
///
/// `name` is the true identity, never shown to other competitors. `id` only tells
/// apart two competitors sharing a name.
#[derive(Debug)]
pub struct Competitor {
    pub name: String,
    pub path_to_exe: PathBuf,
    pub args: Vec<String>,
    pub id: u32,
}

impl PartialEq for Competitor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.id == other.id
    }
}

impl Eq for Competitor {}

impl Hash for Competitor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.id.hash(state);
    }
}

impl Display for Competitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl Competitor {
    pub fn new(name: impl Into<String>, path_to_exe: impl Into<PathBuf>, id: u32) -> Competitor {
        Competitor {
            name: name.into(),
            path_to_exe: path_to_exe.into(),
            args: vec![],
            id,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Competitor {
        self.args = args;
        self
    }

    /// At most 7 characters of the name, used to align the operator report.
    pub fn nickname(&self) -> String {
        self.name.chars().take(7).collect()
    }
}
