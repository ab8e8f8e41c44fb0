use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Bundled configuration set the converter is driven with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Starship,
    Spaghetti,
}

impl Preset {
    pub const ALL: [Preset; 2] = [Preset::Starship, Preset::Spaghetti];

    pub const fn id(self) -> &'static str {
        match self {
            Preset::Starship => "starship",
            Preset::Spaghetti => "spaghetti",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Preset::Starship => "Starship (Star Fox 64)",
            Preset::Spaghetti => "Spaghetti Kart (Mario Kart 64)",
        }
    }

    /// Root of this preset's tree inside the asset bundle.
    pub const fn bundle_root(self) -> &'static str {
        match self {
            Preset::Starship => "starship",
            Preset::Spaghetti => "spaghetti",
        }
    }

    pub const fn output_file_name(self) -> &'static str {
        match self {
            Preset::Starship => "sf64.o2r",
            Preset::Spaghetti => "mk64.o2r",
        }
    }

    pub const fn game_title(self) -> &'static str {
        match self {
            Preset::Starship => "Star Fox 64",
            Preset::Spaghetti => "Mario Kart 64",
        }
    }

    pub const fn short_name(self) -> &'static str {
        match self {
            Preset::Starship => "Starship",
            Preset::Spaghetti => "Spaghetti Kart",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Preset::ALL
            .into_iter()
            .find(|preset| preset.id().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                let known = Preset::ALL.map(Preset::id).join(", ");
                format!("unknown preset `{value}` (expected one of: {known})")
            })
    }
}
