/// Log tags, one per component of the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Router,
    Correlation,
    VolOfVol,
    Breadth,
    Drift,
    Tilt,
}

impl LogTag {
    /// Key used by `--debug <key>` flags
    pub fn to_debug_key(&self) -> &'static str {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Router => "router",
            LogTag::Correlation => "correlation",
            LogTag::VolOfVol => "volofvol",
            LogTag::Breadth => "breadth",
            LogTag::Drift => "drift",
            LogTag::Tilt => "tilt",
        }
    }

    /// Uncolored label used in the file sink
    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Router => "ROUTER",
            LogTag::Correlation => "CORR",
            LogTag::VolOfVol => "VOLVOL",
            LogTag::Breadth => "BREADTH",
            LogTag::Drift => "DRIFT",
            LogTag::Tilt => "TILT",
        }
    }

    pub fn from_debug_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "system" => Some(LogTag::System),
            "config" => Some(LogTag::Config),
            "router" => Some(LogTag::Router),
            "correlation" | "corr" => Some(LogTag::Correlation),
            "volofvol" | "vol-of-vol" => Some(LogTag::VolOfVol),
            "breadth" => Some(LogTag::Breadth),
            "drift" => Some(LogTag::Drift),
            "tilt" => Some(LogTag::Tilt),
            _ => None,
        }
    }

    pub fn all() -> &'static [LogTag] {
        &[
            LogTag::System,
            LogTag::Config,
            LogTag::Router,
            LogTag::Correlation,
            LogTag::VolOfVol,
            LogTag::Breadth,
            LogTag::Drift,
            LogTag::Tilt,
        ]
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
