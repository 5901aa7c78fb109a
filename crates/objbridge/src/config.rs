//! Bridge configuration.

use objbridge_log::Level;

/// Environment variable holding the log level.
pub const LOG_ENV: &str = "OBJBRIDGE_LOG";

/// Environment variable holding a comma-separated list of frameworks whose
/// signatures load at start-up.
pub const PRELOAD_ENV: &str = "OBJBRIDGE_PRELOAD";

/// The pair of foreign classes that make up one collection family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyNames {
    pub immutable: String,
    pub mutable: String,
}

impl FamilyNames {
    pub fn new(immutable: impl Into<String>, mutable: impl Into<String>) -> Self {
        FamilyNames {
            immutable: immutable.into(),
            mutable: mutable.into(),
        }
    }
}

/// Settings for one [`Bridge`](crate::Bridge).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Name of the shared root mirror.
    pub root_name: String,
    pub text_family: FamilyNames,
    pub sequence_family: FamilyNames,
    pub map_family: FamilyNames,
    /// Name prefixes that mark internal classes.
    pub reserved_prefixes: Vec<char>,
    /// Text calls that are always sent to the foreign side.
    pub text_passthrough: Vec<String>,
    /// Sequence calls that are always sent to the foreign side.
    pub sequence_passthrough: Vec<String>,
    /// Map calls that are always sent to the foreign side.
    pub map_passthrough: Vec<String>,
    /// Frameworks whose signatures are loaded when the bridge is built.
    pub preload: Vec<String>,
    pub log_level: Option<Level>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            root_name: "ObjcID".to_string(),
            text_family: FamilyNames::new("NSString", "NSMutableString"),
            sequence_family: FamilyNames::new("NSArray", "NSMutableArray"),
            map_family: FamilyNames::new("NSDictionary", "NSMutableDictionary"),
            reserved_prefixes: vec!['%', '_'],
            text_passthrough: vec!["length".to_string()],
            sequence_passthrough: Vec::new(),
            map_passthrough: Vec::new(),
            preload: vec!["CoreFoundation".to_string(), "Foundation".to_string()],
            log_level: None,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `OBJBRIDGE_LOG` and `OBJBRIDGE_PRELOAD`.
    ///
    /// An unparsable log level is ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = BridgeConfig::default();
        if let Ok(level) = std::env::var(LOG_ENV) {
            match level.parse::<Level>() {
                Ok(level) => config.log_level = Some(level),
                Err(e) => objbridge_log::warn!("ignoring {LOG_ENV}: {e}"),
            }
        }
        if let Ok(list) = std::env::var(PRELOAD_ENV) {
            config.preload = parse_list(&list);
        }
        config
    }

    pub fn with_root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = name.into();
        self
    }

    pub fn with_text_family(mut self, family: FamilyNames) -> Self {
        self.text_family = family;
        self
    }

    pub fn with_sequence_family(mut self, family: FamilyNames) -> Self {
        self.sequence_family = family;
        self
    }

    pub fn with_map_family(mut self, family: FamilyNames) -> Self {
        self.map_family = family;
        self
    }

    pub fn with_reserved_prefixes(mut self, prefixes: impl IntoIterator<Item = char>) -> Self {
        self.reserved_prefixes = prefixes.into_iter().collect();
        self
    }

    pub fn with_preload<S: Into<String>>(mut self, frameworks: impl IntoIterator<Item = S>) -> Self {
        self.preload = frameworks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_log_level(mut self, level: Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Returns `true` if `name` can name a mirror class: it starts with an
    /// ASCII upper-case letter, does not start with a reserved prefix, and
    /// continues with letters, digits or underscores.
    pub fn is_representable(&self, name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if self.reserved_prefixes.contains(&first) => false,
            Some(first) if first.is_ascii_uppercase() => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
