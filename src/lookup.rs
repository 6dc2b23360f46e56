//! Per-context lookup tables.

use indexmap::IndexMap;

/// The three keyed maps a context maintains over its own declarations:
/// long option names, short option names, and command names (including
/// visible command aliases). Values are indices into the context's option
/// and command lists.
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    pub long: IndexMap<String, usize>,
    pub short: IndexMap<String, usize>,
    pub commands: IndexMap<String, usize>,
}

impl Lookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when any long, short, or alias key of an option is taken.
    pub fn has_option_key(&self, long_keys: &[String], short_keys: &[String]) -> Option<String> {
        for key in long_keys {
            if self.long.contains_key(key) {
                return Some(format!("--{key}"));
            }
        }
        for key in short_keys {
            if self.short.contains_key(key) {
                return Some(format!("-{key}"));
            }
        }
        None
    }
}
