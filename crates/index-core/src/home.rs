use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

/// Overrides the home root when set and non-empty.
pub const HOME_ENV_VAR: &str = "BUNDLE_HOME";
/// Overrides the plugins directory when set and non-empty.
pub const PLUGINS_ENV_VAR: &str = "BUNDLE_PLUGINS";

const DEFAULT_DIR_NAME: &str = ".bundle";

/// Root directory holding the client's config, logs, plugins, and index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Home(PathBuf);

impl Home {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self(root.into())
    }

    pub fn root(&self) -> &Path {
        &self.0
    }

    /// Joins `elems` onto the home root.
    pub fn path<I, P>(&self, elems: I) -> PathBuf
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut path = self.0.clone();
        for elem in elems {
            path.push(elem);
        }
        path
    }

    pub fn config(&self) -> PathBuf {
        self.path(["config.toml"])
    }

    pub fn logs(&self) -> PathBuf {
        self.path(["logs"])
    }

    pub fn index(&self) -> PathBuf {
        self.path(["index.json"])
    }

    pub fn plugins(&self, cfg: &HomeConfig) -> PathBuf {
        cfg.plugins_override
            .clone()
            .unwrap_or_else(|| self.path(["plugins"]))
    }
}

impl fmt::Display for Home {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Environment-driven location settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeConfig {
    pub home: Home,
    pub plugins_override: Option<PathBuf>,
}

impl HomeConfig {
    /// Build a [`HomeConfig`] from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a [`HomeConfig`] from an arbitrary variable lookup.
    ///
    /// The home root is `BUNDLE_HOME`, else `$HOME/.bundle` (with
    /// `USERPROFILE` standing in for `HOME` on Windows).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let home = match non_empty(HOME_ENV_VAR) {
            Some(root) => Home::new(root),
            None => {
                let mut base = non_empty("HOME");
                if base.is_none() && cfg!(windows) {
                    base = non_empty("USERPROFILE");
                }
                Home::new(PathBuf::from(base.unwrap_or_default()).join(DEFAULT_DIR_NAME))
            }
        };
        let plugins_override = non_empty(PLUGINS_ENV_VAR).map(PathBuf::from);

        Self {
            home,
            plugins_override,
        }
    }

    pub fn with_home(mut self, root: impl Into<PathBuf>) -> Self {
        self.home = Home::new(root);
        self
    }

    pub fn plugins(&self) -> PathBuf {
        self.home.plugins(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_home_wins() {
        let cfg = HomeConfig::from_lookup(lookup(&[
            ("BUNDLE_HOME", "/opt/bundles"),
            ("HOME", "/home/dev"),
        ]));
        assert_eq!(cfg.home.root(), Path::new("/opt/bundles"));
        assert_eq!(cfg.home.config(), Path::new("/opt/bundles/config.toml"));
        assert_eq!(cfg.home.logs(), Path::new("/opt/bundles/logs"));
        assert_eq!(cfg.plugins(), Path::new("/opt/bundles/plugins"));
    }

    #[test]
    fn falls_back_to_user_home() {
        let cfg = HomeConfig::from_lookup(lookup(&[("BUNDLE_HOME", ""), ("HOME", "/home/dev")]));
        assert_eq!(cfg.home.root(), Path::new("/home/dev/.bundle"));
        assert_eq!(cfg.home.index(), Path::new("/home/dev/.bundle/index.json"));
    }

    #[test]
    fn plugins_override() {
        let cfg = HomeConfig::from_lookup(lookup(&[
            ("HOME", "/home/dev"),
            ("BUNDLE_PLUGINS", "/srv/plugins"),
        ]));
        assert_eq!(cfg.plugins(), Path::new("/srv/plugins"));
    }

    #[test]
    fn path_joins_segments() {
        let home = Home::new("/data");
        assert_eq!(home.path(["a", "b"]), Path::new("/data/a/b"));
        assert_eq!(home.to_string(), "/data");
    }

    #[test]
    fn with_home_replaces_root() {
        let cfg = HomeConfig::from_lookup(lookup(&[("HOME", "/home/dev")])).with_home("/tmp/x");
        assert_eq!(cfg.home.index(), Path::new("/tmp/x/index.json"));
    }
}
