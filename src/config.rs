use crate::upload::UploadPolicy;
use crate::APP_NAME;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.ini";

// Where telegraph keeps its files, and the limits it enforces.
// Read from $XDG_CONFIG_HOME/telegraph/config.ini, for example:
// ```
// [storage]
// root = /srv/posts
//
// [templates]
// dir = /srv/templates
//
// [media]
// dir = /srv/media
// max_bytes = 1048576
// per_session = 3
// ```
// Anything left out defaults to a directory under
// $XDG_DATA_HOME/telegraph/ and the default UploadPolicy.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub root: PathBuf,
    pub templates: PathBuf,
    pub media: PathBuf,
    pub upload: UploadPolicy,
}

impl Config {
    // The configuration used when no file overrides anything.
    pub fn defaults(data_home: &Path) -> Config {
        Config {
            root: data_home.join("posts"),
            templates: data_home.join("templates"),
            media: data_home.join("media"),
            upload: UploadPolicy::default(),
        }
    }

    // Load the configuration from the XDG directories.
    pub fn load() -> Result<Config> {
        let dirs = xdg::BaseDirectories::with_prefix(APP_NAME)?;
        let defaults = Config::defaults(&dirs.get_data_home());
        match dirs.find_config_file(CONFIG_FILE) {
            Some(path) => Config::from_file(&path, defaults),
            None => {
                log::debug!("No {CONFIG_FILE} found, using defaults");
                Ok(defaults)
            }
        }
    }

    pub fn from_file(path: &Path, defaults: Config) -> Result<Config> {
        log::debug!("Loading config from {path:?}");
        let ini = ini::Ini::load_from_file(path).with_context(|| format!("Reading {path:?}"))?;
        Config::from_ini(&ini, defaults).with_context(|| format!("Parsing {path:?}"))
    }

    pub fn from_ini(ini: &ini::Ini, defaults: Config) -> Result<Config> {
        let get = |section: &str, key: &str| ini.get_from(Some(section), key);
        let mut config = defaults;
        if let Some(root) = get("storage", "root") {
            config.root = root.into();
        }
        if let Some(dir) = get("templates", "dir") {
            config.templates = dir.into();
        }
        if let Some(dir) = get("media", "dir") {
            config.media = dir.into();
        }
        if let Some(max) = get("media", "max_bytes") {
            config.upload.max_bytes = max
                .parse()
                .with_context(|| format!("Invalid media.max_bytes: {max:?}"))?;
        }
        if let Some(n) = get("media", "per_session") {
            config.upload.per_session = n
                .parse()
                .with_context(|| format!("Invalid media.per_session: {n:?}"))?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::defaults(Path::new("/data/telegraph"));
        assert_eq!(config.root, Path::new("/data/telegraph/posts"));
        assert_eq!(config.templates, Path::new("/data/telegraph/templates"));
        assert_eq!(config.media, Path::new("/data/telegraph/media"));
        assert_eq!(config.upload, UploadPolicy::default());
    }

    #[test]
    fn test_from_ini() {
        let ini = ini::Ini::load_from_str(
            "[storage]\nroot = /srv/posts\n\n[media]\nmax_bytes = 1024\nper_session = 3\n",
        )
        .unwrap();
        let config = Config::from_ini(&ini, Config::defaults(Path::new("/data"))).unwrap();
        assert_eq!(
            config,
            Config {
                root: "/srv/posts".into(),
                templates: "/data/templates".into(),
                media: "/data/media".into(),
                upload: UploadPolicy {
                    max_bytes: 1024,
                    per_session: 3,
                    ..Default::default()
                },
            }
        );
    }

    #[test]
    fn test_from_ini_invalid() {
        let ini = ini::Ini::load_from_str("[media]\nmax_bytes = lots\n").unwrap();
        let err = Config::from_ini(&ini, Config::defaults(Path::new("/data"))).unwrap_err();
        assert!(err.to_string().contains("max_bytes"), "{err}");
    }

    #[test]
    fn test_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, "[templates]\ndir = /srv/templates\n").unwrap();
        let config = Config::from_file(&path, Config::defaults(Path::new("/data"))).unwrap();
        assert_eq!(config.templates, Path::new("/srv/templates"));
        assert_eq!(config.root, Path::new("/data/posts"));

        assert!(Config::from_file(&tmp.path().join("missing.ini"), config).is_err());
    }
}
