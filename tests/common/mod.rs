#![allow(dead_code)]

use anyhow::Result;
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use vigil::engine::{Engine, EngineSettings};
use vigil::tracking::TargetRegistry;
use vigil::users::FixedUsers;
use vigil::{EngineKind, Layout};

/// Scratch space with a data directory to watch and one managed root per
/// engine
pub struct TestEnv {
    pub temp_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        fs::create_dir_all(temp_dir.path().join("data"))?;
        Ok(Self { temp_dir })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory holding the watched files
    pub fn data(&self) -> PathBuf {
        self.path().join("data")
    }

    pub fn layout(&self, kind: EngineKind) -> Layout {
        Layout::new(kind, self.path().join("roots").join(kind.as_str()))
    }

    /// Write a file under the data directory
    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.data().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Register a path with an engine's registry
    pub fn register(&self, kind: EngineKind, path: &Path) -> Result<u64> {
        let layout = self.layout(kind);
        layout.ensure_exists()?;
        let mut registry = TargetRegistry::open(&layout)?;
        let (id, _) = registry.register(path, "tester")?;
        Ok(id)
    }

    pub fn registry(&self, kind: EngineKind) -> Result<TargetRegistry> {
        TargetRegistry::open(&self.layout(kind))
    }

    /// An engine reporting `alice` as the only logged-on user
    pub fn engine(&self, kind: EngineKind) -> Result<Engine> {
        Engine::open(
            self.layout(kind),
            EngineSettings::default(),
            Box::new(FixedUsers(vec!["alice".to_string()])),
        )
    }

    /// Write a config file pointing both roots and the state dir into the
    /// temp dir
    pub fn write_config(&self) -> Result<PathBuf> {
        let config_path = self.path().join("config.toml");
        let content = format!(
            "[core]\nstate_dir = \"{}\"\npoll_interval_secs = 1\n\n\
             [monitoring]\nroot = \"{}\"\n\n[backup]\nroot = \"{}\"\n",
            self.path().join("state").display(),
            self.layout(EngineKind::Monitoring).root().display(),
            self.layout(EngineKind::Backup).root().display(),
        );
        fs::write(&config_path, content)?;
        Ok(config_path)
    }
}

/// Push a file's mtime (and atime) `secs` seconds into the future
pub fn bump_mtime(path: &Path, secs: u64) -> Result<()> {
    let when = FileTime::from_system_time(SystemTime::now() + Duration::from_secs(secs));
    filetime::set_file_times(path, when, when)?;
    Ok(())
}

/// Push only a file's atime `secs` seconds into the future
pub fn bump_atime(path: &Path, secs: u64) -> Result<()> {
    let when = FileTime::from_system_time(SystemTime::now() + Duration::from_secs(secs));
    filetime::set_file_atime(path, when)?;
    Ok(())
}

/// Names of the entries directly inside `dir`, sorted
pub fn entry_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
