// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use satispress::{App, SatispressConfig};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A fake WordPress site: plugin/theme directories, an inventory file and a
/// settings file, all under one temp dir.
///
/// Keep the fixture alive for the duration of the test to prevent cleanup.
pub struct Site {
    pub temp: TempDir,
    inventory: String,
}

impl Site {
    pub fn new() -> Self {
        Self {
            temp: tempfile::tempdir().unwrap(),
            inventory: String::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn storage_root(&self) -> PathBuf {
        self.path().join("packages")
    }

    /// Artifact path for a release inside storage
    pub fn artifact(&self, package_type: &str, slug: &str, version: &str) -> PathBuf {
        self.storage_root()
            .join(package_type)
            .join(slug)
            .join(format!("{slug}-{version}.zip"))
    }

    /// Install a plugin at `wp/plugins/{slug}` with the given files
    pub fn plugin(mut self, slug: &str, version: &str, files: &[(&str, &str)]) -> Self {
        let dir = self.path().join("wp/plugins").join(slug);
        write_files(&dir, files);
        write!(
            self.inventory,
            "[[plugin]]\nname = \"{slug}\"\nbasename = \"{slug}/{slug}.php\"\ndirectory = \"plugins/{slug}\"\nversion = \"{version}\"\n\n"
        )
        .unwrap();
        self
    }

    /// Install a theme at `wp/themes/{slug}`
    pub fn theme(mut self, slug: &str, version: &str) -> Self {
        let dir = self.path().join("wp/themes").join(slug);
        write_files(&dir, &[("style.css", "/* Theme Name: Test */")]);
        write!(
            self.inventory,
            "[[theme]]\nname = \"{slug}\"\ndirectory = \"themes/{slug}\"\nversion = \"{version}\"\n\n"
        )
        .unwrap();
        self
    }

    /// Whitelist entries written straight into the settings file
    pub fn whitelist(self, plugins: &[&str], themes: &[&str]) -> Self {
        let settings = serde_json::json!({ "plugins": plugins, "themes": themes });
        fs::write(self.path().join("settings.json"), settings.to_string()).unwrap();
        self
    }

    pub fn config(&self) -> SatispressConfig {
        fs::create_dir_all(self.path().join("wp")).unwrap();
        fs::write(self.path().join("wp/inventory.toml"), &self.inventory).unwrap();

        let mut config = SatispressConfig::default();
        config.server.public_url = "https://packages.example.com/".to_string();
        config.storage.root = self.storage_root();
        config.repository.inventory = self.path().join("wp/inventory.toml");
        config.repository.settings = self.path().join("settings.json");
        config
    }

    pub fn app(&self) -> App {
        App::from_config(&self.config(), Vec::new()).unwrap()
    }
}

fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

/// Entry names inside a zip artifact, sorted
pub fn zip_entries(path: &Path) -> Vec<String> {
    let file = fs::File::open(path).unwrap();
    let archive = zip::ZipArchive::new(file).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}
