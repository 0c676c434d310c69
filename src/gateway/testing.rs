//! In-memory daemon and panel used by job, version and world tests.

use async_trait::async_trait;
use mcpanel_core::{AddonError, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use super::{
    FileEntry, PanelServers, PowerSignal, ProcessState, PullOptions, ServerGateway, StartupProfile,
};

/// Normalizes `dir` + `name` into an absolute path without duplicate slashes
pub fn join_path(dir: &str, name: &str) -> String {
    let joined = format!("{}/{}", dir.trim_end_matches('/'), name.trim_start_matches('/'));
    let parts: Vec<&str> = joined.split('/').filter(|p| !p.is_empty()).collect();
    format!("/{}", parts.join("/"))
}

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
    pub dirs: Mutex<BTreeSet<String>>,
    pub calls: Mutex<Vec<String>>,
    /// Operation names (`pull`, `decompress`, ...) that fail
    pub failing: Mutex<HashSet<String>>,
    /// Size of the file a successful pull leaves behind. 0 means nothing lands.
    pub pull_size: Mutex<usize>,
    pub state: Mutex<Option<ProcessState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        let gw = Self::default();
        *gw.pull_size.lock().unwrap() = 4096;
        *gw.state.lock().unwrap() = Some(ProcessState::Running);
        gw
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        let path = join_path("/", path);
        self.ensure_parents(&path);
        self.files.lock().unwrap().insert(path, content.as_bytes().to_vec());
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        let path = join_path("/", path);
        self.ensure_parents(&path);
        self.dirs.lock().unwrap().insert(path);
        self
    }

    pub fn failing_on(self, operation: &str) -> Self {
        self.failing.lock().unwrap().insert(operation.to_string());
        self
    }

    pub fn with_pull_size(self, size: usize) -> Self {
        *self.pull_size.lock().unwrap() = size;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    pub fn has(&self, path: &str) -> bool {
        let path = join_path("/", path);
        self.files.lock().unwrap().contains_key(&path) || self.dirs.lock().unwrap().contains(&path)
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(&join_path("/", path))
            .map(|b| String::from_utf8_lossy(b).to_string())
    }

    fn ensure_parents(&self, path: &str) {
        let mut dirs = self.dirs.lock().unwrap();
        let mut parent = parent_of(path);
        while parent != "/" {
            dirs.insert(parent.clone());
            parent = parent_of(&parent);
        }
    }

    fn record(&self, operation: &str, detail: String) -> Result<()> {
        self.calls.lock().unwrap().push(format!("{} {}", operation, detail));
        if self.failing.lock().unwrap().contains(operation) {
            return Err(AddonError::Gateway(format!("{} rejected by fake daemon", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl ServerGateway for FakeGateway {
    async fn get_directory(&self, _server: &str, path: &str) -> Result<Vec<FileEntry>> {
        self.record("list", path.to_string())?;
        let dir = join_path("/", path);
        let mut entries: Vec<FileEntry> = self
            .dirs
            .lock()
            .unwrap()
            .iter()
            .filter(|d| parent_of(d) == dir && d.as_str() != dir)
            .map(|d| FileEntry {
                name: d.rsplit('/').next().unwrap_or_default().to_string(),
                size: 4096,
                file: false,
                mime: "inode/directory".to_string(),
            })
            .collect();
        entries.extend(
            self.files
                .lock()
                .unwrap()
                .iter()
                .filter(|(f, _)| parent_of(f) == dir)
                .map(|(f, content)| {
                    let name = f.rsplit('/').next().unwrap_or_default().to_string();
                    FileEntry {
                        mime: if name.ends_with(".jar") {
                            "application/java-archive".to_string()
                        } else {
                            "text/plain".to_string()
                        },
                        name,
                        size: content.len() as u64,
                        file: true,
                    }
                }),
        );
        Ok(entries)
    }

    async fn get_content(&self, _server: &str, path: &str) -> Result<String> {
        self.record("read", path.to_string())?;
        self.content(path)
            .ok_or_else(|| AddonError::NotFound(path.to_string()))
    }

    async fn put_content(&self, _server: &str, path: &str, content: Vec<u8>) -> Result<()> {
        self.record("write", path.to_string())?;
        let path = join_path("/", path);
        self.ensure_parents(&path);
        self.files.lock().unwrap().insert(path, content);
        Ok(())
    }

    async fn pull(&self, _server: &str, url: &str, directory: &str, options: &PullOptions) -> Result<()> {
        self.record("pull", format!("{} -> {}", url, directory))?;
        let size = *self.pull_size.lock().unwrap();
        if size > 0 {
            let name = options
                .filename
                .clone()
                .unwrap_or_else(|| url.rsplit('/').next().unwrap_or("download").to_string());
            let path = join_path(directory, &name);
            self.ensure_parents(&path);
            self.files.lock().unwrap().insert(path, vec![0; size]);
        }
        Ok(())
    }

    async fn decompress_file(&self, _server: &str, root: &str, file: &str) -> Result<()> {
        self.record("decompress", join_path(root, file))
    }

    async fn delete_files(&self, _server: &str, root: &str, files: &[String]) -> Result<()> {
        self.record("delete", format!("{} {:?}", root, files))?;
        for name in files {
            let path = join_path(root, name);
            self.files
                .lock()
                .unwrap()
                .retain(|f, _| f != &path && !f.starts_with(&format!("{}/", path)));
            self.dirs
                .lock()
                .unwrap()
                .retain(|d| d != &path && !d.starts_with(&format!("{}/", path)));
        }
        Ok(())
    }

    async fn create_directory(&self, _server: &str, name: &str, parent: &str) -> Result<()> {
        self.record("mkdir", join_path(parent, name))?;
        let path = join_path(parent, name);
        if self.has(&path) {
            return Err(AddonError::Gateway(format!("{} already exists", path)));
        }
        self.ensure_parents(&path);
        self.dirs.lock().unwrap().insert(path);
        Ok(())
    }

    async fn send_power(&self, _server: &str, signal: PowerSignal) -> Result<()> {
        self.record("power", signal.as_str().to_string())?;
        if signal == PowerSignal::Kill {
            *self.state.lock().unwrap() = Some(ProcessState::Offline);
        }
        Ok(())
    }

    async fn get_state(&self, _server: &str) -> Result<ProcessState> {
        self.record("state", String::new())?;
        Ok(self.state.lock().unwrap().unwrap_or(ProcessState::Unknown))
    }
}

pub struct FakePanel {
    pub profile: Mutex<StartupProfile>,
    pub calls: Mutex<Vec<String>>,
    /// How many `is_installing` polls still report an ongoing install
    pub installing_polls: Mutex<u32>,
    pub fail_reinstall: bool,
}

impl FakePanel {
    pub fn new(egg_id: u64) -> Self {
        Self {
            profile: Mutex::new(StartupProfile {
                egg_id,
                startup: "java -Xms128M -jar {{SERVER_JARFILE}}".to_string(),
                image: "ghcr.io/pterodactyl/yolks:java_21".to_string(),
                environment: BTreeMap::from([("SERVER_JARFILE".to_string(), "paper.jar".to_string())]),
            }),
            calls: Mutex::new(Vec::new()),
            installing_polls: Mutex::new(0),
            fail_reinstall: false,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn current(&self) -> StartupProfile {
        self.profile.lock().unwrap().clone()
    }
}

#[async_trait]
impl PanelServers for FakePanel {
    async fn startup_profile(&self, _server: &str) -> Result<StartupProfile> {
        Ok(self.current())
    }

    async fn switch_egg(&self, _server: &str, egg_id: u64, environment: &BTreeMap<String, String>) -> Result<()> {
        self.calls.lock().unwrap().push(format!("switch_egg {}", egg_id));
        let mut profile = self.profile.lock().unwrap();
        profile.egg_id = egg_id;
        profile.environment = environment.clone();
        Ok(())
    }

    async fn update_environment(&self, _server: &str, environment: &BTreeMap<String, String>) -> Result<()> {
        self.calls.lock().unwrap().push("update_environment".to_string());
        self.profile
            .lock()
            .unwrap()
            .environment
            .extend(environment.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn restore_profile(&self, _server: &str, profile: &StartupProfile) -> Result<()> {
        self.calls.lock().unwrap().push(format!("restore {}", profile.egg_id));
        *self.profile.lock().unwrap() = profile.clone();
        Ok(())
    }

    async fn reinstall(&self, _server: &str) -> Result<()> {
        self.calls.lock().unwrap().push("reinstall".to_string());
        if self.fail_reinstall {
            return Err(AddonError::Gateway("reinstall rejected".into()));
        }
        Ok(())
    }

    async fn is_installing(&self, _server: &str) -> Result<bool> {
        let mut polls = self.installing_polls.lock().unwrap();
        if *polls > 0 {
            *polls -= 1;
            return Ok(true);
        }
        Ok(false)
    }
}

#[test]
fn test_join_path() {
    assert_eq!(join_path("/", "mods"), "/mods");
    assert_eq!(join_path("/world/datapacks/", "/x.zip"), "/world/datapacks/x.zip");
    assert_eq!(parent_of("/world/level.dat"), "/world");
    assert_eq!(parent_of("/server.jar"), "/");
}
