//! In-memory and null-object capability implementations.
//!
//! Used by tests and by the stdio host for capabilities it has no editor for.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{
    ChatInjector, ChatTarget, Clipboard, CommandProbe, ConfigurationStore, FilePicker,
    HooksInstaller, HooksStatus, KvStore, Notifier, NotifyLevel, SecretStore, StatusBar,
    Telemetry, UrlOpener, WorkspaceProvider,
};
use crate::error::{Error, Result};
use crate::lock::lock;

fn lock_err<T>(_: T) -> Error {
    Error::Storage("in-memory store lock poisoned".to_string())
}

#[derive(Default)]
pub struct MemoryKvStore {
    values: Mutex<HashMap<String, Value>>,
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.lock().map_err(lock_err)?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values
            .lock()
            .map_err(lock_err)?
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().map_err(lock_err)?.remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.secrets.lock().map_err(lock_err)?.get(name).cloned())
    }

    async fn store(&self, name: &str, value: &str) -> Result<()> {
        self.secrets
            .lock()
            .map_err(lock_err)?
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.secrets.lock().map_err(lock_err)?.remove(name);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryConfigurationStore {
    values: Mutex<HashMap<String, Value>>,
}

#[async_trait]
impl ConfigurationStore for MemoryConfigurationStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.lock().map_err(lock_err)?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self.values.lock().map_err(lock_err)?;
        if value.is_null() {
            values.remove(key);
        } else {
            values.insert(key.to_string(), value);
        }
        Ok(())
    }
}

/// Keeps every notification for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(NotifyLevel, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(NotifyLevel, String)> {
        lock(&self.messages, "notifications").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NotifyLevel, message: &str) {
        tracing::debug!(?level, message, "notification");
        lock(&self.messages, "notifications").push((level, message.to_string()));
    }
}

#[derive(Default)]
pub struct MemoryClipboard {
    text: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn contents(&self) -> Option<String> {
        lock(&self.text, "text").clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<()> {
        *self.text.lock().map_err(lock_err)? = Some(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingUrlOpener {
    opened: Mutex<Vec<String>>,
}

impl RecordingUrlOpener {
    pub fn opened(&self) -> Vec<String> {
        lock(&self.opened, "opened urls").clone()
    }
}

#[async_trait]
impl UrlOpener for RecordingUrlOpener {
    async fn open(&self, url: &str) -> Result<bool> {
        self.opened.lock().map_err(lock_err)?.push(url.to_string());
        Ok(true)
    }
}

/// Fixed workspace folders and editor name.
pub struct StaticWorkspace {
    pub folders: Vec<PathBuf>,
    pub selection: Option<String>,
    pub app_name: String,
}

impl Default for StaticWorkspace {
    fn default() -> Self {
        Self {
            folders: Vec::new(),
            selection: None,
            app_name: "Visual Studio Code".to_string(),
        }
    }
}

impl StaticWorkspace {
    pub fn new(folders: Vec<PathBuf>, app_name: impl Into<String>) -> Self {
        Self {
            folders,
            selection: None,
            app_name: app_name.into(),
        }
    }
}

impl WorkspaceProvider for StaticWorkspace {
    fn folders(&self) -> Vec<PathBuf> {
        self.folders.clone()
    }

    fn active_selection(&self) -> Option<String> {
        self.selection.clone()
    }

    fn app_name(&self) -> String {
        self.app_name.clone()
    }
}

pub struct NullFilePicker;

#[async_trait]
impl FilePicker for NullFilePicker {
    async fn pick_folder(&self, _title: &str) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Rejects every injection, which exercises the clipboard fallback.
pub struct NullChatInjector;

#[async_trait]
impl ChatInjector for NullChatInjector {
    async fn inject(&self, _target: ChatTarget, _text: &str) -> Result<()> {
        Err(Error::Unavailable("chat injection"))
    }
}

#[derive(Default)]
pub struct RecordingStatusBar {
    text: Mutex<Option<String>>,
}

impl RecordingStatusBar {
    pub fn text(&self) -> Option<String> {
        lock(&self.text, "text").clone()
    }
}

impl StatusBar for RecordingStatusBar {
    fn update(&self, text: &str, _tooltip: &str) {
        *lock(&self.text, "status bar") = Some(text.to_string());
    }
}

pub struct NullHooksInstaller;

#[async_trait]
impl HooksInstaller for NullHooksInstaller {
    async fn install(&self) -> Result<HooksStatus> {
        Err(Error::Unavailable("hook installation"))
    }

    async fn uninstall(&self) -> Result<HooksStatus> {
        Err(Error::Unavailable("hook installation"))
    }

    async fn status(&self) -> Result<HooksStatus> {
        Ok(HooksStatus::default())
    }
}

/// Answers `which` from a fixed set of command names.
#[derive(Default)]
pub struct StaticCommandProbe {
    available: HashSet<String>,
}

impl StaticCommandProbe {
    pub fn with_commands<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            available: commands.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl CommandProbe for StaticCommandProbe {
    async fn which(&self, command: &str) -> Option<PathBuf> {
        self.available
            .contains(command)
            .then(|| PathBuf::from("/usr/local/bin").join(command))
    }
}

pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn track(&self, event: &str, _properties: Value) {
        tracing::trace!(event, "telemetry");
    }
}
