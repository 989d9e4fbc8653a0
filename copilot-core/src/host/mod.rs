//! Host capability interfaces
//!
//! Every editor service the core touches is a trait here. The stdio host and
//! the tests wire concrete implementations into [`HostCapabilities`];
//! [`memory`] provides null-object and in-memory versions of each.

pub mod memory;
pub mod probe;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub use probe::{default_probe, CommandProbe, SystemCommandProbe};

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

/// Toast-style notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotifyLevel, message: &str);
}

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<()>;
}

#[async_trait]
pub trait UrlOpener: Send + Sync {
    /// Returns false when the host declined to open the URL.
    async fn open(&self, url: &str) -> Result<bool>;
}

/// Open workspace folders and editor identity.
pub trait WorkspaceProvider: Send + Sync {
    fn folders(&self) -> Vec<PathBuf>;

    /// Text currently selected in the active editor, if any.
    fn active_selection(&self) -> Option<String>;

    /// Editor application name ("Cursor", "Visual Studio Code", ...).
    fn app_name(&self) -> String;
}

/// Persistent key/value store for extension state.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Secret storage for API keys and tokens.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<String>>;
    async fn store(&self, name: &str, value: &str) -> Result<()>;
    async fn delete(&self, name: &str) -> Result<()>;
}

#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick_folder(&self, title: &str) -> Result<Option<PathBuf>>;
}

/// Chat panel a suggestion can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatTarget {
    Cursor,
    ClaudeCode,
}

#[async_trait]
pub trait ChatInjector: Send + Sync {
    async fn inject(&self, target: ChatTarget, text: &str) -> Result<()>;
}

/// Status-bar widget.
pub trait StatusBar: Send + Sync {
    fn update(&self, text: &str, tooltip: &str);
}

/// Installation state of the editor hook scripts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HooksStatus {
    pub installed: bool,
    #[serde(default)]
    pub cursor: bool,
    #[serde(default)]
    pub claude_code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[async_trait]
pub trait HooksInstaller: Send + Sync {
    async fn install(&self) -> Result<HooksStatus>;
    async fn uninstall(&self) -> Result<HooksStatus>;
    async fn status(&self) -> Result<HooksStatus>;
}

/// Editor configuration (`settings.json`-style) storage.
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Usage telemetry sink.
pub trait Telemetry: Send + Sync {
    fn track(&self, event: &str, properties: Value);
}

/// Everything the host hands the core at startup.
#[derive(Clone)]
pub struct HostCapabilities {
    pub notifier: Arc<dyn Notifier>,
    pub clipboard: Arc<dyn Clipboard>,
    pub urls: Arc<dyn UrlOpener>,
    pub workspace: Arc<dyn WorkspaceProvider>,
    pub kv: Arc<dyn KvStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub file_picker: Arc<dyn FilePicker>,
    pub chat: Arc<dyn ChatInjector>,
    pub status_bar: Arc<dyn StatusBar>,
    pub hooks: Arc<dyn HooksInstaller>,
    pub configuration: Arc<dyn ConfigurationStore>,
    pub probe: Arc<dyn CommandProbe>,
    pub telemetry: Arc<dyn Telemetry>,
}

impl HostCapabilities {
    /// All in-memory / null implementations.
    pub fn in_memory() -> Self {
        Self {
            notifier: Arc::new(memory::RecordingNotifier::default()),
            clipboard: Arc::new(memory::MemoryClipboard::default()),
            urls: Arc::new(memory::RecordingUrlOpener::default()),
            workspace: Arc::new(memory::StaticWorkspace::default()),
            kv: Arc::new(memory::MemoryKvStore::default()),
            secrets: Arc::new(memory::MemorySecretStore::default()),
            file_picker: Arc::new(memory::NullFilePicker),
            chat: Arc::new(memory::NullChatInjector),
            status_bar: Arc::new(memory::RecordingStatusBar::default()),
            hooks: Arc::new(memory::NullHooksInstaller),
            configuration: Arc::new(memory::MemoryConfigurationStore::default()),
            probe: Arc::new(memory::StaticCommandProbe::default()),
            telemetry: Arc::new(memory::NullTelemetry),
        }
    }
}
