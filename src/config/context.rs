//! Named deployment contexts and their file-backed store.

use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, Credential};

const CONFIG_FILE_VERSION: &str = "v1";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// A named deployment profile: where the API lives and the credential for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Context {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(flatten)]
    pub credential: Credential,
    /// Bumped on every save; used to detect concurrent writers.
    #[serde(default)]
    pub revision: u64,
}

impl Context {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Storage abstraction for context records.
///
/// `save` is a compare-and-swap on [`Context::revision`]: it fails with
/// [`AuthError::ContextConflict`] if the stored record changed since the
/// caller loaded it, and returns the record as written (revision bumped).
pub trait ContextStore: Send + Sync {
    fn load(&self, name: &str) -> Result<Option<Context>, AuthError>;
    fn save(&self, context: &Context) -> Result<Context, AuthError>;
    fn list(&self) -> Result<Vec<Context>, AuthError>;
    fn active(&self) -> Result<Option<String>, AuthError>;
    fn set_active(&self, name: &str) -> Result<(), AuthError>;

    /// Load `name`, or the active context when no name is given.
    fn resolve(&self, name: Option<&str>) -> Result<Context, AuthError> {
        let name = match name.filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => self.active()?.ok_or(AuthError::NoActiveContext)?,
        };
        self.load(&name)?
            .ok_or_else(|| AuthError::UnknownContext(name))
    }
}

/// YAML-file context store (`<config dir>/config.yaml`).
///
/// # Example
/// ```no_run
/// use authctx::config::{Context, ContextStore, FileContextStore};
///
/// let store = FileContextStore::new(std::path::PathBuf::from("/tmp/authctx"));
/// store.save(&Context::new("prod", "https://api.example.com"))?;
/// # Ok::<(), authctx::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileContextStore {
    path: PathBuf,
}

impl FileContextStore {
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            path: config_dir.join(CONFIG_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<ConfigFile, AuthError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ConfigFile::default())
            }
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        if raw.trim().is_empty() {
            return Ok(ConfigFile::default());
        }
        serde_yaml::from_str(&raw).map_err(|e| {
            AuthError::Config(format!(
                "problems parsing config file {} - {e}",
                self.path.display()
            ))
        })
    }

    fn write(&self, file: &ConfigFile) -> Result<(), AuthError> {
        let serialized = serde_yaml::to_string(file)?;
        atomic_write(&self.path, serialized.as_bytes())
    }
}

impl ContextStore for FileContextStore {
    fn load(&self, name: &str) -> Result<Option<Context>, AuthError> {
        Ok(self
            .read()?
            .contexts
            .into_iter()
            .find(|c| c.name == name))
    }

    fn save(&self, context: &Context) -> Result<Context, AuthError> {
        let mut file = self.read()?;
        let mut stored = context.clone();
        match file.contexts.iter_mut().find(|c| c.name == context.name) {
            Some(existing) => {
                if existing.revision != context.revision {
                    return Err(AuthError::ContextConflict(context.name.clone()));
                }
                stored.revision = existing.revision + 1;
                *existing = stored.clone();
            }
            None => {
                stored.revision = context.revision + 1;
                file.contexts.push(stored.clone());
                if file.contexts.len() == 1 {
                    file.active_context = Some(stored.name.clone());
                }
            }
        }
        self.write(&file)?;
        tracing::debug!(context = %stored.name, revision = stored.revision, "context saved");
        Ok(stored)
    }

    fn list(&self) -> Result<Vec<Context>, AuthError> {
        Ok(self.read()?.contexts)
    }

    fn active(&self) -> Result<Option<String>, AuthError> {
        Ok(self.read()?.active_context)
    }

    fn set_active(&self, name: &str) -> Result<(), AuthError> {
        let mut file = self.read()?;
        if !file.contexts.iter().any(|c| c.name == name) {
            return Err(AuthError::UnknownContext(name.to_string()));
        }
        file.active_context = Some(name.to_string());
        self.write(&file)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigFile {
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_context: Option<String>,
    #[serde(default)]
    contexts: Vec<Context>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: CONFIG_FILE_VERSION.to_string(),
            active_context: None,
            contexts: Vec::new(),
        }
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        AuthError::Config(format!("Config path {} has no file name", path.display()))
    })?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_path = path.with_file_name(format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
