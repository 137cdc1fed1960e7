//! File-based key storage for headless environments

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::storage::{
    KeyEntry, KeyGenSpec, SecureKeyStore, SoftwarePrivateKey, StoreBacking, StoreCapabilities,
    StoreError, StoredKeyRecord,
};

/// File-based key storage
///
/// WARNING: This stores PKCS#8 private keys in files with mode 0600.
/// Prefer KeyringKeyStore when a credential vault is available.
pub struct FileKeyStore {
    base_dir: PathBuf,
}

impl FileKeyStore {
    /// Open the store in the per-user data directory
    pub fn new() -> Result<Self, StoreError> {
        let dirs = ProjectDirs::from("com", "device-pop", "device-pop").ok_or_else(|| {
            StoreError::NotInitialized("Could not determine data directory".to_string())
        })?;

        Self::open(dirs.data_local_dir())
    }

    /// Open the store in `base_dir`, creating it with restrictive permissions
    pub fn open(base_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(base_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            fs::set_permissions(base_dir, perms)?;
        }

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn key_path(&self, alias: &str) -> PathBuf {
        // Sanitize alias to prevent path traversal
        let safe_alias = alias.replace(['/', '\\', '.'], "_");
        self.base_dir.join(format!("{safe_alias}.json"))
    }

    fn read_record(&self, alias: &str) -> Result<StoredKeyRecord, StoreError> {
        match fs::read(self.key_path(alias)) {
            Ok(contents) => StoredKeyRecord::from_json(&contents),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(alias.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_record(&self, alias: &str, record: &StoredKeyRecord) -> Result<(), StoreError> {
        let path = self.key_path(alias);
        let contents = record.to_json()?;

        let mut file = File::create(&path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        file.write_all(&contents)?;
        file.sync_all()?;

        Ok(())
    }
}

impl SecureKeyStore for FileKeyStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            backing: StoreBacking::Software,
            isolation_available: false,
        }
    }

    fn contains(&self, alias: &str) -> Result<bool, StoreError> {
        Ok(self.key_path(alias).exists())
    }

    fn generate(&self, alias: &str, spec: &KeyGenSpec) -> Result<KeyEntry, StoreError> {
        if spec.isolated {
            return Err(StoreError::IsolationUnavailable);
        }

        let key = SoftwarePrivateKey::generate(spec.key_size_bits)?;
        let created_at = Utc::now();
        self.write_record(alias, &StoredKeyRecord::seal(key.as_ref(), created_at)?)?;

        Ok(key.into_entry(alias, created_at, StoreBacking::Software))
    }

    fn entry(&self, alias: &str) -> Result<KeyEntry, StoreError> {
        self.read_record(alias)?
            .into_entry(alias, StoreBacking::Software)
    }

    fn delete(&self, alias: &str) -> Result<(), StoreError> {
        let path = self.key_path(alias);

        if !path.exists() {
            return Ok(());
        }

        // Overwrite with zeros before deleting (basic secure delete)
        if let Ok(metadata) = fs::metadata(&path) {
            let size = metadata.len() as usize;
            if let Ok(mut file) = File::create(&path) {
                let _ = file.write_all(&vec![0u8; size]);
                let _ = file.sync_all();
            }
        }

        fs::remove_file(&path)?;

        Ok(())
    }

    fn creation_date(&self, alias: &str) -> Result<DateTime<Utc>, StoreError> {
        self.read_record(alias).map(|record| record.created_at)
    }
}
