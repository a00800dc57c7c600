//! The managed `~/.ssh/authorized_keys` of one local account.
//!
//! Every write lands in a temp file inside `.ssh` that already has its final
//! mode and owner, and is then renamed into place. Readers such as sshd see
//! either the previous file or the new one, never a truncated one.

use crate::constants;
use crate::core::error::ProvisionError;
use crate::core::identity::OsIdentity;
use nix::fcntl::OFlag;
use std::fs::{self, File, Metadata};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFile {
    pub ssh_dir: PathBuf,
    pub path: PathBuf,
    pub uid: u32,
    pub gid: u32,
}

/// What `initialize` did to the previous key file, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initialized {
    Created,
    BackedUp(PathBuf),
}

impl KeyFile {
    pub fn for_identity(identity: &OsIdentity) -> Self {
        Self {
            ssh_dir: identity.ssh_dir(),
            path: identity.authorized_keys(),
            uid: identity.uid,
            gid: identity.gid,
        }
    }

    /// Create `.ssh` with mode 0700 owned by the account if it is missing.
    ///
    /// An existing directory is left as it is. A symlink or any other
    /// non-directory at that path is refused. Returns whether it was created.
    pub fn ensure_directory(&self) -> Result<bool, ProvisionError> {
        match self.ssh_dir.symlink_metadata() {
            Ok(meta) => {
                require_directory(&self.ssh_dir, &meta)?;
                Ok(false)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::DirBuilder::new()
                    .mode(constants::SSH_DIR_MODE)
                    .create(&self.ssh_dir)
                    .map_err(ProvisionError::filesystem("create directory", &self.ssh_dir))?;
                // mkdir(2) honours the umask; pin mode and owner on the handle
                let dir = open_directory(&self.ssh_dir)
                    .map_err(ProvisionError::filesystem("open", &self.ssh_dir))?;
                dir.set_permissions(fs::Permissions::from_mode(constants::SSH_DIR_MODE))
                    .map_err(ProvisionError::filesystem("set permissions on", &self.ssh_dir))?;
                std::os::unix::fs::fchown(&dir, Some(self.uid), Some(self.gid))
                    .map_err(ProvisionError::filesystem("chown", &self.ssh_dir))?;
                info!(dir = %self.ssh_dir.display(), "created ssh directory");
                Ok(true)
            }
            Err(e) => Err(ProvisionError::filesystem("inspect", &self.ssh_dir)(e)),
        }
    }

    /// Install `template` as the key file, keeping any existing file as a backup.
    ///
    /// The backup is a hard link to the old inode, so its bytes, mode, and owner
    /// are exactly what the operator had.
    pub fn initialize(&self, template: &str) -> Result<Initialized, ProvisionError> {
        self.check_directory()?;
        let outcome = if self.path.symlink_metadata().is_ok() {
            let backup = self.next_backup_path();
            preserve(&self.path, &backup)
                .map_err(ProvisionError::filesystem("back up", &self.path))?;
            info!(from = %self.path.display(), to = %backup.display(), "backed up existing key file");
            Initialized::BackedUp(backup)
        } else {
            Initialized::Created
        };
        self.write_atomic(template)?;
        Ok(outcome)
    }

    /// Overwrite the key file with `content`, mode 0600, owned by the account.
    pub fn replace(&self, content: &str) -> Result<(), ProvisionError> {
        self.write_atomic(content)?;
        debug!(path = %self.path.display(), bytes = content.len(), "replaced key file");
        Ok(())
    }

    /// First free name among `authorized_keys.bak`, `authorized_keys.bak.1`, ...
    pub fn next_backup_path(&self) -> PathBuf {
        let first = self.ssh_dir.join(constants::BACKUP_NAME);
        if first.symlink_metadata().is_err() {
            return first;
        }
        let mut n = 1u32;
        loop {
            let candidate = self.ssh_dir.join(format!("{}.{}", constants::BACKUP_NAME, n));
            if candidate.symlink_metadata().is_err() {
                return candidate;
            }
            n += 1;
        }
    }

    fn check_directory(&self) -> Result<(), ProvisionError> {
        let meta = self
            .ssh_dir
            .symlink_metadata()
            .map_err(ProvisionError::filesystem("inspect", &self.ssh_dir))?;
        require_directory(&self.ssh_dir, &meta)
    }

    fn write_atomic(&self, content: &str) -> Result<(), ProvisionError> {
        self.check_directory()?;
        let mut tmp = NamedTempFile::new_in(&self.ssh_dir)
            .map_err(ProvisionError::filesystem("create temp file in", &self.ssh_dir))?;
        tmp.write_all(content.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(ProvisionError::filesystem("write", tmp.path()))?;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(constants::AUTHORIZED_KEYS_MODE))
            .map_err(ProvisionError::filesystem("set permissions on", tmp.path()))?;
        std::os::unix::fs::fchown(tmp.as_file(), Some(self.uid), Some(self.gid))
            .map_err(ProvisionError::filesystem("chown", tmp.path()))?;
        tmp.persist(&self.path)
            .map_err(|err| ProvisionError::filesystem("replace", &self.path)(err.error))?;
        Ok(())
    }
}

fn require_directory(path: &Path, meta: &Metadata) -> Result<(), ProvisionError> {
    let reason = if meta.file_type().is_symlink() {
        "is a symbolic link"
    } else if !meta.is_dir() {
        "is not a directory"
    } else {
        return Ok(());
    };
    Err(ProvisionError::filesystem("refuse to use", path)(io::Error::new(
        io::ErrorKind::InvalidInput,
        reason,
    )))
}

fn open_directory(path: &Path) -> io::Result<File> {
    fs::OpenOptions::new()
        .read(true)
        .custom_flags((OFlag::O_NOFOLLOW | OFlag::O_DIRECTORY).bits())
        .open(path)
}

fn preserve(path: &Path, backup: &Path) -> io::Result<()> {
    match fs::hard_link(path, backup) {
        Ok(()) => Ok(()),
        // filesystems without link(2) support; fall back to a copy
        Err(e) if e.kind() != io::ErrorKind::AlreadyExists => fs::copy(path, backup).map(|_| ()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::{MetadataExt, PermissionsExt};
    use tempfile::TempDir;

    fn fixture() -> (TempDir, KeyFile) {
        let home = TempDir::new().unwrap();
        let identity = OsIdentity {
            username: "alice".into(),
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
            home_dir: home.path().to_path_buf(),
        };
        (home, KeyFile::for_identity(&identity))
    }

    fn mode(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn test_ensure_directory_creates_private_dir() {
        let (_home, key_file) = fixture();
        assert!(key_file.ensure_directory().unwrap());
        assert_eq!(mode(&key_file.ssh_dir), 0o700);
        assert!(!key_file.ensure_directory().unwrap());
    }

    #[test]
    fn test_ensure_directory_leaves_existing_dir_alone() {
        let (_home, key_file) = fixture();
        fs::create_dir(&key_file.ssh_dir).unwrap();
        fs::set_permissions(&key_file.ssh_dir, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(!key_file.ensure_directory().unwrap());
        assert_eq!(mode(&key_file.ssh_dir), 0o755);
    }

    #[test]
    fn test_ensure_directory_refuses_symlinked_ssh_dir() {
        let (home, key_file) = fixture();
        let elsewhere = TempDir::new().unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), &key_file.ssh_dir).unwrap();

        let err = key_file.ensure_directory().unwrap_err();
        assert!(matches!(err, ProvisionError::Filesystem { .. }));
        assert!(err.to_string().contains("symbolic link"));
        assert!(home.path().join(".ssh").symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read_dir(elsewhere.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_ensure_directory_refuses_plain_file() {
        let (_home, key_file) = fixture();
        fs::write(&key_file.ssh_dir, "not a directory\n").unwrap();
        let err = key_file.ensure_directory().unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_writes_never_follow_symlinked_ssh_dir() {
        let (_home, key_file) = fixture();
        let elsewhere = TempDir::new().unwrap();
        let victim = elsewhere.path().join("authorized_keys");
        fs::write(&victim, "ssh-ed25519 AAAA root@host\n").unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), &key_file.ssh_dir).unwrap();

        let err = key_file.replace("ssh-rsa ATTACKER\n").unwrap_err();
        assert!(matches!(err, ProvisionError::Filesystem { .. }));
        assert!(key_file.initialize(constants::KEYS_FILE_TEMPLATE).is_err());
        assert_eq!(fs::read_to_string(&victim).unwrap(), "ssh-ed25519 AAAA root@host\n");
        assert_eq!(fs::read_dir(elsewhere.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_initialize_without_existing_file_writes_template() {
        let (_home, key_file) = fixture();
        key_file.ensure_directory().unwrap();
        let outcome = key_file.initialize(constants::KEYS_FILE_TEMPLATE).unwrap();
        assert_eq!(outcome, Initialized::Created);
        assert_eq!(
            fs::read_to_string(&key_file.path).unwrap(),
            constants::KEYS_FILE_TEMPLATE
        );
        assert_eq!(mode(&key_file.path), 0o600);
        assert!(!key_file.ssh_dir.join("authorized_keys.bak").exists());
    }

    #[test]
    fn test_initialize_backs_up_existing_bytes() {
        let (_home, key_file) = fixture();
        key_file.ensure_directory().unwrap();
        let original = b"ssh-ed25519 AAAAC3Nza operator@laptop\n\x00odd bytes\n";
        fs::write(&key_file.path, original).unwrap();

        let outcome = key_file.initialize(constants::KEYS_FILE_TEMPLATE).unwrap();
        let backup = key_file.ssh_dir.join("authorized_keys.bak");
        assert_eq!(outcome, Initialized::BackedUp(backup.clone()));
        assert_eq!(fs::read(&backup).unwrap(), original);
        assert_eq!(
            fs::read_to_string(&key_file.path).unwrap(),
            constants::KEYS_FILE_TEMPLATE
        );
    }

    #[test]
    fn test_second_initialize_keeps_first_backup() {
        let (_home, key_file) = fixture();
        key_file.ensure_directory().unwrap();
        fs::write(&key_file.path, "first\n").unwrap();
        key_file.initialize(constants::KEYS_FILE_TEMPLATE).unwrap();
        fs::write(&key_file.path, "second\n").unwrap();

        let outcome = key_file.initialize(constants::KEYS_FILE_TEMPLATE).unwrap();
        let second_backup = key_file.ssh_dir.join("authorized_keys.bak.1");
        assert_eq!(outcome, Initialized::BackedUp(second_backup.clone()));
        assert_eq!(
            fs::read_to_string(key_file.ssh_dir.join("authorized_keys.bak")).unwrap(),
            "first\n"
        );
        assert_eq!(fs::read_to_string(&second_backup).unwrap(), "second\n");
    }

    #[test]
    fn test_next_backup_path_skips_taken_suffixes() {
        let (_home, key_file) = fixture();
        key_file.ensure_directory().unwrap();
        assert_eq!(key_file.next_backup_path(), key_file.ssh_dir.join("authorized_keys.bak"));
        for name in ["authorized_keys.bak", "authorized_keys.bak.1", "authorized_keys.bak.2"] {
            fs::write(key_file.ssh_dir.join(name), "x").unwrap();
        }
        assert_eq!(
            key_file.next_backup_path(),
            key_file.ssh_dir.join("authorized_keys.bak.3")
        );
    }

    #[test]
    fn test_replace_overwrites_and_sets_mode_and_owner() {
        let (_home, key_file) = fixture();
        key_file.ensure_directory().unwrap();
        fs::write(&key_file.path, "old content that is much longer than the new one\n").unwrap();
        fs::set_permissions(&key_file.path, fs::Permissions::from_mode(0o644)).unwrap();

        key_file.replace("new\n").unwrap();
        assert_eq!(fs::read_to_string(&key_file.path).unwrap(), "new\n");
        let meta = fs::metadata(&key_file.path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        assert_eq!(meta.uid(), key_file.uid);
        assert_eq!(meta.gid(), key_file.gid);
    }

    #[test]
    fn test_replace_leaves_no_temp_files() {
        let (_home, key_file) = fixture();
        key_file.ensure_directory().unwrap();
        key_file.replace("keys\n").unwrap();
        let names: Vec<_> = fs::read_dir(&key_file.ssh_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("authorized_keys")]);
    }

    #[test]
    fn test_replace_without_directory_fails_with_path() {
        let (_home, key_file) = fixture();
        let err = key_file.replace("keys\n").unwrap_err();
        assert!(matches!(err, ProvisionError::Filesystem { .. }));
        assert!(err.to_string().contains(".ssh"));
        assert!(!key_file.path.exists());
    }
}
