//! Local account lookups: home directory and numeric ownership.

use crate::constants;
use nix::unistd::User;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

/// A local account as seen by the OS user database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsIdentity {
    pub username: String,
    pub uid: u32,
    pub gid: u32,
    pub home_dir: PathBuf,
}

impl OsIdentity {
    pub fn ssh_dir(&self) -> PathBuf {
        self.home_dir.join(constants::SSH_DIR_NAME)
    }

    pub fn authorized_keys(&self) -> PathBuf {
        self.ssh_dir().join(constants::AUTHORIZED_KEYS_NAME)
    }
}

/// Resolves usernames to local identities. `Ok(None)` means no such user.
pub trait IdentityResolver {
    fn resolve(&self, username: &str) -> io::Result<Option<OsIdentity>>;
}

/// Resolver backed by getpwnam(3).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl IdentityResolver for SystemResolver {
    fn resolve(&self, username: &str) -> io::Result<Option<OsIdentity>> {
        let user = User::from_name(username).map_err(io::Error::from)?;
        Ok(user.map(|u| OsIdentity {
            username: u.name,
            uid: u.uid.as_raw(),
            gid: u.gid.as_raw(),
            home_dir: u.dir,
        }))
    }
}

/// Fixed in-memory user table, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    users: HashMap<String, OsIdentity>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: &str, uid: u32, gid: u32, home_dir: PathBuf) -> Self {
        self.users.insert(
            username.to_string(),
            OsIdentity {
                username: username.to_string(),
                uid,
                gid,
                home_dir,
            },
        );
        self
    }
}

impl IdentityResolver for StaticResolver {
    fn resolve(&self, username: &str) -> io::Result<Option<OsIdentity>> {
        Ok(self.users.get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_paths() {
        let id = OsIdentity {
            username: "alice".into(),
            uid: 1000,
            gid: 1000,
            home_dir: PathBuf::from("/home/alice"),
        };
        assert_eq!(id.ssh_dir(), PathBuf::from("/home/alice/.ssh"));
        assert_eq!(
            id.authorized_keys(),
            PathBuf::from("/home/alice/.ssh/authorized_keys")
        );
    }

    #[test]
    fn test_system_resolver_finds_root() {
        let root = SystemResolver.resolve("root").unwrap().expect("root exists");
        assert_eq!(root.uid, 0);
    }

    #[test]
    fn test_system_resolver_unknown_user() {
        let missing = SystemResolver
            .resolve("serverauth-no-such-user-9f2c")
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_static_resolver() {
        let resolver = StaticResolver::new().with_user("bob", 1001, 1002, "/home/bob".into());
        let bob = resolver.resolve("bob").unwrap().unwrap();
        assert_eq!((bob.uid, bob.gid), (1001, 1002));
        assert!(resolver.resolve("carol").unwrap().is_none());
    }
}
