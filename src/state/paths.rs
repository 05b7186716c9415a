//! Host file locations
//!
//! Every file the provisioner reads or writes is resolved through
//! [`HostPaths`]. Production uses `/` as the root; tests re-root the whole
//! tree under a temporary directory.

use std::path::{Path, PathBuf};

/// Directory that receives the deployment folder
pub const DEPLOY_BASE: &str = "/opt";

/// Standard host paths
#[derive(Debug, Clone)]
pub struct HostPaths {
    /// Filesystem root (default: /)
    pub root: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self::new()
    }
}

impl HostPaths {
    /// Create with the real filesystem root
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }

    /// Create with a custom root (useful for testing)
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve an absolute host path under the configured root
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        self.root.join(path.strip_prefix("/").unwrap_or(path))
    }

    // ==================== Accounts ====================

    /// /etc/passwd
    pub fn passwd(&self) -> PathBuf {
        self.resolve("/etc/passwd")
    }

    /// /etc/group
    pub fn group(&self) -> PathBuf {
        self.resolve("/etc/group")
    }

    /// /etc/os-release
    pub fn os_release(&self) -> PathBuf {
        self.resolve("/etc/os-release")
    }

    // ==================== Deployment ====================

    /// /opt/<folder>
    pub fn deploy_dir(&self, folder: &str) -> PathBuf {
        self.resolve(DEPLOY_BASE).join(folder)
    }

    // ==================== SSH ====================

    /// /etc/ssh/sshd_config
    pub fn sshd_config(&self) -> PathBuf {
        self.resolve("/etc/ssh/sshd_config")
    }

    /// <home>/.ssh
    pub fn ssh_dir(&self, home: &Path) -> PathBuf {
        self.resolve(home).join(".ssh")
    }

    /// <home>/.ssh/id_rsa
    pub fn private_key(&self, home: &Path) -> PathBuf {
        self.ssh_dir(home).join("id_rsa")
    }

    /// <home>/.ssh/id_rsa.pub
    pub fn public_key(&self, home: &Path) -> PathBuf {
        self.ssh_dir(home).join("id_rsa.pub")
    }

    /// <home>/.ssh/authorized_keys
    pub fn authorized_keys(&self, home: &Path) -> PathBuf {
        self.ssh_dir(home).join("authorized_keys")
    }

    // ==================== Packages ====================

    /// /etc/apt/keyrings/docker.asc
    pub fn docker_keyring(&self) -> PathBuf {
        self.resolve("/etc/apt/keyrings/docker.asc")
    }

    /// /etc/apt/sources.list.d/docker.list
    pub fn docker_apt_source(&self) -> PathBuf {
        self.resolve("/etc/apt/sources.list.d/docker.list")
    }

    // ==================== Fail2Ban ====================

    /// /etc/fail2ban/jail.local
    pub fn fail2ban_jail_local(&self) -> PathBuf {
        self.resolve("/etc/fail2ban/jail.local")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let paths = HostPaths::new();
        assert_eq!(paths.sshd_config(), PathBuf::from("/etc/ssh/sshd_config"));
        assert_eq!(paths.deploy_dir("app"), PathBuf::from("/opt/app"));
        assert_eq!(
            paths.fail2ban_jail_local(),
            PathBuf::from("/etc/fail2ban/jail.local")
        );
    }

    #[test]
    fn test_custom_root() {
        let paths = HostPaths::with_root("/tmp/host");
        assert_eq!(paths.passwd(), PathBuf::from("/tmp/host/etc/passwd"));
        assert_eq!(paths.deploy_dir("app"), PathBuf::from("/tmp/host/opt/app"));
    }

    #[test]
    fn test_ssh_paths_follow_home() {
        let paths = HostPaths::with_root("/tmp/host");
        let home = Path::new("/home/admin");
        assert_eq!(
            paths.private_key(home),
            PathBuf::from("/tmp/host/home/admin/.ssh/id_rsa")
        );
        assert_eq!(
            paths.public_key(home),
            PathBuf::from("/tmp/host/home/admin/.ssh/id_rsa.pub")
        );
        assert_eq!(
            paths.authorized_keys(home),
            PathBuf::from("/tmp/host/home/admin/.ssh/authorized_keys")
        );
    }
}
