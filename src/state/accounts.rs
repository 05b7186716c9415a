//! Account database lookups
//!
//! Reads `/etc/passwd` and `/etc/group` directly instead of shelling out, so
//! the checks work against a re-rooted test tree.

use super::HostPaths;
use crate::ProvisionError;
use std::path::PathBuf;
use tokio::fs;

/// Read an account file, treating a missing file as empty
async fn read_db(path: PathBuf) -> Result<String, ProvisionError> {
    match fs::read_to_string(&path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(ProvisionError::Io(e)),
    }
}

/// Find the passwd entry fields for `username`
fn passwd_entry<'a>(passwd: &'a str, username: &str) -> Option<Vec<&'a str>> {
    passwd
        .lines()
        .map(|line| line.split(':').collect::<Vec<_>>())
        .find(|fields| fields.len() >= 6 && fields[0] == username)
}

/// Members of `group`, or `None` if the group does not exist
fn group_members<'a>(group_db: &'a str, group: &str) -> Option<Vec<&'a str>> {
    group_db
        .lines()
        .map(|line| line.split(':').collect::<Vec<_>>())
        .find(|fields| fields.len() >= 3 && fields[0] == group)
        .map(|fields| {
            fields
                .get(3)
                .map(|m| m.split(',').filter(|s| !s.is_empty()).collect::<Vec<_>>())
                .unwrap_or_default()
        })
}

/// Whether `username` is registered
pub async fn user_exists(paths: &HostPaths, username: &str) -> Result<bool, ProvisionError> {
    let passwd = read_db(paths.passwd()).await?;
    Ok(passwd_entry(&passwd, username).is_some())
}

/// Home directory of `username`, defaulting to /home/<user>
pub async fn user_home(paths: &HostPaths, username: &str) -> Result<PathBuf, ProvisionError> {
    let passwd = read_db(paths.passwd()).await?;
    Ok(passwd_entry(&passwd, username)
        .map(|fields| PathBuf::from(fields[5]))
        .unwrap_or_else(|| PathBuf::from(format!("/home/{}", username))))
}

/// Whether `group` exists
pub async fn group_exists(paths: &HostPaths, group: &str) -> Result<bool, ProvisionError> {
    let db = read_db(paths.group()).await?;
    Ok(group_members(&db, group).is_some())
}

/// Whether `username` is a supplementary member of `group`
pub async fn is_member(
    paths: &HostPaths,
    username: &str,
    group: &str,
) -> Result<bool, ProvisionError> {
    let db = read_db(paths.group()).await?;
    Ok(group_members(&db, group).is_some_and(|members| members.contains(&username)))
}
