//! Switching from root to the configured service account.

use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::unistd::{Gid, Group, Uid, User, chown, setgid, setuid};
use thiserror::Error;
use tracing::{info, warn};

use super::PROCESS_TARGET;

/// Errors raised while dropping privileges.
#[derive(Debug, Error)]
pub enum PrivilegeError {
    /// The account database could not be queried.
    #[error("failed to look up '{name}': {source}")]
    Lookup { name: String, source: Errno },
    /// No such user.
    #[error("unknown user '{name}'")]
    UnknownUser { name: String },
    /// No such group.
    #[error("unknown group '{name}'")]
    UnknownGroup { name: String },
    /// Handing the runtime directory to the service account failed.
    #[error("failed to change owner of '{path}': {source}")]
    Chown { path: PathBuf, source: Errno },
    /// Clearing supplementary groups failed.
    #[error("failed to reset supplementary groups: {source}")]
    SetGroups { source: Errno },
    /// `setgid` failed.
    #[error("failed to switch to gid {gid}: {source}")]
    SetGid { gid: u32, source: Errno },
    /// `setuid` failed.
    #[error("failed to switch to uid {uid}: {source}")]
    SetUid { uid: u32, source: Errno },
}

/// What [`drop_privileges`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivilegeOutcome {
    /// The process now runs as `user`.
    Dropped { user: String, uid: u32, gid: u32 },
    /// The process kept its identity.
    Unchanged,
}

/// Switches to `identity` when running as root.
///
/// The runtime directory is handed to the target account first so the
/// daemon can still write its lifecycle files and socket afterwards. The
/// group is changed before the user.
pub fn drop_privileges(
    identity: Option<(&str, Option<&str>)>,
    runtime_dir: &Path,
) -> Result<PrivilegeOutcome, PrivilegeError> {
    let root = Uid::effective().is_root();
    let Some((user_name, group_name)) = identity else {
        if root {
            warn!(
                target: PROCESS_TARGET,
                "running as root without a process_user; keeping root privileges"
            );
        }
        return Ok(PrivilegeOutcome::Unchanged);
    };
    if !root {
        warn!(
            target: PROCESS_TARGET,
            user = user_name,
            "not running as root; ignoring process_user"
        );
        return Ok(PrivilegeOutcome::Unchanged);
    }

    let user = User::from_name(user_name)
        .map_err(|source| PrivilegeError::Lookup {
            name: user_name.to_owned(),
            source,
        })?
        .ok_or_else(|| PrivilegeError::UnknownUser {
            name: user_name.to_owned(),
        })?;
    let gid = match group_name {
        Some(name) => lookup_group(name)?,
        None => user.gid,
    };

    chown(runtime_dir, Some(user.uid), Some(gid)).map_err(|source| PrivilegeError::Chown {
        path: runtime_dir.to_path_buf(),
        source,
    })?;
    #[cfg(target_os = "linux")]
    nix::unistd::setgroups(&[gid]).map_err(|source| PrivilegeError::SetGroups { source })?;
    setgid(gid).map_err(|source| PrivilegeError::SetGid {
        gid: gid.as_raw(),
        source,
    })?;
    setuid(user.uid).map_err(|source| PrivilegeError::SetUid {
        uid: user.uid.as_raw(),
        source,
    })?;

    info!(
        target: PROCESS_TARGET,
        user = user_name,
        uid = user.uid.as_raw(),
        gid = gid.as_raw(),
        "dropped root privileges"
    );
    Ok(PrivilegeOutcome::Dropped {
        user: user_name.to_owned(),
        uid: user.uid.as_raw(),
        gid: gid.as_raw(),
    })
}

fn lookup_group(name: &str) -> Result<Gid, PrivilegeError> {
    Group::from_name(name)
        .map_err(|source| PrivilegeError::Lookup {
            name: name.to_owned(),
            source,
        })?
        .map(|group| group.gid)
        .ok_or_else(|| PrivilegeError::UnknownGroup {
            name: name.to_owned(),
        })
}
