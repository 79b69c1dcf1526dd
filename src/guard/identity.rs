//! Scoped switch of the calling thread to an unprivileged identity.

use log::{debug, error};
use nix::errno::Errno;
use nix::libc;
use nix::unistd::{getegid, geteuid, Gid, Uid, User};

use crate::GolBoxError;

/// Keep the id unchanged in a setres*id call
const KEEP: libc::c_long = -1;

/// Effective uid / gid pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
  uid: Uid,
  gid: Gid,
}

/// Holds the lowered identity of the current thread, restores it on drop.
///
/// Restoration runs on every exit path of the guarded call, including a panic
/// unwinding through it.
#[must_use]
pub struct IdentityGuard {
  restore: Option<Identity>,
}

impl Identity {
  pub fn new(uid: u32, gid: u32) -> Self {
    Identity {
      uid: Uid::from_raw(uid),
      gid: Gid::from_raw(gid),
    }
  }

  /// Effective identity of the calling thread
  pub fn current() -> Self {
    Identity {
      uid: geteuid(),
      gid: getegid(),
    }
  }

  pub fn from_user(name: &str) -> Result<Self, GolBoxError> {
    let user = User::from_name(name)?
      .ok_or_else(|| GolBoxError::privilege(format!("User {} does not exist", name)))?;
    Ok(Identity {
      uid: user.uid,
      gid: user.gid,
    })
  }

  pub fn uid(&self) -> Uid {
    self.uid
  }

  pub fn gid(&self) -> Gid {
    self.gid
  }
}

// 直接调用 syscall，只修改当前线程的凭据；glibc 的 seteuid 会广播到所有线程
fn set_thread_euid(uid: Uid) -> Result<(), Errno> {
  let result =
    unsafe { libc::syscall(libc::SYS_setresuid, KEEP, uid.as_raw() as libc::c_long, KEEP) };
  Errno::result(result).map(drop)
}

fn set_thread_egid(gid: Gid) -> Result<(), Errno> {
  let result =
    unsafe { libc::syscall(libc::SYS_setresgid, KEEP, gid.as_raw() as libc::c_long, KEEP) };
  Errno::result(result).map(drop)
}

impl IdentityGuard {
  /// Lower the current thread to `target`, no-op for `None` or the current identity
  pub fn acquire(target: Option<&Identity>) -> Result<Self, GolBoxError> {
    let target = match target {
      Some(target) => target,
      None => return Ok(IdentityGuard { restore: None }),
    };
    let current = Identity::current();
    if *target == current {
      return Ok(IdentityGuard { restore: None });
    }

    // gid 必须在 uid 之前切换
    set_thread_egid(target.gid).map_err(|err| {
      GolBoxError::privilege(format!("Set egid {} fails: {}", target.gid, err))
    })?;
    if let Err(err) = set_thread_euid(target.uid) {
      if let Err(restore) = set_thread_egid(current.gid) {
        error!("Restore egid {} fails: {}", current.gid, restore);
        std::process::abort();
      }
      return Err(GolBoxError::privilege(format!(
        "Set euid {} fails: {}",
        target.uid, err
      )));
    }

    debug!(
      "Thread identity lowered to uid={} gid={}",
      target.uid, target.gid
    );
    Ok(IdentityGuard {
      restore: Some(current),
    })
  }

  pub fn is_lowered(&self) -> bool {
    self.restore.is_some()
  }
}

impl Drop for IdentityGuard {
  fn drop(&mut self) {
    if let Some(identity) = self.restore.take() {
      // 先恢复 uid，否则没有权限恢复 gid
      let result = set_thread_euid(identity.uid).and_then(|_| set_thread_egid(identity.gid));
      if let Err(err) = result {
        error!(
          "Restore identity uid={} gid={} fails: {}",
          identity.uid, identity.gid, err
        );
        std::process::abort();
      }
      debug!(
        "Thread identity restored to uid={} gid={}",
        identity.uid, identity.gid
      );
    }
  }
}
