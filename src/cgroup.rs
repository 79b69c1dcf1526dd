use cgroups_rs::cgroup_builder::CgroupBuilder;
use cgroups_rs::memory::MemController;
use cgroups_rs::pid::PidController;
use cgroups_rs::{Cgroup, CgroupPid, Controller, MaxValue};
use log::{debug, error, warn};
use nix::unistd::Pid;

use crate::utils::MemoryLimitType;

/// Memory and pid limits of one player process, removed on drop.
///
/// Hosts without the controllers (or without permission to create groups)
/// get a disabled instance, the rlimits of the player still apply.
pub struct PlayerCgroup {
  name: String,
  cgroup: Option<Cgroup>,
}

impl PlayerCgroup {
  pub fn new(parent: &str, child: Pid, memory_limit: MemoryLimitType, process: u64) -> Self {
    let name = format!("{}/{}.{}", parent, parent, child.as_raw());
    debug!("Init cgroup {}", name);

    let hierarchy = cgroups_rs::hierarchies::auto();
    let supports = |controller: &str| {
      hierarchy
        .subsystems()
        .iter()
        .any(|subsystem| subsystem.controller_name() == controller)
    };
    let enable_memory = supports("memory");
    let enable_pids = supports("pids");
    if !enable_memory {
      warn!("cgroup memory is not supported");
    }
    if !enable_pids {
      warn!("cgroup pids is not supported");
    }
    if !enable_memory && !enable_pids {
      return PlayerCgroup { name, cgroup: None };
    }

    let mut builder = CgroupBuilder::new(name.as_str());
    let mut controllers = vec![];
    if enable_memory {
      let memory_limit = (memory_limit * 1024) as i64;
      builder = builder
        .memory()
        .memory_hard_limit(memory_limit)
        .memory_swap_limit(memory_limit)
        .done();
      controllers.push("memory".to_string());
    }
    if enable_pids {
      builder = builder
        .pid()
        .maximum_number_of_processes(MaxValue::Value(process as i64))
        .done();
      controllers.push("pids".to_string());
    }

    let cgroup = match builder.set_specified_controllers(controllers).build(hierarchy) {
      Ok(cgroup) => cgroup,
      Err(err) => {
        error!("Build cgroup {} fails: {}", name, err);
        return PlayerCgroup { name, cgroup: None };
      }
    };

    let task = CgroupPid::from(child.as_raw() as u64);
    if let Some(memory) = cgroup.controller_of::<MemController>() {
      if let Err(err) = memory.add_task(&task) {
        error!("Add player {} to cgroup memory fails: {}", child, err);
      }
    }
    if let Some(pids) = cgroup.controller_of::<PidController>() {
      if let Err(err) = pids.add_task(&task) {
        error!("Add player {} to cgroup pids fails: {}", child, err);
      }
    }

    PlayerCgroup {
      name,
      cgroup: Some(cgroup),
    }
  }

  /// Peak memory of the player in KB, when the memory controller is on
  pub fn max_memory(&self) -> Option<MemoryLimitType> {
    let memory = self.cgroup.as_ref()?.controller_of::<MemController>()?;
    Some(memory.memswap().max_usage_in_bytes / 1024)
  }
}

impl Drop for PlayerCgroup {
  fn drop(&mut self) {
    if let Some(cgroup) = self.cgroup.take() {
      debug!("Delete created cgroup {}", self.name);
      if let Err(err) = cgroup.delete() {
        error!("Delete cgroup {} fails: {}", self.name, err);
      }
    }
  }
}
