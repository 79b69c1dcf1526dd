//! Player running as a separate, restricted process.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info, warn};
use nix::libc;
use nix::sys::resource::{setrlimit, Resource};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{setgid, setgroups, setuid, Pid};

use crate::cgroup::PlayerCgroup;
use crate::grid::Coord;
use crate::guard::{Identity, Interrupter, Namespace, Player};
use crate::protocol::{encode_namespace, encode_stage, parse_reply, MAX_REPLY_LENGTH};
use crate::stage::{decode_latin1, StageView};
use crate::utils::{parse_env, MemoryLimitType};
use crate::GolBoxError;

/// How to start a player process
#[derive(Debug, Clone)]
pub struct ScriptCommand {
  program: String,
  arguments: Vec<String>,
  env: Vec<(String, String)>,
  cwd: Option<PathBuf>,
  identity: Option<Identity>,
  /// KB, 0 for no limit
  memory_limit: MemoryLimitType,
  process: u64,
  cgroup: Option<String>,
  namespace: Namespace,
}

/// A player process speaking the line protocol.
///
/// A process that was interrupted or died is started again from the same
/// command before the next turn.
pub struct ScriptPlayer {
  command: ScriptCommand,
  child: Arc<Mutex<Option<Child>>>,
  interrupted: Arc<AtomicBool>,
  process: Option<Process>,
}

/// Pipes and limits of the running process
struct Process {
  pid: Pid,
  input: ChildStdin,
  output: BufReader<ChildStdout>,
  cgroup: Option<PlayerCgroup>,
}

impl ScriptCommand {
  pub fn new<PS: Into<String>, AS: Into<String>>(program: PS, arguments: Vec<AS>) -> Self {
    ScriptCommand {
      program: program.into(),
      arguments: arguments.into_iter().map(|a| a.into()).collect(),
      env: vec![
        (
          "PATH".to_string(),
          std::env::var("PATH").unwrap_or_default(),
        ),
        ("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string()),
      ],
      cwd: None,
      identity: None,
      memory_limit: 262144,
      process: 16,
      cgroup: None,
      namespace: Namespace::default(),
    }
  }

  pub fn env<KS: Into<String>, VS: Into<String>>(mut self, key: KS, value: VS) -> Self {
    self.env.push((key.into(), value.into()));
    self
  }

  /// Parse `KEY=VALUE` / `KEY` entries
  pub fn parse_env_list(mut self, list: &[String]) -> Result<Self, GolBoxError> {
    for text in list {
      self.env.push(parse_env(text)?);
    }
    Ok(self)
  }

  pub fn cwd<P: Into<PathBuf>>(mut self, path: P) -> Self {
    self.cwd = Some(path.into());
    self
  }

  /// Identity the process switches to before exec, for good
  pub fn identity(mut self, identity: Option<Identity>) -> Self {
    self.identity = identity;
    self
  }

  pub fn memory_limit(mut self, value: MemoryLimitType) -> Self {
    self.memory_limit = value;
    self
  }

  pub fn process(mut self, value: u64) -> Self {
    self.process = value;
    self
  }

  /// Parent name of the per player cgroup, `None` disables cgroups
  pub fn cgroup(mut self, parent: Option<String>) -> Self {
    self.cgroup = parent;
    self
  }

  pub fn namespace(mut self, namespace: Namespace) -> Self {
    self.namespace = namespace;
    self
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  pub fn arguments(&self) -> &[String] {
    &self.arguments
  }

  pub fn spawn(&self) -> Result<ScriptPlayer, GolBoxError> {
    let mut player = ScriptPlayer {
      command: self.clone(),
      child: Arc::new(Mutex::new(None)),
      interrupted: Arc::new(AtomicBool::new(false)),
      process: None,
    };
    player.start()?;
    Ok(player)
  }

  fn launch(&self) -> Result<(Child, Process), GolBoxError> {
    let mut command = Command::new(&self.program);
    command
      .args(&self.arguments)
      .env_clear()
      .envs(self.env.iter().map(|(key, value)| (key, value)))
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::inherit())
      .process_group(0);
    if let Some(cwd) = &self.cwd {
      command.current_dir(cwd);
    }

    let identity = self.identity;
    let memory_limit = self.memory_limit;
    unsafe {
      command.pre_exec(move || restrict(identity.as_ref(), memory_limit));
    }

    let mut child = command.spawn().map_err(|err| {
      GolBoxError::player(format!("Spawn player {} fails: {}", self.program, err))
    })?;
    let pid = Pid::from_raw(child.id() as libc::pid_t);
    info!(
      "Start player #{}. {} {}",
      pid,
      self.program,
      self.arguments.join(" ")
    );

    let cgroup = self
      .cgroup
      .as_ref()
      .map(|parent| PlayerCgroup::new(parent, pid, self.memory_limit, self.process));

    let (mut input, output) = match (child.stdin.take(), child.stdout.take()) {
      (Some(input), Some(output)) => (input, output),
      _ => {
        let _ = child.kill();
        let _ = child.wait();
        return Err(GolBoxError::player("Player pipes are not available"));
      }
    };

    let namespace = encode_namespace(&self.namespace);
    if let Err(err) = input.write_all(namespace.as_bytes()).and_then(|_| input.flush()) {
      warn!("Send namespace to player #{}. fails: {}", pid, err);
    }

    Ok((
      child,
      Process {
        pid,
        input,
        output: BufReader::new(output),
        cgroup,
      },
    ))
  }
}

/// Runs in the child between fork and exec
fn restrict(identity: Option<&Identity>, memory_limit: MemoryLimitType) -> io::Result<()> {
  if unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) } != 0 {
    return Err(io::Error::last_os_error());
  }

  // 禁止写文件和 core dump
  setrlimit(Resource::RLIMIT_FSIZE, 0, 0)?;
  setrlimit(Resource::RLIMIT_CORE, 0, 0)?;
  if memory_limit > 0 {
    let bytes = memory_limit * 1024;
    setrlimit(Resource::RLIMIT_AS, bytes, bytes)?;
  }

  if let Some(identity) = identity {
    setgroups(&[])?;
    setgid(identity.gid())?;
    setuid(identity.uid())?;
  }
  Ok(())
}

fn lock_child(child: &Mutex<Option<Child>>) -> MutexGuard<'_, Option<Child>> {
  match child.lock() {
    Ok(guard) => guard,
    Err(poisoned) => poisoned.into_inner(),
  }
}

impl Process {
  fn read_line(&mut self) -> Result<Option<String>, GolBoxError> {
    let mut buf = vec![];
    let size = (&mut self.output)
      .take(MAX_REPLY_LENGTH)
      .read_until(b'\n', &mut buf)?;
    if size == 0 {
      return Ok(None);
    }
    if !buf.ends_with(b"\n") && size as u64 >= MAX_REPLY_LENGTH {
      return Err(GolBoxError::player(format!(
        "Reply line exceeds {} bytes",
        MAX_REPLY_LENGTH
      )));
    }
    Ok(Some(decode_latin1(&buf)))
  }
}

impl ScriptPlayer {
  /// Pid of the running process
  pub fn pid(&self) -> Option<Pid> {
    self.process.as_ref().map(|process| process.pid)
  }

  fn start(&mut self) -> Result<(), GolBoxError> {
    self.stop();
    let (child, process) = self.command.launch()?;
    *lock_child(&self.child) = Some(child);
    self.interrupted.store(false, Ordering::SeqCst);
    self.process = Some(process);
    Ok(())
  }

  /// Kill and reap the process, then release its pipes and cgroup
  fn stop(&mut self) {
    if let Some(mut child) = lock_child(&self.child).take() {
      let _ = child.kill();
      match child.wait() {
        Ok(status) => debug!("Player #{}. exits with {}", child.id(), status),
        Err(err) => error!("Wait player #{}. fails: {}", child.id(), err),
      }
    }
    if let Some(process) = self.process.take() {
      if let Some(memory) = process.cgroup.as_ref().and_then(|cgroup| cgroup.max_memory()) {
        info!("Player #{}. peak memory {} KB", process.pid, memory);
      }
    }
  }

  fn is_running(&self) -> bool {
    match lock_child(&self.child).as_mut() {
      Some(child) => matches!(child.try_wait(), Ok(None)),
      None => false,
    }
  }
}

impl Player for ScriptPlayer {
  fn play(&mut self, stage: &StageView, played: &mut Vec<Coord>) -> Result<(), GolBoxError> {
    if self.interrupted.load(Ordering::SeqCst) || !self.is_running() {
      info!("Restart player before generation {}", stage.gen());
      self.start()?;
    }
    let process = self
      .process
      .as_mut()
      .ok_or_else(|| GolBoxError::player("Player process is not running"))?;

    process.input.write_all(encode_stage(stage).as_bytes())?;
    process.input.flush()?;

    loop {
      let line = match process.read_line()? {
        Some(line) => line,
        None => return Err(GolBoxError::player("Player closed its output")),
      };
      match parse_reply(&line) {
        Some(reply) if reply.gen == stage.gen() => {
          played.extend(reply.moves);
          return Ok(());
        }
        Some(reply) => debug!("Skip stale reply of generation {}", reply.gen),
        None => debug!("Skip player line ({})", line.trim_end()),
      }
    }
  }

  fn interrupter(&self) -> Option<Interrupter> {
    let child = Arc::clone(&self.child);
    let interrupted = Arc::clone(&self.interrupted);
    Some(Arc::new(move || {
      interrupted.store(true, Ordering::SeqCst);
      let mut child = lock_child(&child);
      if let Some(child) = child.as_mut() {
        // 未回收的进程组长保证进程组 id 没有被复用
        if let Ok(None) = child.try_wait() {
          let group = Pid::from_raw(child.id() as libc::pid_t);
          if let Err(err) = killpg(group, Signal::SIGKILL) {
            debug!("Kill player group #{}. fails: {}", group, err);
            let _ = child.kill();
          }
        }
      }
    }))
  }
}

impl Drop for ScriptPlayer {
  fn drop(&mut self) {
    self.stop();
  }
}
