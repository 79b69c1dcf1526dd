use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use flexi_logger::{Duplicate, FileSpec, Logger};
use log::{error, info};

use golj::guard::Identity;
use golj::runtime::parse_stages;
use golj::sanitize::Sanitizer;
use golj::stage::{decode_latin1, encode_latin1, Replay};
use golj::utils::mount::MountPoint;
use golj::utils::{current_user_name, default_format};
use golj::{
  play_script, ContainerOption, Goal, GolBoxBuilder, GolBoxError, GolBoxExit, GuardOptions,
  RuntimeOptions, ScriptCommand,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[arg(long, global = true, default_value_t = false, help = "Log debug messages")]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
  #[command(about = "Sanitize, run and score team submissions")]
  Run {
    #[arg(long, help = "Root directory holding tmp/, teams/ and logs/")]
    root: PathBuf,

    #[arg(long = "team", required = true, help = "Team id, repeatable")]
    teams: Vec<String>,

    #[arg(long, help = "Container image")]
    image: Option<String>,

    #[arg(long, help = "Container runtime executable")]
    runtime: Option<String>,

    #[arg(long, help = "CPUs given to each container")]
    cpus: Option<f64>,

    #[arg(long = "mount", help = "Read only mount into the container (SRC:DST), repeatable")]
    mounts: Vec<String>,

    #[arg(long, help = "Trusted tree copied into each working tree")]
    template: Option<PathBuf>,

    #[arg(long, default_value = "py", help = "Submission source extension")]
    ext: String,

    #[arg(long, default_value_t = false, help = "Run submissions in parallel")]
    parallel: bool,

    #[arg(long, default_value_t = false, help = "Keep working trees")]
    keep: bool,

    #[arg(help = "Stages, by id or name")]
    stages: Vec<String>,
  },

  #[command(about = "Play stages against a player process")]
  Play {
    #[arg(long, default_value = ".", help = "Directory holding stages/ and logs/")]
    root: PathBuf,

    #[arg(long, default_value_t = 5000, help = "Turn time limit (unit: ms)")]
    timeout: u64,

    #[arg(long, help = "Unprivileged user running the player")]
    user: Option<String>,

    #[arg(long, default_value_t = 262144, help = "Player memory limit (unit: KB)")]
    memory: u64,

    #[arg(long, help = "Pass environment variables (KEY=VALUE or KEY)")]
    env: Vec<String>,

    #[arg(long, default_value_t = false, help = "Do not create a cgroup for the player")]
    no_cgroup: bool,

    #[arg(help = "Stages, by id or name (default: $STAGES)")]
    stages: Vec<String>,

    #[arg(last = true, required = true, help = "Player program and its arguments")]
    command: Vec<String>,
  },

  #[command(about = "Strip banned lines from a submission")]
  Sanitize {
    #[arg(help = "Submission source")]
    source: PathBuf,

    #[arg(short, long, help = "Output file (default: stdout)")]
    output: Option<PathBuf>,
  },

  #[command(about = "Replay a stage log and print its score")]
  Replay {
    #[arg(help = "Stage log")]
    log: PathBuf,
  },
}

fn resolve_stages(stages: &[String]) -> Result<Vec<Goal>, GolBoxError> {
  if stages.is_empty() {
    let text = env::var("STAGES").unwrap_or_default();
    parse_stages(&text)
  } else {
    parse_stages(&stages.join(" "))
  }
}

fn start(cli: Cli) -> Result<(), GolBoxError> {
  match cli.command {
    Commands::Run {
      root,
      teams,
      image,
      runtime,
      cpus,
      mounts,
      template,
      ext,
      parallel,
      keep,
      stages,
    } => {
      let mut stages = resolve_stages(&stages)?;
      if stages.is_empty() {
        stages = Goal::all().to_vec();
      }

      let mut container = ContainerOption::new();
      if let Some(image) = image {
        container = container.image(image);
      }
      if let Some(runtime) = runtime {
        container = container.program(runtime);
      }
      if let Some(cpus) = cpus {
        container = container.cpus(cpus);
      }
      for mount in &mounts {
        container = container.mount(MountPoint::parse_read(mount)?);
      }

      let mut builder = GolBoxBuilder::run(root)
        .set_parallel(parallel)
        .set_default_ext(Some(ext))
        .set_default_template(template)
        .set_default_stages(stages)
        .set_default_container(Some(container))
        .set_default_keep(keep);
      for team in teams {
        builder = builder.submission(team).done();
      }

      let mut golbox = builder.build();
      golbox.start()?;
      golbox.report();
      Ok(())
    }
    Commands::Play {
      root,
      timeout,
      user,
      memory,
      env: envs,
      no_cgroup,
      stages,
      command,
    } => {
      let stages = resolve_stages(&stages)?;
      if stages.is_empty() {
        return Err(GolBoxError::cli("No stage selected"));
      }
      let identity = match &user {
        Some(user) => Some(Identity::from_user(user)?),
        None => None,
      };
      let cgroup = if no_cgroup {
        None
      } else {
        Some(match env::var("GOLJ_CGROUP") {
          Ok(cgroup) => cgroup,
          Err(_) => current_user_name()?,
        })
      };

      let (program, arguments) = match command.split_first() {
        Some((program, arguments)) => (program.clone(), arguments.to_vec()),
        None => return Err(GolBoxError::cli("Missing player program")),
      };
      let script = ScriptCommand::new(program, arguments)
        .cwd(&root)
        .identity(identity)
        .memory_limit(memory)
        .cgroup(cgroup)
        .parse_env_list(&envs)?;

      let options = RuntimeOptions::new(root).stages(stages).guard(
        GuardOptions::new()
          .timeout(Duration::from_millis(timeout))
          .identity(identity),
      );
      let total = play_script(&options, &script)?;
      println!("Total: {}", total);
      Ok(())
    }
    Commands::Sanitize { source, output } => {
      let text = decode_latin1(&fs::read(&source)?);
      let sanitized = Sanitizer::new()?.sanitize(&text);
      for stripped in sanitized.stripped() {
        info!("Line {} stripped for {}", stripped.line, stripped.token);
      }
      match output {
        Some(output) => fs::write(output, encode_latin1(sanitized.text()))?,
        None => print!("{}", sanitized.text()),
      }
      Ok(())
    }
    Commands::Replay { log } => {
      let text = decode_latin1(&fs::read(&log)?);
      let replay = Replay::parse(&text)?;
      let stage = replay.final_stage()?;
      println!("Score {}: {}", stage.goal().name(), golj::score(&stage));
      Ok(())
    }
  }
}

fn main() -> GolBoxExit {
  let cli = Cli::parse();

  let spec = if cli.verbose { "golj=debug" } else { "golj=info" };
  let logger = Logger::try_with_str(spec).and_then(|logger| {
    logger
      .log_to_file(
        FileSpec::default()
          .directory(env::var("LOG_DIR").unwrap_or("./logs/".into()))
          .basename("golj")
          .discriminant(format!("{}", chrono::offset::Local::now().format("%Y-%m-%d")))
          .suppress_timestamp(),
      )
      .append()
      .duplicate_to_stderr(Duplicate::Warn)
      .format_for_files(default_format)
      .start()
  });
  let _logger = match logger {
    Ok(logger) => logger,
    Err(err) => return GolBoxExit::Err(GolBoxError::from(err)),
  };

  info!("Start running golj");
  let result = start(cli);
  if let Err(err) = &result {
    error!("{}", err);
  }
  info!("Running golj finished");

  GolBoxExit::from(result)
}
