use std::path::PathBuf;

use log::debug;

use crate::context::{GolBoxContext, GolBoxRunContext, SubmissionOption};
use crate::sandbox::ContainerOption;
use crate::stage::Goal;
use crate::GolBox;

/// Build GolBox
pub struct GolBoxBuilder {
  context: Box<dyn GolBoxContext>,
  options: Vec<SubmissionOption>,
  root: PathBuf,
  parallel: bool,
  ext: Option<String>,
  template: Option<PathBuf>,
  stages: Vec<Goal>,
  container: Option<ContainerOption>,
  keep: Option<bool>,
}

/// Build one submission option
pub struct SubmissionOptionBuilder {
  parent: GolBoxBuilder,
  option: SubmissionOption,
}

impl GolBoxBuilder {
  /// Create a new GolBox with a context
  pub fn new<P: Into<PathBuf>>(context: Box<dyn GolBoxContext>, root: P) -> Self {
    GolBoxBuilder {
      context,
      options: vec![],
      root: root.into(),
      parallel: false,
      ext: None,
      template: None,
      stages: vec![],
      container: None,
      keep: None,
    }
  }

  /// Create a GolBox collecting scores
  pub fn run<P: Into<PathBuf>>(root: P) -> Self {
    Self::new(Box::new(GolBoxRunContext::new()), root)
  }

  /// Add the submission of a team
  pub fn submission<LS: Into<String>>(self, label: LS) -> SubmissionOptionBuilder {
    let mut option = SubmissionOption::new(label, self.root.clone());

    if let Some(ext) = &self.ext {
      option.ext = ext.clone();
    }
    if let Some(template) = &self.template {
      option.template = Some(template.clone());
    }
    option.stages = self.stages.clone();
    if let Some(container) = &self.container {
      option.container = container.clone();
    }
    if let Some(keep) = self.keep {
      option.keep = keep;
    }
    debug!("Add submission {}", option.label);

    SubmissionOptionBuilder {
      parent: self,
      option,
    }
  }

  /// Build GolBox after setting all the options
  pub fn build(self) -> GolBox {
    GolBox {
      context: self.context,
      options: self.options,
      parallel: self.parallel,
    }
  }

  /// Run submissions on scoped threads
  pub fn set_parallel(mut self, flag: bool) -> Self {
    self.parallel = flag;
    self
  }

  /// Set default source extension
  pub fn set_default_ext(mut self, ext: Option<String>) -> Self {
    self.ext = ext;
    self
  }

  /// Set default template directory
  pub fn set_default_template(mut self, template: Option<PathBuf>) -> Self {
    self.template = template;
    self
  }

  /// Set default stage selection
  pub fn set_default_stages(mut self, stages: Vec<Goal>) -> Self {
    self.stages = stages;
    self
  }

  /// Set default container runtime
  pub fn set_default_container(mut self, container: Option<ContainerOption>) -> Self {
    self.container = container;
    self
  }

  /// Keep working trees after the run
  pub fn set_default_keep(mut self, flag: bool) -> Self {
    self.keep = Some(flag);
    self
  }
}

impl SubmissionOptionBuilder {
  /// Finish building, return GolBoxBuilder
  pub fn done(self) -> GolBoxBuilder {
    let mut builder = self.parent;
    builder.options.push(self.option);
    builder
  }

  /// Finish building, return GolBox
  pub fn build(self) -> GolBox {
    let builder = self.done();
    builder.build()
  }

  pub fn ext<S: Into<String>>(mut self, ext: S) -> Self {
    self.option.ext = ext.into();
    self
  }

  /// Set installed source name, without extension
  pub fn entry<S: Into<String>>(mut self, entry: S) -> Self {
    self.option.entry = entry.into();
    self
  }

  pub fn template<P: Into<PathBuf>>(mut self, template: P) -> Self {
    self.option.template = Some(template.into());
    self
  }

  /// Replace the import line written before the sanitized source
  pub fn preamble<S: Into<String>>(mut self, preamble: S) -> Self {
    self.option.preamble = Some(preamble.into());
    self
  }

  pub fn stages(mut self, stages: Vec<Goal>) -> Self {
    self.option.stages = stages;
    self
  }

  pub fn container(mut self, container: ContainerOption) -> Self {
    self.option.container = container;
    self
  }

  pub fn keep(mut self, flag: bool) -> Self {
    self.option.keep = flag;
    self
  }
}
