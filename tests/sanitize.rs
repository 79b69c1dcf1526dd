use std::fs;

use tempfile::tempdir;

use golj::sanitize::{banned_tokens, contains_banned_token, Sanitizer, DEFAULT_PREAMBLE};

mod common;

#[test]
fn it_should_strip_banned_lines() {
  common::setup();

  let source = "def play(stage, played):\n    print(stage)\n    played.append(0)\nimport os\n";
  let sanitized = Sanitizer::new().unwrap().sanitize(source);

  assert_eq!(
    sanitized.text(),
    format!("{}\ndef play(stage, played):\n    played.append(0)\n", DEFAULT_PREAMBLE)
  );
  let lines = sanitized.stripped().iter().map(|s| s.line).collect::<Vec<usize>>();
  assert_eq!(lines, vec![2, 4]);
  assert_eq!(sanitized.stripped()[0].token, "print");
  assert_eq!(sanitized.stripped()[1].token, "import");
}

#[test]
fn tokens_sharing_a_prefix_are_all_found() {
  common::setup();

  let sanitizer = Sanitizer::new().unwrap();
  // "ev" 开头的 eval 不能挡住后面的 exec
  assert!(sanitizer.find("x = evexec").is_some());
  assert!(sanitizer.find("x = getgetattr").is_some());
  assert!(sanitizer.find("__na__name__").is_some());
  assert!(sanitizer.find("compile").is_some());
  assert!(sanitizer.find("delattr(x, 'y')").is_some());
  assert!(sanitizer.find("evaluate = 1").is_some());
  assert!(sanitizer.find("moves = stage.moves").is_none());
}

#[test]
fn compatibility_spellings_are_stripped() {
  common::setup();

  let sanitizer = Sanitizer::new().unwrap();
  assert_eq!(sanitizer.find("x = ｅｖａｌ('1')"), Some("ｅ"));
  assert_eq!(sanitizer.find("ºpen('/etc/passwd')"), Some("º"));
  assert_eq!(sanitizer.find("__ｉｍｐｏｒｔ__('os')"), Some("ｉ"));
  assert_eq!(sanitizer.find("x = ＿＿doc＿＿"), Some("＿"));
  assert_eq!(sanitizer.find("x = a‿b"), Some("‿"));
  // 更早出现的 ASCII 禁用词优先
  assert_eq!(sanitizer.find("print(ｅ)"), Some("print"));
  assert!(sanitizer.find("s = '→ ok'").is_none());

  let source = "def play(stage, played):\n    ｅｘｅｃ('x')\n    played.append(0)\n";
  let sanitized = sanitizer.preamble("").sanitize(source);
  assert_eq!(sanitized.text(), "def play(stage, played):\n    played.append(0)\n");
  assert_eq!(sanitized.stripped()[0].line, 2);
}

#[test]
fn banned_tokens_are_separate_entries() {
  assert!(banned_tokens().contains(&"compile"));
  assert!(banned_tokens().contains(&"delattr"));
  assert!(!banned_tokens().contains(&"compiledelattr"));
  assert!(contains_banned_token("__builtins__"));
  assert!(!contains_banned_token("range"));
}

#[test]
fn custom_token_lists_and_preambles() {
  let sanitizer = Sanitizer::with_tokens(&["a.b", "(?"]).unwrap().preamble("");
  let sanitized = sanitizer.sanitize("axb\na.b\n(?x\nok");
  assert_eq!(sanitized.text(), "axb\nok");
  assert!(Sanitizer::with_tokens(&[]).is_err());
}

#[test]
fn it_should_install_into_the_submission_root() {
  common::setup();

  let dir = tempdir().unwrap();
  let upload = dir.path().join("tmp").join("7.py");
  let target = dir.path().join("teams").join("7").join("ModulePlayer.py");
  fs::create_dir_all(upload.parent().unwrap()).unwrap();
  fs::write(&upload, b"x = 1\nopen('f')\ny = '\xb0'\n\xe9 = 2\n").unwrap();

  let sanitized = Sanitizer::new().unwrap().preamble("import GoLLib").install(&upload, &target).unwrap();
  assert_eq!(sanitized.stripped().len(), 2);
  assert_eq!(sanitized.stripped()[1].token, "\u{e9}");
  assert!(!upload.exists());
  assert_eq!(fs::read(&target).unwrap(), b"import GoLLib\nx = 1\ny = '\xb0'\n".to_vec());

  let leftovers = fs::read_dir(target.parent().unwrap()).unwrap().count();
  assert_eq!(leftovers, 1);
}

#[test]
fn missing_uploads_are_fatal() {
  let dir = tempdir().unwrap();
  let err = Sanitizer::new()
    .unwrap()
    .install(dir.path().join("missing.py"), dir.path().join("out.py"))
    .unwrap_err();
  assert!(err.to_string().contains("does not exist"));
}
