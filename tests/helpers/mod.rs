use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use rsbackup::BackupError;
use rsbackup::adapter::AdapterContext;
use rsbackup::command::Utilities;
use rsbackup::delivery::Compression;
use rsbackup::executor::{CommandExecutor, CommandSpec, ExecutionResult};

/// Executor that records every command and answers from a script.
///
/// Responses are matched by action name and consumed in order; actions with
/// no scripted response succeed silently.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedExecutor {
    calls: Mutex<Vec<CommandSpec>>,
    responses: Mutex<BTreeMap<String, VecDeque<ExecutionResult>>>,
}

#[allow(dead_code)]
impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for the next command with the given action.
    pub fn respond(self, action: &str, result: ExecutionResult) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(action.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.action).collect()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult, BackupError> {
        self.calls.lock().unwrap().push(spec.clone());
        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&spec.action)
            .and_then(VecDeque::pop_front);
        Ok(scripted.unwrap_or_else(|| ExecutionResult::exited(0, "", "")))
    }
}

/// Utilities that never consult PATH.
#[allow(dead_code)]
pub fn passthrough_utilities() -> Utilities {
    Utilities::passthrough(BTreeMap::new())
}

/// Builds an adapter context for a real (non dry-run) run.
#[allow(dead_code)]
pub fn context<'a>(
    executor: &'a dyn CommandExecutor,
    utilities: &'a Utilities,
    dump_dir: &'a Utf8Path,
    compression: Option<&'a Compression>,
) -> AdapterContext<'a> {
    AdapterContext {
        executor,
        utilities,
        dump_dir,
        compression,
        dry_run: false,
    }
}

/// Returns the UTF-8 path of a temporary directory.
#[allow(dead_code)]
pub fn utf8_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("temp dir path is valid UTF-8")
}

/// Writes `contents` to `dir/name`, returning the path.
#[allow(dead_code)]
pub fn write_file(dir: &Utf8Path, name: &str, contents: &[u8]) -> Utf8PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}
