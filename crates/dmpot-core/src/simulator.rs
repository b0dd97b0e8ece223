use crate::reachfile::REACH_OUTPUT_FILE;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::warn;

/// Handle on the external simulator executable. The simulator is a black
/// box: given a working directory holding a complete input set, it writes
/// the reach output file. A failed invocation is NOT fatal for the
/// campaign; the run is scored with sentinel statistics instead.
#[derive(Debug, Clone)]
pub struct Simulator {
    exe: String,
}

impl Simulator {
    pub fn new(exe: impl Into<String>) -> Self {
        Self { exe: exe.into() }
    }

    /// Runs the simulator synchronously inside `working_dir`. Success
    /// means the process exited cleanly AND the output file exists.
    pub fn run(&self, working_dir: &Path) -> bool {
        let local: PathBuf = working_dir.join(&self.exe);
        let program: PathBuf = if local.is_file() {
            local
        } else {
            PathBuf::from(&self.exe)
        };

        let status = Command::new(&program).current_dir(working_dir).status();
        let exited_ok = match status {
            Ok(status) => status.success(),
            Err(e) => {
                warn!("simulator {} failed to start: {}", program.display(), e);
                false
            }
        };

        let output_present = working_dir.join(REACH_OUTPUT_FILE).exists();
        if exited_ok && !output_present {
            warn!(
                "simulator exited cleanly but wrote no {} in {}",
                REACH_OUTPUT_FILE,
                working_dir.display()
            );
        }
        exited_ok && output_present
    }
}
