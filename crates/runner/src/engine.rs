//! Engine process invocation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use loadctl_core::run::RunPaths;
use loadctl_core::worker::{engine_worker_list, WorkerServer};
use tokio::process::{Child, Command};

/// Arguments of one non-interactive distributed engine run.
#[derive(Debug, Clone)]
pub struct EngineInvocation {
    pub program: PathBuf,
    pub test_plan: PathBuf,
    pub per_worker_users: u32,
    pub duration_secs: u32,
    pub step_num: Option<u32>,
    pub workers: Vec<WorkerServer>,
    pub result_file: PathBuf,
    pub report_dir: PathBuf,
    pub engine_log: PathBuf,
}

impl EngineInvocation {
    pub fn new(
        program: &Path,
        test_plan: PathBuf,
        per_worker_users: u32,
        duration_secs: u32,
        step_num: Option<u32>,
        workers: &[WorkerServer],
        paths: &RunPaths,
    ) -> Self {
        Self {
            program: program.to_path_buf(),
            test_plan,
            per_worker_users,
            duration_secs,
            step_num,
            workers: workers.to_vec(),
            result_file: paths.result_file.clone(),
            report_dir: paths.report_dir.clone(),
            engine_log: paths.engine_log.clone(),
        }
    }

    /// Command-line arguments, excluding the program itself.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-n".into(),
            "-t".into(),
            self.test_plan.clone().into(),
            "-Gusers".into(),
            self.per_worker_users.to_string().into(),
            "-Ghold_time".into(),
            self.duration_secs.to_string().into(),
            "-Gserver.rmi.ssl.disable=true".into(),
            "-R".into(),
            engine_worker_list(&self.workers).into(),
            "-l".into(),
            self.result_file.clone().into(),
            "-e".into(),
            "-o".into(),
            self.report_dir.clone().into(),
            "-j".into(),
            self.engine_log.clone().into(),
        ];
        if let Some(step) = self.step_num {
            args.push("-Gstepnum".into());
            args.push(step.to_string().into());
        }
        args
    }

    /// Human-readable command line for the run log.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_os_str().to_os_string())
            .chain(self.args())
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Spawn the engine with stdout and stderr captured.
    ///
    /// The child is killed if its handle is dropped.
    pub fn spawn(&self) -> std::io::Result<Child> {
        Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }
}
