//! 外部上传程序调用：构造参数、等待退出并按退出码分类结果。

use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{error, info};

/// 子进程运行结果中被消费的部分：退出码与标准错误输出。
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stderr: Vec<u8>,
}

pub type RunFuture<'a> = Pin<Box<dyn Future<Output = io::Result<CommandOutput>> + Send + 'a>>;

/// 对“运行外部命令并等待结束”的抽象，便于测试替换。
pub trait CommandRunner: Send + Sync + fmt::Debug {
    fn run<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> RunFuture<'a>;
}

/// 基于 `tokio::process` 的真实实现，不设超时；请求被取消时子进程随之被终止。
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> RunFuture<'a> {
        Box::pin(async move {
            let output = Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await?;
            Ok(CommandOutput {
                success: output.status.success(),
                code: output.status.code(),
                stderr: output.stderr,
            })
        })
    }
}

#[derive(Debug)]
pub enum UploadError {
    MissingCredentials,
    Failed { code: Option<i32>, stderr: String },
    Spawn(io::Error),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::MissingCredentials => write!(f, "uploader credentials are not configured"),
            UploadError::Failed { code, stderr } => {
                write!(f, "uploader exited with {code:?}: {stderr}")
            }
            UploadError::Spawn(err) => write!(f, "failed to run uploader: {err}"),
        }
    }
}

/// 上传程序的账号与目标目录。
#[derive(Debug)]
pub struct UploaderConfig {
    pub program: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub destination: String,
}

#[derive(Debug, Clone)]
pub struct Uploader {
    config: Arc<UploaderConfig>,
    runner: Arc<dyn CommandRunner>,
}

impl Uploader {
    pub fn new(config: UploaderConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config: Arc::new(config),
            runner,
        }
    }

    fn credentials(&self) -> Result<(&str, &str), UploadError> {
        match (
            non_empty(self.config.username.as_deref()),
            non_empty(self.config.password.as_deref()),
        ) {
            (Some(username), Some(password)) => Ok((username, password)),
            _ => Err(UploadError::MissingCredentials),
        }
    }

    /// 账号缺失时提前失败，避免无用的暂存写入。
    pub fn ensure_configured(&self) -> Result<(), UploadError> {
        self.credentials().map(|_| ())
    }

    /// 对单个已校验的本地文件调用一次上传程序。
    ///
    /// 账号缺失时不会启动子进程。
    pub async fn upload(&self, file: &Path, display_name: &str) -> Result<(), UploadError> {
        let (username, password) = self.credentials().inspect_err(|_| {
            error!(file = display_name, "uploader credentials missing");
        })?;

        let args: Vec<OsString> = vec![
            "-l".into(),
            username.into(),
            "-p".into(),
            password.into(),
            "-u".into(),
            self.config.destination.clone().into(),
            file.as_os_str().to_owned(),
        ];

        info!(
            file = display_name,
            destination = self.config.destination,
            "invoking uploader"
        );
        let output = self
            .runner
            .run(&self.config.program, &args)
            .await
            .map_err(|err| {
                error!(program = self.config.program, error = %err, "failed to spawn uploader");
                UploadError::Spawn(err)
            })?;

        if output.success {
            info!(file = display_name, "uploader finished");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        error!(
            file = display_name,
            code = ?output.code,
            stderr,
            "uploader failed"
        );
        Err(UploadError::Failed {
            code: output.code,
            stderr,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeRunner, config};
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn passes_credentials_destination_and_file_in_order() {
        let runner = FakeRunner::succeeding();
        let uploader = Uploader::new(config(Some("jan"), Some("tajne")), runner.clone());
        uploader
            .upload(&PathBuf::from("/app/browse/a.txt"), "a.txt")
            .await
            .expect("upload succeeds");

        let args: Vec<String> = runner
            .last_args()
            .expect("one call")
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["-l", "jan", "-p", "tajne", "-u", "/Moje_Uploady", "/app/browse/a.txt"]
        );
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn missing_credentials_short_circuit_before_spawn() {
        let runner = FakeRunner::succeeding();
        let uploader = Uploader::new(config(Some("jan"), None), runner.clone());
        let result = uploader.upload(Path::new("/app/browse/a.txt"), "a.txt").await;
        assert!(matches!(result, Err(UploadError::MissingCredentials)));

        let uploader = Uploader::new(config(Some(""), Some("tajne")), runner.clone());
        let result = uploader.upload(Path::new("/app/browse/a.txt"), "a.txt").await;
        assert!(matches!(result, Err(UploadError::MissingCredentials)));
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let runner = FakeRunner::failing(2, "Błąd logowania\n");
        let uploader = Uploader::new(config(Some("jan"), Some("tajne")), runner);
        let result = uploader.upload(Path::new("/app/browse/a.txt"), "a.txt").await;
        match result {
            Err(UploadError::Failed { code, stderr }) => {
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "Błąd logowania\n");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_runner_captures_exit_code_and_stderr() {
        let runner = ProcessRunner;
        let args: Vec<OsString> = vec!["-c".into(), "echo oops >&2; exit 4".into()];
        let output = runner.run("sh", &args).await.expect("sh runs");
        assert!(!output.success);
        assert_eq!(output.code, Some(4));
        assert_eq!(String::from_utf8_lossy(&output.stderr), "oops\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancelled_run_kills_the_child() {
        let temp = tempfile::tempdir().expect("tempdir");
        let marker = temp.path().join("finished");
        let script = format!("sleep 1; touch '{}'", marker.display());
        let args: Vec<OsString> = vec!["-c".into(), script.into()];

        let runner = ProcessRunner;
        let result =
            tokio::time::timeout(std::time::Duration::from_millis(100), runner.run("sh", &args)).await;
        assert!(result.is_err(), "run should still be pending");

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let uploader = Uploader::new(
            UploaderConfig {
                program: "/nonexistent/chomik-uploader".into(),
                ..config(Some("jan"), Some("tajne"))
            },
            Arc::new(ProcessRunner),
        );
        let result = uploader.upload(Path::new("/tmp/a.txt"), "a.txt").await;
        assert!(matches!(result, Err(UploadError::Spawn(_))));
    }
}
