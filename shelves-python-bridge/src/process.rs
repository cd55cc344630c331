//! Script host running the module in a child interpreter
//!
//! The child runs a bundled shim that imports the module, registers
//! callbacks that print JSON lines, and waits for replies on stdin. This
//! keeps the harness free of any build-time link against libpython.

use std::ffi::{OsStr, OsString};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;

use tracing::{debug, error, info, warn};

use crate::protocol::{decode_line, encode_command, HostCommand, HostMessage};
use crate::{Callbacks, HostError, MessageFn, ModuleSpec, ScriptHost};

/// Python source of the host-side shim
const SHIM: &str = include_str!("shim.py");

/// Program and arguments used to start the host process
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Run the bundled shim for `spec` under the given interpreter
    pub fn python(python: impl Into<PathBuf>, spec: &ModuleSpec) -> Self {
        Self::new(python)
            .arg("-u")
            .arg("-c")
            .arg(SHIM)
            .arg(&spec.search_path)
            .arg(&spec.module)
            .arg(&spec.class)
            .arg(if spec.debug { "1" } else { "0" })
            .env("PYTHONIOENCODING", "utf-8")
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    fn spawn(&self) -> Result<Child, HostError> {
        Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| HostError::Spawn {
                program: self.program.display().to_string(),
                source,
            })
    }
}

/// A running host process
struct Session {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Session {
    fn start(command: &ProcessCommand) -> Result<Self, HostError> {
        let mut child = command.spawn()?;
        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            return Err(HostError::Protocol("child stdio was not captured".to_string()));
        };
        forward_stderr(stderr);

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// Next message, or `None` once the child closes stdout.
    fn read_message(&mut self) -> Result<Option<HostMessage>, HostError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            if let Some(message) = decode_line(&line)? {
                return Ok(Some(message));
            }
        }
    }

    fn send(&mut self, command: &HostCommand) -> Result<(), HostError> {
        self.stdin.write_all(encode_command(command)?.as_bytes())?;
        self.stdin.flush()?;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            debug!("Killing script host process {}", self.child.id());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn forward_stderr(stderr: ChildStderr) {
    let spawned = thread::Builder::new()
        .name("script-host-stderr".to_string())
        .spawn(move || {
            for line in BufReader::new(stderr).lines() {
                match line {
                    Ok(line) => debug!(target: "script_host", "{}", line),
                    Err(_) => break,
                }
            }
        });
    if let Err(e) = spawned {
        warn!("Could not forward script host stderr: {}", e);
    }
}

/// [`ScriptHost`] backed by a child process speaking JSON lines
pub struct ProcessHost {
    command: ProcessCommand,
    session: Option<Session>,
    callbacks: Option<Callbacks>,
    log: Option<MessageFn>,
}

impl ProcessHost {
    pub fn new(command: ProcessCommand) -> Self {
        Self {
            command,
            session: None,
            callbacks: None,
            log: None,
        }
    }

    /// Host for `spec` under the given Python executable
    pub fn python(python: impl Into<PathBuf>, spec: &ModuleSpec) -> Self {
        Self::new(ProcessCommand::python(python, spec))
    }
}

impl ScriptHost for ProcessHost {
    fn initialize(&mut self) -> Result<(), HostError> {
        if self.session.is_some() {
            return Ok(());
        }

        info!("Starting script host: {}", self.command.program().display());
        let mut session = Session::start(&self.command)?;

        loop {
            match session.read_message()? {
                Some(HostMessage::Ready) => break,
                Some(HostMessage::Error { message }) => {
                    let _ = session.child.wait();
                    return Err(HostError::Script(message));
                }
                Some(other) => debug!("Ignoring {:?} before ready", other),
                None => {
                    let status = session.child.wait()?;
                    return Err(HostError::Exited(status));
                }
            }
        }

        info!("Script host ready (pid {})", session.child.id());
        self.session = Some(session);
        Ok(())
    }

    fn set_callbacks(&mut self, callbacks: Callbacks) -> Result<(), HostError> {
        self.callbacks = Some(callbacks);
        Ok(())
    }

    fn set_log_callback(&mut self, log: MessageFn) -> Result<(), HostError> {
        self.log = Some(log);
        Ok(())
    }

    fn run_loop(&mut self) -> Result<(), HostError> {
        let callbacks = self.callbacks.clone().ok_or(HostError::CallbacksMissing)?;
        let log = self.log.clone();
        let session = self.session.as_mut().ok_or(HostError::NotInitialized)?;

        session.send(&HostCommand::Run)?;

        let mut script_error = None;
        while let Some(message) = session.read_message()? {
            match message {
                HostMessage::Output { message } => (callbacks.output)(&message),
                HostMessage::Log { message } => match &log {
                    Some(log) => log(&message),
                    None => debug!(target: "script_host", "{}", message),
                },
                HostMessage::Status { state } => (callbacks.status)(&state),
                HostMessage::Input { prompt } => {
                    let value = (callbacks.input)(&prompt)?;
                    session.send(&HostCommand::InputReply { value })?;
                }
                HostMessage::Error { message } => {
                    error!("Script error: {}", message);
                    script_error = Some(message);
                }
                HostMessage::Ready => warn!("Unexpected ready message during run loop"),
            }
        }

        let status = session.child.wait()?;
        self.session = None;

        if let Some(message) = script_error {
            return Err(HostError::Script(message));
        }
        if !status.success() {
            return Err(HostError::Exited(status));
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Record = Arc<Mutex<Vec<String>>>;

    fn recording_callbacks(answer: Option<&'static str>) -> (Callbacks, MessageFn, Record) {
        let record: Record = Arc::new(Mutex::new(Vec::new()));

        let r = Arc::clone(&record);
        let output = Arc::new(move |m: &str| r.lock().unwrap().push(format!("output:{m}")));
        let r = Arc::clone(&record);
        let input = Arc::new(move |p: &str| {
            r.lock().unwrap().push(format!("input:{p}"));
            answer.map(str::to_string).ok_or(HostError::InputClosed)
        });
        let r = Arc::clone(&record);
        let status = Arc::new(move |s: &str| r.lock().unwrap().push(format!("status:{s}")));
        let r = Arc::clone(&record);
        let log: MessageFn = Arc::new(move |m: &str| r.lock().unwrap().push(format!("log:{m}")));

        (
            Callbacks {
                output,
                input,
                status,
            },
            log,
            record,
        )
    }

    fn sh_host(script: &str) -> ProcessHost {
        ProcessHost::new(ProcessCommand::new("sh").arg("-c").arg(script))
    }

    fn start(host: &mut ProcessHost, answer: Option<&'static str>) -> Record {
        host.initialize().unwrap();
        let (callbacks, log, record) = recording_callbacks(answer);
        host.set_callbacks(callbacks).unwrap();
        host.set_log_callback(log).unwrap();
        record
    }

    #[test]
    fn test_round_trip_over_stdio() {
        let mut host = sh_host(
            r#"
            echo '{"type":"log","message":"booting"}'
            echo '{"type":"ready"}'
            read -r cmd
            echo '{"type":"output","message":"A"}'
            echo '{"type":"status","state":"start"}'
            echo '{"type":"input","prompt":"Name?"}'
            read -r reply
            case "$reply" in
              *'"value":"Bob"'*) echo '{"type":"output","message":"got Bob"}' ;;
              *) echo '{"type":"output","message":"wrong reply"}' ;;
            esac
            echo ''
            echo '{"type":"log","message":"B"}'
            "#,
        );
        let record = start(&mut host, Some("Bob"));

        host.run_loop().unwrap();

        assert_eq!(
            *record.lock().unwrap(),
            vec![
                "output:A",
                "status:start",
                "input:Name?",
                "output:got Bob",
                "log:B",
            ]
        );
    }

    #[test]
    fn test_error_before_ready() {
        let mut host = sh_host(
            r#"
            echo '{"type":"error","message":"ModuleNotFoundError: shelves_api"}'
            exit 1
            "#,
        );
        match host.initialize() {
            Err(HostError::Script(message)) => assert!(message.contains("shelves_api")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_exit_before_ready() {
        let mut host = sh_host("exit 0");
        assert!(matches!(host.initialize(), Err(HostError::Exited(_))));
    }

    #[test]
    fn test_nonzero_exit_during_loop() {
        let mut host = sh_host(
            r#"
            echo '{"type":"ready"}'
            read -r cmd
            exit 3
            "#,
        );
        start(&mut host, None);

        match host.run_loop() {
            Err(HostError::Exited(status)) => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_script_error_during_loop() {
        let mut host = sh_host(
            r#"
            echo '{"type":"ready"}'
            read -r cmd
            echo '{"type":"error","message":"Traceback: boom"}'
            exit 1
            "#,
        );
        start(&mut host, None);

        assert!(matches!(host.run_loop(), Err(HostError::Script(m)) if m == "Traceback: boom"));
    }

    #[test]
    fn test_abandoned_input_ends_loop() {
        let mut host = sh_host(
            r#"
            echo '{"type":"ready"}'
            read -r cmd
            echo '{"type":"input","prompt":"Continue?"}'
            read -r reply
            "#,
        );
        let record = start(&mut host, None);

        assert!(matches!(host.run_loop(), Err(HostError::InputClosed)));
        assert_eq!(*record.lock().unwrap(), vec!["input:Continue?"]);
    }

    #[test]
    fn test_malformed_message() {
        let mut host = sh_host(
            r#"
            echo '{"type":"ready"}'
            read -r cmd
            echo 'Traceback (most recent call last):'
            "#,
        );
        start(&mut host, None);

        assert!(matches!(host.run_loop(), Err(HostError::Decode(_))));
    }

    #[test]
    fn test_run_loop_requires_initialize() {
        let mut host = sh_host("exit 0");
        let (callbacks, _, _) = recording_callbacks(None);
        host.set_callbacks(callbacks).unwrap();

        assert!(matches!(host.run_loop(), Err(HostError::NotInitialized)));
    }

    #[test]
    fn test_run_loop_requires_callbacks() {
        let mut host = sh_host("exit 0");
        assert!(matches!(host.run_loop(), Err(HostError::CallbacksMissing)));
    }

    #[test]
    fn test_spawn_failure() {
        let mut host = ProcessHost::new(ProcessCommand::new("/nonexistent/python3"));
        assert!(matches!(host.initialize(), Err(HostError::Spawn { .. })));
    }

    #[test]
    fn test_python_command_arguments() {
        let spec = ModuleSpec {
            search_path: PathBuf::from("/opt/shelves"),
            debug: true,
            ..ModuleSpec::default()
        };
        let command = ProcessCommand::python("python3", &spec);

        assert_eq!(command.program(), Path::new("python3"));
        let args: Vec<_> = command.args().iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args[0], "-u");
        assert_eq!(args[1], "-c");
        assert!(args[2].contains("set_log_callback"));
        assert_eq!(&args[3..], ["/opt/shelves", "shelves_api", "ShelvesAPI", "1"]);
    }

    const FAKE_API: &str = r#"
import threading

class FakeAPI:
    def __init__(self, debug):
        self.debug = debug

    def initialize(self):
        print("initialized")

    def set_callbacks(self, output, request, status):
        self.output, self.request, self.status = output, request, status

    def set_log_callback(self, log):
        self.log = log

    def run_loop(self):
        threading.Thread(target=self._loop, daemon=True).start()

    def _loop(self):
        self.log("debug=%s" % self.debug)
        self.output("A")
        self.status("start")
        name = self.request("Name?")
        self.status("stop")
        self.output("Hello, " + name)
"#;

    #[test]
    fn test_shim_drives_python_module() {
        if Command::new("python3").arg("--version").output().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fake_api.py"), FAKE_API).unwrap();
        let spec = ModuleSpec {
            search_path: dir.path().to_path_buf(),
            module: "fake_api".to_string(),
            class: "FakeAPI".to_string(),
            debug: false,
        };

        let mut host = ProcessHost::python("python3", &spec);
        let record = start(&mut host, Some("Bob"));
        host.run_loop().unwrap();

        assert_eq!(
            *record.lock().unwrap(),
            vec![
                "log:debug=False",
                "output:A",
                "status:start",
                "input:Name?",
                "status:stop",
                "output:Hello, Bob",
            ]
        );
    }
}
