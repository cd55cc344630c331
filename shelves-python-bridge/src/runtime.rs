//! Embedded Python host using PyO3
//!
//! Runs the module inside this process. Every call into the interpreter
//! holds the GIL; the input callback releases it while the user thinks, so
//! the module's own threads keep running.

use std::ffi::CStr;
use std::sync::Once;

use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use pyo3::types::{PyCFunction, PyDict, PyModule, PyTuple};
use tracing::{debug, info};

use crate::{Callbacks, HostError, InputFn, MessageFn, ModuleSpec, ScriptHost};

static PREPARE: Once = Once::new();

/// The interpreter is process-wide and never re-initialized.
fn prepare_interpreter() {
    PREPARE.call_once(|| {
        info!("Initializing embedded Python runtime...");
        pyo3::prepare_freethreaded_python();
    });
}

/// [`ScriptHost`] holding the module's API object in an embedded interpreter
pub struct EmbeddedHost {
    spec: ModuleSpec,
    api: Option<Py<PyAny>>,
}

impl EmbeddedHost {
    pub fn new(spec: ModuleSpec) -> Self {
        Self { spec, api: None }
    }

    fn api(&self) -> Result<&Py<PyAny>, HostError> {
        self.api.as_ref().ok_or(HostError::NotInitialized)
    }
}

impl ScriptHost for EmbeddedHost {
    fn initialize(&mut self) -> Result<(), HostError> {
        if self.api.is_some() {
            return Ok(());
        }

        prepare_interpreter();
        let spec = &self.spec;

        let api = Python::with_gil(|py| -> Result<Py<PyAny>, HostError> {
            let sys = PyModule::import(py, "sys")?;
            sys.getattr("path")?
                .call_method1("append", (spec.search_path.to_string_lossy().into_owned(),))?;
            debug!("sys.path += {}", spec.search_path.display());

            let module = PyModule::import(py, spec.module.as_str()).map_err(|e| {
                HostError::ImportError {
                    module: spec.module.clone(),
                    error: e.to_string(),
                }
            })?;

            let api = module.getattr(spec.class.as_str())?.call1((spec.debug,))?;
            api.call_method0("initialize")?;
            Ok(api.unbind())
        })?;

        info!("Loaded {}", spec.qualified_name());
        self.api = Some(api);
        Ok(())
    }

    fn set_callbacks(&mut self, callbacks: Callbacks) -> Result<(), HostError> {
        let api = self.api()?;
        Python::with_gil(|py| -> Result<(), HostError> {
            let output = message_function(py, c"harness_output", callbacks.output)?;
            let input = input_function(py, callbacks.input)?;
            let status = message_function(py, c"harness_status", callbacks.status)?;
            api.bind(py)
                .call_method1("set_callbacks", (output, input, status))?;
            Ok(())
        })
    }

    fn set_log_callback(&mut self, log: MessageFn) -> Result<(), HostError> {
        let api = self.api()?;
        Python::with_gil(|py| -> Result<(), HostError> {
            let log = message_function(py, c"harness_log", log)?;
            api.bind(py).call_method1("set_log_callback", (log,))?;
            Ok(())
        })
    }

    fn run_loop(&mut self) -> Result<(), HostError> {
        let api = self.api()?;
        Python::with_gil(|py| -> Result<(), HostError> {
            api.bind(py).call_method0("run_loop")?;
            Ok(())
        })
    }
}

/// First positional argument, converted with `str()`
fn first_arg(args: &Bound<'_, PyTuple>) -> PyResult<String> {
    args.get_item(0)?.str()?.extract()
}

fn message_function<'py>(
    py: Python<'py>,
    name: &'static CStr,
    callback: MessageFn,
) -> PyResult<Bound<'py, PyCFunction>> {
    PyCFunction::new_closure(
        py,
        Some(name),
        None,
        move |args: &Bound<'_, PyTuple>, _kwargs: Option<&Bound<'_, PyDict>>| -> PyResult<()> {
            let message = first_arg(args)?;
            callback(&message);
            Ok(())
        },
    )
}

fn input_function(py: Python<'_>, callback: InputFn) -> PyResult<Bound<'_, PyCFunction>> {
    PyCFunction::new_closure(
        py,
        Some(c"harness_input"),
        None,
        move |args: &Bound<'_, PyTuple>, _kwargs: Option<&Bound<'_, PyDict>>| -> PyResult<String> {
            let prompt = first_arg(args)?;
            let callback = InputFn::clone(&callback);
            args.py()
                .allow_threads(move || callback(&prompt))
                .map_err(|e| PyRuntimeError::new_err(e.to_string()))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const ECHO_API: &str = r#"
class EchoAPI:
    def __init__(self, debug):
        self.debug = debug

    def initialize(self):
        pass

    def set_callbacks(self, output, request, status):
        self.output, self.request, self.status = output, request, status

    def set_log_callback(self, log):
        self.log = log

    def run_loop(self):
        self.log("debug=%s" % self.debug)
        self.status("start")
        answer = self.request("Name?")
        self.status("stop")
        self.output("Hello, " + answer)
"#;

    #[test]
    fn test_embedded_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("echo_api.py"), ECHO_API).unwrap();
        let mut host = EmbeddedHost::new(ModuleSpec {
            search_path: dir.path().to_path_buf(),
            module: "echo_api".to_string(),
            class: "EchoAPI".to_string(),
            debug: true,
        });

        let record = Arc::new(Mutex::new(Vec::new()));
        let r = Arc::clone(&record);
        let output = Arc::new(move |m: &str| r.lock().unwrap().push(format!("output:{m}")));
        let r = Arc::clone(&record);
        let input = Arc::new(move |p: &str| {
            r.lock().unwrap().push(format!("input:{p}"));
            Ok::<_, HostError>("Bob".to_string())
        });
        let r = Arc::clone(&record);
        let status = Arc::new(move |s: &str| r.lock().unwrap().push(format!("status:{s}")));
        let r = Arc::clone(&record);
        let log: MessageFn = Arc::new(move |m: &str| r.lock().unwrap().push(format!("log:{m}")));

        host.initialize().unwrap();
        host.set_callbacks(Callbacks {
            output,
            input,
            status,
        })
        .unwrap();
        host.set_log_callback(log).unwrap();
        host.run_loop().unwrap();

        assert_eq!(
            *record.lock().unwrap(),
            vec![
                "log:debug=True",
                "status:start",
                "input:Name?",
                "status:stop",
                "output:Hello, Bob",
            ]
        );
    }

    #[test]
    fn test_missing_module() {
        let mut host = EmbeddedHost::new(ModuleSpec {
            module: "definitely_not_a_module".to_string(),
            ..ModuleSpec::default()
        });
        assert!(matches!(host.initialize(), Err(HostError::ImportError { .. })));
    }

    #[test]
    fn test_calls_before_initialize() {
        let mut host = EmbeddedHost::new(ModuleSpec::default());
        assert!(matches!(host.run_loop(), Err(HostError::NotInitialized)));
    }
}
