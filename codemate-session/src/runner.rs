//! Running generated Python in a persistent embedded interpreter.
//!
//! The interpreter's namespace survives across calls: names defined by one
//! execution are visible to the next, which is what makes iterative
//! LLM-assisted sessions work. Stdout is captured per call into an in-memory
//! buffer and the real stream is restored on every exit path.
//!
//! Trust boundary: code arrives from an external model and runs with the full
//! privileges of the host process. No sandboxing, resource limits, or timeout.

use rustpython_vm::builtins::PyBaseException;
use rustpython_vm::compiler::Mode;
use rustpython_vm::scope::Scope;
use rustpython_vm::{Interpreter, PyRef, Settings, VirtualMachine};

/// Swap sys.stdout for an in-memory buffer
const CAPTURE_PREAMBLE: &str = "\
import io, sys
__cm_prev_stdout = sys.stdout
__cm_capture = io.StringIO()
sys.stdout = __cm_capture
";

/// Restore the previous stream, then read what the buffer collected
const CAPTURE_POSTAMBLE: &str = "\
import sys
sys.stdout = __cm_prev_stdout
__cm_captured = __cm_capture.getvalue()
";

/// Outcome of one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Everything the code printed before finishing or faulting
    pub output: String,
    /// Textual description of the fault, if the code raised
    pub error: Option<String>,
}

/// A persistent Python namespace backed by an embedded interpreter.
///
/// Owned by [`CodeRunner`] and injectable, so tests can run against a fresh
/// isolated namespace instead of sharing one.
pub struct ExecutionEnvironment {
    interpreter: Interpreter,
    scope: Scope,
}

impl ExecutionEnvironment {
    pub fn new() -> Self {
        let interpreter = Interpreter::with_init(Settings::default(), |vm| {
            vm.add_native_modules(rustpython_stdlib::get_module_inits());
            vm.add_frozen(rustpython_pylib::FROZEN_STDLIB);
        });
        let scope = interpreter.enter(|vm| vm.new_scope_with_builtins());
        Self { interpreter, scope }
    }

    /// Run a code string in the persistent namespace, capturing stdout.
    ///
    /// A fault in the code is returned as data, never propagated; output
    /// collected before the fault is preserved. Empty code is a no-op with
    /// empty output.
    pub fn run(&mut self, code: &str) -> Execution {
        let scope = self.scope.clone();
        self.interpreter.enter(|vm| {
            if let Err(exc) = run_source(vm, scope.clone(), CAPTURE_PREAMBLE, "<capture>") {
                return Execution {
                    output: String::new(),
                    error: Some(describe_exception(vm, &exc)),
                };
            }

            let error = match run_source(vm, scope.clone(), code, "<session>") {
                Ok(()) => None,
                Err(exc) => Some(describe_exception(vm, &exc)),
            };

            // Restores the real stream on the fault path too
            if let Err(exc) = run_source(vm, scope.clone(), CAPTURE_POSTAMBLE, "<capture>") {
                return Execution {
                    output: String::new(),
                    error: error.or_else(|| Some(describe_exception(vm, &exc))),
                };
            }

            Execution {
                output: global_string(vm, &scope, "__cm_captured"),
                error,
            }
        })
    }
}

impl Default for ExecutionEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Executes extracted code against one [`ExecutionEnvironment`]
pub struct CodeRunner {
    env: ExecutionEnvironment,
}

impl CodeRunner {
    /// Create a runner with a fresh environment
    pub fn new() -> Self {
        Self::with_environment(ExecutionEnvironment::new())
    }

    /// Create a runner over a caller-supplied environment
    pub fn with_environment(env: ExecutionEnvironment) -> Self {
        Self { env }
    }

    pub fn execute(&mut self, code: &str) -> Execution {
        self.env.run(code)
    }
}

impl Default for CodeRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn run_source(
    vm: &VirtualMachine,
    scope: Scope,
    source: &str,
    label: &str,
) -> Result<(), PyRef<PyBaseException>> {
    let code = vm
        .compile(source, Mode::Exec, label.to_owned())
        .map_err(|err| vm.new_syntax_error(&err, Some(source)))?;
    vm.run_code_obj(code, scope)?;
    Ok(())
}

fn describe_exception(vm: &VirtualMachine, exc: &PyRef<PyBaseException>) -> String {
    let mut text = String::new();
    if vm.write_exception(&mut text, exc).is_err() {
        return "unprintable python exception".to_string();
    }
    text.trim_end().to_string()
}

fn global_string(vm: &VirtualMachine, scope: &Scope, name: &str) -> String {
    scope
        .globals
        .get_item(name, vm)
        .ok()
        .and_then(|value| value.str(vm).ok())
        .map(|s| s.as_str().to_owned())
        .unwrap_or_default()
}
