//! Athera tree-walking interpreter.
//!
//! The [`Interpreter`] owns the whole execution context (tasks, variables,
//! error state, return slot) and executes parsed [`Node`] trees.  It
//! implements [`EvalContext`] so the expression evaluator can look up
//! variables and report builtin errors into the same output stream.
//!
//! Statement execution returns `Result<(), Fault>`.  A fault unwinds through
//! the enclosing blocks and task calls until a `protect:` node intercepts it;
//! everything else (missing tasks, bad backups, builtin errors) is reported as
//! an output line and execution continues.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, trace};

use super::{
    builtins,
    expr::{evaluate, split_run_args, EvalContext},
    fault::{Fault, RunError},
    parallel,
    stmt::{parse_source, Node},
    value::Value,
};

/// Default limit on nested `run` calls.
pub const DEFAULT_MAX_DEPTH: usize = 200;

/// Largest accepted call-depth limit.
pub const MAX_DEPTH_LIMIT: usize = 1000;

/// File extension of Athera source files.
pub const SOURCE_EXT: &str = "ath";

// ── TaskDef ───────────────────────────────────────────────────────────────────

/// A registered task: parameter names and body.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDef {
    pub params: Vec<String>,
    pub body: Vec<Node>,
}

type TaskMap = HashMap<String, Arc<TaskDef>>;

// ── OutputMode ────────────────────────────────────────────────────────────────

/// Where program output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Collect lines in [`Interpreter::output`].
    #[default]
    Capture,
    /// Write lines to stdout as they are produced.
    Stream,
}

// ── Interpreter ───────────────────────────────────────────────────────────────

/// The Athera interpreter.
pub struct Interpreter {
    /// Task table, shared with parallel forks and copied on write.
    tasks: Arc<TaskMap>,
    /// Flat variable store.
    variables: HashMap<String, Value>,
    /// Names imported with `use`.
    modules: HashSet<String>,
    error_occurred: bool,
    last_error: Option<Fault>,
    return_value: Value,
    depth: usize,
    max_depth: usize,
    /// Extra directories searched for `<name>.ath` modules.
    module_paths: Vec<PathBuf>,
    /// Lines produced in [`OutputMode::Capture`].
    pub output: Vec<String>,
    mode: OutputMode,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// A capturing interpreter.
    pub fn new() -> Self {
        Interpreter {
            tasks: Arc::new(HashMap::new()),
            variables: HashMap::new(),
            modules: HashSet::new(),
            error_occurred: false,
            last_error: None,
            return_value: Value::Absent,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            module_paths: Vec::new(),
            output: Vec::new(),
            mode: OutputMode::Capture,
        }
    }

    /// An interpreter that writes its output straight to stdout.
    pub fn streaming() -> Self {
        Interpreter {
            mode: OutputMode::Stream,
            ..Self::new()
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Set the call-depth limit, clamped to [`MAX_DEPTH_LIMIT`].
    pub fn set_max_depth(&mut self, limit: usize) {
        self.max_depth = limit.min(MAX_DEPTH_LIMIT);
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn add_module_path(&mut self, dir: impl Into<PathBuf>) {
        self.module_paths.push(dir.into());
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn task(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.get(name).map(Arc::as_ref)
    }

    pub fn is_imported(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    pub fn error_occurred(&self) -> bool {
        self.error_occurred
    }

    pub fn last_error(&self) -> Option<&Fault> {
        self.last_error.as_ref()
    }

    pub fn return_value(&self) -> &Value {
        &self.return_value
    }

    /// Drain captured output.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Evaluate an expression in this context.
    pub fn eval(&mut self, expr: &str) -> Result<Value, Fault> {
        evaluate(expr, self)
    }

    fn emit(&mut self, line: String) {
        match self.mode {
            OutputMode::Capture => self.output.push(line),
            OutputMode::Stream => {
                let _ = writeln!(std::io::stdout().lock(), "{line}");
            }
        }
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Lex, parse and execute a source text.
    pub fn exec_source(&mut self, src: &str) -> Result<(), Fault> {
        let nodes = parse_source(src);
        self.execute(&nodes)
    }

    /// Read and execute an Athera source file.
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> Result<(), RunError> {
        let path = path.as_ref();
        let src = fs::read_to_string(path).map_err(|source| RunError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("running {}", path.display());
        self.exec_source(&src)?;
        Ok(())
    }

    /// Execute top-level statements in order.  The first uncaught fault stops
    /// execution and is returned.
    pub fn execute(&mut self, nodes: &[Node]) -> Result<(), Fault> {
        trace!("executing {} statements", nodes.len());
        for node in nodes {
            self.exec_node(node)?;
        }
        Ok(())
    }

    /// Execute a single statement.
    pub fn exec_node(&mut self, node: &Node) -> Result<(), Fault> {
        match node {
            Node::Task { name, params, body } => {
                let def = TaskDef {
                    params: params.clone(),
                    body: body.clone(),
                };
                Arc::make_mut(&mut self.tasks).insert(name.clone(), Arc::new(def));
            }
            Node::Greet { message } => {
                let v = self.eval(message)?;
                self.emit(v.to_string());
            }
            Node::Backup { source, dest } => self.backup(source, dest)?,
            Node::Check { condition, action } => {
                if self.condition(condition)? {
                    self.inline_action(action)?;
                }
            }
            Node::RepeatN { count, body } => {
                for _ in 0..*count {
                    self.exec_block(body)?;
                }
            }
            Node::RepeatEach { var, list_expr, body } => match self.eval(list_expr)? {
                Value::List(items) => {
                    for item in items {
                        self.variables.insert(var.clone(), item);
                        self.exec_block(body)?;
                    }
                }
                other => self.emit(format!("[Warning: expected list, got {}]", other.type_name())),
            },
            Node::Set { var, value } => {
                let v = self.eval(value)?;
                self.variables.insert(var.clone(), v);
            }
            Node::Run { target } => self.run_task(target)?,
            Node::Use { module } => self.use_module(module),
            Node::Protect { protect, handle } => self.protect(protect, handle),
            Node::HandleInline { action, .. } => {
                if self.error_occurred {
                    self.inline_action(action)?;
                }
            }
            Node::RunParallel { tasks } => self.run_parallel(tasks)?,
            Node::Return { expr } => {
                self.return_value = self.eval(expr)?;
            }
        }
        Ok(())
    }

    fn exec_block(&mut self, body: &[Node]) -> Result<(), Fault> {
        for node in body {
            self.exec_node(node)?;
        }
        Ok(())
    }

    /// Run a task body, stopping after the first statement that leaves a value
    /// in the return slot.
    fn exec_task_body(&mut self, body: &[Node]) -> Result<(), Fault> {
        for node in body {
            self.exec_node(node)?;
            if !self.return_value.is_absent() {
                break;
            }
        }
        Ok(())
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn backup(&mut self, source: &str, dest: &str) -> Result<(), Fault> {
        let src = strip_quotes(&self.eval(source)?.to_string()).to_owned();
        let dest = strip_quotes(&self.eval(dest)?.to_string()).to_owned();

        if src.is_empty() || dest.is_empty() {
            self.emit("[Backup error: source or destination missing]".into());
            return Ok(());
        }
        if let Err(e) = fs::create_dir_all(&dest) {
            self.emit(format!("[Backup error: {e}]"));
            return Ok(());
        }

        let src_path = Path::new(&src);
        let meta = match fs::metadata(src_path) {
            Ok(meta) => meta,
            Err(_) => {
                self.emit(format!("[Backup error: source not found: {src}]"));
                return Ok(());
            }
        };
        if meta.is_dir() {
            self.emit(format!("[Backup warning: directory backup not yet supported: {src}]"));
            return Ok(());
        }

        let dest_path = match src_path.file_name() {
            Some(name) => Path::new(&dest).join(name),
            None => Path::new(&dest).join(&src),
        };
        if same_file(src_path, &dest_path) {
            self.emit(format!(
                "[Backup error: source and destination are the same file: {}]",
                dest_path.display()
            ));
            return Ok(());
        }
        match fs::copy(src_path, &dest_path) {
            Ok(_) => self.emit(format!("[Backed up: {src} -> {}]", dest_path.display())),
            Err(e) => self.emit(format!("[Backup error: {e}]")),
        }
        Ok(())
    }

    /// Condition of a `check` statement.
    fn condition(&mut self, cond: &str) -> Result<bool, Fault> {
        let cond = cond.trim();
        if cond.starts_with(['"', '\'']) {
            let path = self.eval(strip_quotes(cond))?.to_string();
            return Ok(Path::new(&path).exists());
        }
        if let Some(v) = self.variables.get(cond) {
            return Ok(v.is_truthy());
        }
        Ok(self.eval(cond)?.is_truthy())
    }

    /// Inline action of `check` and `handle … ->`.  Only `greet` is recognised.
    fn inline_action(&mut self, action: &str) -> Result<(), Fault> {
        let action = action.trim();
        match action.strip_prefix("greet ") {
            Some(msg) => {
                let v = self.eval(msg)?;
                self.emit(v.to_string());
            }
            None => trace!("ignoring inline action {action:?}"),
        }
        Ok(())
    }

    fn run_task(&mut self, target: &str) -> Result<(), Fault> {
        let target = target.trim();
        let (name, arg_text) = target.split_once(char::is_whitespace).unwrap_or((target, ""));

        let Some(def) = self.tasks.get(name).cloned() else {
            self.emit(format!("[Error: task '{name}' not found]"));
            return Ok(());
        };
        if self.depth >= self.max_depth {
            return Err(Fault::DepthExceeded {
                task: name.to_owned(),
                limit: self.max_depth,
            });
        }

        let args = split_run_args(arg_text)
            .into_iter()
            .map(|a| self.eval(a))
            .collect::<Result<Vec<_>, _>>()?;

        let saved: Vec<(&String, Option<Value>)> = def
            .params
            .iter()
            .map(|p| (p, self.variables.get(p).cloned()))
            .collect();
        for (i, param) in def.params.iter().enumerate() {
            let arg = args.get(i).cloned().unwrap_or_default();
            self.variables.insert(param.clone(), arg);
        }

        trace!("run {name} with {} args at depth {}", args.len(), self.depth);
        self.return_value = Value::Absent;
        self.depth += 1;
        let result = self.exec_task_body(&def.body);
        self.depth -= 1;

        for (param, prev) in saved.into_iter().rev() {
            match prev {
                Some(v) => self.variables.insert(param.clone(), v),
                None => self.variables.remove(param),
            };
        }
        result
    }

    fn use_module(&mut self, module: &str) {
        let name = module.trim();
        if builtins::has_module(name) {
            self.modules.insert(name.to_owned());
            self.emit(format!("[Imported built-in module: {name}]"));
            return;
        }

        let Some(path) = self.find_module_file(name) else {
            self.emit(format!("[Warning: module {name} not found]"));
            return;
        };
        debug!("loading module {name} from {}", path.display());
        let result = match fs::read_to_string(&path) {
            Ok(src) => self.exec_source(&src).map_err(|f| f.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match result {
            Ok(()) => {
                self.modules.insert(name.to_owned());
                self.emit(format!("[Imported module: {name} from {}]", path.display()));
            }
            Err(e) => self.emit(format!("[Error importing module {name}: {e}]")),
        }
    }

    /// Search the current directory, `./modules`, then the configured module
    /// paths for `<name>.ath`.
    fn find_module_file(&self, name: &str) -> Option<PathBuf> {
        let file = if name.ends_with(&format!(".{SOURCE_EXT}")) {
            PathBuf::from(name)
        } else {
            PathBuf::from(format!("{name}.{SOURCE_EXT}"))
        };
        [PathBuf::from("."), PathBuf::from("modules")]
            .iter()
            .chain(self.module_paths.iter())
            .map(|dir| dir.join(&file))
            .find(|candidate| candidate.is_file())
    }

    fn protect(&mut self, protect: &[Node], handle: &[Node]) {
        self.error_occurred = false;
        self.last_error = None;

        for node in protect {
            if let Err(fault) = self.exec_node(node) {
                self.error_occurred = true;
                self.emit(format!("[Error caught: {fault}]"));
                self.last_error = Some(fault);
                for h in handle {
                    if let Err(e) = self.exec_node(h) {
                        self.emit(format!("[Error in handler: {e}]"));
                        break;
                    }
                }
                return;
            }
            if self.error_occurred {
                break;
            }
        }
    }

    fn run_parallel(&mut self, names: &[String]) -> Result<(), Fault> {
        if self.depth >= self.max_depth {
            return Err(Fault::DepthExceeded {
                task: names.join(", "),
                limit: self.max_depth,
            });
        }
        let mut jobs = Vec::new();
        for name in names {
            let name = name.trim();
            match self.tasks.get(name).cloned() {
                Some(def) => {
                    let mut unit = self.fork();
                    let name = name.to_owned();
                    jobs.push(move || unit.run_unit(&name, &def));
                }
                None => self.emit(format!("[Warning: task {name} not found for parallel run]")),
            }
        }

        let launched = jobs.len();
        let outputs = parallel::fork_join(jobs)?;
        for line in outputs.into_iter().flatten() {
            self.emit(line);
        }
        self.emit(format!("[Parallel execution complete: {launched} tasks]"));
        Ok(())
    }

    /// An independent copy of this context for a parallel unit.  Variables are
    /// copied; the task table is shared until either side writes to it.
    fn fork(&self) -> Interpreter {
        Interpreter {
            tasks: Arc::clone(&self.tasks),
            variables: self.variables.clone(),
            modules: self.modules.clone(),
            error_occurred: false,
            last_error: None,
            return_value: Value::Absent,
            depth: self.depth + 1,
            max_depth: self.max_depth,
            module_paths: self.module_paths.clone(),
            output: Vec::new(),
            mode: self.mode,
        }
    }

    /// Body of one parallel unit.  Returns the captured output.
    fn run_unit(&mut self, name: &str, def: &TaskDef) -> Vec<String> {
        for param in &def.params {
            self.variables.insert(param.clone(), Value::Absent);
        }
        if let Err(fault) = self.exec_task_body(&def.body) {
            debug!("parallel task {name} stopped: {fault}");
        }
        std::mem::take(&mut self.output)
    }
}

// ── EvalContext impl ──────────────────────────────────────────────────────────

impl EvalContext for Interpreter {
    fn get_var(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn report(&mut self, line: String) {
        self.emit(line);
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(['"', '\''])
}

/// `true` when both paths exist and resolve to the same file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
