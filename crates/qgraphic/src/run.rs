//! Public interface for running QGraphic code, plus the tree-walking
//! evaluator behind it.
//!
//! [`Runner`] supports two execution modes:
//! - **Eager**: [`Runner::run`] executes the program to completion.
//! - **Stepping**: [`Runner::run_traced`] drives the same evaluator with a
//!   [`StepTracer`], which is announced before every statement and may
//!   stop the run between any two steps.
//!
//! # Example
//! ```
//! use qgraphic::{CollectPublish, Runner};
//!
//! let source = "Frame f = Frame().\nf -> (0 0) = (31 0 0).\nPublish f.\n";
//! let runner = Runner::new(source.to_owned(), "demo.qgk").unwrap();
//! let mut out = CollectPublish::new();
//! runner.run(&mut out).unwrap();
//! assert_eq!(out.published()[0].get_pixel(0, 0), Ok((31, 0, 0)));
//! ```

use std::{path::Path, rc::Rc};

use smallvec::SmallVec;
use strum::IntoEnumIterator;

use crate::{
    builtins::Builtin,
    exception::{Exception, RunError, RunResult},
    expressions::{BinOp, Expr, Item, LiteralValue, Program, Stmt, TypeName},
    frame::Frame,
    heap::Heap,
    lex::lex_source,
    namespace::{EnvId, Environments, GLOBAL_ENV},
    parse::parse,
    publish::PublishHandler,
    step::{NoopStepTracer, StepControl, StepInfo, StepOutcome, StepTracer},
    value::{self, FunctionValue, Value},
};

/// A parsed QGraphic program, ready to run any number of times.
///
/// Each run gets a fresh global environment, frame store and built-in set;
/// nothing carries over between runs, which is what makes step sequences
/// deterministic across replays.
#[derive(Debug, Clone)]
pub struct Runner {
    program: Program,
    script_name: String,
    code: String,
}

impl Runner {
    /// Lexes and parses `code`.
    ///
    /// # Errors
    /// Returns the first `LexError` or `ParseError`.
    pub fn new(code: String, script_name: &str) -> Result<Self, Exception> {
        let tokens = lex_source(&code)?;
        let program = parse(tokens)?;
        Ok(Self {
            program,
            script_name: script_name.to_owned(),
            code,
        })
    }

    /// Reads and parses a `.qgk` file.
    pub fn from_file(path: &Path) -> Result<Self, Exception> {
        let code = std::fs::read_to_string(path)
            .map_err(|err| Exception::runtime(format!("failed to read {}: {err}", path.display())))?;
        let script_name = path.display().to_string();
        Self::new(code, &script_name)
    }

    /// The source code this runner was built from.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The script name given at construction, for error reporting by
    /// embedders.
    #[must_use]
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    /// The parsed program, for tooling that wants the AST.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Executes the program to completion.
    ///
    /// # Errors
    /// Returns the first `RuntimeError` (or codec error) raised.
    pub fn run(&self, publish: &mut impl PublishHandler) -> Result<(), Exception> {
        self.execute(publish, &mut NoopStepTracer).map(|_| ())
    }

    /// Executes the program under a stepping tracer.
    ///
    /// The tracer is announced before every statement per the stepping
    /// contract and receives post-statement frame snapshots; answering
    /// [`StepControl::Stop`] abandons the run with
    /// [`StepOutcome::Stopped`].
    pub fn run_traced(
        &self,
        publish: &mut impl PublishHandler,
        tracer: &mut impl StepTracer,
    ) -> Result<StepOutcome, Exception> {
        self.execute(publish, tracer)
    }

    fn execute(
        &self,
        publish: &mut impl PublishHandler,
        tracer: &mut impl StepTracer,
    ) -> Result<StepOutcome, Exception> {
        let mut interp = Interp {
            envs: Environments::new(),
            heap: Heap::new(),
            publish,
            tracer,
        };
        match interp.execute_program(&self.program) {
            Ok(()) => Ok(StepOutcome::Finished),
            Err(RunError::Stopped) => Ok(StepOutcome::Stopped),
            Err(err) => Err(err.into()),
        }
    }
}

/// Statement-level control flow.
///
/// `Return` unwinds to the nearest enclosing function call; the stepping
/// driver's cancellation travels on the error side as
/// [`RunError::Stopped`] so nothing in user code can intercept it.
enum Flow {
    Normal,
    Return(Value),
}

struct Interp<'a, P: PublishHandler, T: StepTracer> {
    envs: Environments,
    heap: Heap,
    publish: &'a mut P,
    tracer: &'a mut T,
}

impl<P: PublishHandler, T: StepTracer> Interp<'_, P, T> {
    /// Pre-scans function declarations (forward references are allowed),
    /// then executes the remaining items in source order.
    fn execute_program(&mut self, program: &Program) -> RunResult<()> {
        for builtin in Builtin::iter() {
            self.envs
                .define(GLOBAL_ENV, Rc::from(builtin.name()), Value::Builtin(builtin));
        }
        for item in &program.items {
            if let Item::Function(decl) = item {
                let function = FunctionValue {
                    decl: decl.clone(),
                    closure: GLOBAL_ENV,
                };
                self.envs
                    .define(GLOBAL_ENV, decl.name.clone(), Value::Function(Rc::new(function)));
            }
        }
        for item in &program.items {
            let Item::Stmt(stmt) = item else { continue };
            match self.exec_stmt(stmt, GLOBAL_ENV)? {
                Flow::Normal => {}
                Flow::Return(_) => {
                    return Err(RunError::runtime("return outside of a function", stmt.line()));
                }
            }
        }
        Ok(())
    }

    /// Announces a statement to the tracer; `Stop` unwinds the whole run.
    fn emit_step(&mut self, stmt: &Stmt) -> RunResult<()> {
        match self.tracer.on_step(StepInfo { line: stmt.line(), stmt }) {
            StepControl::Continue => Ok(()),
            StepControl::Stop => Err(RunError::Stopped),
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], env: EnvId) -> RunResult<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: EnvId) -> RunResult<Flow> {
        match stmt {
            Stmt::If {
                condition,
                then_body,
                else_body,
                ..
            } => {
                self.emit_step(stmt)?;
                let condition = self.eval(condition, env)?;
                if condition.truthy(&self.heap) {
                    self.exec_block(then_body, env)
                } else if let Some(else_body) = else_body {
                    self.exec_block(else_body, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { condition, body, .. } => {
                loop {
                    // One step per iteration, announced before the
                    // condition is evaluated; a false condition ends the
                    // loop with no further emission.
                    self.emit_step(stmt)?;
                    if !self.eval(condition, env)?.truthy(&self.heap) {
                        return Ok(Flow::Normal);
                    }
                    match self.exec_block(body, env)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
            }
            Stmt::For {
                var, iterable, body, line, ..
            } => {
                let iterable = self.eval(iterable, env)?;
                let Value::List(list) = iterable else {
                    return Err(RunError::runtime("For loop requires a list iterable", *line));
                };
                // Indexed iteration observes mutations the body makes to
                // the list, like iterating a live list.
                let mut index = 0;
                loop {
                    let Some(item) = self.heap.list(list).get(index).cloned() else {
                        return Ok(Flow::Normal);
                    };
                    index += 1;
                    self.emit_step(stmt)?;
                    let loop_env = self.envs.child(env);
                    self.envs.define(loop_env, var.clone(), item);
                    let flow = self.exec_block(body, loop_env);
                    self.envs.release(loop_env);
                    match flow? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
            }
            simple => {
                self.emit_step(simple)?;
                // Open this statement's mutation window. Nested statements
                // (inside called functions) drain the slot themselves, so
                // whatever is left at the end belongs to this statement.
                self.heap.take_touched();
                let flow = self.exec_simple(simple, env)?;
                if let Some(id) = self.heap.take_touched() {
                    self.tracer.on_frame(self.heap.frame(id));
                }
                Ok(flow)
            }
        }
    }

    fn exec_simple(&mut self, stmt: &Stmt, env: EnvId) -> RunResult<Flow> {
        match stmt {
            Stmt::VarDecl {
                type_name, name, value, ..
            } => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => self.type_default(*type_name),
                };
                self.envs.define(env, name.clone(), value);
                Ok(Flow::Normal)
            }
            Stmt::Assign { target, value, line } => {
                let value = self.eval(value, env)?;
                self.assign_target(target, value, env, *line)?;
                Ok(Flow::Normal)
            }
            Stmt::PixelAssign { pointer, value, line } => {
                let value = self.eval(value, env)?;
                let pointer = self.eval(pointer, env)?;
                self.assign_pixel(&pointer, &value, *line)?;
                Ok(Flow::Normal)
            }
            Stmt::Publish { expr, line } => {
                let value = self.eval(expr, env)?;
                let Value::Frame(id) = value else {
                    return Err(RunError::runtime(
                        format!("Publish expects a Frame, not {}", value.type_name()),
                        *line,
                    ));
                };
                self.publish
                    .publish(self.heap.frame(id))
                    .map_err(|exc| RunError::at_line(exc, *line))?;
                Ok(Flow::Normal)
            }
            Stmt::Send { expr, line } => {
                let value = self.eval(expr, env)?;
                let Value::Str(path) = value else {
                    return Err(RunError::runtime(
                        format!("Send expects a string path, not {}", value.type_name()),
                        *line,
                    ));
                };
                self.publish.send(&path).map_err(|exc| RunError::at_line(exc, *line))?;
                Ok(Flow::Normal)
            }
            Stmt::Return { expr, .. } => {
                let value = match expr {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Expr { expr, .. } => {
                self.eval(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::If { .. } | Stmt::While { .. } | Stmt::For { .. } => {
                unreachable!("compound statements are handled by exec_stmt")
            }
        }
    }

    fn type_default(&mut self, type_name: TypeName) -> Value {
        match type_name {
            TypeName::Frame => Value::Frame(self.heap.alloc_frame(Frame::new())),
            TypeName::Int => Value::Int(0),
            TypeName::Color => Value::tuple3(Value::Int(0), Value::Int(0), Value::Int(0)),
            TypeName::Pixel => Value::tuple2(Value::Int(0), Value::Int(0)),
            TypeName::Bool => Value::Bool(false),
            TypeName::String => Value::str(""),
            TypeName::List => Value::List(self.heap.alloc_list(Vec::new())),
            TypeName::None => Value::None,
        }
    }

    fn assign_target(&mut self, target: &Expr, value: Value, env: EnvId, line: u32) -> RunResult<()> {
        match target {
            Expr::Var { name, .. } => {
                if self.envs.set(env, name, value) {
                    Ok(())
                } else {
                    Err(RunError::runtime(format!("Undefined variable {name}"), line))
                }
            }
            Expr::Index { base, index, .. } => {
                let base = self.eval(base, env)?;
                let index = self.eval(index, env)?;
                let Value::Int(i) = index else {
                    return Err(RunError::runtime("Index must be int", line));
                };
                match base {
                    Value::List(id) => {
                        let len = self.heap.list(id).len();
                        let slot = resolve_index(i, len)
                            .ok_or_else(|| RunError::runtime(format!("list index {i} out of range"), line))?;
                        self.heap.list_mut(id)[slot] = value;
                        Ok(())
                    }
                    other => Err(RunError::runtime(
                        format!("cannot assign into {}", other.type_name()),
                        line,
                    )),
                }
            }
            _ => Err(RunError::runtime("Invalid assignment target", line)),
        }
    }

    fn assign_pixel(&mut self, pointer: &Value, value: &Value, line: u32) -> RunResult<()> {
        let Value::PixelRef(ptr) = pointer else {
            return Err(RunError::runtime("Pixel assignment requires frame->pixel", line));
        };
        let Value::Tuple(items) = value else {
            return Err(RunError::runtime("Pixel assignment requires a color tuple", line));
        };
        let [Value::Int(r), Value::Int(g), Value::Int(b)] = &**items else {
            return Err(RunError::runtime("Pixel assignment requires a color tuple", line));
        };
        self.heap
            .frame_mut(ptr.frame)
            .set_color(ptr.x, ptr.y, *r, *g, *b)
            .map_err(|err| RunError::runtime(err.to_string(), line))?;
        self.heap.touch(ptr.frame);
        Ok(())
    }

    fn eval(&mut self, expr: &Expr, env: EnvId) -> RunResult<Value> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                LiteralValue::Int(v) => Value::Int(*v),
                LiteralValue::Str(text) => Value::Str(text.clone()),
                LiteralValue::Bool(v) => Value::Bool(*v),
                LiteralValue::None => Value::None,
            }),
            Expr::Var { name, line } => self
                .envs
                .get(env, name)
                .ok_or_else(|| RunError::runtime(format!("Undefined variable {name}"), *line)),
            Expr::Unary { op, expr, line } => {
                let value = self.eval(expr, env)?;
                value::unary_op(*op, value, &self.heap, *line)
            }
            Expr::Binary { op, left, right, line } => match op {
                // Short-circuit: the right operand is only evaluated when
                // the left does not decide the result.
                BinOp::And => {
                    let left = self.eval(left, env)?;
                    if left.truthy(&self.heap) {
                        self.eval(right, env)
                    } else {
                        Ok(left)
                    }
                }
                BinOp::Or => {
                    let left = self.eval(left, env)?;
                    if left.truthy(&self.heap) {
                        Ok(left)
                    } else {
                        self.eval(right, env)
                    }
                }
                _ => {
                    let left = self.eval(left, env)?;
                    let right = self.eval(right, env)?;
                    value::binary_op(*op, left, right, &mut self.heap, *line)
                }
            },
            Expr::Index { base, index, line } => {
                let base = self.eval(base, env)?;
                let index = self.eval(index, env)?;
                self.index_value(&base, &index, *line)
            }
            Expr::Call { name, args, line } => {
                let mut values: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, env)?);
                }
                self.call_function(name, &values, *line, env)
            }
            Expr::Color { r, g, b, .. } => {
                let r = self.eval(r, env)?;
                let g = self.eval(g, env)?;
                let b = self.eval(b, env)?;
                Ok(Value::tuple3(r, g, b))
            }
            Expr::Pixel { x, y, .. } => {
                let x = self.eval(x, env)?;
                let y = self.eval(y, env)?;
                Ok(Value::tuple2(x, y))
            }
            Expr::List { items, .. } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, env)?);
                }
                Ok(Value::List(self.heap.alloc_list(values)))
            }
            Expr::Paren { expr, .. } => self.eval(expr, env),
            Expr::WalrusAssign { name, expr, line } => {
                let value = self.eval(expr, env)?;
                if !self.envs.set(env, name, value.clone()) {
                    return Err(RunError::runtime(format!("Undefined variable {name}"), *line));
                }
                Ok(value)
            }
            Expr::WalrusDecl { name, expr, .. } => {
                let value = self.eval(expr, env)?;
                self.envs.define(env, name.clone(), value.clone());
                Ok(value)
            }
        }
    }

    fn index_value(&self, base: &Value, index: &Value, line: u32) -> RunResult<Value> {
        let Value::Int(i) = index else {
            return Err(RunError::runtime("Index must be int", line));
        };
        match base {
            Value::List(id) => {
                let items = self.heap.list(*id);
                let slot = resolve_index(*i, items.len())
                    .ok_or_else(|| RunError::runtime(format!("list index {i} out of range"), line))?;
                Ok(items[slot].clone())
            }
            Value::Tuple(items) => {
                let slot = resolve_index(*i, items.len())
                    .ok_or_else(|| RunError::runtime(format!("tuple index {i} out of range"), line))?;
                Ok(items[slot].clone())
            }
            Value::Str(text) => {
                let slot = resolve_index(*i, text.chars().count())
                    .ok_or_else(|| RunError::runtime(format!("string index {i} out of range"), line))?;
                let ch = text.chars().nth(slot).map(String::from).unwrap_or_default();
                Ok(Value::str(ch))
            }
            other => Err(RunError::runtime(
                format!("{} is not indexable", other.type_name()),
                line,
            )),
        }
    }

    fn call_function(&mut self, name: &str, args: &[Value], line: u32, env: EnvId) -> RunResult<Value> {
        let Some(callee) = self.envs.get(env, name) else {
            return Err(RunError::runtime(format!("Unknown function {name}"), line));
        };
        match callee {
            Value::Builtin(builtin) => builtin.call(args, &mut self.heap, line),
            Value::Function(function) => {
                let decl = &function.decl;
                if args.len() != decl.params.len() {
                    return Err(RunError::runtime(
                        format!(
                            "Argument count mismatch: {name} takes {} arguments, got {}",
                            decl.params.len(),
                            args.len()
                        ),
                        line,
                    ));
                }
                let call_env = self.envs.child(function.closure);
                for (param, arg) in decl.params.iter().zip(args) {
                    self.envs.define(call_env, param.name.clone(), arg.clone());
                }
                let flow = self.exec_block(&decl.body, call_env);
                self.envs.release(call_env);
                match flow? {
                    Flow::Return(value) => Ok(value),
                    Flow::Normal => Ok(Value::None),
                }
            }
            other => Err(RunError::runtime(
                format!("{name} is not callable ({})", other.type_name()),
                line,
            )),
        }
    }
}

/// Python-style index resolution: negative indices count from the end.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let adjusted = if index < 0 { index + len } else { index };
    if (0..len).contains(&adjusted) {
        Some(adjusted as usize)
    } else {
        None
    }
}
