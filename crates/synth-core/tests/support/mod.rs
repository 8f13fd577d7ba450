#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use synth_core::{CollaboratorError, CoreEngineError, ExecutionContext, Executor, ExecutorError, ExecutorFactory,
                 InMemoryRecordStore, InputLoader, OutputSaver, PipelineContext, PipelineEngine, PipelineSpec,
                 StepDescriptor};

/// Splits every input value on whitespace.
struct Words;

impl Executor for Words {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), ExecutorError> {
        let mut count = 0;
        for node in ctx.input() {
            for word in node.value.split_whitespace() {
                ctx.derive(node, word);
                count += 1;
            }
        }
        ctx.annotate("words", json!(count));
        Ok(())
    }
}

/// Uppercases every value; fails while `fail` is set.
struct Upper {
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl Executor for Upper {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExecutorError::Provider("provider unavailable".into()));
        }
        for node in ctx.input() {
            ctx.derive(node, node.value.to_uppercase());
        }
        Ok(())
    }
}

struct Suffix(String);

impl Executor for Suffix {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), ExecutorError> {
        for node in ctx.input() {
            ctx.derive(node, format!("{}{}", node.value, self.0));
        }
        Ok(())
    }
}

struct Panics;

impl Executor for Panics {
    fn execute(&self, _ctx: &mut ExecutionContext<'_>) -> Result<(), ExecutorError> {
        panic!("executor blew up");
    }
}

/// Re-emits its input instead of deriving.
struct Passthrough;

impl Executor for Passthrough {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), ExecutorError> {
        for node in ctx.input() {
            ctx.emit(node.clone());
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct TestFactory {
    pub fail: Arc<AtomicBool>,
    /// Times the "upper" executor ran, failed attempts included.
    pub upper_calls: Arc<AtomicUsize>,
}

impl TestFactory {
    pub fn failing() -> Self {
        Self { fail: Arc::new(AtomicBool::new(true)),
               ..Self::default() }
    }

    pub fn heal(&self) {
        self.fail.store(false, Ordering::SeqCst);
    }

    pub fn upper_calls(&self) -> usize {
        self.upper_calls.load(Ordering::SeqCst)
    }
}

impl ExecutorFactory for TestFactory {
    fn create(&self, d: &StepDescriptor) -> Result<Box<dyn Executor>, CoreEngineError> {
        match (d.step_type.as_str(), d.method.as_str()) {
            ("split", "words") => Ok(Box::new(Words)),
            ("map", "upper") => Ok(Box::new(Upper { fail: self.fail.clone(),
                                                     calls: self.upper_calls.clone() })),
            ("map", "suffix") => {
                let suffix = d.parameters["suffix"].as_str().unwrap_or("!").to_string();
                Ok(Box::new(Suffix(suffix)))
            }
            ("map", "panic") => Ok(Box::new(Panics)),
            ("map", "passthrough") => Ok(Box::new(Passthrough)),
            (t, m) => Err(CoreEngineError::UnknownExecutor { step_type: t.to_string(),
                                                             method: m.to_string() }),
        }
    }
}

pub struct VecLoader(pub Vec<String>);

impl VecLoader {
    pub fn of(values: &[&str]) -> Self {
        Self(values.iter().map(|s| s.to_string()).collect())
    }
}

impl InputLoader for VecLoader {
    fn load(&self, ctx: &mut PipelineContext) -> Result<(), CollaboratorError> {
        for v in &self.0 {
            ctx.push_root(v.clone());
        }
        Ok(())
    }
}

pub struct FailingLoader;

impl InputLoader for FailingLoader {
    fn load(&self, _ctx: &mut PipelineContext) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::InvalidData("no such file".into()))
    }
}

#[derive(Default)]
pub struct CollectSaver {
    pub saved: Mutex<Vec<String>>,
}

impl CollectSaver {
    pub fn values(&self) -> Vec<String> {
        self.saved.lock().unwrap().clone()
    }
}

impl OutputSaver for CollectSaver {
    fn save(&self, ctx: &PipelineContext) -> Result<(), CollaboratorError> {
        *self.saved.lock().unwrap() = ctx.working().iter().map(|n| n.value.clone()).collect();
        Ok(())
    }
}

pub struct FailingSaver;

impl OutputSaver for FailingSaver {
    fn save(&self, _ctx: &PipelineContext) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Other("disk full".into()))
    }
}

pub fn three_steps() -> PipelineSpec {
    PipelineSpec::from_steps(vec![StepDescriptor::new("split", "words", json!({})),
                                  StepDescriptor::new("map", "upper", json!({})).named("shout"),
                                  StepDescriptor::new("map", "suffix", json!({"suffix": "!"})),])
}

pub fn engine(factory: TestFactory) -> PipelineEngine<InMemoryRecordStore, TestFactory> {
    PipelineEngine::builder(InMemoryRecordStore::new(), factory).build()
}
