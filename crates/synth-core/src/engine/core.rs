//! PipelineEngine: fresh execution and resume.
//!
//! # Design notes
//!
//! A run is written to the store before any of it executes: the run row and
//! one PENDING row per step, in a single commit. From then on the store is
//! the record of progress, not the engine. Each step goes through three
//! writes, all of them owned by `StateMachine`:
//!
//! 1. `start_step` flips the step to RUNNING together with its input links.
//! 2. The executor runs against an in-memory `ExecutionContext`. Nothing it
//!    does reaches the store directly.
//! 3. `finish_step` commits the produced nodes, their output links and the
//!    FINISHED status in one transaction.
//!
//! A failure between 1 and 3 leaves a RUNNING step whose inputs are
//! recorded and whose outputs are not. `fail_quietly` then moves the step
//! and the run to ERRORED, which is what resume looks for.
//!
//! Resume never re-derives a step's input from the steps before it. It reads
//! the input links back (`LineageTracker::resolve_inputs`), so the replayed
//! step sees the same nodes in the same order even if an earlier executor
//! would now produce something else. Steps before the resumed one are never
//! written.
//!
//! An executor panic is caught at the step boundary long enough to mark the
//! step and run ERRORED, then resumed. The caller still sees the panic, and
//! the run it leaves behind is resumable.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, info, warn};

use super::{EngineBuilder, EngineConfig, RunReport};
use crate::errors::CoreEngineError;
use crate::executor::{CollaboratorError, ExecutionContext, Executor, ExecutorError, ExecutorFactory, InputLoader,
                      OutputSaver, PipelineContext};
use crate::lineage::LineageTracker;
use crate::model::{LinkRole, Node, NodeId, Run, RunId, RunStatus, Step, StepId, StepNode, StepStatus};
use crate::spec::{PipelineSpec, StepDescriptor};
use crate::state::StateMachine;
use crate::store::{RecordStore, StoreError};

/// Drives a pipeline's steps strictly one after another against a
/// `RecordStore`.
///
/// The engine owns every status transition and every write. Executors only
/// return nodes and metadata through their `ExecutionContext`.
#[derive(Debug)]
pub struct PipelineEngine<S, F>
    where S: RecordStore,
          F: ExecutorFactory
{
    store: S,
    factory: F,
    config: EngineConfig,
}

impl<S, F> PipelineEngine<S, F>
    where S: RecordStore,
          F: ExecutorFactory
{
    #[inline]
    pub fn builder(store: S, factory: F) -> EngineBuilder<S, F> {
        EngineBuilder::new(store, factory)
    }

    pub fn new(store: S, factory: F, config: EngineConfig) -> Self {
        Self { store,
               factory,
               config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lineage(&self) -> LineageTracker<'_, S> {
        LineageTracker::new(&self.store)
    }

    /// Instantiates the executor of every descriptor. Fails on the first
    /// descriptor the factory does not know, before anything is persisted.
    fn build_executors(&self, descriptors: &[StepDescriptor]) -> Result<Vec<Box<dyn Executor>>, CoreEngineError> {
        descriptors.iter().map(|d| self.factory.create(d)).collect()
    }

    /// Fresh execution: creates a run with all of its steps, loads the input
    /// and runs every step in position order.
    pub fn execute(&self,
                   spec: &PipelineSpec,
                   input: &dyn InputLoader,
                   output: &dyn OutputSaver)
                   -> Result<RunReport, CoreEngineError> {
        let executors = self.build_executors(spec.steps())?;

        let run = Run::new(spec.config().clone());
        let steps: Vec<Step> = spec.steps()
                                   .iter()
                                   .enumerate()
                                   .map(|(i, d)| Step::pending(run.id, i as u32 + 1, d))
                                   .collect();
        self.store.create_run_with_steps(&run, &steps)?;
        info!("run {} created with {} steps (config {})", run.id, steps.len(), run.config_hash);

        let mut ctx = PipelineContext::new(run.id);
        if let Err(source) = input.load(&mut ctx) {
            error!("run {}: input loader failed: {source}", run.id);
            self.fail_quietly(&run, None);
            return Err(CoreEngineError::InputFailed { run_id: run.id,
                                                      source });
        }
        if let Some(node) = ctx.working().iter().find(|n| !n.is_root()) {
            self.fail_quietly(&run, None);
            let source = CollaboratorError::InvalidData(format!("input node {} has a parent", node.id));
            return Err(CoreEngineError::InputFailed { run_id: run.id,
                                                      source });
        }
        if let Err(e) = self.store.insert_nodes(ctx.working()) {
            self.fail_quietly(&run, None);
            return Err(e.into());
        }
        debug!("run {}: loaded {} root nodes", run.id, ctx.working().len());

        self.drive(run, &steps, &executors, ctx, output)
    }

    /// Resumes a run from one of its ERRORED steps.
    ///
    /// Rejected without touching any state when the run is FINISHED, the
    /// step is not ERRORED, or `spec` does not serialize identically to the
    /// run's snapshot. Otherwise the run is reactivated and the pipeline is
    /// replayed from the step's position, seeded with the nodes recorded as
    /// that step's input. Earlier steps are not touched.
    ///
    /// The guards above run against rows read at the start of the call, so
    /// two callers can both pass them. Reactivation is the point where they
    /// are told apart: the run row moves ERRORED -> RUNNING only if it is
    /// still ERRORED, and the caller that loses gets `InvalidResumeTarget`
    /// before it starts any step. Up to that point it has only read, so
    /// there is nothing to undo.
    pub fn resume_from_step(&self,
                            spec: &PipelineSpec,
                            step_id: StepId,
                            output: &dyn OutputSaver)
                            -> Result<RunReport, CoreEngineError> {
        let step = self.store.get_step(step_id)?;
        let run = self.store.get_run(step.run_id)?;
        let steps = self.store.list_steps(run.id)?;

        self.check_resume(spec, &run, &step, &steps).inspect_err(|e| warn!("resume rejected: {e}"))?;

        let from = (step.position - 1) as usize;
        let executors = self.build_executors(&spec.steps()[from..])?;
        let inputs = self.lineage().resolve_inputs(&step)?;

        let run = match StateMachine::new(&self.store).reactivate_run(&run) {
            Ok(run) => run,
            Err(CoreEngineError::Storage(StoreError::Conflict(detail))) => {
                warn!("resume rejected: run {} changed underneath ({detail})", run.id);
                return Err(CoreEngineError::InvalidResumeTarget { run_id: run.id,
                                                                  step_id: Some(step.id),
                                                                  reason: "run was resumed concurrently".into() });
            }
            Err(e) => return Err(e),
        };
        info!("run {} resumed from step {} ({}) with {} input nodes",
              run.id,
              step.position,
              step.label(),
              inputs.len());

        let ctx = PipelineContext::seeded(run.id, inputs);
        self.drive(run, &steps[from..], &executors, ctx, output)
    }

    /// Resumes a run from its ERRORED step, whichever it is.
    pub fn resume_run(&self,
                      spec: &PipelineSpec,
                      run_id: RunId,
                      output: &dyn OutputSaver)
                      -> Result<RunReport, CoreEngineError> {
        let run = self.store.get_run(run_id)?;
        if run.status == RunStatus::Finished {
            return Err(CoreEngineError::InvalidResumeTarget { run_id,
                                                              step_id: None,
                                                              reason: "run already finished".into() });
        }
        let failed = self.store
                         .list_steps(run_id)?
                         .into_iter()
                         .find(|s| s.status == StepStatus::Errored)
                         .ok_or_else(|| CoreEngineError::InvalidResumeTarget { run_id,
                                                                               step_id: None,
                                                                               reason: "run has no errored step".into() })?;
        self.resume_from_step(spec, failed.id, output)
    }

    fn check_resume(&self, spec: &PipelineSpec, run: &Run, step: &Step, steps: &[Step]) -> Result<(), CoreEngineError> {
        let reject = |reason: String| CoreEngineError::InvalidResumeTarget { run_id: run.id,
                                                                             step_id: Some(step.id),
                                                                             reason };
        if run.status == RunStatus::Finished {
            return Err(reject("run already finished".into()));
        }
        if step.status != StepStatus::Errored {
            return Err(reject(format!("step {} is {}, not errored", step.position, step.status)));
        }
        if run.status != RunStatus::Errored {
            return Err(reject(format!("run is {}, not errored", run.status)));
        }
        if !spec.matches_snapshot(&run.config) || !same_steps(spec.steps(), steps) {
            return Err(CoreEngineError::ConfigMismatch { run_id: run.id });
        }
        Ok(())
    }

    /// The sequential loop shared by fresh execution and resume. `steps` are
    /// the steps still to run, in position order, paired with `executors`.
    fn drive(&self,
             run: Run,
             steps: &[Step],
             executors: &[Box<dyn Executor>],
             mut ctx: PipelineContext,
             output: &dyn OutputSaver)
             -> Result<RunReport, CoreEngineError> {
        let sm = StateMachine::new(&self.store);

        for (step, executor) in steps.iter().zip(executors) {
            if let Err(e) = self.check_predecessor(step) {
                self.fail_quietly(&run, None);
                return Err(e);
            }
            let produced = self.execute_step(&sm, &run, step, executor.as_ref(), ctx.working())?;
            ctx.replace_working(produced);
        }

        if let Err(source) = output.save(&ctx) {
            error!("run {}: output saver failed: {source}", run.id);
            self.fail_quietly(&run, None);
            return Err(CoreEngineError::OutputFailed { run_id: run.id,
                                                       source });
        }

        let run = sm.finish_run(&run)?;
        info!("run {} finished with {} output nodes", run.id, ctx.working().len());
        Ok(RunReport { steps: self.store.list_steps(run.id)?,
                       run,
                       output: ctx.into_working() })
    }

    /// A step only starts once the step before it is FINISHED.
    fn check_predecessor(&self, step: &Step) -> Result<(), CoreEngineError> {
        if step.position == 1 {
            return Ok(());
        }
        let previous = self.store
                           .list_steps(step.run_id)?
                           .into_iter()
                           .find(|s| s.position == step.position - 1);
        match previous {
            Some(p) if p.status == StepStatus::Finished => Ok(()),
            Some(p) => Err(CoreEngineError::OutOfOrder { run_id: step.run_id,
                                                         position: step.position,
                                                         reason: format!("step {} is {}", p.position, p.status) }),
            None => Err(CoreEngineError::OutOfOrder { run_id: step.run_id,
                                                      position: step.position,
                                                      reason: format!("step {} is missing", step.position - 1) }),
        }
    }

    fn execute_step(&self,
                    sm: &StateMachine<'_, S>,
                    run: &Run,
                    step: &Step,
                    executor: &dyn Executor,
                    working: &[Node])
                    -> Result<Vec<Node>, CoreEngineError> {
        let links = match self.lineage().consumption_links(step, working) {
            Ok(links) => links,
            Err(e) => {
                self.fail_quietly(run, None);
                return Err(e.into());
            }
        };
        let running = match sm.start_step(step, &links) {
            Ok(s) => s,
            Err(e) => {
                self.fail_quietly(run, None);
                return Err(e);
            }
        };

        if self.config.debug {
            info!("run {} step {} [{}] parameters={} input_nodes={}",
                  run.id,
                  running.position,
                  running.label(),
                  running.parameters,
                  working.len());
        } else {
            debug!("run {} step {} [{}] started", run.id, running.position, running.label());
        }

        let mut ectx = ExecutionContext::new(&running, working);
        let result = panic::catch_unwind(AssertUnwindSafe(|| executor.execute(&mut ectx)));

        let failure = match result {
            Ok(Ok(())) => {
                let outcome = ectx.into_outcome();
                match check_produced(working, &outcome.produced) {
                    Ok(()) => {
                        let ids: Vec<NodeId> = outcome.produced.iter().map(|n| n.id).collect();
                        let outputs = StepNode::for_nodes(running.id, LinkRole::Output, &ids);
                        return match sm.finish_step(&running, &outcome.produced, &outputs, outcome.metadata) {
                            Ok(done) => {
                                if self.config.debug {
                                    info!("run {} step {} [{}] finished output_nodes={}",
                                          run.id,
                                          done.position,
                                          done.label(),
                                          outcome.produced.len());
                                }
                                Ok(outcome.produced)
                            }
                            Err(e) => {
                                self.fail_quietly(run, Some(&running));
                                Err(e)
                            }
                        };
                    }
                    Err(e) => e,
                }
            }
            Ok(Err(e)) => e,
            Err(payload) => {
                error!("run {} step {} [{}] panicked", run.id, running.position, running.label());
                self.fail_quietly(run, Some(&running));
                panic::resume_unwind(payload);
            }
        };

        error!("run {} step {} [{}] failed: {failure}", run.id, running.position, running.label());
        self.fail_quietly(run, Some(&running));
        Err(CoreEngineError::StepFailed { run_id: run.id,
                                          position: running.position,
                                          step_type: running.step_type.clone(),
                                          method: running.method.clone(),
                                          source: failure })
    }

    /// Marks the running step (if any) and the run ERRORED. Errors while
    /// doing so are logged; the caller returns the original failure.
    fn fail_quietly(&self, run: &Run, step: Option<&Step>) {
        let sm = StateMachine::new(&self.store);
        if let Some(step) = step {
            if let Err(e) = sm.fail_step(step) {
                error!("could not mark step {} errored: {e}", step.id);
            }
        }
        if let Err(e) = sm.fail_run(run) {
            error!("could not mark run {} errored: {e}", run.id);
        }
    }
}

/// Produced nodes must be new and derive from the step's input.
fn check_produced(input: &[Node], produced: &[Node]) -> Result<(), ExecutorError> {
    let input_ids: HashSet<NodeId> = input.iter().map(|n| n.id).collect();
    for node in produced {
        match node.parent_id {
            Some(parent) if input_ids.contains(&parent) => {}
            Some(parent) => {
                return Err(ExecutorError::Failed(format!("produced node {} derives from {parent}, which is not part of the step input",
                                                         node.id)))
            }
            None => return Err(ExecutorError::Failed(format!("produced node {} has no parent", node.id))),
        }
        if input_ids.contains(&node.id) {
            return Err(ExecutorError::Failed(format!("node {} re-emitted unchanged; derive a new node instead", node.id)));
        }
    }
    Ok(())
}

/// Stored steps were materialized from exactly these descriptors.
fn same_steps(descriptors: &[StepDescriptor], steps: &[Step]) -> bool {
    descriptors.len() == steps.len()
    && descriptors.iter().zip(steps).all(|(d, s)| {
                                        d.step_type == s.step_type
                                        && d.method == s.method
                                        && d.name == s.name
                                        && crate::hashing::to_canonical_json(&d.parameters)
                                           == crate::hashing::to_canonical_json(&s.parameters)
                                    })
}
