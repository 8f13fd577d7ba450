//! Run/Step state machine.
//!
//! Each transition takes the current entity, checks the move is allowed,
//! persists the new version and returns it. Nothing else in the crate
//! writes a status.
//!
//! The status of the entity passed in is sent to the store as the expected
//! prior status. If another writer moved it in the meantime the store
//! answers with a conflict and nothing is written.
//!
//! ```text
//! Run:  Running -> Finished | Errored,   Errored -> Running (resume)
//! Step: Pending -> Running -> Finished | Errored,   Errored -> Running (resume)
//! ```

use chrono::Utc;
use log::debug;
use serde_json::Value;

use crate::errors::CoreEngineError;
use crate::model::{Node, Run, RunStatus, Step, StepNode, StepStatus};
use crate::store::RecordStore;

fn run_can_transition(from: RunStatus, to: RunStatus) -> bool {
    matches!((from, to),
             (RunStatus::Running, RunStatus::Finished)
             | (RunStatus::Running, RunStatus::Errored)
             | (RunStatus::Errored, RunStatus::Running))
}

fn check_run(run: &Run, to: RunStatus) -> Result<(), CoreEngineError> {
    if run_can_transition(run.status, to) {
        Ok(())
    } else {
        Err(CoreEngineError::InvalidTransition { entity: "run",
                                                 id: run.id,
                                                 from: run.status.to_string(),
                                                 to: to.to_string() })
    }
}

fn check_step(step: &Step, to: StepStatus) -> Result<(), CoreEngineError> {
    if step.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreEngineError::InvalidTransition { entity: "step",
                                                 id: step.id,
                                                 from: step.status.to_string(),
                                                 to: to.to_string() })
    }
}

pub struct StateMachine<'s, S: RecordStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: RecordStore + ?Sized> StateMachine<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Pending|Errored -> Running, committed together with the step's input
    /// links.
    pub fn start_step(&self, step: &Step, inputs: &[StepNode]) -> Result<Step, CoreEngineError> {
        check_step(step, StepStatus::Running)?;
        let next = Step { status: StepStatus::Running,
                          run_at: Utc::now(),
                          finished_at: None,
                          ..step.clone() };
        self.store.begin_step(&next, step.status, inputs)?;
        debug!("step {} position={} -> running", next.id, next.position);
        Ok(next)
    }

    /// Running -> Finished, committed together with the produced nodes and
    /// their output links.
    pub fn finish_step(&self,
                       step: &Step,
                       produced: &[Node],
                       outputs: &[StepNode],
                       metadata: Value)
                       -> Result<Step, CoreEngineError> {
        check_step(step, StepStatus::Finished)?;
        let next = Step { status: StepStatus::Finished,
                          finished_at: Some(Utc::now()),
                          metadata: Some(metadata),
                          ..step.clone() };
        self.store.complete_step(&next, step.status, produced, outputs)?;
        debug!("step {} position={} -> finished", next.id, next.position);
        Ok(next)
    }

    /// Running -> Errored.
    pub fn fail_step(&self, step: &Step) -> Result<Step, CoreEngineError> {
        check_step(step, StepStatus::Errored)?;
        let next = Step { status: StepStatus::Errored,
                          finished_at: Some(Utc::now()),
                          ..step.clone() };
        self.store.update_step(&next, step.status)?;
        debug!("step {} position={} -> errored", next.id, next.position);
        Ok(next)
    }

    pub fn finish_run(&self, run: &Run) -> Result<Run, CoreEngineError> {
        self.move_run(run, RunStatus::Finished)
    }

    pub fn fail_run(&self, run: &Run) -> Result<Run, CoreEngineError> {
        self.move_run(run, RunStatus::Errored)
    }

    /// Errored -> Running. Only the resume path calls this, after its guards
    /// passed.
    pub fn reactivate_run(&self, run: &Run) -> Result<Run, CoreEngineError> {
        self.move_run(run, RunStatus::Running)
    }

    fn move_run(&self, run: &Run, to: RunStatus) -> Result<Run, CoreEngineError> {
        check_run(run, to)?;
        let next = run.with_status(to);
        self.store.update_run(&next, run.status)?;
        debug!("run {} -> {}", next.id, to);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::StepDescriptor;
    use crate::store::InMemoryRecordStore;
    use serde_json::json;

    fn fixture() -> (InMemoryRecordStore, Run, Step) {
        let store = InMemoryRecordStore::new();
        let run = Run::new(json!({}));
        let step = Step::pending(run.id, 1, &StepDescriptor::new("split", "chunk", json!({})));
        store.create_run_with_steps(&run, std::slice::from_ref(&step)).unwrap();
        (store, run, step)
    }

    #[test]
    fn step_lifecycle_is_persisted() {
        let (store, _, step) = fixture();
        let sm = StateMachine::new(&store);
        let running = sm.start_step(&step, &[]).unwrap();
        assert_eq!(store.get_step(step.id).unwrap().status, StepStatus::Running);
        let done = sm.finish_step(&running, &[], &[], json!({"k": 1})).unwrap();
        let stored = store.get_step(step.id).unwrap();
        assert_eq!(stored, done);
        assert_eq!(stored.metadata, Some(json!({"k": 1})));
        assert!(stored.finished_at.is_some());
    }

    #[test]
    fn pending_step_cannot_finish_or_fail() {
        let (store, _, step) = fixture();
        let sm = StateMachine::new(&store);
        assert!(matches!(sm.fail_step(&step), Err(CoreEngineError::InvalidTransition { .. })));
        assert!(matches!(sm.finish_step(&step, &[], &[], json!({})),
                         Err(CoreEngineError::InvalidTransition { .. })));
        assert_eq!(store.get_step(step.id).unwrap().status, StepStatus::Pending);
    }

    #[test]
    fn errored_step_can_restart() {
        let (store, _, step) = fixture();
        let sm = StateMachine::new(&store);
        let failed = sm.fail_step(&sm.start_step(&step, &[]).unwrap()).unwrap();
        assert_eq!(failed.status, StepStatus::Errored);
        assert_eq!(sm.start_step(&failed, &[]).unwrap().status, StepStatus::Running);
    }

    #[test]
    fn finished_run_cannot_be_reactivated() {
        let (store, run, _) = fixture();
        let sm = StateMachine::new(&store);
        let done = sm.finish_run(&run).unwrap();
        assert!(sm.reactivate_run(&done).is_err());
        let failed = sm.fail_run(&Run::new(json!({})).with_status(RunStatus::Running));
        // run not stored: the store reports it missing
        assert!(matches!(failed, Err(CoreEngineError::Storage(_))));
    }

    #[test]
    fn errored_run_reactivates() {
        let (store, run, _) = fixture();
        let sm = StateMachine::new(&store);
        let failed = sm.fail_run(&run).unwrap();
        let again = sm.reactivate_run(&failed).unwrap();
        assert_eq!(store.get_run(run.id).unwrap().status, RunStatus::Running);
        assert_eq!(again.status, RunStatus::Running);
    }
}
