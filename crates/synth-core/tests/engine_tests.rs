mod support;

use std::panic::{self, AssertUnwindSafe};

use serde_json::json;
use support::{engine, three_steps, CollectSaver, FailingLoader, FailingSaver, TestFactory, VecLoader};
use synth_core::{CoreEngineError, ExecutorError, LinkRole, PipelineSpec, RecordStore, RunStatus, StepDescriptor,
                 StepStatus};

#[test]
fn fresh_run_finishes_every_step_and_links_lineage() {
    let engine = engine(TestFactory::default());
    let saver = CollectSaver::default();
    let report = engine.execute(&three_steps(), &VecLoader::of(&["a b", "c"]), &saver)
                       .expect("run should finish");

    assert_eq!(report.run.status, RunStatus::Finished);
    assert_eq!(report.step_statuses(), vec![StepStatus::Finished; 3]);
    assert_eq!(saver.values(), vec!["A!", "B!", "C!"]);

    let store = engine.store();
    assert_eq!(store.get_run(report.run.id).unwrap().status, RunStatus::Finished);
    // 2 roots + 3 words + 3 upper + 3 suffix
    assert_eq!(store.node_count().unwrap(), 11);

    // each step's inputs are exactly the previous step's outputs
    let lineage = engine.lineage();
    for pair in report.steps.windows(2) {
        let out: Vec<_> = lineage.resolve_outputs(&pair[0]).unwrap().iter().map(|n| n.id).collect();
        let inp: Vec<_> = lineage.resolve_inputs(&pair[1]).unwrap().iter().map(|n| n.id).collect();
        assert_eq!(out, inp);
    }

    let chain = lineage.ancestry(report.output[1].id).unwrap();
    let values: Vec<_> = chain.iter().map(|n| n.value.as_str()).collect();
    assert_eq!(values, vec!["B!", "B", "b", "a b"]);
    assert!(chain.last().unwrap().is_root());

    assert_eq!(report.steps[0].metadata, Some(json!({"words": 3})));
    assert_eq!(store.list_step_nodes(report.steps[0].id, LinkRole::Input).unwrap().len(), 2);
}

#[test]
fn step_failure_marks_step_and_run_errored() {
    let engine = engine(TestFactory::failing());
    let err = engine.execute(&three_steps(), &VecLoader::of(&["a b"]), &CollectSaver::default())
                    .unwrap_err();

    let run_id = match &err {
        CoreEngineError::StepFailed { run_id,
                                      position,
                                      source: ExecutorError::Provider(_),
                                      .. } => {
            assert_eq!(*position, 2);
            *run_id
        }
        other => panic!("unexpected error: {other:?}"),
    };

    let store = engine.store();
    assert_eq!(store.get_run(run_id).unwrap().status, RunStatus::Errored);
    let statuses: Vec<_> = store.list_steps(run_id).unwrap().iter().map(|s| s.status).collect();
    assert_eq!(statuses, vec![StepStatus::Finished, StepStatus::Errored, StepStatus::Pending]);
    // nothing from the failed step was persisted
    assert_eq!(store.node_count().unwrap(), 3);

    let failed = &store.list_steps(run_id).unwrap()[1];
    assert_eq!(store.list_step_nodes(failed.id, LinkRole::Input).unwrap().len(), 2);
    assert!(store.list_step_nodes(failed.id, LinkRole::Output).unwrap().is_empty());
}

#[test]
fn unknown_executor_is_reported_before_a_run_exists() {
    let engine = engine(TestFactory::default());
    let spec = PipelineSpec::from_steps(vec![StepDescriptor::new("split", "words", json!({})),
                                             StepDescriptor::new("ablation", "nope", json!({}))]);
    let err = engine.execute(&spec, &VecLoader::of(&["x"]), &CollectSaver::default())
                    .unwrap_err();
    assert!(matches!(err, CoreEngineError::UnknownExecutor { .. }));
    assert!(engine.store().list_runs().unwrap().is_empty());
}

#[test]
fn zero_step_pipeline_saves_loaded_input() {
    let engine = engine(TestFactory::default());
    let saver = CollectSaver::default();
    let report = engine.execute(&PipelineSpec::from_steps(vec![]), &VecLoader::of(&["x", "y"]), &saver)
                       .unwrap();
    assert_eq!(report.run.status, RunStatus::Finished);
    assert!(report.steps.is_empty());
    assert_eq!(saver.values(), vec!["x", "y"]);
}

#[test]
fn input_failure_errors_the_run() {
    let engine = engine(TestFactory::default());
    let err = engine.execute(&three_steps(), &FailingLoader, &CollectSaver::default())
                    .unwrap_err();
    assert!(matches!(err, CoreEngineError::InputFailed { .. }));
    let run = &engine.store().list_runs().unwrap()[0];
    assert_eq!(run.status, RunStatus::Errored);
    let statuses: Vec<_> = engine.store().list_steps(run.id).unwrap().iter().map(|s| s.status).collect();
    assert_eq!(statuses, vec![StepStatus::Pending; 3]);
}

#[test]
fn output_failure_errors_the_run_after_steps_finished() {
    let engine = engine(TestFactory::default());
    let err = engine.execute(&three_steps(), &VecLoader::of(&["a"]), &FailingSaver).unwrap_err();
    let run_id = err.run_id().unwrap();
    assert!(matches!(err, CoreEngineError::OutputFailed { .. }));
    assert_eq!(engine.store().get_run(run_id).unwrap().status, RunStatus::Errored);
    assert!(engine.store()
                  .list_steps(run_id)
                  .unwrap()
                  .iter()
                  .all(|s| s.status == StepStatus::Finished));
}

#[test]
fn re_emitting_input_fails_the_step() {
    let engine = engine(TestFactory::default());
    let spec = PipelineSpec::from_steps(vec![StepDescriptor::new("map", "passthrough", json!({}))]);
    let err = engine.execute(&spec, &VecLoader::of(&["x"]), &CollectSaver::default())
                    .unwrap_err();
    assert!(matches!(err,
                     CoreEngineError::StepFailed { source: ExecutorError::Failed(_),
                                                   .. }));
}

#[test]
fn executor_panic_marks_state_then_propagates() {
    let engine = engine(TestFactory::default());
    let spec = PipelineSpec::from_steps(vec![StepDescriptor::new("split", "words", json!({})),
                                             StepDescriptor::new("map", "panic", json!({}))]);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                      engine.execute(&spec, &VecLoader::of(&["x"]), &CollectSaver::default())
                  }));
    assert!(outcome.is_err());

    let run = &engine.store().list_runs().unwrap()[0];
    assert_eq!(run.status, RunStatus::Errored);
    let statuses: Vec<_> = engine.store().list_steps(run.id).unwrap().iter().map(|s| s.status).collect();
    assert_eq!(statuses, vec![StepStatus::Finished, StepStatus::Errored]);
}

#[test]
fn debug_config_does_not_change_results() {
    let engine = synth_core::PipelineEngine::builder(synth_core::InMemoryRecordStore::new(), TestFactory::default())
        .debug(true)
        .build();
    assert!(engine.config().debug);
    let report = engine.execute(&three_steps(), &VecLoader::of(&["q"]), &CollectSaver::default())
                       .unwrap();
    assert_eq!(report.output.len(), 1);
    assert_eq!(report.output[0].value, "Q!");
}
