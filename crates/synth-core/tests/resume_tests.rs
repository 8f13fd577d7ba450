mod support;

use std::sync::Barrier;
use std::thread;

use serde_json::json;
use support::{engine, three_steps, CollectSaver, TestFactory, VecLoader};
use synth_core::{CoreEngineError, LinkRole, PipelineSpec, RecordStore, RunId, RunStatus, StepDescriptor, StepStatus};

fn failed_run(factory: &TestFactory) -> (synth_core::PipelineEngine<synth_core::InMemoryRecordStore, TestFactory>, RunId) {
    let engine = engine(factory.clone());
    let err = engine.execute(&three_steps(), &VecLoader::of(&["a b", "c"]), &CollectSaver::default())
                    .unwrap_err();
    let run_id = err.run_id().expect("step failure carries the run id");
    (engine, run_id)
}

#[test]
fn resume_from_failed_step_completes_without_touching_earlier_steps() {
    let factory = TestFactory::failing();
    let (engine, run_id) = failed_run(&factory);
    let store = engine.store();
    let before = store.list_steps(run_id).unwrap();
    let recorded_inputs = store.list_step_nodes(before[1].id, LinkRole::Input).unwrap();
    let nodes_before = store.node_count().unwrap();

    factory.heal();
    let saver = CollectSaver::default();
    let report = engine.resume_from_step(&three_steps(), before[1].id, &saver)
                       .expect("resume should finish");

    assert_eq!(report.run.id, run_id);
    assert_eq!(report.run.status, RunStatus::Finished);
    assert_eq!(report.step_statuses(), vec![StepStatus::Finished; 3]);
    assert_eq!(saver.values(), vec!["A!", "B!", "C!"]);

    // step 1 is exactly as it was
    assert_eq!(report.steps[0], before[0]);
    // step 1's outputs were not duplicated, steps 2 and 3 added 3 each
    assert_eq!(store.node_count().unwrap(), nodes_before + 6);
    // input links of the resumed step were not rewritten
    assert_eq!(store.list_step_nodes(before[1].id, LinkRole::Input).unwrap(), recorded_inputs);

    let chain = engine.lineage().ancestry(report.output[2].id).unwrap();
    assert_eq!(chain.last().unwrap().value, "c");
}

#[test]
fn resume_run_locates_the_errored_step() {
    let factory = TestFactory::failing();
    let (engine, run_id) = failed_run(&factory);
    factory.heal();
    let report = engine.resume_run(&three_steps(), run_id, &CollectSaver::default()).unwrap();
    assert_eq!(report.run.status, RunStatus::Finished);
}

#[test]
fn changed_configuration_is_rejected_without_state_change() {
    let factory = TestFactory::failing();
    let (engine, run_id) = failed_run(&factory);
    factory.heal();
    let steps_before = engine.store().list_steps(run_id).unwrap();

    let changed = PipelineSpec::from_steps(vec![StepDescriptor::new("split", "words", json!({})),
                                                StepDescriptor::new("map", "upper", json!({})).named("shout"),
                                                StepDescriptor::new("map", "suffix", json!({"suffix": "?"})),]);
    let err = engine.resume_from_step(&changed, steps_before[1].id, &CollectSaver::default())
                    .unwrap_err();
    assert!(matches!(err, CoreEngineError::ConfigMismatch { .. }));
    assert!(err.is_rejection());

    assert_eq!(engine.store().get_run(run_id).unwrap().status, RunStatus::Errored);
    assert_eq!(engine.store().list_steps(run_id).unwrap(), steps_before);
}

#[test]
fn non_errored_step_cannot_be_resumed() {
    let factory = TestFactory::failing();
    let (engine, run_id) = failed_run(&factory);
    let steps = engine.store().list_steps(run_id).unwrap();

    for target in [&steps[0], &steps[2]] {
        let err = engine.resume_from_step(&three_steps(), target.id, &CollectSaver::default())
                        .unwrap_err();
        assert!(matches!(err, CoreEngineError::InvalidResumeTarget { .. }), "{err}");
    }
    assert_eq!(engine.store().get_run(run_id).unwrap().status, RunStatus::Errored);
}

#[test]
fn finished_run_cannot_be_resumed() {
    let engine = engine(TestFactory::default());
    let report = engine.execute(&three_steps(), &VecLoader::of(&["x"]), &CollectSaver::default())
                       .unwrap();
    let err = engine.resume_run(&three_steps(), report.run.id, &CollectSaver::default())
                    .unwrap_err();
    assert!(matches!(err, CoreEngineError::InvalidResumeTarget { .. }));
    let err = engine.resume_from_step(&three_steps(), report.steps[1].id, &CollectSaver::default())
                    .unwrap_err();
    assert!(err.is_rejection());
}

#[test]
fn repeated_failure_keeps_run_resumable() {
    let factory = TestFactory::failing();
    let (engine, run_id) = failed_run(&factory);
    let step_id = engine.store().list_steps(run_id).unwrap()[1].id;

    // still failing: resume errors again, state is back to ERRORED
    let err = engine.resume_from_step(&three_steps(), step_id, &CollectSaver::default())
                    .unwrap_err();
    assert!(matches!(err, CoreEngineError::StepFailed { position: 2, .. }));
    assert_eq!(engine.store().get_run(run_id).unwrap().status, RunStatus::Errored);

    factory.heal();
    assert!(engine.resume_from_step(&three_steps(), step_id, &CollectSaver::default()).is_ok());
}

#[test]
fn unknown_step_id_is_not_found() {
    let engine = engine(TestFactory::default());
    let err = engine.resume_from_step(&three_steps(), uuid::Uuid::new_v4(), &CollectSaver::default())
                    .unwrap_err();
    assert!(matches!(err, CoreEngineError::Storage(synth_core::StoreError::NotFound { .. })));
}

#[test]
fn concurrent_resumes_of_one_step_run_it_once() {
    for _ in 0..50 {
        let factory = TestFactory::failing();
        let (engine, run_id) = failed_run(&factory);
        factory.heal();
        let failed = engine.store().list_steps(run_id).unwrap()[1].clone();
        let calls_before = factory.upper_calls();

        let barrier = Barrier::new(2);
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..2).map(|_| {
                                            s.spawn(|| {
                                                 let saver = CollectSaver::default();
                                                 barrier.wait();
                                                 engine.resume_from_step(&three_steps(), failed.id, &saver)
                                             })
                                        })
                                        .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let (won, lost): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
        assert_eq!(won.len(), 1, "exactly one resume may win");
        let err = lost.into_iter().next().unwrap().unwrap_err();
        assert!(err.is_rejection(), "loser should be rejected, got {err}");

        assert_eq!(factory.upper_calls(), calls_before + 1);
        assert_eq!(engine.store().get_run(run_id).unwrap().status, RunStatus::Finished);
        assert_eq!(engine.store().list_step_nodes(failed.id, LinkRole::Output).unwrap().len(), 3);
    }
}
