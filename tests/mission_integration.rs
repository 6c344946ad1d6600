//! End-to-end missions over the file-backed collaborators.

mod common;

use std::collections::BTreeSet;

use common::{
    batch, contradicting, fact, informative, official, source, worker, MissionFiles,
};
use deepresearch::adapters::{ReplayFixture, ReplayStep};
use deepresearch::application::{MissionController, MissionOutcome, MissionSnapshot};
use deepresearch::cli::exit_code_for;
use deepresearch::domain::models::{
    Config, CredibilityTier, FreshnessBucket, MissionPhase, Severity, SourceType, TaskId, TaskKind,
    TaskStatus,
};
use deepresearch::domain::ports::SnapshotStore;

fn fixture(entries: Vec<(&str, Vec<ReplayStep>)>) -> ReplayFixture {
    ReplayFixture {
        tasks: entries
            .into_iter()
            .map(|(id, steps)| (TaskId::new(id), steps))
            .collect(),
    }
}

async fn snapshot(files: &MissionFiles) -> MissionSnapshot {
    let bytes = files.snapshot_store().load().await.unwrap().unwrap();
    MissionSnapshot::from_bytes(&bytes).unwrap()
}

const SINGLE_TASK_PLAN: &str = r"
dimensions:
  - name: market size
    primary: true
tasks:
  - id: P0
    kind: plan
    title: Outline the question
  - id: E1
    title: Size the market
    depends_on: [P0]
    dimensions: [market size]
";

#[tokio::test]
async fn test_saturation_worked_example_end_to_end() {
    common::setup_test_logging();
    let files = MissionFiles::new(SINGLE_TASK_PLAN);
    let replay = worker(fixture(vec![(
        "E1",
        vec![
            batch(
                vec![official("https://stats.gov/a"), official("https://census.gov/b")],
                vec![fact("Market is 4bn", &["https://stats.gov/a", "https://census.gov/b"], &["market size"])],
            ),
            batch(
                vec![official("https://trade.gov/c")],
                vec![fact("Market grew 8%", &["https://trade.gov/c"], &["market size"])],
            ),
        ],
    )]));

    let mut mission =
        MissionController::new(Config::default(), "EV chargers", files.collaborators(replay.clone())).unwrap();
    let outcome = mission.run().await.unwrap();
    assert!(matches!(outcome, MissionOutcome::Completed(_)));

    // Two informative batches, then two empty ones: k expands only after a
    // non-informative batch and research stops at batch 4.
    let ks: Vec<u32> = replay
        .requests_for(&TaskId::new("E1"))
        .await
        .iter()
        .map(|r| r.k)
        .collect();
    assert_eq!(ks, vec![5, 5, 5, 10]);
    assert_eq!(mission.state().saturation_counters[&TaskId::new("E1")], 2);

    let plan_task = mission.graph().get(&TaskId::new("P0")).unwrap();
    assert_eq!(plan_task.status, TaskStatus::Completed);
    assert!(replay.requests_for(&TaskId::new("P0")).await.is_empty());

    let report = files.report();
    assert_eq!(report["topic"], "EV chargers");
    assert_eq!(report["facts"].as_array().unwrap().len(), 2);
    assert_eq!(report["sources"].as_array().unwrap().len(), 3);
    assert!(report["uncovered_dimensions"].as_array().unwrap().is_empty());

    // Every citation in the bundle resolves inside the bundle.
    let bundled: BTreeSet<u64> = report["sources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_u64().unwrap())
        .collect();
    for f in report["facts"].as_array().unwrap() {
        for id in f["source_ids"].as_array().unwrap() {
            assert!(bundled.contains(&id.as_u64().unwrap()));
        }
    }

    assert_eq!(snapshot(&files).await.state.phase, MissionPhase::Completed);
}

#[tokio::test]
async fn test_medium_conflict_resolved_by_weight() {
    let files = MissionFiles::new(
        r"
dimensions:
  - name: price
    primary: true
tasks:
  - id: E1
    title: Official price
    dimensions: [price]
  - id: E2
    title: Street price
    depends_on: [E1]
    dimensions: [price]
",
    );
    let blog = "https://blog.example/prices";
    let replay = worker(fixture(vec![
        (
            "E1",
            vec![batch(
                vec![
                    official("https://a.gov/1"),
                    official("https://b.gov/2"),
                    official("https://c.gov/3"),
                ],
                vec![fact(
                    "Unit price is 10",
                    &["https://a.gov/1", "https://b.gov/2", "https://c.gov/3"],
                    &["price"],
                )],
            )],
        ),
        (
            "E2",
            vec![batch(
                vec![source(
                    blog,
                    SourceType::Blog,
                    CredibilityTier::Tier3,
                    FreshnessBucket::TwoPlusYears,
                )],
                vec![contradicting(
                    fact("Unit price is 14", &[blog], &["price"]),
                    1,
                    "unit price",
                    Severity::Medium,
                )],
            )],
        ),
    ]));

    let mut mission =
        MissionController::new(Config::default(), "pricing", files.collaborators(replay)).unwrap();
    mission.run().await.unwrap();

    let conflicts = mission.conflicts().conflicts();
    assert_eq!(conflicts.len(), 1);
    let resolution = conflicts[0].resolution().unwrap();
    assert_eq!(resolution.adopted.get(), 1);
    assert!(!resolution.forced);
    assert!(conflicts[0].arbitration_task.is_none());

    // E2 never reaches three tier-1 sources and stops at the batch cap.
    let e2 = mission.graph().get(&TaskId::new("E2")).unwrap();
    assert!(e2.partial);

    let report = files.report();
    assert_eq!(report["conflicts"][0]["resolutions"][0]["basis"], "weight");
    assert_eq!(report["facts"].as_array().unwrap().len(), 2);
    assert!(report["caveats"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c.as_str().unwrap().contains("task E2 stopped before saturation")));
}

#[tokio::test]
async fn test_high_conflict_dispatches_scoped_arbitration() {
    let files = MissionFiles::new(
        r"
tasks:
  - id: E1
    title: First estimate
  - id: E2
    title: Second estimate
    depends_on: [E1]
",
    );
    let replay = worker(fixture(vec![
        ("E1", vec![informative("E1", 1, &[])]),
        (
            "E2",
            vec![batch(
                vec![official("https://e2.gov/x")],
                vec![contradicting(
                    fact("Core claim is false", &["https://e2.gov/x"], &[]),
                    1,
                    "core claim",
                    Severity::High,
                )],
            )],
        ),
    ]));

    let mut mission =
        MissionController::new(Config::default(), "core", files.collaborators(replay.clone())).unwrap();
    mission.run().await.unwrap();

    let arbitration: Vec<_> = mission.graph().by_kind(TaskKind::Conflict).collect();
    assert_eq!(arbitration.len(), 1);
    let requests = replay.requests_for(&arbitration[0].id).await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].k, 10);
    assert_eq!(requests[0].scope.as_deref(), Some("core claim"));

    let conflict = &mission.conflicts().conflicts()[0];
    assert_eq!(conflict.arbitration_task.as_ref(), Some(&arbitration[0].id));
    assert!(conflict.is_resolved());
    assert!(!conflict.resolution().unwrap().forced);
}

#[tokio::test]
async fn test_timeout_is_retried_once_with_same_parameters() {
    let files = MissionFiles::new(SINGLE_TASK_PLAN);
    let replay = worker(fixture(vec![(
        "E1",
        vec![
            ReplayStep::Stall { stall_secs: 30 },
            informative("E1", 1, &["market size"]),
        ],
    )]));
    let mut config = Config::default();
    config.dispatch.timeout_secs = 1;

    let mut mission = MissionController::new(config, "t", files.collaborators(replay.clone())).unwrap();
    mission.run().await.unwrap();

    let requests = replay.requests_for(&TaskId::new("E1")).await;
    assert_eq!((requests[0].batch, requests[0].attempt), (1, 1));
    assert_eq!((requests[1].batch, requests[1].attempt), (1, 2));
    assert_eq!(requests[0].k, requests[1].k);
    let e1 = mission.graph().get(&TaskId::new("E1")).unwrap();
    assert_eq!(e1.status, TaskStatus::Completed);
    assert_eq!(e1.reopen_count, 0);
}

#[tokio::test]
async fn test_persistent_failure_routes_around_dependents() {
    let files = MissionFiles::new(
        r"
tasks:
  - id: E1
    title: Flaky source
  - id: E2
    title: Depends on flaky
    depends_on: [E1]
  - id: E3
    title: Independent
",
    );
    let error = || ReplayStep::Error {
        error: "upstream 502".to_string(),
    };
    let replay = worker(fixture(vec![("E1", vec![error(), error(), error(), error()])]));

    let mut mission =
        MissionController::new(Config::default(), "t", files.collaborators(replay.clone())).unwrap();
    mission.run().await.unwrap();

    let graph = mission.graph();
    let e1 = graph.get(&TaskId::new("E1")).unwrap();
    assert_eq!(e1.status, TaskStatus::Failed);
    assert_eq!(e1.reopen_count, 1);
    assert_eq!(replay.requests_for(&TaskId::new("E1")).await.len(), 4);

    let e2 = graph.get(&TaskId::new("E2")).unwrap();
    assert_eq!(e2.status, TaskStatus::Failed);
    assert!(e2.failure.as_deref().unwrap().contains("E1"));
    assert!(replay.requests_for(&TaskId::new("E2")).await.is_empty());
    assert_eq!(graph.get(&TaskId::new("E3")).unwrap().status, TaskStatus::Completed);

    let caveats = &mission.state().caveats;
    assert!(caveats.iter().any(|c| c.starts_with("task E1 failed")));
    assert!(caveats.iter().any(|c| c.starts_with("task E2 skipped")));
}

#[tokio::test]
async fn test_unsourced_candidates_never_enter_the_bundle() {
    let files = MissionFiles::new(SINGLE_TASK_PLAN);
    let replay = worker(fixture(vec![(
        "E1",
        vec![batch(
            vec![official("https://stats.gov/a")],
            vec![
                fact("Sourced", &["https://stats.gov/a"], &["market size"]),
                fact("Cites nothing", &[], &["market size"]),
                fact("Cites a ghost", &["https://ghost.example"], &["market size"]),
            ],
        )],
    )]));

    let mut mission = MissionController::new(Config::default(), "t", files.collaborators(replay)).unwrap();
    mission.run().await.unwrap();

    let report = files.report();
    let facts = report["facts"].as_array().unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0]["statement"], "Sourced");
}

#[tokio::test]
async fn test_uncovered_dimension_gets_gap_task() {
    let files = MissionFiles::new(
        r"
dimensions:
  - name: size
    primary: true
  - name: risk
tasks:
  - id: E1
    title: Size
    dimensions: [size]
",
    );
    let replay = worker(fixture(vec![
        ("E1", vec![informative("E1", 1, &["size"])]),
        ("gap-1", vec![informative("gap-1", 1, &["risk"])]),
    ]));

    let mut mission = MissionController::new(Config::default(), "t", files.collaborators(replay.clone())).unwrap();
    mission.run().await.unwrap();

    let gap_requests = replay.requests_for(&TaskId::new("gap-1")).await;
    assert!(!gap_requests.is_empty());
    assert_eq!(gap_requests[0].dimensions, vec!["risk".to_string()]);
    assert!(files.report()["uncovered_dimensions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_iteration_ceiling_synthesizes_with_caveats() {
    let files = MissionFiles::new(
        r"
dimensions:
  - name: size
  - name: risk
tasks:
  - id: E1
    title: Size
    dimensions: [size]
",
    );
    let replay = worker(fixture(vec![("E1", vec![informative("E1", 1, &["size"])])]));
    let mut config = Config::default();
    config.mission.max_iterations = 1;

    let mut mission = MissionController::new(config, "t", files.collaborators(replay)).unwrap();
    mission.run().await.unwrap();
    assert_eq!(mission.state().iteration, 1);
    assert!(mission.graph().get(&TaskId::new("gap-1")).is_none());

    let report = files.report();
    assert_eq!(report["uncovered_dimensions"][0]["name"], "risk");
    assert!(report["caveats"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c.as_str().unwrap().contains("Iteration limit")));
}

#[tokio::test]
async fn test_cycle_fails_then_forced_resume_completes() {
    let files = MissionFiles::new(
        r"
tasks:
  - id: E1
    title: A
    depends_on: [E2]
  - id: E2
    title: B
    depends_on: [E1]
",
    );

    let mut mission =
        MissionController::new(Config::default(), "t", files.collaborators(worker(ReplayFixture::default())))
            .unwrap();
    let err = mission.run().await.unwrap_err();
    assert_eq!(exit_code_for(&err), 2);

    let failed = snapshot(&files).await;
    assert_eq!(failed.state.phase, MissionPhase::Error);
    assert_eq!(failed.state.failure.as_ref().unwrap().exit_code, 2);

    let refused = MissionController::resume(
        Config::default(),
        files.collaborators(worker(ReplayFixture::default())),
        false,
    )
    .await;
    assert!(refused.is_err());

    files.rewrite_plan("tasks:\n  - id: E1\n    title: A\n");
    let mut resumed = MissionController::resume(
        Config::default(),
        files.collaborators(worker(ReplayFixture::default())),
        true,
    )
    .await
    .unwrap();
    assert_eq!(resumed.phase(), MissionPhase::Planning);
    assert_eq!(resumed.state().mission_id, failed.state.mission_id);
    assert!(matches!(resumed.run().await.unwrap(), MissionOutcome::Completed(_)));
    assert!(files.output.exists());
}

#[tokio::test]
async fn test_exclusive_tasks_never_overlap() {
    let files = MissionFiles::new(
        r"
tasks:
  - id: B1
    title: Browse one
    exclusive_resource: true
  - id: B2
    title: Browse two
    exclusive_resource: true
",
    );
    let replay = worker(fixture(vec![
        ("B1", vec![informative("B1", 1, &[])]),
        ("B2", vec![informative("B2", 1, &[])]),
    ]));

    let mut mission = MissionController::new(Config::default(), "t", files.collaborators(replay.clone())).unwrap();
    mission.run().await.unwrap();

    assert_eq!(mission.graph().count_by_status(TaskStatus::Completed), 2);
    assert!(!replay.requests_for(&TaskId::new("B1")).await.is_empty());
    assert!(!replay.requests_for(&TaskId::new("B2")).await.is_empty());
}
