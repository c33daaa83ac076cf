use crate::cell::{CellState, CommitMode, ConflictMode, Job, Workload};
use crate::cluster::ClusterSimulator;
use crate::sched::{MonolithicScheduler, Scheduler};
use crate::sim::SimTime;
use std::collections::HashMap;

fn think_maps(workload: &str) -> (HashMap<String, f64>, HashMap<String, f64>) {
    let mut constant = HashMap::new();
    let mut per_task = HashMap::new();
    constant.insert(workload.to_string(), 0.1);
    per_task.insert(workload.to_string(), 0.01);
    (constant, per_task)
}

fn single_monolithic(workload: &str, seed: u64) -> Vec<Box<dyn Scheduler>> {
    let (constant, per_task) = think_maps(workload);
    vec![Box::new(MonolithicScheduler::new(
        "monolithic",
        constant,
        per_task,
        0,
        seed,
    ))]
}

fn mapping(workload: &str) -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    map.insert(workload.to_string(), vec!["monolithic".to_string()]);
    map
}

fn one_job_workload(workload: &str, job: Job) -> Vec<Workload> {
    let mut wl = Workload::new(workload);
    wl.add_job(job);
    vec![wl]
}

#[test]
fn two_task_job_is_fully_placed_once_the_think_time_elapses() {
    let cell = CellState::new(
        2,
        4.0,
        8000.0,
        ConflictMode::SequenceNumbers,
        CommitMode::Incremental,
    );
    let job = Job::new(
        1,
        SimTime::ZERO,
        2,
        SimTime::from_secs(50),
        "batch",
        1.0,
        2000.0,
    );

    let mut cluster = ClusterSimulator::new(
        cell,
        single_monolithic("batch", 0),
        mapping("batch"),
        one_job_workload("batch", job),
        Vec::new(),
        None,
    )
    .expect("valid setup");

    // think time = 0.1 + 0.01 * 2 = 0.12; cut the run right after it
    let completed = cluster.run(Some(0.2), None).expect("no fatal errors");
    assert!(completed);
    assert!((cluster.cell().total_occupied_cpus() - 2.0).abs() < 1e-6);
    assert!((cluster.cell().total_occupied_mem() - 4000.0).abs() < 1e-6);

    let metrics = cluster
        .scheduler_metrics("monolithic")
        .expect("registered scheduler");
    assert_eq!(metrics.num_successful_transactions, 1);
    assert_eq!(metrics.num_failed_transactions, 0);
    assert_eq!(metrics.num_jobs_timed_out, 0);
    assert_eq!(metrics.num_successful_task_transactions, 2);
}

#[test]
fn tasks_release_their_resources_when_the_duration_elapses() {
    let cell = CellState::new(
        2,
        4.0,
        8000.0,
        ConflictMode::SequenceNumbers,
        CommitMode::Incremental,
    );
    let job = Job::new(
        1,
        SimTime::ZERO,
        2,
        SimTime::from_secs(50),
        "batch",
        1.0,
        2000.0,
    );

    let mut cluster = ClusterSimulator::new(
        cell,
        single_monolithic("batch", 0),
        mapping("batch"),
        one_job_workload("batch", job),
        Vec::new(),
        None,
    )
    .expect("valid setup");

    let completed = cluster.run(None, None).expect("no fatal errors");
    assert!(completed);

    // drained naturally: both end events fired at 0.12 + 50
    assert!((cluster.now().as_secs_f64() - 50.12).abs() < 1e-6);
    assert!((cluster.cell().total_occupied_cpus() - 0.0).abs() < 1e-6);
    assert!((cluster.cell().total_occupied_mem() - 0.0).abs() < 1e-6);
}

#[test]
fn job_with_zero_progress_is_abandoned_at_attempt_101() {
    let cell = CellState::new(
        1,
        1.0,
        1000.0,
        ConflictMode::SequenceNumbers,
        CommitMode::Incremental,
    );

    // prefill pins the whole machine until long after the abandonment point
    let mut prefill = Workload::new("prefill");
    prefill.add_job(Job::new(
        100,
        SimTime::ZERO,
        1,
        SimTime::from_secs(10_000),
        "prefill",
        1.0,
        1000.0,
    ));

    let job = Job::new(
        1,
        SimTime::ZERO,
        1,
        SimTime::from_secs(10),
        "batch",
        1.0,
        1000.0,
    );

    let mut cluster = ClusterSimulator::new(
        cell,
        single_monolithic("batch", 0),
        mapping("batch"),
        one_job_workload("batch", job),
        vec![prefill],
        None,
    )
    .expect("valid setup");

    let completed = cluster.run(None, None).expect("no fatal errors");
    assert!(completed);

    let metrics = cluster
        .scheduler_metrics("monolithic")
        .expect("registered scheduler");
    assert_eq!(metrics.num_jobs_timed_out, 1);
    assert_eq!(metrics.num_successful_transactions, 0);
    assert_eq!(metrics.num_successful_task_transactions, 0);
    // attempts 1..=100 re-queue, attempt 101 abandons
    assert_eq!(metrics.num_no_resources_found_attempts, 101);
}

#[test]
fn job_with_partial_progress_is_abandoned_at_attempt_1001() {
    let cell = CellState::new(
        1,
        1.0,
        1000.0,
        ConflictMode::SequenceNumbers,
        CommitMode::Incremental,
    );

    // first attempt places one task which then never terminates; the second
    // task can never fit, so attempts keep accumulating
    let job = Job::new(
        1,
        SimTime::ZERO,
        2,
        SimTime::from_secs(1_000_000),
        "batch",
        1.0,
        1000.0,
    );

    let mut cluster = ClusterSimulator::new(
        cell,
        single_monolithic("batch", 0),
        mapping("batch"),
        one_job_workload("batch", job),
        Vec::new(),
        None,
    )
    .expect("valid setup");

    let completed = cluster.run(None, None).expect("no fatal errors");
    assert!(completed);

    let metrics = cluster
        .scheduler_metrics("monolithic")
        .expect("registered scheduler");
    assert_eq!(metrics.num_jobs_timed_out, 1);
    assert_eq!(metrics.num_successful_transactions, 1);
    assert_eq!(metrics.num_successful_task_transactions, 1);
    assert_eq!(metrics.num_no_resources_found_attempts, 1000);
}
