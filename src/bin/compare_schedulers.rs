use clap::Parser;
use schedsim_rs::cluster::{ClusterSimulator, ExperimentSpec};
use schedsim_rs::error::CoreError;
use schedsim_rs::sched::{
    MesosAllocator, MesosScheduler, MonolithicScheduler, OmegaScheduler, Scheduler,
    SchedulerMetrics,
};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "compare-schedulers",
    about = "Run the same workload through monolithic, mesos and omega scheduling and print a CSV summary"
)]
struct Args {
    /// Path to an experiment spec JSON (defaults to the built-in experiment)
    #[arg(long)]
    spec: Option<PathBuf>,

    /// Random seed shared by all schedulers
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of competing omega schedulers
    #[arg(long, default_value_t = 3)]
    omega_schedulers: usize,

    /// Offer batching interval of the mesos allocator (seconds)
    #[arg(long, default_value_t = 0.001)]
    offer_batch_interval: f64,

    /// Stop each run at this simulated time (seconds)
    #[arg(long)]
    run_time_limit: Option<f64>,

    /// Wall-clock budget per run (seconds)
    #[arg(long)]
    wall_clock_timeout: Option<f64>,
}

/// Sums the counters we report across a set of schedulers.
fn aggregate<'a>(metrics: impl Iterator<Item = &'a SchedulerMetrics>) -> SchedulerMetrics {
    let mut total = SchedulerMetrics::default();
    for m in metrics {
        total.num_successful_transactions += m.num_successful_transactions;
        total.num_failed_transactions += m.num_failed_transactions;
        total.num_retried_transactions += m.num_retried_transactions;
        total.num_jobs_timed_out += m.num_jobs_timed_out;
        total.num_successful_task_transactions += m.num_successful_task_transactions;
        total.num_failed_task_transactions += m.num_failed_task_transactions;
        total.num_no_resources_found_attempts += m.num_no_resources_found_attempts;
        total.total_useful_time_scheduling += m.total_useful_time_scheduling;
        total.total_wasted_time_scheduling += m.total_wasted_time_scheduling;
    }
    total
}

fn emit(experiment: &str, metrics: &SchedulerMetrics, include_retried: bool) {
    println!(
        "{experiment},num_successful_transactions,{}",
        metrics.num_successful_transactions
    );
    println!(
        "{experiment},total_useful_time_scheduling,{:.3}",
        metrics.total_useful_time_scheduling
    );
    println!(
        "{experiment},num_failed_transactions,{}",
        metrics.num_failed_transactions
    );
    println!(
        "{experiment},num_jobs_timed_out,{}",
        metrics.num_jobs_timed_out
    );
    if include_retried {
        println!(
            "{experiment},num_retried_transactions,{}",
            metrics.num_retried_transactions
        );
    }
}

fn run_monolithic(spec: &ExperimentSpec, args: &Args) -> Result<SchedulerMetrics, CoreError> {
    let cell = spec.build_cell("sequence-numbers", "incremental")?;
    let (constant, per_task) = spec.think_time_maps();
    let schedulers: Vec<Box<dyn Scheduler>> = vec![Box::new(MonolithicScheduler::new(
        "monolithic",
        constant,
        per_task,
        0,
        args.seed,
    ))];
    let mut mapping = HashMap::new();
    mapping.insert(
        spec.workload.name.clone(),
        vec!["monolithic".to_string()],
    );

    let mut cluster = ClusterSimulator::new(
        cell,
        schedulers,
        mapping,
        vec![spec.build_workload()],
        Vec::new(),
        None,
    )?;
    cluster.run(args.run_time_limit, args.wall_clock_timeout)?;
    Ok(aggregate(
        cluster.scheduler_metrics("monolithic").into_iter(),
    ))
}

fn run_mesos(spec: &ExperimentSpec, args: &Args) -> Result<SchedulerMetrics, CoreError> {
    let cell = spec.build_cell("resource-fit", "incremental")?;
    let (constant, per_task) = spec.think_time_maps();
    let allocator = MesosAllocator::new(args.offer_batch_interval, 1.0, 1.0, 0.5);
    let schedulers: Vec<Box<dyn Scheduler>> = vec![Box::new(MesosScheduler::new(
        "mesos", constant, per_task, 0, args.seed,
    ))];
    let mut mapping = HashMap::new();
    mapping.insert(spec.workload.name.clone(), vec!["mesos".to_string()]);

    let mut cluster = ClusterSimulator::new(
        cell,
        schedulers,
        mapping,
        vec![spec.build_workload()],
        Vec::new(),
        Some(allocator),
    )?;
    cluster.run(args.run_time_limit, args.wall_clock_timeout)?;
    Ok(aggregate(cluster.scheduler_metrics("mesos").into_iter()))
}

fn run_omega(spec: &ExperimentSpec, args: &Args) -> Result<SchedulerMetrics, CoreError> {
    let cell = spec.build_cell("sequence-numbers", "all-or-nothing")?;
    let (constant, per_task) = spec.think_time_maps();

    let num_schedulers = args.omega_schedulers.max(1);
    let mut schedulers: Vec<Box<dyn Scheduler>> = Vec::new();
    let mut names = Vec::new();
    for i in 0..num_schedulers {
        let name = format!("omega-{i}");
        schedulers.push(Box::new(OmegaScheduler::new(
            name.clone(),
            constant.clone(),
            per_task.clone(),
            0,
            args.seed + i as u64,
        )));
        names.push(name);
    }
    // all schedulers compete for the same workload stream
    let mut mapping = HashMap::new();
    mapping.insert(spec.workload.name.clone(), names.clone());

    let mut cluster = ClusterSimulator::new(
        cell,
        schedulers,
        mapping,
        vec![spec.build_workload()],
        Vec::new(),
        None,
    )?;
    cluster.run(args.run_time_limit, args.wall_clock_timeout)?;
    Ok(aggregate(
        names
            .iter()
            .filter_map(|name| cluster.scheduler_metrics(name)),
    ))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    let spec = match &args.spec {
        Some(path) => {
            let raw = fs::read_to_string(path).expect("read experiment spec");
            serde_json::from_str::<ExperimentSpec>(&raw).expect("parse experiment spec")
        }
        None => ExperimentSpec::default(),
    };

    println!("experiment,metric,value");

    match run_monolithic(&spec, &args) {
        Ok(metrics) => emit("monolithic", &metrics, false),
        Err(err) => println!("monolithic,error,{err}"),
    }
    match run_mesos(&spec, &args) {
        Ok(metrics) => emit("mesos", &metrics, false),
        Err(err) => println!("mesos,error,{err}"),
    }
    match run_omega(&spec, &args) {
        Ok(metrics) => emit("omega", &metrics, true),
        Err(err) => println!("omega,error,{err}"),
    }
}
