use clap::Parser;
use schedsim_rs::cluster::{ClusterSimulator, ExperimentSpec};
use schedsim_rs::error::CoreError;
use schedsim_rs::sched::{OmegaScheduler, Scheduler, SchedulerMetrics};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "omega-conflicts",
    about = "Sweep the number of competing omega schedulers and print conflict/retry rates"
)]
struct Args {
    /// Path to an experiment spec JSON (defaults to the built-in experiment)
    #[arg(long)]
    spec: Option<PathBuf>,

    /// Random seed; scheduler i uses seed + i
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Sweep 1..=max_schedulers competing omega schedulers
    #[arg(long, default_value_t = 4)]
    max_schedulers: usize,

    /// Stop each run at this simulated time (seconds)
    #[arg(long)]
    run_time_limit: Option<f64>,

    /// Wall-clock budget per run (seconds)
    #[arg(long)]
    wall_clock_timeout: Option<f64>,
}

fn run_with_schedulers(
    spec: &ExperimentSpec,
    args: &Args,
    num_schedulers: usize,
) -> Result<SchedulerMetrics, CoreError> {
    let cell = spec.build_cell("sequence-numbers", "all-or-nothing")?;
    let (constant, per_task) = spec.think_time_maps();

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

    let mut total = SchedulerMetrics::default();
    for name in &names {
        let Some(m) = cluster.scheduler_metrics(name) else {
            continue;
        };
        total.num_successful_transactions += m.num_successful_transactions;
        total.num_retried_transactions += m.num_retried_transactions;
        total.num_jobs_timed_out += m.num_jobs_timed_out;
        total.total_useful_time_scheduling += m.total_useful_time_scheduling;
        total.total_wasted_time_scheduling += m.total_wasted_time_scheduling;
    }
    Ok(total)
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

    println!("schedulers,metric,value");

    for n in 1..=args.max_schedulers.max(1) {
        match run_with_schedulers(&spec, &args, n) {
            Ok(total) => {
                println!("{n},num_successful_transactions,{}", total.num_successful_transactions);
                println!("{n},num_retried_transactions,{}", total.num_retried_transactions);
                println!("{n},num_jobs_timed_out,{}", total.num_jobs_timed_out);
                println!(
                    "{n},total_useful_time_scheduling,{:.3}",
                    total.total_useful_time_scheduling
                );
                println!(
                    "{n},total_wasted_time_scheduling,{:.3}",
                    total.total_wasted_time_scheduling
                );
            }
            Err(err) => println!("{n},error,{err}"),
        }
    }
}
