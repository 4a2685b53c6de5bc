use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use waiter_agent::gateway::Plan;
use waiter_agent::{
    ActionEntry, ExecutionConfig, FluentEntry, KnowledgeStore, PlannerConfig, SolverGateway,
};
use waiter_cli::{Simulation, restaurant, run_simulation};
use waiter_solver::{ScriptedSolver, Solver, SolverDyn};

#[derive(Parser, Debug)]
#[command(name = "waiter")]
#[command(about = "Restaurant waiter robot driven by an answer-set planner")]
struct Cli {
    /// Load environment from .env file
    #[arg(long, default_value = "true")]
    dotenv: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct SolverArgs {
    /// Logic program with the observation, goal and initial-situation regions
    #[arg(long)]
    program: Option<PathBuf>,

    /// Solver command template, `{program}` is replaced with the program path
    #[arg(long)]
    solver: Option<String>,

    /// Replay the answer stored in this file instead of calling a solver
    #[arg(long, conflicts_with = "solver")]
    scripted: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate the dining room with the planner in the loop
    Run {
        #[command(flatten)]
        solver: SolverArgs,

        /// Clients entering together at the start
        #[arg(long, default_value_t = 2)]
        clients: usize,

        /// Table that calls for the bill
        #[arg(long)]
        bill_table: Option<String>,

        /// Seconds before the bill is requested
        #[arg(long, default_value_t = 20)]
        bill_after: u64,

        /// Seconds to run before shutting down
        #[arg(long, default_value_t = 60)]
        duration: u64,

        /// Chairs already occupied, e.g. chair1t4
        #[arg(long, value_delimiter = ',')]
        seated: Vec<String>,
    },
    /// Find the minimal plan for the program as it is
    Solve {
        #[command(flatten)]
        solver: SolverArgs,

        #[arg(long)]
        max_horizon: Option<u32>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the restaurant position graph as logic-program facts
    Graph {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct SolveReport<'a> {
    horizon: u32,
    actions: Vec<ActionEntry>,
    fluents: &'a [FluentEntry],
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    if cli.dotenv {
        let _ = dotenvy::dotenv();
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match cli.command {
        Commands::Run {
            solver,
            clients,
            bill_table,
            bill_after,
            duration,
            seated,
        } => {
            let planner = planner_config(&solver)?;
            let execution = ExecutionConfig::from_env()?;
            let store = open_store(&planner).await?;
            let simulation = Simulation {
                clients,
                bill_table,
                bill_after: Duration::from_secs(bill_after),
                duration: Duration::from_secs(duration),
                seated,
                ..Simulation::default()
            };
            let stop = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            let solver = build_solver(&solver, &planner).await?;
            let report = run_simulation(store, solver, planner, execution, simulation, stop).await?;
            println!("plans published: {}", report.plans);
            for (chair, client) in &report.seated {
                println!("c{client} sits on {chair}");
            }
            for target in &report.billed {
                println!("bill delivered to {target}");
            }
        }
        Commands::Solve {
            solver,
            max_horizon,
            json,
        } => {
            let planner = planner_config(&solver)?;
            let mut store = open_store(&planner).await?;
            let previous = store.step_horizon();
            let mut gateway = SolverGateway::new(build_solver(&solver, &planner).await?);
            let max_horizon = max_horizon.unwrap_or(planner.max_horizon_probe);
            let plan = gateway.find_minimal_plan(&mut store, max_horizon).await;
            if let Some(horizon) = previous {
                store.set_step_horizon(horizon)?;
            }
            store.close().await?;
            print_plan(&plan?, json)?;
        }
        Commands::Graph { output } => {
            let facts = restaurant()?.graph.to_asp();
            match output {
                Some(path) => tokio::fs::write(&path, facts)
                    .await
                    .wrap_err_with(|| format!("failed to write {}", path.display()))?,
                None => print!("{facts}"),
            }
        }
    }
    Ok(())
}

fn planner_config(args: &SolverArgs) -> color_eyre::Result<PlannerConfig> {
    let mut config = PlannerConfig::from_env()?;
    if let Some(program) = &args.program {
        config.program_path = program.clone();
    }
    if let Some(solver) = &args.solver {
        config.solver_command = solver.clone();
    }
    Ok(config)
}

async fn open_store(config: &PlannerConfig) -> color_eyre::Result<KnowledgeStore> {
    let store = KnowledgeStore::open(&config.program_path, &config.horizon_constant).await?;
    Ok(store)
}

async fn build_solver(
    args: &SolverArgs,
    config: &PlannerConfig,
) -> color_eyre::Result<Box<dyn SolverDyn>> {
    match &args.scripted {
        Some(path) => {
            let answer = tokio::fs::read_to_string(path)
                .await
                .wrap_err_with(|| format!("failed to read scripted answer {}", path.display()))?;
            tracing::info!(answer = %path.display(), "replaying a scripted answer");
            Ok(ScriptedSolver::constant(answer).boxed())
        }
        None => {
            tracing::info!(command = %config.solver_command, "using external solver");
            Ok(config.solver().boxed())
        }
    }
}

fn print_plan(plan: &Plan, json: bool) -> color_eyre::Result<()> {
    let actions = plan.answer.action_stack();
    if json {
        let report = SolveReport {
            horizon: plan.horizon,
            actions,
            fluents: plan.answer.fluents(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("minimal horizon: {}", plan.horizon);
    for entry in actions {
        println!("{entry}");
    }
    Ok(())
}
