use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use sym_search::config::{SearchParams, UtilityEvaluation};
use sym_search::engine::SymbolicSearch;
use sym_search::search::SearchMode;
use sym_search::state_space::StateSpace;
use sym_search::task::{Fact, Operator, PlanningTask};
use sym_search::vars::SymVariables;

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Mode {
    Fw,
    Bw,
    Bd,
    Osp,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of lamps in the row.
    #[arg(value_name = "INT", default_value = "8")]
    n: usize,

    #[clap(long, value_enum, default_value = "bd")]
    mode: Mode,

    /// Number of plans to extract.
    #[clap(long, value_name = "INT", default_value = "1")]
    plans: usize,

    /// Cost bound for oversubscription planning.
    #[clap(long, value_name = "INT")]
    bound: Option<u32>,

    /// Time limit in seconds.
    #[clap(long, value_name = "SEC")]
    time_limit: Option<u64>,

    /// Use precomputed utility layers instead of diagram products.
    #[clap(long)]
    decomposed: bool,

    /// BDD size (in bits, so the actual size is `2^size` nodes).
    #[clap(long, value_name = "INT", default_value = "16")]
    size: usize,
}

/// A row of lamps, all off. Lamp `i` can be switched on (cost 2) when lamp
/// `i-1` is on, and the first one for free. Lamp `i` is worth `i+1`; the
/// classical goal is the last lamp.
fn lamps(n: usize) -> PlanningTask {
    let mut operators = Vec::new();
    for i in 0..n {
        let mut on = Operator::new(format!("on-{}", i), if i == 0 { 0 } else { 2 })
            .pre(Fact::neg(i))
            .eff(Fact::pos(i));
        if i > 0 {
            on = on.pre(Fact::pos(i - 1));
        }
        operators.push(on);
        operators.push(Operator::new(format!("off-{}", i), 1).pre(Fact::pos(i)).eff(Fact::neg(i)));
    }
    PlanningTask {
        variables: (0..n).map(|i| format!("lamp{}", i)).collect(),
        operators,
        initial_state: vec![false; n],
        goal: vec![Fact::pos(n.saturating_sub(1))],
        utilities: (0..n).map(|i| (Fact::pos(i), (i + 1) as f64)).collect(),
        plan_bound: None,
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let mut task = lamps(args.n);
    let params = SearchParams {
        time_limit: args.time_limit.map(Duration::from_secs),
        num_plans: args.plans,
        utility_evaluation: if args.decomposed {
            UtilityEvaluation::Decomposed
        } else {
            UtilityEvaluation::Direct
        },
        storage_bits: args.size,
        ..SearchParams::default()
    };

    let vars = Rc::new(SymVariables::new(task.variables.clone(), params.storage_bits));
    let space = Rc::new(StateSpace::from_task(vars.clone(), &task, &params)?);
    println!("bdd = {:?}", vars.bdd());

    let (status, plans) = match args.mode {
        Mode::Osp => {
            // Any final state will do, the utility decides.
            task.goal.clear();
            task.plan_bound = args.bound;
            let space = Rc::new(StateSpace::from_task(vars.clone(), &task, &params)?);
            let mut search = SymbolicSearch::osp(space, params, &task);
            let status = search.run()?;
            println!("best utility = {}", search.policy().best_utility());
            (status, search.plans().to_vec())
        }
        mode => {
            let mode = match mode {
                Mode::Fw => SearchMode::Forward,
                Mode::Bw => SearchMode::Backward,
                _ => SearchMode::Bidirectional,
            };
            let mut search = SymbolicSearch::uniform_cost(space, params, mode);
            let status = search.run()?;
            (status, search.plans().to_vec())
        }
    };

    println!("status = {:?}", status);
    for plan in &plans {
        let end = task.simulate(&plan.operators)?;
        let names: Vec<_> = plan.operators.iter().map(|&id| task.operator(id).name.as_str()).collect();
        println!(
            "plan of cost {} (utility {}): {}",
            plan.cost,
            task.utility(&end),
            names.join(" ")
        );
    }

    println!("bdd = {:?}", vars.bdd());
    println!("Total time: {:?}", time_total.elapsed());
    Ok(())
}
