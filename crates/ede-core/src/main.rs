use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use ede_core::{EdeConfig, ExplorationSession, RunOutcome};
use ede_eventlog::{coverage_filter, variant_counts, ColumnRoles, EventLog};
use ede_synthesis::ChatCompletionsOracle;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let log_arg = Arg::new("log")
        .long("log")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Event log as a JSON array of records");
    let roles_arg = Arg::new("roles")
        .long("roles")
        .default_value("xes")
        .value_parser(["xes", "csv"])
        .help("Column naming of the log");
    let coverage_arg = Arg::new("coverage")
        .long("coverage")
        .value_parser(value_parser!(f64))
        .help("Variant coverage threshold in (0, 1]");
    let question_arg = Arg::new("question")
        .long("question")
        .required(true)
        .help("Analysis question");

    Command::new("ede")
        .version(ede_core::VERSION)
        .about("Event-data exploration: synthesized analyses and report export")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("variants")
                .about("Show variant frequencies and the coverage selection")
                .arg(log_arg.clone())
                .arg(roles_arg.clone())
                .arg(coverage_arg.clone()),
        )
        .subcommand(
            Command::new("suggest")
                .about("Ask the oracle for analysis ideas")
                .arg(question_arg.clone()),
        )
        .subcommand(
            Command::new("explore")
                .about("Run analyses against a log and export the report")
                .arg(log_arg)
                .arg(roles_arg)
                .arg(coverage_arg)
                .arg(question_arg)
                .arg(
                    Arg::new("suggestion")
                        .long("suggestion")
                        .action(ArgAction::Append)
                        .help("Analysis to run; repeatable. Asks the oracle when omitted"),
                )
                .arg(
                    Arg::new("take")
                        .long("take")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("How many oracle suggestions to run"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .default_value("report.html")
                        .value_parser(value_parser!(PathBuf))
                        .help("Report output path"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<EdeConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => Ok(EdeConfig::load(path)?),
        None => Ok(EdeConfig::default()
            .with_env_overrides(|name| std::env::var(name).ok())),
    }
}

fn load_log(args: &ArgMatches) -> Result<EventLog> {
    let path = args
        .get_one::<PathBuf>("log")
        .context("--log is required")?;
    let roles = match args.get_one::<String>("roles").map(String::as_str) {
        Some("csv") => ColumnRoles::csv(),
        _ => ColumnRoles::xes(),
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    EventLog::from_json_str(roles, &text).with_context(|| format!("parsing {}", path.display()))
}

fn oracle(config: &EdeConfig) -> Result<Arc<ChatCompletionsOracle>> {
    Ok(Arc::new(ChatCompletionsOracle::new(config.oracle.clone())?))
}

fn run_variants(config: &EdeConfig, args: &ArgMatches) -> Result<()> {
    let log = load_log(args)?;
    let threshold = args
        .get_one::<f64>("coverage")
        .copied()
        .unwrap_or(config.coverage);
    let total = log.case_count();

    println!("{total} cases, {} events", log.len());
    for count in variant_counts(&log) {
        #[allow(clippy::cast_precision_loss)]
        let share = count.cases as f64 / total as f64 * 100.0;
        println!("{:>6} {share:>6.2}%  {}", count.cases, count.variant);
    }

    let selection = coverage_filter(&log, threshold)?;
    println!();
    for (label, value) in selection.summary_rows() {
        println!("{label}: {value}");
    }
    Ok(())
}

async fn run_suggest(config: EdeConfig, args: &ArgMatches) -> Result<()> {
    let question = args
        .get_one::<String>("question")
        .context("--question is required")?;
    let oracle = oracle(&config)?;
    let mut session = ExplorationSession::new(config, oracle);
    session.set_question(question.as_str());
    for (i, suggestion) in session.suggest().await?.iter().enumerate() {
        println!("{}. {suggestion}", i + 1);
    }
    Ok(())
}

async fn run_explore(config: EdeConfig, args: &ArgMatches) -> Result<()> {
    let log = load_log(args)?;
    let question = args
        .get_one::<String>("question")
        .context("--question is required")?;
    let coverage = args.get_one::<f64>("coverage").copied();
    let out = args
        .get_one::<PathBuf>("out")
        .context("--out has a default")?;
    let take = args.get_one::<usize>("take").copied().unwrap_or(3);

    let oracle = oracle(&config)?;
    let mut session = ExplorationSession::new(config, oracle);
    session.load_dataset(log);
    session.set_question(question.as_str());

    let given: Vec<String> = args
        .get_many::<String>("suggestion")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let selections = if given.is_empty() {
        session.suggest().await?.into_iter().take(take).collect()
    } else {
        given
    };

    let outcomes = session.run_selected(&selections, coverage).await?;
    report_outcomes(&outcomes);
    write_report(&session, out).await
}

fn report_outcomes(outcomes: &[RunOutcome]) {
    for outcome in outcomes {
        match outcome {
            RunOutcome::Registered {
                suggestion,
                key,
                replaced,
                warnings,
            } => {
                let verb = if *replaced { "updated" } else { "added" };
                println!("[ok] {suggestion} -> {key} ({verb})");
                for warning in warnings {
                    println!("     warning: {warning}");
                }
            }
            RunOutcome::Failed {
                suggestion,
                kind,
                message,
                code,
            } => {
                println!("[{kind}] {suggestion}: {message}");
                if let Some(code) = code {
                    println!("---- code ----\n{code}\n--------------");
                }
            }
        }
    }
}

async fn write_report(session: &ExplorationSession, out: &Path) -> Result<()> {
    let generated_at = chrono::Local::now().naive_local();
    let bytes = session.export_report_to(out, generated_at).await?;
    println!("report: {} ({bytes} bytes)", out.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    let config = load_config(&matches)?;
    match matches.subcommand() {
        Some(("variants", args)) => run_variants(&config, args),
        Some(("suggest", args)) => run_suggest(config, args).await,
        Some(("explore", args)) => run_explore(config, args).await,
        Some((other, _)) => bail!("unknown subcommand {other}"),
        None => bail!("no subcommand given"),
    }
}
