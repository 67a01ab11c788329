//! Command implementations and argument parsing for the gradflip CLI.

use std::io::{self, Write};

use clap::{Args, Parser, Subcommand, ValueEnum};
use gradflip_core::{
    AttackError, AttackReport, FgaBuilder, FlipPolicy, GradientOracle, OracleError,
};
use thiserror::Error;
use tracing::{Span, field, info, instrument};

use super::synthetic::{SyntheticError, SyntheticGraph, SyntheticSpec};

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "gradflip",
    about = "Run gradient-guided edge-flip attacks against a GCN surrogate."
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Attack one node of a seeded synthetic graph.
    Attack(AttackCommand),
}

/// Options accepted by the `attack` command.
#[derive(Debug, Args, Clone)]
pub struct AttackCommand {
    /// Number of nodes in the synthetic graph.
    #[arg(long, default_value_t = 20, value_parser = parse_positive)]
    pub nodes: usize,

    /// Probability of each undirected edge.
    #[arg(long = "edge-probability", default_value_t = 0.15, value_parser = parse_probability)]
    pub edge_probability: f64,

    /// Feature dimension.
    #[arg(long, default_value_t = 8, value_parser = parse_positive)]
    pub features: usize,

    /// Number of classes scored by the surrogate.
    #[arg(long, default_value_t = 3, value_parser = parse_positive)]
    pub classes: usize,

    /// Probability of each node joining the training set.
    #[arg(long = "train-fraction", default_value_t = 0.5, value_parser = parse_probability)]
    pub train_fraction: f64,

    /// Seed for graph, feature, weight and training-set generation.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Node whose edges are perturbed.
    #[arg(long, default_value_t = 0)]
    pub target: usize,

    /// Number of edge flips to apply.
    #[arg(short = 'k', long = "perturbations", default_value_t = 3)]
    pub perturbations: usize,

    /// How flips are written into the adjacency.
    #[arg(long, value_enum, default_value_t = PolicyArg::Accumulate)]
    pub policy: PolicyArg,

    /// Clamp flipped entries to `[0, 1]`; shorthand for `--policy clamp`.
    #[arg(long, conflicts_with = "policy")]
    pub strict: bool,
}

impl AttackCommand {
    /// Resolves `--policy` and `--strict` into a [`FlipPolicy`].
    #[must_use]
    pub fn flip_policy(&self) -> FlipPolicy {
        if self.strict {
            FlipPolicy::Clamp
        } else {
            self.policy.into()
        }
    }

    fn spec(&self) -> SyntheticSpec {
        SyntheticSpec {
            nodes: self.nodes,
            edge_probability: self.edge_probability,
            features: self.features,
            classes: self.classes,
            train_fraction: self.train_fraction,
            seed: self.seed,
        }
    }
}

/// Command-line spelling of [`FlipPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Add the flip delta without clamping.
    Accumulate,
    /// Clamp flipped entries to `[0, 1]`.
    Clamp,
    /// Never flip the same column twice in one attack.
    SkipFlipped,
}

impl From<PolicyArg> for FlipPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Accumulate => Self::Accumulate,
            PolicyArg::Clamp => Self::Clamp,
            PolicyArg::SkipFlipped => Self::SkipFlipped,
        }
    }
}

fn parse_positive(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err("value must be at least 1".to_owned()),
        Ok(value) => Ok(value),
        Err(err) => Err(err.to_string()),
    }
}

fn parse_probability(raw: &str) -> Result<f64, String> {
    let value = raw.trim().parse::<f64>().map_err(|err| err.to_string())?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in [0, 1]"))
    }
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Scenario generation failed.
    #[error(transparent)]
    Synthetic(#[from] SyntheticError),
    /// The attack failed.
    #[error(transparent)]
    Core(#[from] AttackError),
    /// The surrogate could not score the perturbed graph.
    #[error("failed to evaluate perturbed graph: {0}")]
    Evaluation(#[from] OracleError),
    /// The attack succeeded without storing a perturbed adjacency.
    #[error("attack finished without a modified adjacency")]
    MissingResult,
}

/// Outcome of an `attack` command.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// Name reported by the surrogate.
    pub oracle: String,
    /// Flip policy in effect.
    pub policy: FlipPolicy,
    /// Number of nodes in the graph.
    pub nodes: usize,
    /// Undirected edges before the attack.
    pub edges_before: usize,
    /// Undirected edges after the attack.
    pub edges_after: usize,
    /// Surrogate prediction for the target on the clean graph.
    pub prediction_before: usize,
    /// Surrogate prediction for the target on the perturbed graph.
    pub prediction_after: usize,
    /// Flips applied by the attack.
    pub report: AttackReport,
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when generation, the attack or evaluation fails.
///
/// # Examples
/// ```
/// use gradflip_cli::cli::{AttackCommand, Cli, Command, PolicyArg, run_cli};
///
/// let cli = Cli {
///     command: Command::Attack(AttackCommand {
///         nodes: 10,
///         edge_probability: 0.3,
///         features: 4,
///         classes: 2,
///         train_fraction: 1.0,
///         seed: 1,
///         target: 0,
///         perturbations: 2,
///         policy: PolicyArg::Accumulate,
///         strict: false,
///     }),
/// };
/// let summary = run_cli(cli)?;
/// assert_eq!(summary.report.flips().len(), 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[instrument(
    name = "cli.run",
    err,
    skip(cli),
    fields(command = field::Empty),
)]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Attack(attack) => {
            Span::current().record("command", field::display("attack"));
            run_attack(&attack)
        }
    }
}

#[instrument(
    name = "cli.attack",
    err,
    skip(command),
    fields(
        nodes = command.nodes,
        seed = command.seed,
        target = command.target,
        policy = field::Empty,
    ),
)]
pub(super) fn run_attack(command: &AttackCommand) -> Result<ExecutionSummary, CliError> {
    let policy = command.flip_policy();
    Span::current().record("policy", field::display(policy.as_str()));

    let scenario = SyntheticGraph::generate(&command.spec())?;
    let mut fga = FgaBuilder::new(&scenario.model, command.nodes)
        .with_feature_shape((command.nodes, command.features))
        .with_flip_policy(policy)
        .build()?;
    let report = fga.attack(
        &scenario.features,
        &scenario.adjacency,
        &scenario.labels,
        &scenario.train,
        command.target,
        command.perturbations,
    )?;
    let modified = fga.modified_adjacency().ok_or(CliError::MissingResult)?;
    let after = scenario
        .model
        .predict(&scenario.features, &modified.to_dense())?;
    let summary = ExecutionSummary {
        oracle: scenario.model.name().to_owned(),
        policy,
        nodes: command.nodes,
        edges_before: scenario.adjacency.upper_edges().len(),
        edges_after: modified.upper_edges().len(),
        prediction_before: scenario.labels.get(command.target).copied().unwrap_or_default(),
        prediction_after: after.get(command.target).copied().unwrap_or_default(),
        report,
    };

    info!(
        flips = summary.report.flips().len(),
        prediction_changed = summary.prediction_before != summary.prediction_after,
        "command completed"
    );
    Ok(summary)
}

/// Renders `summary` to `writer` in a human-readable text format.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
///
/// # Examples
/// ```
/// use gradflip_cli::cli::{ExecutionSummary, render_summary};
/// use gradflip_core::{AttackReport, EdgeFlip, FlipKind, FlipPolicy};
///
/// let summary = ExecutionSummary {
///     oracle: "demo".into(),
///     policy: FlipPolicy::Accumulate,
///     nodes: 4,
///     edges_before: 4,
///     edges_after: 3,
///     prediction_before: 0,
///     prediction_after: 1,
///     report: AttackReport::new(
///         0,
///         vec![EdgeFlip { step: 0, column: 3, kind: FlipKind::Removed, score: -1.0, reverted: false }],
///     ),
/// };
/// let mut buffer = Vec::new();
/// render_summary(&summary, &mut buffer)?;
/// let text = String::from_utf8(buffer)?;
/// assert!(text.contains("edges: 4 -> 3"));
/// assert!(text.contains("0\t3\tremoved\t-1.0000"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    let report = &summary.report;
    writeln!(writer, "oracle: {}", summary.oracle)?;
    writeln!(writer, "policy: {}", summary.policy.as_str())?;
    writeln!(writer, "nodes: {}", summary.nodes)?;
    writeln!(writer, "target: {}", report.target())?;
    writeln!(
        writer,
        "edges: {} -> {}",
        summary.edges_before, summary.edges_after
    )?;
    writeln!(
        writer,
        "prediction: {} -> {}",
        summary.prediction_before, summary.prediction_after
    )?;
    writeln!(
        writer,
        "flips: {} ({} reverted)",
        report.flips().len(),
        report.reverted_count()
    )?;
    for flip in report.flips() {
        writeln!(
            writer,
            "{}\t{}\t{}\t{:.4}",
            flip.step,
            flip.column,
            flip.kind.as_str(),
            flip.score
        )?;
    }
    Ok(())
}
