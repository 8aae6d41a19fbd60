//! catchtree-inspect - Batch model inspection tool
//!
//! Loads a parameter schema, a catch data tree and rule forests from JSON
//! files, and shows what the core makes of them.
//!
//! **Usage:**
//! ```bash
//! catchtree-inspect tree --schema sorting.json [--catch-schema catch.json] [--data catch-batch.json] [--json]
//! catchtree-inspect walk --schema sorting.json [--data catch-batch.json]
//! catchtree-inspect check --rules rules.json --entity batch.json
//! ```

use anyhow::{Context, Result};
use catchtree_common::batch::Batch;
use catchtree_common::config::{CompilerConfig, ConfigResolver, TomlConfig};
use catchtree_common::model::compiler::{create_model, log_tree, render_tree, to_batch};
use catchtree_common::model::is_editable;
use catchtree_common::rules::{AccessorMap, Rule, RuleSet};
use catchtree_common::schema::{parse_parameters, Parameter};
use catchtree_common::tree::navigator::{first, forward};
use catchtree_common::BatchModelTree;
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "catchtree-inspect")]
#[command(about = "Inspect batch model trees and business rules")]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, global = true, env = "CATCHTREE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile and print the batch model tree
    Tree {
        #[command(flatten)]
        model: ModelArgs,

        /// Print the flattened data tree as JSON instead
        #[arg(long)]
        json: bool,
    },

    /// List editable rows in keyboard navigation order
    Walk {
        #[command(flatten)]
        model: ModelArgs,
    },

    /// Evaluate a rule forest against an entity
    Check {
        /// Rule forest (JSON array of rules)
        #[arg(long, value_name = "FILE")]
        rules: PathBuf,

        /// Entity to control (JSON)
        #[arg(long, value_name = "FILE")]
        entity: PathBuf,
    },
}

/// Inputs of a model compilation
#[derive(Args, Debug)]
struct ModelArgs {
    /// Sorting batch parameters (JSON array)
    #[arg(long, value_name = "FILE")]
    schema: PathBuf,

    /// Catch batch parameters (JSON array)
    #[arg(long, value_name = "FILE")]
    catch_schema: Option<PathBuf>,

    /// Existing catch batch tree (JSON)
    #[arg(long, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Override compiler.max_depth
    #[arg(long)]
    max_depth: Option<usize>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = ConfigResolver::new(cli.config.clone())
        .load()
        .context("Failed to load configuration")?;

    // Initialize tracing (RUST_LOG overrides the configured level)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting catchtree-inspect v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Tree { model, json } => {
            let tree = build_model(&model, &config)?;
            if json {
                let data = to_batch(&tree);
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print!("{}", render_tree(&tree));
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Walk { model } => {
            let tree = build_model(&model, &config)?;
            for name in walk(&tree) {
                println!("{}", name);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Check { rules, entity } => {
            let rules: Vec<Rule> = read_json(&rules)?;
            let entity: Value = read_json(&entity)?;

            let set = RuleSet::load(rules, &AccessorMap::json_paths()).context("Invalid rule forest")?;
            info!("Loaded {} rule(s)", set.len());

            match set.control(&entity)? {
                None => {
                    println!("valid");
                    Ok(ExitCode::SUCCESS)
                }
                Some(errors) => {
                    println!("{}", serde_json::to_string_pretty(&errors)?);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn build_model(args: &ModelArgs, config: &TomlConfig) -> Result<BatchModelTree> {
    let schema = read_schema(&args.schema)?;
    let catch_schema = match &args.catch_schema {
        Some(path) => read_schema(path)?,
        None => Vec::new(),
    };
    let data: Option<Batch> = args.data.as_deref().map(read_json).transpose()?;

    let compiler = match args.max_depth {
        Some(max_depth) => CompilerConfig {
            max_depth,
            ..config.compiler.clone()
        },
        None => config.compiler.clone(),
    };

    let tree = create_model(data.as_ref(), &schema, &catch_schema, &compiler);
    info!(
        "Compiled batch model: {} node(s), depth {} (max {})",
        tree.len(),
        tree.height(),
        compiler.max_depth
    );
    if config.logging.log_tree {
        log_tree(&tree);
    }
    Ok(tree)
}

/// Full names of the editable rows, in `forward` order
fn walk(tree: &BatchModelTree) -> Vec<String> {
    let Some(root) = tree.root() else {
        return Vec::new();
    };
    let Some(start) = first(tree, root, is_editable) else {
        debug!("No editable row");
        return Vec::new();
    };

    let mut names = Vec::new();
    let mut current = start;
    loop {
        names.extend(tree.full_name(current));
        match forward(tree, current, is_editable) {
            Some(next) if next != start => current = next,
            _ => break,
        }
    }
    names
}

fn read_schema(path: &Path) -> Result<Vec<Parameter>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_parameters(&content).with_context(|| format!("Invalid schema {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}
