use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use goannotate::annotate::{self, AnnotateContext, Registry};
use goannotate::config::{load_from_path, AnnotateConfig};
use goannotate::edit::{EditEngine, FileOutcome};
use goannotate::format::{CommandFormatter, Formatter, Passthrough};
use goannotate::locate::{CancelToken, LocateOptions, Locator};
use goannotate::toolchain::{GoCommand, ModuleLayout, Toolchain};
use similar::{ChangeTag, TextDiff};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "goannotate")]
#[command(about = "Locate and annotate Go functions, interface implementations and comments", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Resolve packages from this module tree instead of running `go list`
    #[arg(long, global = true)]
    module_root: Option<PathBuf>,

    /// Worker threads, 0 for the available parallelism
    #[arg(long, global = true, default_value_t = 0)]
    concurrency: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate interfaces, functions, implementations and comments
    Locate {
        /// Interfaces to locate, as `package.regexp` or a listing expression
        #[arg(long, value_delimiter = ',')]
        interfaces: Vec<String>,

        /// Functions to locate, as `package.regexp` or a listing expression
        #[arg(long, value_delimiter = ',')]
        functions: Vec<String>,

        /// Regular expressions matched against comments
        #[arg(long, value_delimiter = ',')]
        comments: Vec<String>,

        /// Include methods when locating functions
        #[arg(long)]
        methods: bool,

        /// Include test files
        #[arg(long)]
        tests: bool,

        /// Do not fail when a spec matches nothing
        #[arg(long)]
        ignore_missing: bool,

        /// Packages whose methods are checked against the located interfaces
        packages: Vec<String>,
    },

    /// Apply configured annotations
    Annotate {
        /// Configuration file
        #[arg(short, long, default_value = "goannotate.toml")]
        config: PathBuf,

        /// Annotations to apply, in order
        #[arg(short, long = "annotation", required = true)]
        annotations: Vec<String>,

        /// Write edited files under this directory instead of in place
        #[arg(short, long)]
        write_dir: Option<PathBuf>,

        /// Show a diff of the changes without writing anything
        #[arg(short, long)]
        diff: bool,

        /// Packages to annotate, overriding the configured ones
        packages: Vec<String>,
    },

    /// List annotator types, or the annotations in a configuration file
    List {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "error:".red(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "goannotate=debug" } else { "goannotate=warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let registry = Registry::with_builtins();
    match cli.command {
        Commands::Locate {
            interfaces,
            functions,
            comments,
            methods,
            tests,
            ignore_missing,
            packages,
        } => {
            let options = LocateOptions {
                concurrency: cli.concurrency,
                include_tests: tests,
                ignore_missing,
                include_methods: methods,
            };
            let toolchain = toolchain(cli.module_root.as_deref())?;
            cmd_locate(toolchain, options, interfaces, functions, comments, packages)
        }
        Commands::Annotate {
            config,
            annotations,
            write_dir,
            diff,
            packages,
        } => {
            let config = load_from_path(&config)?;
            let module_root = cli.module_root.or_else(|| config.settings.module_root.clone());
            let toolchain = toolchain(module_root.as_deref())?;
            let concurrency = if cli.concurrency == 0 {
                config.settings.concurrency
            } else {
                cli.concurrency
            };
            cmd_annotate(
                &registry,
                &config,
                toolchain,
                concurrency,
                &annotations,
                write_dir.as_deref(),
                diff,
                &packages,
            )
        }
        Commands::List { config } => cmd_list(&registry, config.as_deref()),
    }
}

fn toolchain(module_root: Option<&Path>) -> Result<Arc<dyn Toolchain>> {
    Ok(match module_root {
        Some(root) => Arc::new(
            ModuleLayout::new(root).with_context(|| format!("failed to read module at {}", root.display()))?,
        ),
        None => Arc::new(GoCommand::default()),
    })
}

fn cmd_locate(
    toolchain: Arc<dyn Toolchain>,
    options: LocateOptions,
    interfaces: Vec<String>,
    functions: Vec<String>,
    comments: Vec<String>,
    packages: Vec<String>,
) -> Result<()> {
    let mut locator = Locator::new(toolchain, options);
    locator
        .add_interfaces(interfaces)
        .add_functions(functions)
        .add_comments(comments)
        .add_packages(packages);
    locator.run(&CancelToken::new())?;

    locator.walk_interfaces(|entry, _file, _pkg| {
        println!("{} {} {}", "interface".cyan(), entry.name, entry.position.to_string().dimmed());
    });
    locator.walk_functions(|entry, _file, _pkg| {
        let label = if entry.function.is_method() { "method" } else { "function" };
        print!("{} {} {}", label.green(), entry.function.full_name, entry.position.to_string().dimmed());
        if !entry.implements.is_empty() {
            print!(" implements {}", entry.implements.join(", "));
        }
        println!();
    });
    locator.walk_comments(|entry, _file, _pkg| {
        let text = entry.group.text();
        let first = text.lines().next().unwrap_or_default();
        println!("{} {} {} {}", "comment".yellow(), entry.pattern, entry.position.to_string().dimmed(), first);
    });
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_annotate(
    registry: &Registry,
    config: &AnnotateConfig,
    toolchain: Arc<dyn Toolchain>,
    concurrency: usize,
    names: &[String],
    write_dir: Option<&Path>,
    show_diff: bool,
    packages: &[String],
) -> Result<()> {
    let formatter: Arc<dyn Formatter> = match CommandFormatter::from_argv(&config.settings.formatter) {
        Some(formatter) => Arc::new(formatter),
        None => Arc::new(Passthrough),
    };
    let engine = EditEngine::new(formatter).with_validation(config.settings.validate);
    let mut ctx = AnnotateContext::new(toolchain);
    ctx.concurrency = concurrency;

    let mut annotations = Vec::with_capacity(names.len());
    for name in names {
        let entry = config
            .annotation(name)
            .with_context(|| format!("annotation {name:?} is not defined in the configuration"))?;
        annotations.push(registry.build(entry)?);
    }

    for annotation in &annotations {
        println!("{} {} ({})", "Annotating".bold(), annotation.name(), annotation.kind());
        if show_diff {
            let packages = annotate::packages_for(annotation.as_ref(), packages);
            let edits = annotation.edits(&ctx, &packages)?;
            let changes = engine.preview(&edits)?;
            for (file, change) in &changes {
                if change.original != change.formatted {
                    display_diff(file, &change.original, &change.formatted);
                }
            }
            continue;
        }
        let outcomes = annotate::run(annotation.as_ref(), &ctx, &engine, write_dir, packages)?;
        for outcome in outcomes {
            match outcome {
                FileOutcome::Written { source, destination } if source == destination => {
                    println!("  {} {}", "✓".green(), source.display());
                }
                FileOutcome::Written { source, destination } => {
                    println!("  {} {} -> {}", "✓".green(), source.display(), destination.display());
                }
                FileOutcome::Unchanged { source } => {
                    println!("  {} {}", "⊘".cyan(), source.display().to_string().dimmed());
                }
            }
        }
    }
    Ok(())
}

fn cmd_list(registry: &Registry, config: Option<&Path>) -> Result<()> {
    match config {
        Some(path) => {
            let config = load_from_path(path)?;
            for entry in &config.annotations {
                println!("{} {}", entry.name.bold(), format!("({})", entry.kind).dimmed());
                if let Some(factory) = registry.get(&entry.kind) {
                    println!("  {}", factory.summary.lines().next().unwrap_or_default());
                }
            }
        }
        None => {
            for factory in registry.factories() {
                println!("{}", factory.name.bold());
                for line in factory.describe().lines() {
                    println!("  {line}");
                }
                println!();
            }
        }
    }
    Ok(())
}

/// Shows a unified diff between original and formatted content.
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!("\n{}", format!("--- {} (original)", file.display()).dimmed());
    println!("{}", format!("+++ {} (annotated)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);
    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        println!("{}", hunk.header().to_string().cyan());
        for change in hunk.iter_changes() {
            let line = match change.tag() {
                ChangeTag::Delete => format!("-{change}").red(),
                ChangeTag::Insert => format!("+{change}").green(),
                ChangeTag::Equal => format!(" {change}").normal(),
            };
            print!("{line}");
        }
    }
}
