use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use treegraft::config::{compile_from_path, ConfigError};
use treegraft::tree::{Forest, TreeSpec};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "treegraft")]
#[command(about = "Rule-based search and replace over typed trees", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply rules to a tree
    Apply {
        /// Rule file, or a directory of .toml rule files applied in name order
        #[arg(short, long)]
        rules: PathBuf,

        /// Subject tree as JSON
        #[arg(short, long)]
        tree: PathBuf,

        /// Where to write the rewritten tree (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dry run - report hits without writing the output
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of the tree per rule file
        #[arg(short, long)]
        diff: bool,
    },

    /// Load and compile rule files, reporting every issue
    Check {
        #[arg(short, long)]
        rules: PathBuf,
    },

    /// List rules with their modes and repetition limits
    List {
        #[arg(short, long)]
        rules: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            rules,
            tree,
            output,
            dry_run,
            diff,
        } => cmd_apply(&rules, &tree, output, dry_run, diff),

        Commands::Check { rules } => cmd_check(&rules),

        Commands::List { rules } => cmd_list(&rules),
    }
}

/// Helper: A single rule file, or every .toml file directly inside a
/// directory, sorted by path.
fn discover_rule_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        anyhow::bail!("rule path {} does not exist", path.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
        {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No .toml rule files found in {}", path.display());
    }
    Ok(files)
}

/// Helper: Show unified diff between two renderings of the tree
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- tree (before {})", file.display()).dimmed()
    );
    println!(
        "{}",
        format!("+++ tree (after {})", file.display()).dimmed()
    );

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_apply(
    rules: &Path,
    tree: &Path,
    output: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let rule_files = discover_rule_files(rules)?;

    let input = fs::read_to_string(tree)
        .with_context(|| format!("failed to read tree from {}", tree.display()))?;
    let mut spec: TreeSpec = serde_json::from_str(&input)
        .with_context(|| format!("failed to parse tree JSON from {}", tree.display()))?;

    if dry_run {
        println!("{}", "[DRY RUN - the rewritten tree is not written]".cyan());
    }

    let mut total_hits = 0;
    let mut total_unmatched = 0;
    let mut total_failed = 0;

    // Every file brings its own kinds, so the tree is re-imported per file.
    for rule_file in rule_files {
        println!("Loading rules from {}...", rule_file.display());
        let set = compile_from_path(&rule_file)?;

        let mut forest = Forest::new(set.schema.clone());
        let mut root = forest.import(&spec).with_context(|| {
            format!("tree does not fit the kinds of {}", rule_file.display())
        })?;
        let before = serde_json::to_string_pretty(&spec)?;

        for rule in &set.rules {
            match rule
                .transformation
                .apply(&mut forest, root, rule.limits)
            {
                Ok(applied) if applied.hits > 0 => {
                    println!(
                        "{} {}: {} hit(s)",
                        "✓".green(),
                        rule.id(),
                        applied.hits
                    );
                    root = applied.root;
                    total_hits += applied.hits;
                }
                Ok(_) => {
                    println!("{} {}: No match", "⊙".yellow(), rule.id());
                    total_unmatched += 1;
                }
                Err(e) => {
                    eprintln!("{} {}: Error - {}", "✗".red(), rule.id(), e);
                    total_failed += 1;
                }
            }
        }

        spec = forest.export(root);
        if show_diff {
            let after = serde_json::to_string_pretty(&spec)?;
            if before != after {
                display_diff(&rule_file, &before, &after);
            }
        }
        println!();
    }

    let result = serde_json::to_string_pretty(&spec)?;
    match output {
        Some(path) if !dry_run => {
            fs::write(&path, format!("{result}\n"))
                .with_context(|| format!("failed to write tree to {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        Some(path) => println!("Would write {}", path.display()),
        None => println!("{result}"),
    }

    println!("{}", "Summary:".bold());
    println!("  {} hit(s)", format!("{}", total_hits).green());
    println!(
        "  {} rule(s) without match",
        format!("{}", total_unmatched).yellow()
    );
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_check(rules: &Path) -> Result<()> {
    let rule_files = discover_rule_files(rules)?;
    let mut failed = 0;

    println!("{}", "Checking rule files...".bold());
    for rule_file in rule_files {
        match compile_from_path(&rule_file) {
            Ok(set) => println!(
                "{} {}: {} rule(s), {} kind(s)",
                "✓".green(),
                rule_file.display(),
                set.rules.len(),
                set.schema.len()
            ),
            Err(ConfigError::Validation { source, .. }) => {
                eprintln!("{} {}: INVALID", "✗".red(), rule_file.display());
                for issue in &source.issues {
                    eprintln!("  - {}", issue);
                }
                failed += 1;
            }
            Err(e) => {
                eprintln!("{} {}: Error - {}", "✗".red(), rule_file.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_list(rules: &Path) -> Result<()> {
    for rule_file in discover_rule_files(rules)? {
        let set = compile_from_path(&rule_file)?;
        let title = if set.name.is_empty() {
            rule_file.display().to_string()
        } else {
            format!("{} ({})", set.name, rule_file.display())
        };
        println!("{}", title.bold());

        for rule in &set.rules {
            let strict = if rule.limits.strict { ", strict" } else { "" };
            print!(
                "  - {} [{}, max {}{}]",
                rule.id(),
                rule.transformation.mode(),
                rule.limits.max_repetitions,
                strict
            );
            match &rule.description {
                Some(description) => println!(" {}", description.dimmed()),
                None => println!(),
            }
        }
        println!();
    }
    Ok(())
}
