//! TrackerBlock CLI
//!
//! CLI tool for compiling filter lists, checking URLs against them and
//! inspecting domain extraction.

mod lists;

use std::fs;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde::Serialize;

use tb_compiler::compile_with_stats;
use tb_core::url::extract_domain;
use tb_engine::{BlockingProvider, EngineConfig, ThirdPartyPolicy};

use crate::lists::{read_exception_rules, read_lists};

#[derive(Parser)]
#[command(name = "tb-cli")]
#[command(about = "TrackerBlock filter list compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile filter lists and report statistics
    Compile {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check whether a URL would be blocked
    Check {
        /// Blocking filter list files
        #[arg(short, long, required = true)]
        rules: Vec<String>,

        /// URL of the requested resource
        #[arg(short, long)]
        url: String,

        /// URL of the page making the request
        #[arg(short, long)]
        source: Option<String>,

        /// Resource type (script, image, xhr, ...)
        #[arg(short = 't', long = "type")]
        resource_type: Option<String>,

        /// File of host/page exceptions, one per line
        #[arg(short, long)]
        exceptions: Option<String>,

        /// JSON engine configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Classify third-party requests by registrable domain
        #[arg(long)]
        same_site: bool,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the domain the matcher extracts from each URL
    Resolve {
        /// URLs to resolve
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { input, verbose } => cmd_compile(&input, verbose),
        Commands::Check {
            rules,
            url,
            source,
            resource_type,
            exceptions,
            config,
            same_site,
            json,
        } => {
            let options = CheckOptions {
                source: source.as_deref(),
                resource_type: resource_type.as_deref(),
                exceptions: exceptions.as_deref(),
                config: config.as_deref(),
                same_site,
                json,
            };
            cmd_check(&rules, &url, &options)
        }
        Commands::Resolve { urls } => cmd_resolve(&urls),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_compile(inputs: &[String], verbose: bool) -> Result<(), String> {
    let start = Instant::now();
    let lists = read_lists(inputs)?;

    let mut total_lines = 0usize;
    let mut total_before = 0usize;
    let mut total_after = 0usize;

    for (list_id, list) in lists.iter().enumerate() {
        let line_count = list.text.lines().count();
        total_lines += line_count;

        let (set, stats) = compile_with_stats(&list.text)
            .map_err(|e| format!("Failed to compile '{}': {}", list.name, e))?;
        total_before += stats.optimize.before;
        total_after += set.rule_count();

        println!(
            "  [{}] {} - {} lines, {} rules ({} skipped, {} ignored)",
            list_id,
            list.name,
            line_count,
            set.rule_count(),
            stats.skipped,
            stats.ignored
        );

        if verbose {
            println!(
                "      dedupe removed {}, badfilter removed {} via {} rules",
                stats.optimize.deduped,
                stats.optimize.badfiltered_rules,
                stats.optimize.badfilter_rules
            );
            println!(
                "      index: {} hostnames, {} tokens, {} fallback",
                stats.domain_entries, stats.token_entries, stats.fallback_rules
            );
        }
    }

    let total_time = start.elapsed();

    println!("Compiled {} filter lists", lists.len());
    println!("  Lines:    {}", total_lines);
    println!(
        "  Rules:    {} -> {} (optimizer removed {})",
        total_before,
        total_after,
        total_before.saturating_sub(total_after)
    );
    println!("  Time:     {:.1}ms", total_time.as_secs_f64() * 1000.0);

    Ok(())
}

struct CheckOptions<'a> {
    source: Option<&'a str>,
    resource_type: Option<&'a str>,
    exceptions: Option<&'a str>,
    config: Option<&'a str>,
    same_site: bool,
    json: bool,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    url: &'a str,
    source: Option<&'a str>,
    resource_type: Option<&'a str>,
    blocked: bool,
    saved_by_exception: bool,
    explicit_cancel: bool,
    redirect: Option<String>,
    list: Option<&'a str>,
    rule_id: Option<usize>,
}

fn cmd_check(rule_files: &[String], url: &str, options: &CheckOptions<'_>) -> Result<(), String> {
    let mut config = match options.config {
        Some(path) => {
            let text =
                fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
            EngineConfig::from_json(&text).map_err(|e| format!("'{}': {}", path, e))?
        }
        None => EngineConfig::default(),
    };
    if options.same_site {
        config.third_party = ThirdPartyPolicy::SameSite;
    }

    let lists = read_lists(rule_files)?;
    let exception_rules = match options.exceptions {
        Some(path) => read_exception_rules(path)?,
        None => None,
    };

    let provider = BlockingProvider::with_config(config);
    let texts: Vec<&str> = lists.iter().map(|list| list.text.as_str()).collect();
    provider
        .set_rules(&texts, exception_rules.as_deref())
        .map_err(|e| e.to_string())?;

    let verdict = provider.check(url, options.source, options.resource_type);
    let report = CheckReport {
        url,
        source: options.source,
        resource_type: options.resource_type,
        blocked: verdict.matched,
        saved_by_exception: verdict.saved_by_exception,
        explicit_cancel: verdict.explicit_cancel,
        redirect: verdict.redirect,
        list: verdict
            .engine_index
            .and_then(|i| lists.get(i))
            .map(|list| list.name.as_str()),
        rule_id: verdict.rule_id,
    };

    if options.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to serialize verdict: {}", e))?;
        println!("{}", json);
        return Ok(());
    }

    let decision = if report.blocked {
        "BLOCK"
    } else if report.saved_by_exception {
        "ALLOW (exception)"
    } else {
        "ALLOW"
    };
    println!("{}  {}", decision, url);
    if let Some(list) = report.list {
        println!("  List:     {}", list);
    }
    if let Some(rule_id) = report.rule_id {
        println!("  Rule:     #{}", rule_id);
    }
    if let Some(redirect) = &report.redirect {
        println!("  Redirect: {}", redirect);
    }
    if report.explicit_cancel {
        println!("  Explicit cancel");
    }

    Ok(())
}

fn cmd_resolve(urls: &[String]) -> Result<(), String> {
    for url in urls {
        let (start, end) = extract_domain(url);
        println!("{}\t[{}, {})\t{}", &url[start..end], start, end, url);
    }
    Ok(())
}
