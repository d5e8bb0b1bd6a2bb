use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use reva::cli::{Cli, Commands};
use reva::core::runner::CommandResult;
use reva::{Agent, Config};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // init only writes a config file and must work without a repository
    if let Commands::Init { output } = &cli.command {
        let config = Config::default();
        config.save(Some(output))?;
        println!("Configuration initialized at: {}", output.display());
        return Ok(ExitCode::SUCCESS);
    }

    let mut agent = Agent::new(&cli.repo, cli.config.as_deref())?;
    if cli.dry_run {
        agent.dry_run = true;
    }

    match cli.command {
        Commands::Status => {
            let status = agent.get_status()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Commands::Analyze { patterns } => {
            let analysis = agent.analyze_codebase(patterns.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }

        Commands::Read { file } => {
            println!("{}", agent.read_file(&file)?);
        }

        Commands::Write {
            file,
            content,
            no_commit,
        } => {
            agent.write_file(&file, &content, !no_commit)?;
            println!("Written to: {file}");
        }

        Commands::Refactor {
            file,
            instructions,
            no_commit,
        } => {
            let result = agent.refactor_file(&file, &instructions, !no_commit)?;
            println!("Refactored: {file}\n");
            println!("{result}");
        }

        Commands::AnalyzeFile { file, task } => {
            println!("{}", agent.analyze_file(&file, &task)?);
        }

        Commands::Test { path } => {
            let result = agent.run_tests(path.as_deref());
            return Ok(report_command(&result, "Tests"));
        }

        Commands::Run { command } => {
            let result = agent.run_command(&command);
            return Ok(report_command(&result, "Command"));
        }

        Commands::Lint => {
            let result = agent.run_lint();
            return Ok(report_command(&result, "Lint"));
        }

        Commands::Fmt { check } => {
            let result = agent.run_format(check);
            return Ok(report_command(&result, "Format"));
        }

        Commands::Commit { message, files } => {
            match agent.commit_changes(message.as_deref(), files.as_deref())? {
                Some(sha) => println!("Created commit: {}", &sha[..sha.len().min(8)]),
                None => println!("No changes to commit (dry run)"),
            }
        }

        Commands::Branch { name, no_checkout } => {
            let branch = agent.create_branch(&name, !no_checkout)?;
            println!("Created branch: {branch}");
        }

        Commands::Push { remote, branch } => {
            agent.push(&remote, branch.as_deref())?;
            println!("Pushed to: {remote}");
        }

        Commands::Log { count } => {
            let commits = agent.recent_commits(count)?;
            println!("{}", serde_json::to_string_pretty(&commits)?);
        }

        Commands::Task { description } => {
            let plan = agent.execute_task(&description)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }

        // handled above, before agent construction
        Commands::Init { .. } => {}
    }

    Ok(ExitCode::SUCCESS)
}

fn report_command(result: &CommandResult, label: &str) -> ExitCode {
    println!("{label} {}", if result.success { "succeeded" } else { "failed" });
    if let Some(command) = &result.command {
        println!("  ({command})");
    }
    if !result.stdout.is_empty() {
        println!("\nOutput:\n{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprintln!("\nErrors:\n{}", result.stderr);
    }
    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
