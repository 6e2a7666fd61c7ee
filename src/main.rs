use changeset_release::{
    Orchestrator, Result, RunOutcome,
    cli::Args,
    exec::ProcessRunner,
    forge::github::Github,
    outputs::GithubOutput,
    repo::Repository,
};
use clap::Parser;
use log::*;

fn initialize_logger(debug: bool) -> Result<()> {
    let filter = if debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("changeset_release")
        .build();

    simplelog::TermLogger::init(
        filter,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli_args = Args::parse();

    initialize_logger(cli_args.debug)?;

    let setup = cli_args.resolve()?;

    info!("setting up repository at {}", setup.run.cwd.display());
    let repo = Repository::open(&setup.run.cwd, setup.remote.token.clone())?;
    let forge = Github::new(setup.remote)?;
    let outputs = GithubOutput::new(setup.output_file);

    let orchestrator = Orchestrator::builder()
        .config(setup.run)
        .forge(Box::new(forge))
        .git(Box::new(repo))
        .runner(Box::new(ProcessRunner::new()))
        .build()?;

    match orchestrator.run(&outputs).await? {
        RunOutcome::Versioned(pr) => {
            let action = if pr.created { "created" } else { "updated" };
            info!("{action} release pull request #{}", pr.number);
        }
        RunOutcome::Published(result) if result.published() => {
            info!("published {} packages", result.published_packages.len());
        }
        RunOutcome::Published(_) => info!("no packages were published"),
        RunOutcome::Idle => {}
    }

    Ok(())
}
