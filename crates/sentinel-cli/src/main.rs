use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sentinel_core::{GateOutcome, HttpClient, ReleaseVersion, Secret};
use sentinel_host::{HostStats, ReqwestHttpClient, ThreadSleeper};
use sentinel_release::{release_notes, rollback, GitHubReleases, KubectlRollout};
use sentinel_runner::{
    run_span, standard_effects, Collaborators, ConfigSource, EnvSource, GateRunner, RunReport, Settings,
};
use sentinel_vcs_git::GitRepository;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Exit code for a failure after every gate passed.
const ACTUATION_FAILED: u8 = 3;

#[derive(Parser)]
#[command(name = "release-sentinel", version, about = "Decide whether a release may proceed, then tag and publish it")]
struct Cli {
    /// TOML settings file (falls back to RS_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every gate and, if all pass, tag and publish the release
    Gate {
        /// Target environment: dev, stage or prod
        #[arg(long, env = "ENV")]
        env: String,
        /// Release version, e.g. v1.2.3
        #[arg(long = "version", env = "VERSION", value_name = "VERSION")]
        release: String,
    },

    /// Print the notes the next release would be published with
    Notes {
        #[arg(long = "version", value_name = "VERSION")]
        release: String,
    },

    /// Undo the last rollout of a deployment
    Rollback {
        #[arg(long)]
        deployment: String,
        #[arg(long, default_value = "default")]
        namespace: String,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let repo_root = std::env::current_dir()?;

    match cli.cmd {
        Command::Gate { env, release } => {
            let settings = match Settings::load(cli.config.as_deref(), &EnvSource) {
                Ok(settings) => settings,
                Err(e) => {
                    let outcome = GateOutcome::Blocked(format!("Release BLOCKED (config): {e}"));
                    let fallback = Settings::fallback(&EnvSource);
                    let effects = standard_effects(&fallback, Arc::new(ReqwestHttpClient::new()?));
                    let _run = run_span(&env).entered();
                    error!(error = %e, "cannot load settings");
                    effects.dispatch(&RunReport::from_outcome(&env, &outcome));
                    if let GateOutcome::Blocked(reason) = &outcome {
                        println!("{reason}");
                    }
                    return Ok(ExitCode::from(outcome.exit_code() as u8));
                }
            };
            let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
            let repo = GitRepository::open(&repo_root);
            let stats = HostStats::new();
            let publisher = GitHubReleases::new(http.clone(), settings.github_api_url.clone(), settings.publish_timeout());
            let with = Collaborators {
                source: &EnvSource,
                repo: &repo,
                stats: &stats,
                http: http.as_ref(),
                sleeper: &ThreadSleeper,
                publisher: &publisher,
            };
            let effects = standard_effects(&settings, http.clone());

            match GateRunner::new(&settings, with, effects, run_span(&env)).run(&env, &release) {
                Ok(outcome) => {
                    match &outcome {
                        GateOutcome::Safe => println!("Release SAFE: {release} published for {env}"),
                        GateOutcome::Blocked(reason) => println!("{reason}"),
                        GateOutcome::Critical(failed) => {
                            println!("{}", sentinel_runner::CRITICAL_MESSAGE);
                            for check in failed {
                                println!("  {check}");
                            }
                        }
                    }
                    Ok(ExitCode::from(outcome.exit_code() as u8))
                }
                Err(e) => {
                    println!("Release FAILED: {e}");
                    Ok(ExitCode::from(ACTUATION_FAILED))
                }
            }
        }
        Command::Notes { release } => {
            let version = ReleaseVersion::parse(&release)?;
            let repo = GitRepository::open(&repo_root);
            print!("{}", release_notes(&repo, &version)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Rollback { deployment, namespace } => {
            let kubectl = KubectlRollout::new(EnvSource.get("KUBECONFIG").map(Secret::new));
            match rollback(&kubectl, &deployment, &namespace) {
                Ok(()) => {
                    println!("Rolled back deployment/{deployment} in {namespace}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    println!("Rollback FAILED: {e}");
                    Ok(ExitCode::from(ACTUATION_FAILED))
                }
            }
        }
    }
}
