use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use credential_vault::{CredentialVault, VaultConfig, VaultStatus};
use summary_pulse::{
    estimate_tokens, openai::OpenAIClient, tracing::init_tracing_subscriber, ClientError,
    Credential, JobError, JobEvent, JobRunnerBuilder, ModelCatalog, ModelProfile,
};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(
    name = "summary-pulse",
    about = "Summarize meeting transcripts using an API key kept encrypted on disk"
)]
struct Cli {
    /// Directory holding the key file and the sealed credential
    #[arg(long, env = "SUMMARY_PULSE_VAULT_DIR")]
    vault_dir: Option<PathBuf>,

    /// JSON model catalog to use instead of the built-in one
    #[arg(long, env = "SUMMARY_PULSE_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// List model profiles, or show which one a transcript would use
    Models {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Summarize a transcript file
    Summarize {
        file: PathBuf,

        /// Model profile to use instead of selecting one by size
        #[arg(long)]
        model: Option<String>,

        /// Where to write the summary [default: Summary_<file name> next to the input]
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Also write a .md copy of the summary
        #[arg(long)]
        markdown: bool,

        /// Stored in the vault when no key is stored yet
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        openai_key: Option<String>,

        #[arg(long, env = "OPENAI_BASE_URL")]
        base_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Store a new API key (rotates the encryption key)
    Set {
        /// Read from stdin when omitted
        #[arg(long)]
        value: Option<String>,
    },
    /// Report whether a usable key is stored
    Status,
    /// Delete the stored key and its encryption key
    Delete,
}

fn prompt_line(prompt: &str) -> std::io::Result<String> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn load_catalog(path: Option<&Path>) -> anyhow::Result<ModelCatalog> {
    let Some(path) = path else {
        return Ok(ModelCatalog::builtin());
    };

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;
    ModelCatalog::from_json(&json)
        .with_context(|| format!("Invalid catalog {}", path.display()))
}

/// Loads the stored key, seeding the vault from `seed` or `prompt` when
/// nothing is stored.
fn resolve_credential<P>(
    vault: &CredentialVault,
    seed: Option<String>,
    prompt: P,
) -> anyhow::Result<Credential>
where
    P: FnOnce() -> std::io::Result<String>,
{
    let mut prompt_error = None;
    let credential = vault
        .get_or_store(|| {
            seed.or_else(|| match prompt() {
                Ok(key) => Some(key).filter(|key| !key.is_empty()),
                Err(e) => {
                    prompt_error = Some(e);
                    None
                }
            })
        })
        .map_err(|e| {
            if e.is_corrupt() {
                anyhow::anyhow!("{e}\nThe key store is damaged or was tampered with; run `summary-pulse key delete` and then `summary-pulse key set`.")
            } else {
                anyhow::Error::new(e).context("Failed to load the stored API key")
            }
        })?;

    match (credential, prompt_error) {
        (Some(credential), _) => Ok(credential),
        (None, Some(e)) => Err(anyhow::Error::new(e).context("Failed to read the API key")),
        (None, None) => anyhow::bail!("An API key is required to proceed"),
    }
}

fn run_key_action(vault: &CredentialVault, action: KeyAction) -> anyhow::Result<()> {
    match action {
        KeyAction::Set { value } => {
            let value = match value {
                Some(value) => value,
                None => prompt_line("Enter your OpenAI API key: ")?,
            };
            vault.store(&value)?;
            println!("API key stored in {}", vault.sealed_path().display());
        }
        KeyAction::Status => match vault.status()? {
            VaultStatus::Present => println!("present"),
            VaultStatus::Absent => println!("absent"),
            VaultStatus::Corrupt => {
                println!("corrupt (run `summary-pulse key delete` and store the key again)")
            }
        },
        KeyAction::Delete => {
            vault.delete()?;
            println!("API key deleted");
        }
    }
    Ok(())
}

fn run_models(catalog: &ModelCatalog, file: Option<&Path>) -> anyhow::Result<()> {
    let default = &catalog.default_profile().name;
    for profile in catalog.profiles() {
        let marker = if &profile.name == default { " (default)" } else { "" };
        println!("{:<16} {:>9} tokens{marker}", profile.name, profile.capacity_tokens);
    }

    if let Some(file) = file {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let estimate = estimate_tokens(&content);
        println!(
            "\n{}: ~{estimate} tokens -> {}",
            file.display(),
            catalog.select(estimate).name
        );
    }
    Ok(())
}

fn default_output_path(input: &Path) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "transcript.txt".into());
    input.with_file_name(format!("Summary_{file_name}"))
}

struct SummarizeArgs {
    file: PathBuf,
    model: Option<String>,
    output: Option<PathBuf>,
    markdown: bool,
    openai_key: Option<String>,
    base_url: Option<String>,
}

async fn run_summarize(
    vault: &CredentialVault,
    catalog: ModelCatalog,
    args: SummarizeArgs,
) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let credential = resolve_credential(vault, args.openai_key, || {
        prompt_line("Enter your OpenAI API key: ")
    })?;

    let profile: ModelProfile = match args.model {
        Some(name) => catalog
            .get(&name)
            .cloned()
            .with_context(|| format!("Unknown model `{name}`; see `summary-pulse models`"))?,
        None => catalog.select_for(&content).clone(),
    };
    tracing::info!(
        model = %profile.name,
        estimated_tokens = estimate_tokens(&content),
        "Selected model profile"
    );

    let mut client = OpenAIClient::new();
    if let Some(url) = args.base_url {
        client = client.with_base_url(url);
    }

    let runner = JobRunnerBuilder::new()
        .summarizer(client)
        .catalog(catalog)
        .build()?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = runner.submit(content, &profile, &credential, tx)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancel_requested = false;

    let outcome = loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(JobEvent::Progress(progress)) => {
                    eprintln!("[{:>3}%] {}", progress.percent, progress.phase)
                }
                Some(JobEvent::Finished { outcome, .. }) => break outcome,
                None => anyhow::bail!("Job ended without reporting an outcome"),
            },
            _ = &mut ctrl_c, if !cancel_requested => {
                cancel_requested = true;
                eprintln!("Cancelling...");
                handle.cancel();
            }
        }
    };

    let summary = match outcome {
        Ok(summary) => summary,
        Err(JobError::Client(ClientError::Auth(msg))) => anyhow::bail!(
            "The API key was rejected ({msg}); run `summary-pulse key set` to replace it"
        ),
        Err(e) => return Err(anyhow::Error::new(e).context("Failed to summarize the content")),
    };

    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.file));
    tokio::fs::write(&output, &summary)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Summary saved to {}", output.display());

    if args.markdown {
        let markdown = output.with_extension("md");
        if markdown != output {
            tokio::fs::write(&markdown, &summary)
                .await
                .with_context(|| format!("Failed to write {}", markdown.display()))?;
            println!("Markdown copy saved to {}", markdown.display());
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    ));

    let cli = Cli::parse();
    init_tracing_subscriber()?;

    let vault_config = match cli.vault_dir {
        Some(dir) => VaultConfig::new(dir),
        None => VaultConfig::default_location()
            .context("No config directory on this platform; pass --vault-dir")?,
    };
    let vault = CredentialVault::new(&vault_config);

    match cli.command {
        Command::Key { action } => run_key_action(&vault, action)?,
        Command::Models { file } => {
            let catalog = load_catalog(cli.catalog.as_deref())?;
            run_models(&catalog, file.as_deref())?;
        }
        Command::Summarize {
            file,
            model,
            output,
            markdown,
            openai_key,
            base_url,
        } => {
            let catalog = load_catalog(cli.catalog.as_deref())?;
            let args = SummarizeArgs {
                file,
                model,
                output,
                markdown,
                openai_key,
                base_url,
            };
            run_summarize(&vault, catalog, args).await?;
        }
    }

    Ok(())
}
