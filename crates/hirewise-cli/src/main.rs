use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use hirewise_coach::{
    CareerCoach, CvProfile, INTERVIEW_FALLBACK_REPLY, InterviewCoach, InterviewMode, Market,
};
use hirewise_core::{
    AiRouter, ChatMessage, Complexity, GenerationRequest, ProviderOverride, ProviderRegistry,
    RouterError,
};

mod config;

use config::HirewiseConfig;

#[derive(Parser)]
#[command(name = "hirewise")]
#[command(version)]
#[command(about = "hirewise: CV analysis and interview practice over multiple AI providers")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory and default config
    Init,

    /// Show current configuration (keys masked)
    Config,

    /// List registered providers and their capabilities
    Providers,

    /// Show the routes a caller would get, without calling any provider
    Route {
        /// Caller id; omitted means the default (premium) route
        #[arg(long)]
        caller: Option<String>,

        /// Complexity to plan a generation route for
        #[arg(long, default_value = "easy")]
        complexity: Complexity,

        /// Plan for a JSON-mode request
        #[arg(long)]
        json: bool,
    },

    /// Send a one-shot generation request through the router
    Generate {
        /// The prompt to send
        prompt: String,

        /// easy, medium or hard
        #[arg(long, default_value = "easy")]
        complexity: Complexity,

        /// Provider id to pin, or "auto"
        #[arg(long, default_value = "auto")]
        provider: ProviderOverride,

        /// Ask for a JSON object response
        #[arg(long)]
        json: bool,

        #[arg(long)]
        temperature: Option<f32>,

        /// System instruction
        #[arg(long)]
        system: Option<String>,

        #[arg(long)]
        caller: Option<String>,
    },

    /// Score a CV against a job description
    Analyze {
        /// File holding the CV text
        cv: PathBuf,
        /// File holding the job description
        jd: PathBuf,
        #[arg(long)]
        caller: Option<String>,
    },

    /// Rewrite weak CV bullets with the STAR method
    Rewrite {
        /// File holding the CV text
        cv: PathBuf,
    },

    /// Draft CV content for a target role
    CreateCv {
        #[arg(long)]
        role: String,

        /// USA, Europe, LatAm or Global
        #[arg(long, default_value = "Global")]
        market: Market,

        #[arg(long, default_value = "")]
        industry: String,

        /// Extra candidate facts as a JSON object
        #[arg(long)]
        data: Option<String>,
    },

    /// Run an interactive mock interview
    Interview {
        /// File holding the CV text
        cv: PathBuf,
        /// File holding the job description
        jd: PathBuf,

        /// hardcore or coach
        #[arg(long, default_value = "hardcore")]
        mode: InterviewMode,

        #[arg(long)]
        caller: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging; RUST_LOG wins when set
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Providers => cmd_providers(&cli.config).await,
        Commands::Route {
            caller,
            complexity,
            json,
        } => cmd_route(&cli.config, caller.as_deref(), complexity, json).await,
        Commands::Generate {
            prompt,
            complexity,
            provider,
            json,
            temperature,
            system,
            caller,
        } => {
            let mut request = GenerationRequest::new(prompt)
                .with_complexity(complexity)
                .with_override(provider);
            if json {
                request = request.json();
            }
            if let Some(t) = temperature {
                request = request.with_temperature(t);
            }
            if let Some(s) = system {
                request = request.with_system_instruction(s);
            }
            if let Some(c) = caller {
                request = request.with_caller(c);
            }
            cmd_generate(&cli.config, request).await
        }
        Commands::Analyze { cv, jd, caller } => {
            cmd_analyze(&cli.config, &cv, &jd, caller.as_deref()).await
        }
        Commands::Rewrite { cv } => cmd_rewrite(&cli.config, &cv).await,
        Commands::CreateCv {
            role,
            market,
            industry,
            data,
        } => cmd_create_cv(&cli.config, role, market, industry, data.as_deref()).await,
        Commands::Interview {
            cv,
            jd,
            mode,
            caller,
        } => cmd_interview(&cli.config, &cv, &jd, mode, caller.as_deref()).await,
    }
}

/// Build the one router every command shares
fn build_router(cfg: &HirewiseConfig) -> Result<Arc<AiRouter>> {
    let router_config = cfg.router_config();
    let registry = ProviderRegistry::from_config(&router_config)
        .context("Failed to build provider registry")?;
    if registry.is_empty() {
        warn!("No providers are enabled; every request will fail with no provider available");
    }
    Ok(Arc::new(AiRouter::from_config(Arc::new(registry), &router_config)))
}

async fn read_input(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        info!("Created default config at {}", config_path.display());
    }

    println!("hirewise initialized at {}", config_dir.display());
    println!(
        "Export your provider API keys (OPENAI_API_KEY, ANTHROPIC_API_KEY, ...) or edit {}.",
        config_path.display()
    );
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = HirewiseConfig::load(config_path)?;
    println!("{}", toml::to_string_pretty(&cfg.redacted())?);
    Ok(())
}

async fn cmd_providers(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = HirewiseConfig::load(config_path)?;
    let router = build_router(&cfg)?;

    println!(
        "{:<12} {:<14} {:<6} {:<6} {:<6} {:>10} {:>9}",
        "ID", "KIND", "TIER", "JSON", "CHAT", "MAX_INPUT", "TIMEOUT"
    );
    for provider in router.registry().providers() {
        let d = &provider.descriptor;
        println!(
            "{:<12} {:<14} {:<6} {:<6} {:<6} {:>10} {:>8}s",
            d.id,
            provider.adapter.kind(),
            d.cost_tier.to_string(),
            d.supports_json_mode,
            d.supports_chat,
            d.max_input_tokens,
            d.timeout_ms / 1000
        );
    }
    Ok(())
}

async fn cmd_route(
    config_path: &Option<PathBuf>,
    caller: Option<&str>,
    complexity: Complexity,
    json: bool,
) -> Result<()> {
    let cfg = HirewiseConfig::load(config_path)?;
    let router = build_router(&cfg)?;

    let mut request = GenerationRequest::new("route preview").with_complexity(complexity);
    if json {
        request = request.json();
    }
    if let Some(c) = caller {
        request = request.with_caller(c);
    }

    let plan = router.plan(&request)?;
    let chat = router.get_route(caller);

    println!("caller tier: {}", router.caller_tier(caller));
    println!(
        "generate ({}{}): [{}]",
        complexity,
        if json { ", json" } else { "" },
        plan.providers.join(", ")
    );
    println!("chat session: [{}]", chat.providers.join(", "));
    Ok(())
}

async fn cmd_generate(config_path: &Option<PathBuf>, request: GenerationRequest) -> Result<()> {
    let cfg = HirewiseConfig::load(config_path)?;
    let router = build_router(&cfg)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let response = router
        .route_request_cancellable(&request, &cancel)
        .await
        .context("Generation failed")?;

    info!(
        "Answered by {} in {}ms (tokens: {})",
        response.provider_id,
        response.latency_ms,
        response
            .tokens_used
            .map_or_else(|| "unknown".to_string(), |t| t.to_string())
    );
    println!("{}", response.text);
    Ok(())
}

async fn cmd_analyze(
    config_path: &Option<PathBuf>,
    cv: &Path,
    jd: &Path,
    caller: Option<&str>,
) -> Result<()> {
    let cfg = HirewiseConfig::load(config_path)?;
    let coach = CareerCoach::new(build_router(&cfg)?);

    let cv_text = read_input(cv).await?;
    let jd_text = read_input(jd).await?;
    let analysis = coach.analyze_cv(&cv_text, &jd_text, caller).await?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

async fn cmd_rewrite(config_path: &Option<PathBuf>, cv: &Path) -> Result<()> {
    let cfg = HirewiseConfig::load(config_path)?;
    let coach = CareerCoach::new(build_router(&cfg)?);

    let cv_text = read_input(cv).await?;
    let rewrite = coach.rewrite_cv(&cv_text).await?;
    println!("{}", serde_json::to_string_pretty(&rewrite)?);
    Ok(())
}

async fn cmd_create_cv(
    config_path: &Option<PathBuf>,
    role: String,
    market: Market,
    industry: String,
    data: Option<&str>,
) -> Result<()> {
    let raw_data = match data {
        Some(raw) => serde_json::from_str(raw).context("--data must be a JSON object")?,
        None => serde_json::Value::Null,
    };
    if !(raw_data.is_object() || raw_data.is_null()) {
        bail!("--data must be a JSON object");
    }

    let cfg = HirewiseConfig::load(config_path)?;
    let coach = CareerCoach::new(build_router(&cfg)?);

    let profile = CvProfile {
        role,
        market,
        industry,
        raw_data,
    };
    let cv = coach.generate_cv(&profile).await;
    println!("{}", serde_json::to_string_pretty(&cv)?);
    Ok(())
}

async fn cmd_interview(
    config_path: &Option<PathBuf>,
    cv: &Path,
    jd: &Path,
    mode: InterviewMode,
    caller: Option<&str>,
) -> Result<()> {
    let cfg = HirewiseConfig::load(config_path)?;
    let coach = InterviewCoach::new(build_router(&cfg)?);

    let cv_text = read_input(cv).await?;
    let jd_text = read_input(jd).await?;
    let session = coach.start_session(caller, &cv_text, &jd_text, mode);
    if session.route().is_empty() {
        bail!("No provider can serve interview chat for this caller");
    }
    debug!("Interview pinned to [{}]", session.route().providers.join(", "));

    println!("Mock interview ({} mode). Type 'exit' or press Ctrl-C to finish.\n", mode);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let mut history: Vec<ChatMessage> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    'session: loop {
        let reply = match session.try_reply_cancellable(&history, &cancel).await {
            Ok(response) => response.text,
            Err(RouterError::Cancelled) => break 'session,
            Err(e) => {
                warn!("Interview reply failed: {}", e);
                INTERVIEW_FALLBACK_REPLY.to_string()
            }
        };
        println!("Alex: {}\n", reply);
        history.push(ChatMessage::assistant(reply));

        let answer = loop {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'session,
                next = lines.next_line() => next?,
            };
            let Some(line) = next else {
                break 'session;
            };
            let line = line.trim().to_string();
            if !line.is_empty() {
                break line;
            }
        };
        if matches!(answer.as_str(), "exit" | "quit") {
            break;
        }
        history.push(ChatMessage::user(answer));
    }

    println!("\nInterview finished after {} turn(s).", history.len());
    Ok(())
}
