use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use vaporwaver_backend_core::api::server::serve;
use vaporwaver_backend_core::compose::config::{
    ComposeConfig, Gradient, DEFAULT_GLITCH, DEFAULT_GLITCH_SEED,
};
use vaporwaver_backend_core::compose::engine::{SharedComposer, VaporwaverScriptComposer};
use vaporwaver_backend_core::compose::orchestrator::ComposeOrchestrator;
use vaporwaver_backend_core::compose::workspace::WorkspaceFactory;
use vaporwaver_backend_core::settings::{default_app_root_from_manifest_dir, BackendSettings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli_args = std::env::args().skip(1).collect::<Vec<_>>();
    if matches!(cli_args.first().map(String::as_str), Some("compose")) {
        run_compose_cli(cli_args.into_iter().skip(1).collect::<Vec<_>>()).await?;
        return Ok(());
    }

    let app_root = default_app_root_from_manifest_dir();
    let settings = BackendSettings::load(app_root.as_path())?;
    serve(settings).await?;
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}

#[derive(Debug, Clone, PartialEq)]
struct ComposeCliArgs {
    character: PathBuf,
    output: PathBuf,
    background: Option<String>,
    misc: Option<String>,
    glitch: f64,
    glitch_seed: i64,
    gradient: Gradient,
    crt: bool,
    character_only: bool,
}

fn parse_compose_cli_args(args: &[String]) -> Result<ComposeCliArgs, Box<dyn std::error::Error>> {
    let mut character = None::<PathBuf>;
    let mut output = None::<PathBuf>;
    let mut background = None::<String>;
    let mut misc = None::<String>;
    let mut glitch = DEFAULT_GLITCH;
    let mut glitch_seed = DEFAULT_GLITCH_SEED;
    let mut gradient = Gradient::None;
    let mut crt = false;
    let mut character_only = false;

    let mut i = 0usize;
    while i < args.len() {
        let flag = args[i].as_str();
        let needs_value = |idx: usize| -> Result<String, Box<dyn std::error::Error>> {
            let Some(value) = args.get(idx + 1) else {
                return Err(std::io::Error::other(format!("Missing value for {flag}")).into());
            };
            Ok(value.clone())
        };

        match flag {
            "--character" => {
                character = Some(PathBuf::from(needs_value(i)?));
                i += 2;
            }
            "--output" => {
                output = Some(PathBuf::from(needs_value(i)?));
                i += 2;
            }
            "--background" => {
                background = Some(needs_value(i)?);
                i += 2;
            }
            "--misc" => {
                misc = Some(needs_value(i)?);
                i += 2;
            }
            "--glitch" => {
                glitch = needs_value(i)?.parse::<f64>()?;
                i += 2;
            }
            "--glitch-seed" => {
                glitch_seed = needs_value(i)?.parse::<i64>()?;
                i += 2;
            }
            "--gradient" => {
                gradient = needs_value(i)?.parse::<Gradient>()?;
                i += 2;
            }
            "--crt" => {
                crt = true;
                i += 1;
            }
            "--character-only" => {
                character_only = true;
                i += 1;
            }
            unknown => {
                return Err(std::io::Error::other(format!(
                    "Unknown argument: {unknown}\n\nUse --help for usage."
                ))
                .into());
            }
        }
    }

    let character =
        character.ok_or_else(|| std::io::Error::other("Missing required --character"))?;
    let output = output.ok_or_else(|| std::io::Error::other("Missing required --output"))?;

    Ok(ComposeCliArgs {
        character,
        output,
        background,
        misc,
        glitch,
        glitch_seed,
        gradient,
        crt,
        character_only,
    })
}

/// One-off composition from the command line, through the same fallback
/// ladder the HTTP surface uses.
async fn run_compose_cli(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    if args
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_compose_usage();
        return Ok(());
    }
    let parsed = parse_compose_cli_args(args.as_slice())?;

    let app_root = default_app_root_from_manifest_dir();
    let settings = BackendSettings::load(app_root.as_path())?;
    let composer: SharedComposer = Arc::new(VaporwaverScriptComposer::new(
        settings.python_bin.clone(),
        settings.script_path.clone(),
    ));
    let orchestrator = ComposeOrchestrator::new(composer, settings.stage_timeout);

    let workspace = WorkspaceFactory::new(settings.temp_root.clone()).allocate()?;
    std::fs::copy(parsed.character.as_path(), workspace.character_path.as_path())?;

    let mut config = ComposeConfig::character_only(
        workspace.character_path.clone(),
        workspace.output_path.clone(),
        parsed.glitch,
        parsed.glitch_seed,
        parsed.gradient,
    );
    if !parsed.character_only {
        config.character_only = false;
        if let Some(background) = parsed.background {
            config.background = background;
        }
        if let Some(misc) = parsed.misc {
            config.misc = misc;
        }
        config.crt = parsed.crt;
    }

    let result = orchestrator.run(&config, &workspace).await;
    let bytes = match result {
        Ok(bytes) => bytes,
        Err(error) => {
            workspace.release();
            return Err(std::io::Error::other(error.to_string()).into());
        }
    };
    std::fs::write(parsed.output.as_path(), bytes.as_slice())?;
    workspace.release();

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "ok": true,
            "output": parsed.output.display().to_string(),
            "bytes": bytes.len(),
        }))?
    );
    Ok(())
}

fn print_compose_usage() {
    eprintln!(concat!(
        "Usage:\n",
        "  cargo run -- compose --character PATH --output PATH ",
        "[--background ID] [--misc ID] [--glitch F] [--glitch-seed N] ",
        "[--gradient NAME] [--crt] [--character-only]\n\n",
        "Defaults:\n",
        "  --glitch 0.1, --glitch-seed 0, --gradient none\n",
        "  omit --character-only to run the full background/overlay ladder\n"
    ));
}
