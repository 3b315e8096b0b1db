use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use engine_dispatch::config::AppConfig;
use engine_dispatch::dispatcher::EngineDispatcher;
use engine_dispatch::engine::EngineType;
use engine_dispatch::engines::registry_for;
use engine_dispatch::render::render_to_wav;
use engine_dispatch::session::SessionFile;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "engine_cli",
    about = "Inspect, render, and edit engine dispatcher sessions"
)]
struct Cli {
    /// Session file to restore from and save back to
    #[arg(long, global = true)]
    session: Option<PathBuf>,
    /// JSON config (defaults to assets/dispatcher_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Dispatcher category to operate on
    #[arg(long = "type", value_enum, default_value_t = TypeArg::Synth, global = true)]
    engine_type: TypeArg,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TypeArg {
    Synth,
    Effect,
}

impl From<TypeArg> for EngineType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Synth => EngineType::Synth,
            TypeArg::Effect => EngineType::Effect,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered engines and their presets
    List {
        #[arg(long)]
        json: bool,
    },
    /// Render an engine to a 32-bit float WAV file
    Render {
        #[arg(long)]
        engine: Option<String>,
        /// Preset index or name of the selected engine
        #[arg(long)]
        preset: Option<String>,
        #[arg(long, default_value_t = 1.0)]
        seconds: f64,
        #[arg(long)]
        output: PathBuf,
    },
    /// Snapshot an engine's current state as a named preset
    MakePreset {
        #[arg(long)]
        engine: Option<String>,
        #[arg(long)]
        name: String,
    },
    /// Print the persisted dispatcher document
    Show,
}

#[derive(Serialize)]
struct EngineListing<'a> {
    index: usize,
    name: &'a str,
    active: bool,
    presets: Vec<String>,
}

fn main() -> ExitCode {
    engine_dispatch::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .as_deref()
        .map(AppConfig::load_from_file)
        .unwrap_or_else(AppConfig::load);

    let engine_type = EngineType::from(cli.engine_type);
    let registry = registry_for(engine_type)
        .ok_or_else(|| anyhow!("no built-in engines for {}", engine_type))??;
    let mut dispatcher = EngineDispatcher::new(registry, &config.dispatcher)?;

    let mut session = match &cli.session {
        Some(path) => SessionFile::load_or_default(path)?,
        None => SessionFile::new(),
    };
    session.restore(&mut dispatcher)?;

    let modified = match cli.command {
        Commands::List { json } => {
            run_list(&dispatcher, json)?;
            false
        }
        Commands::Render {
            engine,
            preset,
            seconds,
            output,
        } => {
            run_render(&mut dispatcher, engine, preset, seconds, &output, &config)?;
            true
        }
        Commands::MakePreset { engine, name } => {
            run_make_preset(&mut dispatcher, engine, &name)?;
            true
        }
        Commands::Show => {
            dispatcher.save_engine_state();
            println!("{}", serde_json::to_string_pretty(&dispatcher.to_json())?);
            false
        }
    };

    if modified {
        if let Some(path) = &cli.session {
            session.capture(&mut dispatcher);
            session.save(path)?;
        }
    }
    Ok(ExitCode::from(0))
}

fn run_list(dispatcher: &EngineDispatcher, json: bool) -> Result<()> {
    let bank = dispatcher.preset_bank();
    let listings: Vec<EngineListing> = dispatcher
        .engine_names()
        .into_iter()
        .enumerate()
        .map(|(index, name)| EngineListing {
            index,
            name,
            active: index == dispatcher.current_index(),
            presets: bank.preset_names(name),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    for listing in listings {
        let marker = if listing.active { "*" } else { " " };
        if listing.presets.is_empty() {
            println!("{} {} {}", marker, listing.index, listing.name);
        } else {
            println!(
                "{} {} {} [{}]",
                marker,
                listing.index,
                listing.name,
                listing.presets.join(", ")
            );
        }
    }
    Ok(())
}

fn run_render(
    dispatcher: &mut EngineDispatcher,
    engine: Option<String>,
    preset: Option<String>,
    seconds: f64,
    output: &Path,
    config: &AppConfig,
) -> Result<()> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(anyhow!("--seconds must be positive (got {})", seconds));
    }
    if let Some(name) = &engine {
        dispatcher.select_name(name)?;
    }
    let _span = tracing::info_span!("render", engine = dispatcher.current_name()).entered();

    if let Some(preset) = &preset {
        let index = resolve_preset(dispatcher, preset)?;
        dispatcher.select_preset(index)?;
    }

    let frames = (seconds * config.audio.sample_rate as f64).round() as u64;
    let summary = render_to_wav(dispatcher, frames, output, &config.audio)
        .with_context(|| format!("rendering {}", dispatcher.current_name()))?;
    println!(
        "Rendered {} frames of '{}' to {} (peak {:.3})",
        summary.frames,
        dispatcher.current_name(),
        output.display(),
        summary.peak
    );
    Ok(())
}

fn run_make_preset(
    dispatcher: &mut EngineDispatcher,
    engine: Option<String>,
    name: &str,
) -> Result<()> {
    if let Some(engine) = &engine {
        dispatcher.select_name(engine)?;
    }
    let index = dispatcher.make_new_preset(name);
    println!(
        "Preset '{}' stored for '{}' at index {}",
        dispatcher.presets()[index].name,
        dispatcher.current_name(),
        index
    );
    Ok(())
}

fn resolve_preset(dispatcher: &EngineDispatcher, preset: &str) -> Result<usize> {
    if let Ok(index) = preset.parse::<usize>() {
        return Ok(index);
    }
    dispatcher
        .presets()
        .iter()
        .position(|p| p.name == preset)
        .ok_or_else(|| {
            anyhow!(
                "preset '{}' not found for '{}'",
                preset,
                dispatcher.current_name()
            )
        })
}
