use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use facebridge_core::{
    Capabilities, Credentials, EngineConfig, ExtractPurpose, FaceError, FaceFacade,
};
use facebridge_onnx::OnnxProvider;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "facebridge",
    version,
    about = "Detect, extract, compare and analyze faces in image files"
)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EngineArgs {
    #[arg(long, env = "FACEBRIDGE_APP_ID", global = true, default_value = "")]
    app_id: String,

    #[arg(long, env = "FACEBRIDGE_SDK_KEY", global = true, default_value = "", hide_env_values = true)]
    sdk_key: String,

    #[arg(long, env = "FACEBRIDGE_ACTIVE_KEY", global = true, default_value = "", hide_env_values = true)]
    active_key: String,

    /// Directory containing the ONNX model files
    #[arg(long, env = "FACEBRIDGE_MODEL_DIR", global = true)]
    model_dir: Option<PathBuf>,

    /// Maximum faces reported per image
    #[arg(
        long,
        env = "FACEBRIDGE_MAX_FACES",
        global = true,
        default_value_t = 2,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_faces: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// List the faces found in an image
    Detect { path: PathBuf },
    /// Print the Base64 feature of the first face in an image
    Extract {
        path: PathBuf,
        /// register or recognize
        #[arg(long, default_value = "recognize")]
        purpose: ExtractPurpose,
    },
    /// Similarity score of two Base64 features
    Compare { first: String, second: String },
    /// Whether the first face in an image is a live capture
    Liveness { path: PathBuf },
    /// Estimated age of the first face in an image
    Age { path: PathBuf },
    /// Estimated gender of the first face in an image
    Gender { path: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            match err.downcast_ref::<FaceError>() {
                Some(face) => eprintln!("{}: {face}", face.code()),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<serde_json::Value> {
    let facade = open_facade(&cli.engine)?;
    run_and_release(&facade, cli.command)
}

/// Run one command, then release the engine whether or not it succeeded.
fn run_and_release(facade: &FaceFacade, command: Commands) -> Result<serde_json::Value> {
    let output = execute(facade, command);
    if let Err(err) = facade.shutdown() {
        tracing::warn!(code = err.code(), error = %err, "engine shutdown failed");
    }
    output
}

fn execute(facade: &FaceFacade, command: Commands) -> Result<serde_json::Value> {
    let output = match command {
        Commands::Detect { path } => serde_json::to_value(facade.detect_faces(&path)?)?,
        Commands::Extract { path, purpose } => {
            json!({ "feature": facade.extract_feature(&path, purpose)? })
        }
        Commands::Compare { first, second } => {
            json!({ "score": facade.compare_features(&first, &second)? })
        }
        Commands::Liveness { path } => json!({ "live": facade.check_liveness(&path)? }),
        Commands::Age { path } => json!({ "age": facade.estimate_age(&path)? }),
        Commands::Gender { path } => json!({ "gender": facade.estimate_gender(&path)?.as_str() }),
    };
    Ok(output)
}

fn open_facade(args: &EngineArgs) -> Result<FaceFacade, FaceError> {
    let model_dir = args
        .model_dir
        .clone()
        .unwrap_or_else(facebridge_onnx::default_model_dir);
    tracing::debug!(model_dir = %model_dir.display(), "opening engine");

    let config = EngineConfig {
        max_faces: args.max_faces,
        capabilities: Capabilities::all(),
        ..EngineConfig::default()
    };
    let facade = FaceFacade::new(OnnxProvider::new(model_dir), config);
    facade.initialize(&Credentials::new(
        args.app_id.as_str(),
        args.sdk_key.as_str(),
        args.active_key.as_str(),
    ))?;
    Ok(facade)
}
