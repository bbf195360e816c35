use {
    anyhow::{anyhow, Result},
    clap::{Args, Parser, Subcommand},
    kestrel_asset::{GltfImporter, GltfList, ImportLogger},
    kestrel_core::{logging, LogFilter},
    std::path::{Path, PathBuf},
};

/// glTF importer: emits engine-native mesh / skeleton / scene assets.
#[derive(Parser)]
#[command(name = "legsmi", version, disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ImportArgs {
    /// Mounted data root the destination lives under.
    #[arg(long, value_name = "DIR")]
    data_root: Option<PathBuf>,
    /// Destination directory; defaults to <data-root>/<gltf stem>.
    #[arg(long, value_name = "DIR")]
    dest_dir: Option<PathBuf>,
    /// Debug-level logging.
    #[arg(long)]
    verbose: bool,
    /// Overwrite pre-existing target files instead of reusing them.
    #[arg(long)]
    overwrite: bool,
    /// Source .gltf / .glb file.
    gltf: PathBuf,
    /// Mesh / scene indices to import (default: all).
    indices: Vec<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Import meshes (with their materials, textures and skeletons).
    Mesh(ImportArgs),
    /// Import scenes (meshes included) as scene manifests.
    Scene(ImportArgs),
    /// Print the scene and mesh indices of a glTF file.
    List {
        #[arg(long)]
        verbose: bool,
        gltf: PathBuf,
    },
}

fn main() {
    // Any failure, including unknown options, exits 1 with the message on
    // stderr.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help/version requests print to stdout and succeed.
            if e.use_stderr() {
                eprintln!("{e}");
                std::process::exit(1);
            }
            print!("{e}");
            return;
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("legsmi: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::List { verbose, gltf } => {
            init_logging(verbose)?;
            // Keep stdout machine readable: listing output only.
            let logger = ImportLogger {
                filter: LogFilter::default().silence(log::Level::Info),
            };
            let list = GltfList::peek(&gltf, &logger)?;
            println!("scenes:");
            for scene in &list.scenes {
                println!("  [{}] {}", scene.index, display_name(&scene.name));
            }
            println!("meshes:");
            for mesh in &list.meshes {
                let kind = if mesh.skinned { "skinned" } else { "static" };
                println!("  [{}] {} ({kind})", mesh.index, display_name(&mesh.name));
            }
            Ok(())
        }
        Command::Mesh(args) => {
            init_logging(args.verbose)?;
            let mut importer = importer(&args)?;
            let list = GltfList::peek(&args.gltf, &ImportLogger::default())?;
            let indices =
                resolve_indices(&args.indices, list.meshes.iter().map(|mesh| mesh.index), "mesh")?;
            if indices.is_empty() {
                return Err(anyhow!("no importable meshes in {}", args.gltf.display()));
            }
            for index in indices {
                let uri = importer.import_mesh(index)?;
                println!("{uri}");
            }
            Ok(())
        }
        Command::Scene(args) => {
            init_logging(args.verbose)?;
            let mut importer = importer(&args)?;
            let list = GltfList::peek(&args.gltf, &ImportLogger::default())?;
            let indices = resolve_indices(
                &args.indices,
                list.scenes.iter().map(|scene| scene.index),
                "scene",
            )?;
            if indices.is_empty() {
                return Err(anyhow!("no scenes in {}", args.gltf.display()));
            }
            for index in indices {
                let uri = importer.import_scene(index)?;
                println!("{uri}");
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    logging::init_with_level(level).map_err(|e| anyhow!("logging setup failed: {e}"))
}

fn importer(args: &ImportArgs) -> Result<GltfImporter> {
    let stem = args
        .gltf
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "import".into());
    let dest = match (&args.dest_dir, &args.data_root) {
        (Some(dest), _) => dest.clone(),
        (None, Some(root)) => root.join(&stem),
        (None, None) => Path::new(".").join(&stem),
    };
    GltfImporter::new(&args.gltf, dest, args.overwrite, ImportLogger::default())
}

fn resolve_indices(
    requested: &[usize],
    available: impl Iterator<Item = usize>,
    kind: &str,
) -> Result<Vec<usize>> {
    let available: Vec<usize> = available.collect();
    if requested.is_empty() {
        return Ok(available);
    }
    for index in requested {
        if !available.contains(index) {
            return Err(anyhow!("no {kind} with index {index} (run `legsmi list`)"));
        }
    }
    Ok(requested.to_vec())
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "(unnamed)"
    } else {
        name
    }
}
