use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use tonetransfer_core::{
    decode_image_file, encode_image_file, FaceRect, PipelineConfig, Preset, SkinRegions,
    TransferOptions, TransferPipeline,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tonetransfer")]
#[command(version, about = "Statistical color and skin-tone transfer between photographs", long_about = None)]
struct Cli {
    /// Show debug diagnostics
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-grade TARGET with the color mood of REFERENCE
    Transfer {
        /// Image to re-grade
        #[arg(value_name = "TARGET")]
        target: PathBuf,

        /// Image whose colors are borrowed
        #[arg(value_name = "REFERENCE")]
        reference: PathBuf,

        /// Output file (format from extension). Defaults to <target>_transfer.jpg
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Starting preset (skin-and-mood, mood-only, crisp)
        #[arg(short, long, value_name = "NAME", default_value = "skin-and-mood")]
        preset: Preset,

        /// Pipeline configuration file (JSON), replaces the preset's tunables
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Transfer strength in percent
        #[arg(short, long, value_name = "0-100", value_parser = clap::value_parser!(u32).range(0..=100))]
        strength: Option<u32>,

        /// Match skin tone through the face regions
        #[arg(long, conflicts_with = "no_skin_boost")]
        skin_boost: bool,

        /// Disable the face-local skin pass
        #[arg(long)]
        no_skin_boost: bool,

        /// Keep the target's chrominance; only pull lightness and polish
        #[arg(long)]
        mood_only: bool,

        /// Apply an unsharp mask after the cosmetic pass
        #[arg(long)]
        sharpen: bool,

        /// Face region in the target (x,y,width,height)
        #[arg(long, value_name = "X,Y,W,H", requires = "reference_face")]
        target_face: Option<FaceRect>,

        /// Face region in the reference after resampling to the target size
        #[arg(long, value_name = "X,Y,W,H", requires = "target_face")]
        reference_face: Option<FaceRect>,

        /// JPEG quality
        #[arg(long, value_name = "1-100", default_value = "95", value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: u8,
    },

    /// List the built-in presets
    Presets,

    /// Write a preset's configuration as JSON
    InitConfig {
        /// Output file path
        output: PathBuf,

        /// Preset to export
        #[arg(short, long, value_name = "NAME", default_value = "skin-and-mood")]
        preset: Preset,
    },
}

/// Per-run overrides collected from the command line.
struct RunFlags {
    strength: Option<u32>,
    skin_boost: Option<bool>,
    mood_only: bool,
    sharpen: bool,
    faces: Option<(FaceRect, FaceRect)>,
    quality: u8,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Transfer {
            target,
            reference,
            out,
            preset,
            config,
            strength,
            skin_boost,
            no_skin_boost,
            mood_only,
            sharpen,
            target_face,
            reference_face,
            quality,
        } => {
            let flags = RunFlags {
                strength,
                skin_boost: skin_override(skin_boost, no_skin_boost),
                mood_only,
                sharpen,
                faces: target_face.zip(reference_face),
                quality,
            };
            cmd_transfer(target, reference, out, preset, config, flags)
        }

        Commands::Presets => cmd_presets(),

        Commands::InitConfig { output, preset } => cmd_init_config(output, preset),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn skin_override(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn cmd_transfer(
    target: PathBuf,
    reference: PathBuf,
    out: Option<PathBuf>,
    preset: Preset,
    config: Option<PathBuf>,
    flags: RunFlags,
) -> Result<(), String> {
    let pipeline_config = match &config {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            PipelineConfig::from_json_file(path).map_err(|e| e.to_string())?
        }
        None => preset.config(),
    };
    let options = build_options(preset, &flags)?;
    let output_path = out.unwrap_or_else(|| default_output_path(&target));

    tracing::info!(
        target_image = %target.display(),
        reference_image = %reference.display(),
        %preset,
        strength = options.strength.percent(),
        skin_boost = options.apply_skin_boost,
        mood_only = options.mood_only,
        "starting transfer"
    );

    let target_img = decode_image_file(&target).map_err(|e| e.to_string())?;
    let reference_img = decode_image_file(&reference).map_err(|e| e.to_string())?;

    if skin_pass_unavailable(&options, &flags) {
        tracing::warn!(
            "skin boost needs --target-face and --reference-face; running the global transfer only"
        );
    }

    let pipeline = TransferPipeline::new(pipeline_config);
    let result = match flags.faces {
        Some((target_face, reference_face)) => {
            let regions = SkinRegions {
                target: vec![target_face],
                reference: vec![reference_face],
            };
            pipeline.run_with_regions(&target_img, &reference_img, &options, &regions)
        }
        None => pipeline.run(&target_img, &reference_img, &options),
    }
    .map_err(|e| e.to_string())?;

    encode_image_file(&result, &output_path, flags.quality).map_err(|e| e.to_string())?;

    println!("Saved {}", output_path.display());
    Ok(())
}

/// Start from the preset's options and apply command-line overrides.
///
/// Supplying face regions turns skin boost on unless it was disabled
/// explicitly.
fn build_options(preset: Preset, flags: &RunFlags) -> Result<TransferOptions, String> {
    let mut options = preset.options();
    if let Some(percent) = flags.strength {
        options = options
            .with_strength_percent(percent)
            .map_err(|e| e.to_string())?;
    }
    match flags.skin_boost {
        Some(on) => options.apply_skin_boost = on,
        None if flags.faces.is_some() => options.apply_skin_boost = true,
        None => {}
    }
    options.mood_only |= flags.mood_only;
    options.apply_sharpen |= flags.sharpen;
    Ok(options)
}

/// The CLI has no face detector, so skin boost only runs on manual regions.
fn skin_pass_unavailable(options: &TransferOptions, flags: &RunFlags) -> bool {
    options.apply_skin_boost && flags.faces.is_none()
}

fn default_output_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    target.with_file_name(format!("{}_transfer.jpg", stem))
}

fn cmd_presets() -> Result<(), String> {
    for preset in Preset::ALL {
        let options = preset.options();
        let config = preset.config();
        println!("{}", preset);
        println!(
            "  strength {}%, skin boost {}, mood only {}, sharpen {}",
            options.strength.percent(),
            on_off(options.apply_skin_boost),
            on_off(options.mood_only),
            on_off(options.apply_sharpen)
        );
        println!(
            "  skin boost factor {:.2}, light weight {:.2}, contrast gain {:.2}, saturation gain {:.2}",
            config.transfer.skin_boost_factor,
            config.transfer.light_weight,
            config.polish.contrast_gain,
            config.polish.saturation_gain
        );
    }
    Ok(())
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn cmd_init_config(output: PathBuf, preset: Preset) -> Result<(), String> {
    preset
        .config()
        .to_json_file(&output)
        .map_err(|e| e.to_string())?;
    println!("Wrote {} configuration to {}", preset, output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn flags() -> RunFlags {
        RunFlags {
            strength: None,
            skin_boost: None,
            mood_only: false,
            sharpen: false,
            faces: None,
            quality: 95,
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/photos/portrait.png")),
            PathBuf::from("/photos/portrait_transfer.jpg")
        );
    }

    #[test]
    fn test_preset_options_kept_without_flags() {
        let options = build_options(Preset::Crisp, &flags()).unwrap();
        assert_eq!(options, Preset::Crisp.options());
    }

    #[test]
    fn test_flags_override_preset() {
        let run = RunFlags {
            strength: Some(40),
            skin_boost: Some(false),
            sharpen: true,
            ..flags()
        };
        let options = build_options(Preset::SkinAndMood, &run).unwrap();
        assert_eq!(options.strength.percent(), 40);
        assert!(!options.apply_skin_boost);
        assert!(options.apply_sharpen);
    }

    #[test]
    fn test_faces_enable_skin_boost() {
        let face = FaceRect::new(1, 1, 4, 4);
        let run = RunFlags {
            faces: Some((face, face)),
            ..flags()
        };
        assert!(build_options(Preset::MoodOnly, &run).unwrap().apply_skin_boost);

        let disabled = RunFlags {
            faces: Some((face, face)),
            skin_boost: Some(false),
            ..flags()
        };
        assert!(!build_options(Preset::MoodOnly, &disabled).unwrap().apply_skin_boost);
    }

    #[test]
    fn test_skin_pass_unavailable_without_faces() {
        let options = build_options(Preset::SkinAndMood, &flags()).unwrap();
        assert!(skin_pass_unavailable(&options, &flags()));

        let face = FaceRect::new(1, 1, 4, 4);
        let with_faces = RunFlags {
            faces: Some((face, face)),
            ..flags()
        };
        assert!(!skin_pass_unavailable(&options, &with_faces));

        let mood = build_options(Preset::MoodOnly, &flags()).unwrap();
        assert!(!skin_pass_unavailable(&mood, &flags()));
    }

    #[test]
    fn test_parse_transfer_args() {
        let cli = Cli::try_parse_from([
            "tonetransfer",
            "transfer",
            "a.jpg",
            "b.jpg",
            "--strength",
            "60",
            "--preset",
            "crisp",
            "--target-face",
            "10,10,50,50",
            "--reference-face",
            "0,0,20,20",
        ])
        .unwrap();
        match cli.command {
            Commands::Transfer {
                strength,
                preset,
                target_face,
                ..
            } => {
                assert_eq!(strength, Some(60));
                assert_eq!(preset, Preset::Crisp);
                assert_eq!(target_face, Some(FaceRect::new(10, 10, 50, 50)));
            }
            _ => panic!("expected transfer command"),
        }
    }

    #[test]
    fn test_rejects_bad_args() {
        let base = ["tonetransfer", "transfer", "a.jpg", "b.jpg"];
        let with = |extra: &[&'static str]| {
            Cli::try_parse_from(base.iter().copied().chain(extra.iter().copied()))
        };
        assert!(with(&["--strength", "101"]).is_err());
        assert!(with(&["--skin-boost", "--no-skin-boost"]).is_err());
        assert!(with(&["--target-face", "1,1,4,4"]).is_err(), "faces come in pairs");
        assert!(with(&["--preset", "vintage"]).is_err());
        assert!(with(&["--quality", "0"]).is_err());
    }
}
