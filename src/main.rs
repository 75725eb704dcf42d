use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use skelkin::{BvhExport, ChannelTarget, InterpType, Motion, MotionBuilderMode, NameTable, Result, Skeleton};

/// Inspect and convert skeletal motion files
#[derive(Parser)]
#[command(name = "skelkin")]
#[command(about = "Skeletal kinematics tools for BVH and .sm motions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a skeleton and motion summary of a .bvh or .sm file
    Info { file: PathBuf },

    /// Convert a BVH motion into the .sm text format
    Convert { input: PathBuf, output: PathBuf },

    /// Re-export a BVH file
    Export {
        input: PathBuf,
        output: PathBuf,
        /// Sampling rate of the written frames
        #[arg(long, default_value_t = 30.0)]
        fps: f32,
        #[arg(long, value_enum, default_value_t = Mode::Standard)]
        mode: Mode,
    },

    /// Print global joint positions after applying a BVH motion at a time
    Sample { input: PathBuf, time: f32 },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Standard,
    OmitLeafChannels,
    EndSiteLeaves,
}

impl From<Mode> for MotionBuilderMode {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Standard => MotionBuilderMode::Standard,
            Mode::OmitLeafChannels => MotionBuilderMode::OmitLeafChannels,
            Mode::EndSiteLeaves => MotionBuilderMode::EndSiteLeaves,
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Info { file } => info(&file),
        Commands::Convert { input, output } => convert(&input, &output),
        Commands::Export {
            input,
            output,
            fps,
            mode,
        } => export(&input, &output, fps, mode.into()),
        Commands::Sample { input, time } => sample(&input, time),
    };

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn is_sm(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("sm"))
}

fn print_skeleton(sk: &Skeleton) {
    println!("skeleton {} ({} joints)", sk.name(), sk.len());
    for id in sk.dfs_order() {
        let mut depth = 0;
        let mut p = sk.joint(id).parent();
        while let Some(pid) = p {
            depth += 1;
            p = sk.joint(pid).parent();
        }
        let j = sk.joint(id);
        println!("{:indent$}{} {:?}", "", j.name(), j.rot_type(), indent = depth * 2);
    }
}

fn print_motion(m: &Motion) {
    let channels = m.channels().borrow();
    println!(
        "motion {}: {} frames, {:.3}s, {} channels ({} floats)",
        m.name(),
        m.len(),
        m.duration(),
        channels.len(),
        channels.floats()
    );
}

fn info(path: &Path) -> Result<()> {
    if is_sm(path) {
        let m = Motion::load_sm(path, NameTable::new())?;
        print_motion(&m);
    } else {
        let bvh = Motion::load_bvh_file(path)?;
        print_skeleton(&bvh.skeleton);
        print_motion(&bvh.motion);
    }
    Ok(())
}

fn convert(input: &Path, output: &Path) -> Result<()> {
    let bvh = Motion::load_bvh_file(input)?;
    bvh.motion.save_sm(output)?;
    log::info!("wrote {} frames to {}", bvh.motion.len(), output.display());
    Ok(())
}

fn export(input: &Path, output: &Path, fps: f32, mode: MotionBuilderMode) -> Result<()> {
    let mut bvh = Motion::load_bvh_file(input)?;
    let cfg = BvhExport::default().with_fps(fps).with_mode(mode);
    bvh.motion.save_bvh_file(output, &mut bvh.skeleton, &cfg)?;
    log::info!("exported {} to {}", input.display(), output.display());
    Ok(())
}

fn sample(input: &Path, time: f32) -> Result<()> {
    let mut bvh = Motion::load_bvh_file(input)?;
    let sk = &mut bvh.skeleton;
    bvh.motion.apply(time, InterpType::Linear, None, ChannelTarget::Skeleton(&mut *sk));
    sk.update_global_matrices();
    for id in sk.dfs_order() {
        let j = sk.joint(id);
        let p = j.gcenter();
        println!("{} {:.6} {:.6} {:.6}", j.name(), p.x, p.y, p.z);
    }
    Ok(())
}
