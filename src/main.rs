use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use photobooth::background::BackgroundSelector;
use photobooth::booth::{Booth, BoothError};
use photobooth::capture::{self, StillFrames};
use photobooth::config::Config;
use photobooth::segmentation::{self, SegmentationModel};
use photobooth::session::SessionError;
use photobooth::store::{self, JsonFileStore, KeyValueStore, SessionSettings};
use photobooth::strip::{FrameSkin, PhotoSize, StackDirection, StripAssembler};
use photobooth::{Backdrop, FrameCompositor};
use std::io::BufRead;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about = "Photobooth with background replacement", long_about = None)]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Key-value store holding settings and captured shots
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Choose photo count, size and background for the next session
    Configure {
        /// Number of photos to take
        #[arg(short, long)]
        quantity: Option<usize>,

        /// Photo aspect: Portrait, Square or Landscape
        #[arg(short, long)]
        size: Option<PhotoSize>,

        /// Background: CSS color, image path or data URI
        #[arg(short, long, conflicts_with = "upload")]
        background: Option<String>,

        /// Use an image file as the background
        #[arg(short, long)]
        upload: Option<PathBuf>,
    },

    /// Run a capture session
    Shoot(ShootArgs),

    /// Lay out the captured shots as a framed strip
    Strip {
        /// Stack direction: vertical or horizontal (remembered)
        #[arg(short, long)]
        orientation: Option<StackDirection>,

        /// Frame artwork: a size name or a file in the frames directory
        #[arg(short, long)]
        skin: Option<String>,

        /// Where to write the strip image
        #[arg(long)]
        output: PathBuf,
    },

    /// Composite a single frame over a background
    Compose {
        /// Camera frame
        #[arg(long)]
        frame: PathBuf,

        /// Grayscale matte, white = subject
        #[arg(long)]
        matte: PathBuf,

        /// Background: CSS color, image path or data URI
        #[arg(long)]
        background: Option<String>,

        #[arg(long)]
        output: PathBuf,
    },

    /// Write the slot thumbnails of the stored session
    Preview {
        #[arg(long)]
        output_dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ShootArgs {
    /// Still images used as camera frames, replayed in order
    #[arg(long, num_args = 1.., conflicts_with = "device")]
    frames: Vec<PathBuf>,

    /// Webcam device index (needs the `webcam` feature)
    #[arg(long)]
    device: Option<u32>,

    /// Grayscale matte applied to every frame, white = subject
    #[arg(long, conflicts_with = "model")]
    matte: Option<PathBuf>,

    /// Path to segmentation model (ONNX file, needs the `rvm` feature)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Slots (1-based) to retake once every photo is taken
    #[arg(long)]
    retake: Vec<usize>,

    /// Continue the stored session instead of starting empty
    #[arg(long)]
    resume: bool,

    /// Read commands from stdin: c (capture), r N (retake slot N),
    /// s (status), f (finish), q (quit without saving)
    #[arg(short, long)]
    interactive: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    let store_path = cli
        .store
        .clone()
        .unwrap_or_else(|| config.store.resolved_path());
    let mut store = JsonFileStore::open(&store_path).context("Failed to open store")?;
    tracing::debug!("Using store {}", store.path().display());

    match cli.command {
        Command::Configure {
            quantity,
            size,
            background,
            upload,
        } => configure(&mut store, &config, quantity, size, background, upload),
        Command::Shoot(args) => shoot(&mut store, &config, args),
        Command::Strip {
            orientation,
            skin,
            output,
        } => strip(&mut store, &config, orientation, skin, &output),
        Command::Compose {
            frame,
            matte,
            background,
            output,
        } => compose(&config, &frame, &matte, background.as_deref(), &output),
        Command::Preview { output_dir } => preview(&store, &config, &output_dir),
    }
}

fn configure(
    store: &mut dyn KeyValueStore,
    config: &Config,
    quantity: Option<usize>,
    size: Option<PhotoSize>,
    background: Option<String>,
    upload: Option<PathBuf>,
) -> Result<()> {
    let mut settings = SessionSettings::load(store, &config.session)?;

    if let Some(quantity) = quantity {
        if quantity == 0 || quantity > config.session.total_slots {
            anyhow::bail!(
                "Photo quantity must be between 1 and {}, got {}",
                config.session.total_slots,
                quantity
            );
        }
        settings.max_photos = quantity;
    }
    if let Some(size) = size {
        settings.photo_size = size;
    }

    let mut selector = BackgroundSelector::new(config.session.default_background.clone());
    selector.select(settings.background.clone());
    if let Some(background) = background {
        selector
            .select_setting(&background)
            .context("Invalid background")?;
    }
    if let Some(path) = upload {
        let bytes =
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        selector
            .set_from_upload(&bytes)
            .with_context(|| format!("Cannot use {} as background", path.display()))?;
    }
    settings.background = selector.resolve();

    settings.save(store)?;
    tracing::info!(
        "Next session: {} {} photo(s) on {}",
        settings.max_photos,
        settings.photo_size,
        settings.background.describe()
    );
    Ok(())
}

fn open_camera(args: &ShootArgs) -> Result<Option<Box<dyn capture::CaptureSource>>> {
    if !args.frames.is_empty() {
        return Ok(Some(Box::new(StillFrames::new(args.frames.clone())?)));
    }
    match args.device {
        Some(device) => Ok(Some(capture::open_webcam(device)?)),
        None => Ok(None),
    }
}

fn open_model(args: &ShootArgs) -> Result<Option<Box<dyn SegmentationModel>>> {
    if let Some(matte) = &args.matte {
        return Ok(Some(segmentation::open_still_matte(matte)?));
    }
    match &args.model {
        Some(model) => {
            tracing::info!("Loading segmentation model from {}", model.display());
            Ok(Some(segmentation::create_default_model(model)?))
        }
        None => Ok(None),
    }
}

fn shoot(store: &mut JsonFileStore, config: &Config, args: ShootArgs) -> Result<()> {
    let mut booth = Booth::from_store(store, &config.session)?;
    if args.resume {
        booth.restore_from(store)?;
    }

    match open_camera(&args) {
        Ok(Some(camera)) => booth.attach_camera(camera),
        Ok(None) => tracing::warn!("No camera given (--frames or --device)"),
        Err(e) => tracing::error!("Cannot access camera: {:#}", e),
    }
    match open_model(&args) {
        Ok(Some(model)) => booth.attach_model(model),
        Ok(None) => tracing::warn!("No segmentation given (--matte or --model)"),
        Err(e) => tracing::error!("Cannot load segmentation: {:#}", e),
    }

    if args.interactive {
        return run_interactive(&mut booth, store);
    }

    while !booth.session().is_full() {
        booth.snap()?;
    }
    for slot in &args.retake {
        let index = slot
            .checked_sub(1)
            .with_context(|| format!("Slots are numbered from 1, got {}", slot))?;
        booth.select_retake(index)?;
        booth.snap()?;
    }

    let finished = booth.finish(store)?;
    println!(
        "Saved {} photo(s) to {}",
        finished.len(),
        store.path().display()
    );
    Ok(())
}

fn run_interactive(booth: &mut Booth, store: &mut JsonFileStore) -> Result<()> {
    println!("Commands: c = capture, r N = retake slot N, s = status, f = finish, q = quit");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read command")?;
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("c"), _) => match booth.snap() {
                Ok(slot) => println!("Captured photo {}", slot + 1),
                // User-recoverable: tell them and keep going
                Err(e @ (BoothError::NotReady(_) | BoothError::Session(SessionError::Capacity { .. }))) => {
                    println!("{}", e)
                }
                Err(e) => println!("Capture failed: {}", e),
            },
            (Some("r"), Some(n)) => {
                let index = n.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
                match index.map(|i| booth.select_retake(i)) {
                    Some(Ok(())) => println!("Next capture replaces photo {}", n),
                    Some(Err(e)) => println!("{}", e),
                    None => println!("Not a slot number: {}", n),
                }
            }
            (Some("s"), _) => print_status(booth)?,
            (Some("f"), _) => break,
            (Some("q"), _) => {
                println!("Quit without saving");
                return Ok(());
            }
            (None, _) => {}
            _ => println!("Unknown command: {}", line.trim()),
        }
    }

    let finished = booth.finish(store)?;
    println!("Saved {} photo(s)", finished.len());
    Ok(())
}

fn print_status(booth: &Booth) -> Result<()> {
    for thumb in booth.thumbnails()? {
        let state = if thumb.disabled {
            "disabled"
        } else if thumb.filled {
            "taken"
        } else {
            "empty"
        };
        let marker = if thumb.selected { " <- retake" } else { "" };
        println!("  photo {}: {}{}", thumb.index + 1, state, marker);
    }
    Ok(())
}

fn strip(
    store: &mut dyn KeyValueStore,
    config: &Config,
    orientation: Option<StackDirection>,
    skin: Option<String>,
    output: &Path,
) -> Result<()> {
    let captures = store::load_captured_shots(store)?;
    if captures.is_empty() {
        anyhow::bail!("No captured photos in the store; run `photobooth shoot` first");
    }
    let photo_size = store::load_strip_photo_size(store)?;

    if let Some(direction) = orientation {
        store::save_orientation(store, direction)?;
    }
    let direction = match orientation {
        Some(direction) => Some(direction),
        None => store::load_orientation(store)?,
    };

    let assembler = StripAssembler::from_config(&config.strip);
    let mut layout = assembler.layout(&captures, photo_size, &FrameSkin::for_size(photo_size));
    if let Some(direction) = direction {
        layout.set_direction(direction);
    }
    if let Some(key) = skin {
        layout.set_skin(FrameSkin::from_key(key));
    }

    let rendered = assembler.render(&layout, &captures)?;
    rendered
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let (width, height) = layout.dimensions();
    println!(
        "Wrote {}x{} {} strip of {} photo(s) to {}",
        width,
        height,
        layout.direction(),
        captures.len(),
        output.display()
    );
    Ok(())
}

fn compose(
    config: &Config,
    frame: &Path,
    matte: &Path,
    background: Option<&str>,
    output: &Path,
) -> Result<()> {
    let frame = image::open(frame)
        .with_context(|| format!("Failed to load frame {}", frame.display()))?
        .to_rgb8();

    let mut model = segmentation::open_still_matte(matte)?;
    let mask = model.segment_mask(&frame, config.session.mask_threshold)?;

    let mut selector = BackgroundSelector::new(config.session.default_background.clone());
    if let Some(background) = background {
        selector
            .select_setting(background)
            .context("Invalid background")?;
    }
    let backdrop = Backdrop::new(selector.resolve());

    let frame = image::DynamicImage::ImageRgb8(frame).to_rgba8();
    let composite = FrameCompositor::new().composite(&frame, &mask, &backdrop)?;
    composite
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn preview(store: &dyn KeyValueStore, config: &Config, output_dir: &Path) -> Result<()> {
    let mut booth = Booth::from_store(store, &config.session)?;
    booth.restore_from(store)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    for thumb in booth.thumbnails()? {
        let path = output_dir.join(format!("slot-{}.png", thumb.index + 1));
        thumb
            .display_image()
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    println!("Wrote {} thumbnail(s) to {}", booth.session().total_slots(), output_dir.display());
    Ok(())
}
