use anyhow::{anyhow, bail, Context};
use crabeye::pin::properties::{group_name, PIN_PROPERTY_GROUP, PROPERTY_CATEGORY};
use crabeye::{
    AdapterConfig, CaptureSource, ChannelSink, FormatSpec, MediaFormat, MemoryAllocator,
    OutputPin, PropertySet, StreamConfig,
};
use serde_json::json;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const USAGE: &str = "Usage: crabeye-cli <devices|formats|caps|properties|capture> [args]
  capture [--frames N] [--format WxH@FPS] [--config PATH] [--snapshot PATH] [--json]";

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "devices" => cmd_devices(&args),
        "formats" => cmd_formats(&args),
        "caps" => cmd_caps(&args),
        "properties" => cmd_properties(&args),
        "capture" => cmd_capture(&args),
        _ => {
            eprintln!("Unknown command: {}\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

fn wants_json(args: &[String]) -> bool {
    args.iter().any(|a| a == "--json")
}

fn deviceless_source() -> anyhow::Result<CaptureSource> {
    Ok(CaptureSource::new(Vec::new(), &AdapterConfig::default())?)
}

fn cmd_devices(args: &[String]) -> anyhow::Result<()> {
    crabeye::init_logging();
    let names: Vec<String> = crabeye::platform::discover_devices()
        .iter()
        .map(|device| device.name())
        .collect();
    if wants_json(args) {
        println!("{}", serde_json::to_string(&names)?);
    } else if names.is_empty() {
        println!("No capture devices found");
    } else {
        for (index, name) in names.iter().enumerate() {
            println!("{}: {}", index, name);
        }
    }
    Ok(())
}

fn cmd_formats(args: &[String]) -> anyhow::Result<()> {
    let source = deviceless_source()?;
    let pin = source.pin();
    let mut formats = Vec::new();
    let mut index = 0;
    while let Ok(format) = pin.enumerate_format(index) {
        formats.push(format);
        index += 1;
    }

    if wants_json(args) {
        println!("{}", serde_json::to_string(&formats)?);
    } else {
        for (index, format) in formats.iter().enumerate() {
            println!("{}: {} ({} bytes)", index, format, format.byte_size());
        }
    }
    Ok(())
}

fn cmd_caps(args: &[String]) -> anyhow::Result<()> {
    let source = deviceless_source()?;
    let pin = source.pin();
    let (count, size) = pin.capability_count();

    let mut caps = Vec::new();
    for index in 0..count {
        caps.push(pin.capability_at(index)?);
    }

    if wants_json(args) {
        let entries: Vec<_> = caps
            .iter()
            .map(|(format, descriptor)| json!({ "format": format, "capability": descriptor }))
            .collect();
        println!("{}", serde_json::to_string(&entries)?);
    } else {
        println!("{} capabilities, {} bytes each", count, size);
        for (format, descriptor) in &caps {
            println!(
                "{}: interval {}..{}, granularity {}",
                format,
                descriptor.min_frame_interval,
                descriptor.max_frame_interval,
                descriptor.output_granularity_x
            );
        }
    }
    Ok(())
}

fn cmd_properties(args: &[String]) -> anyhow::Result<()> {
    let source = deviceless_source()?;
    let pin = source.pin();
    let category = pin.get(&PIN_PROPERTY_GROUP, PROPERTY_CATEGORY)?;
    let support = pin.query_supported(&PIN_PROPERTY_GROUP, PROPERTY_CATEGORY)?;

    if wants_json(args) {
        println!(
            "{}",
            json!({
                "group": PIN_PROPERTY_GROUP,
                "property": PROPERTY_CATEGORY,
                "value": category,
                "support": support,
                "registration": source.registration(),
            })
        );
    } else {
        println!(
            "{} property group {}: category = {:?} (get: {}, set: {})",
            group_name(&PIN_PROPERTY_GROUP),
            PIN_PROPERTY_GROUP,
            category,
            support.get,
            support.set
        );
        let registration = source.registration();
        println!(
            "Registered as '{}' ({}), pin '{}'",
            registration.name, registration.component_id, registration.output_pin
        );
    }
    Ok(())
}

struct CaptureArgs {
    frames: u64,
    format: Option<FormatSpec>,
    config: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    json: bool,
}

fn parse_capture_args(args: &[String]) -> anyhow::Result<CaptureArgs> {
    let mut parsed = CaptureArgs {
        frames: 30,
        format: None,
        config: None,
        snapshot: None,
        json: false,
    };

    let mut i = 2;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| anyhow!("{} needs a value", flag))
        };
        match flag {
            "--frames" => parsed.frames = value()?.parse().context("invalid --frames")?,
            "--format" => {
                parsed.format = Some(value()?.parse().map_err(|e: String| anyhow!(e))?)
            }
            "--config" => parsed.config = Some(PathBuf::from(value()?)),
            "--snapshot" => parsed.snapshot = Some(PathBuf::from(value()?)),
            "--json" => parsed.json = true,
            other => bail!("Unknown capture argument: {}", other),
        }
        i += 1;
    }
    Ok(parsed)
}

fn cmd_capture(args: &[String]) -> anyhow::Result<()> {
    let options = parse_capture_args(args)?;

    let mut config = match &options.config {
        Some(path) => AdapterConfig::load_from_file(path)?,
        None => AdapterConfig::load_or_default(),
    };
    if let Some(format) = options.format {
        config.stream.format = Some(format);
    }
    crabeye::init_logging_with_level(&config.logging.level);

    let source = CaptureSource::discover(&config)?;
    let (sink, frames) = ChannelSink::bounded(4);
    let format = source.pin().connect(Arc::new(sink))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    let streamer = source.streamer(Arc::new(MemoryAllocator::new()));
    streamer.activate()?;
    let started = Instant::now();

    let mut received = 0u64;
    let mut last_frame = None;
    let mut first_time = None;
    let mut last_time = None;
    while !interrupted.load(Ordering::SeqCst) && (options.frames == 0 || received < options.frames)
    {
        let Ok(sample) = frames.recv_timeout(Duration::from_millis(100)) else {
            if let Some(error) = streamer.last_error() {
                log::error!("Stream ended: {}", error);
                break;
            }
            continue;
        };
        received += 1;
        if let Some((start, _)) = sample.times() {
            first_time.get_or_insert(start);
            last_time = Some(start);
        }
        if !options.json && received % 30 == 0 {
            println!("{} frames", received);
        }
        if options.snapshot.is_some() {
            last_frame = Some(sample.data().to_vec());
        }
    }

    let delivered = streamer.deactivate()?;
    let elapsed = started.elapsed();

    if let (Some(path), Some(data)) = (&options.snapshot, &last_frame) {
        save_snapshot(path, &format, data)?;
    }

    if options.json {
        println!(
            "{}",
            json!({
                "format": format,
                "device": source.pin().device_name(),
                "frames": received,
                "delivered": delivered,
                "elapsed_ms": elapsed.as_millis() as u64,
                "first_start": first_time,
                "last_start": last_time,
            })
        );
    } else {
        println!(
            "Captured {} frames at {} from {} in {:.2}s",
            received,
            format,
            source
                .pin()
                .device_name()
                .unwrap_or_else(|| "no device".to_string()),
            elapsed.as_secs_f64()
        );
    }
    Ok(())
}

fn save_snapshot(path: &Path, format: &MediaFormat, bgra: &[u8]) -> anyhow::Result<()> {
    let mut rgba = bgra[..format.byte_size()].to_vec();
    for pixel in rgba.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
    let image = image::RgbaImage::from_raw(
        format.width.unsigned_abs(),
        format.height.unsigned_abs(),
        rgba,
    )
    .ok_or_else(|| anyhow!("frame does not match {}", format))?;
    image
        .save(path)
        .with_context(|| format!("failed to save snapshot to {}", path.display()))?;
    println!("Saved snapshot to {}", path.display());
    Ok(())
}
