use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use glam::Vec3;
use tracing_subscriber::EnvFilter;

use zonesave_common::ClassRef;
use zonesave_engine::{SaveEngine, SaveSettings};
use zonesave_persist::{Staging, decode_snapshot};
use zonesave_world::{ClassSpec, PropertyBag, PropertyValue, World, ZoneExtents, ZoneIndex};

#[derive(Parser)]
#[command(name = "zonesave-cli", about = "CLI tool for zone save data")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Saved-games root directory
    #[arg(long, default_value = "Saved/SaveGames")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the configured save layout
    Info,
    /// Run a scripted capture/restore cycle against the save root
    Demo {
        /// Slot to write the demo save into
        #[arg(short, long, default_value = "DemoSlot")]
        slot: String,
    },
    /// Decode and summarize staged zone blobs
    Inspect {
        /// Slot to inspect; omit to inspect the scratch area
        #[arg(short, long)]
        slot: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let settings = SaveSettings::default().with_root(&cli.root);

    match cli.command {
        Commands::Info => {
            println!("zonesave-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("saved-games root: {}", settings.saved_games_root.display());
            println!("scratch folder:   {}", settings.temp_folder);
            println!("slot zone folder: {}", settings.zones_folder);
            println!("flush workers:    {}", settings.workers);
        }
        Commands::Demo { slot } => run_demo(settings, &slot)?,
        Commands::Inspect { slot } => inspect(&settings, slot.as_deref()),
    }

    Ok(())
}

/// Scripted session: loot a chest, drop a crate, stream the zone out and
/// back in, then commit the save slot.
fn run_demo(settings: SaveSettings, slot: &str) -> anyhow::Result<()> {
    let chest = ClassRef::new("/Game/Classes/Chest");
    let crate_class = ClassRef::new("/Game/Classes/Crate");

    let mut world = World::new();
    world.register_class(
        ClassSpec::new(chest.as_str())
            .with_props(PropertyBag::new().with("gold", PropertyValue::Int(100))),
    );
    world.register_class(ClassSpec::new(crate_class.as_str()).runtime_tracked());

    let zone = world.add_zone("/Game/Maps/Forest_01");
    let chest_id = world
        .spawn_static(&zone, "Chest_1", &chest)
        .ok_or_else(|| anyhow::anyhow!("chest class not registered"))?;

    let mut index = ZoneIndex::new();
    index.add(
        zone.clone(),
        ZoneExtents::new(Vec3::ZERO, Vec3::new(100.0, 0.0, 100.0)),
    );
    let mut engine = SaveEngine::new(settings, Box::new(index));

    engine.zone_becoming_visible(&mut world, &zone);
    if let Some(e) = world.entity_mut(chest_id) {
        e.props.set("gold", PropertyValue::Int(0));
    }
    world
        .spawn_runtime(
            &crate_class,
            zonesave_common::Transform {
                position: Vec3::new(10.0, 0.0, 10.0),
                ..Default::default()
            },
        )
        .ok_or_else(|| anyhow::anyhow!("crate class not registered"))?;
    println!(
        "before stream-out: {} static, {} runtime",
        world.zone(&zone).map_or(0, |z| z.entity_count()),
        world.runtime_entity_count()
    );

    engine.zone_becoming_invisible(&mut world, &zone);
    while engine.flush_in_flight(&zone) {
        if !engine.pump_blocking(&mut world, Duration::from_secs(5)) {
            anyhow::bail!("zone flush did not finish");
        }
    }
    world.remove_zone(&zone);
    println!("zone streamed out; runtime entities: {}", world.runtime_entity_count());

    let zone = world.add_zone("/Game/Maps/Forest_01");
    world
        .spawn_static(&zone, "Chest_1", &chest)
        .ok_or_else(|| anyhow::anyhow!("chest class not registered"))?;
    engine.zone_becoming_visible(&mut world, &zone);
    if !engine.pump_blocking(&mut world, Duration::from_secs(5)) {
        anyhow::bail!("zone restore did not finish");
    }
    println!(
        "after stream-in: {} static, {} runtime",
        world.zone(&zone).map_or(0, |z| z.entity_count()),
        world.runtime_entity_count()
    );

    engine.begin_sequence(slot, true);
    engine.end_sequence(&mut world);
    for note in engine.drain_notifications() {
        println!("notification: {note:?}");
    }
    println!("slot files: {:?}", engine.staging().list_slot_files(slot));
    engine.teardown();
    Ok(())
}

fn inspect(settings: &SaveSettings, slot: Option<&str>) {
    let staging = Staging::new(
        settings.saved_games_root.clone(),
        settings.temp_folder.clone(),
        settings.zones_folder.clone(),
    );
    let (label, dir, files) = match slot {
        Some(slot) => (
            format!("slot {slot}"),
            staging.slot_zones_dir(slot),
            staging.list_slot_files(slot),
        ),
        None => ("scratch".to_string(), staging.temp_dir(), staging.list_temp_files()),
    };
    if files.is_empty() {
        println!("{label}: no zone blobs under {}", dir.display());
        return;
    }
    println!("{label}: {} zone blob(s)", files.len());
    for file in files {
        let path = dir.join(&file);
        match std::fs::read(&path).ok().and_then(|b| decode_snapshot(&b)) {
            Some(snap) => println!(
                "  {file}: {} record(s), {} tombstone(s), {} runtime",
                snap.records.len(),
                snap.destroyed.len(),
                snap.runtime.len()
            ),
            None => println!("  {file}: unreadable"),
        }
    }
}
