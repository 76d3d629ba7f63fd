use clap::Parser;
use pixel_thumb::{Args, CatalogPipeline, UpdateKind};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let mut pipeline = CatalogPipeline::new(args.pipeline_config(), runtime.handle().clone())?;
    pipeline.set_display_settings(args.display_settings());

    pipeline.subscribe(|update| {
        if let UpdateKind::Status(text) = &update.kind {
            println!("{}", text);
        }
    });

    pipeline.load(args.directories.clone());

    let bounds = args.filter_bounds();
    if bounds.is_active() {
        pipeline.set_filter_bounds(bounds);
    }

    runtime.block_on(pipeline.settle());

    let settings = pipeline.display_settings();
    println!();
    for entry in pipeline.visible_entries() {
        let size = pipeline.display_size(entry);
        let (x, y) = size.centered_origin(settings.container_size);
        println!(
            "{:<40} {:>13} {:>10}  {:>7.1} x {:<7.1} at ({:.1}, {:.1})  {:?}",
            entry.file_name(),
            entry.resolution_text(),
            entry.file_size_text(),
            size.width,
            size.height,
            x,
            y,
            entry.status()
        );
    }

    Ok(())
}
