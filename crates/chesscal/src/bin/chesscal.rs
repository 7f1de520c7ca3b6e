use chesscal::{format_report, run_remove_distortion, PipelineConfig};
use std::path::Path;

const CONFIG_FILE: &str = "chesscal.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(not(feature = "tracing"))]
    chesscal::core::init_with_level(log::LevelFilter::Info)?;
    #[cfg(feature = "tracing")]
    chesscal::core::init_tracing(false);

    let mut cfg = if Path::new(CONFIG_FILE).is_file() {
        log::info!("using {CONFIG_FILE}");
        PipelineConfig::load_json(CONFIG_FILE)?
    } else {
        PipelineConfig::default()
    };

    // A relative archive path lands next to the executable.
    let exe = std::env::current_exe()?;
    if let Some(dir) = exe.parent() {
        cfg.anchor_output(dir);
    }

    let (result, _) = run_remove_distortion(&cfg)?;
    println!("{}", format_report(&result));
    Ok(())
}
