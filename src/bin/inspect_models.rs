use anyhow::Result;
use sleep_timeline::ModelRepository;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        println!("Usage: {} <model_set_file_or_dir>", args[0]);
        std::process::exit(1);
    }

    let repository = ModelRepository::load(Path::new(&args[1]))?;

    println!("\n{} model(s):", repository.len());
    for model in repository.models() {
        println!("\n{}", model.name);
        println!("  window: {} min", model.window_minutes);
        println!(
            "  states: {} ({} free parameters)",
            model.num_states(),
            model.hmm.parameter_count()
        );
        println!("  sleep states: {:?}", model.sleep_states);
        println!("  on-bed states: {:?}", model.on_bed_states);
        println!("  allowable endings: {:?}", model.allowable_ending_states);
        println!(
            "  pill disturbance threshold: {} lsb",
            model.pill_magnitude_disturbance_threshold_lsb
        );
        println!(
            "  sound disturbance threshold: {} dB",
            model.sound_disturbance_threshold_db
        );
        println!(
            "  natural light filter: {}h to {}h",
            model.natural_light_filter_start_hour, model.natural_light_filter_stop_hour
        );
    }

    Ok(())
}
