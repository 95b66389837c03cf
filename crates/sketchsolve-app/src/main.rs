//! Main application entry point (native).

use sketchsolve_core::Settings;

fn main() {
    env_logger::init();
    log::info!("Starting SketchSolve");

    let settings = Settings::from_env();
    if let Err(e) = sketchsolve_app::App::run(settings) {
        log::error!("fatal: {e}");
        std::process::exit(1);
    }
}
