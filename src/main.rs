use std::process::ExitCode;

use eframe::egui;

use tilefe::app::TileFEApp;
use tilefe::{cli, log_err, logger};

fn main() -> ExitCode {
    // -- CLI / headless mode ------------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        return cli::run(args);
    }

    // -- GUI mode -----------------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_title("TileFE"),
        ..Default::default()
    };

    match eframe::run_native("TileFE", options, Box::new(|cc| Box::new(TileFEApp::new(cc)))) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_err!("eframe exited with error: {}", e);
            eprintln!("TileFE failed to start: {}", e);
            ExitCode::FAILURE
        }
    }
}
