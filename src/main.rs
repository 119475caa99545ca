use std::{process, sync::Arc};

use clap::Parser;
use log::{error, info};

use stickynotes::{
    spawn_dispatcher, App, Cli, Config, HeadlessBackend, JsonFileBackend, PersistentStore, Result,
};

pub fn initialize_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.set_data_dir(data_dir);
    }

    let store = Arc::new(PersistentStore::open(Box::new(JsonFileBackend::new(
        config.store_path(),
    )))?);
    let (handle, task) = spawn_dispatcher(config, store, Arc::new(HeadlessBackend));

    let mut focus_status = handle.focus_status();
    tokio::spawn(async move {
        while focus_status.changed().await.is_ok() {
            let tooltip = focus_status.borrow_and_update().tooltip();
            info!("Tray tooltip: {}", tooltip);
        }
    });

    let app = App::new(handle.external(), cli.verbose);
    let result = app.run(cli.command).await;

    drop(app);
    drop(handle);
    if let Err(e) = task.await {
        error!("Dispatcher task failed: {}", e);
    }
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    info!("Application starting up");
    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
    info!("Application shutting down");
}
