use core::error::Error;

use clap::Parser;
use tokio::runtime::Builder;
use volley::{
    cfg::Config,
    cmd::{Cmd, OutputFormat},
    engine::Runtime,
};

pub fn main() {
    let cmd = Cmd::parse();
    if let Err(err) = volley::logging::init(cmd.verbose as usize) {
        eprintln!("ERROR: failed to initialize logging: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(cmd) {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}

fn run(cmd: Cmd) -> Result<(), Box<dyn Error>> {
    let cfg: Config = cmd.try_into()?;
    let output = cfg.output;

    println!("Dispatching {} clients", cfg.concurrency);

    // Init I/O runtime.
    let runtime = Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .thread_name("runtime")
        .build()?;

    let report = runtime.block_on(async {
        println!("Waiting for results...");

        Runtime::new(cfg).run(interrupt()).await
    })?;

    match output {
        OutputFormat::Text => println!("{report}"),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    // Do not wait for abandoned connections.
    runtime.shutdown_background();

    Ok(())
}

async fn interrupt() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("failed to listen for interrupt: {err}");
        core::future::pending::<()>().await;
    }
}
