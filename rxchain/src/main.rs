mod args;
mod console;
mod store;

use args::Args;
use clap::Parser;
use rxchain_engine::Engine;
use rxchain_engine::device::ProcessDrivers;
use rxchain_messages::{Command, Config};

use log::{LevelFilter, error, info};
use std::io::{BufRead, Write};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let engine_level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::builder()
        .format(|buf, record| {
            writeln!(
                buf,
                "{:<5} - mod path |{}| - target | {} | args: |{}|",
                record.level(),
                record.module_path().unwrap_or(""),
                record.target(),
                record.args()
            )
        })
        .filter_level(LevelFilter::Warn)
        .filter_module("rxchain_engine", engine_level)
        .filter_module("rxchain", engine_level)
        .init();

    let store_path = store::default_path();
    if args.reset {
        store::reset(&store_path)?;
    }
    let mut config = store::load(&store_path)?;
    args.apply(&mut config);
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    // Create flume channels for bidirectional communication
    let (cmd_tx, cmd_rx) = flume::unbounded();
    let (event_tx, event_rx) = flume::unbounded();

    // Spawn engine thread
    let engine_handle = std::thread::spawn(move || -> anyhow::Result<Config> {
        let engine = Engine::new(cmd_rx, event_tx, config, &ProcessDrivers::default())?;
        engine.run()
    });

    // Print events until the engine is gone
    let printer = std::thread::spawn(move || {
        for event in event_rx.iter() {
            println!("{}", console::describe(&event));
        }
        println!("Engine stopped, press enter to exit");
    });

    println!("{}", console::HELP);
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        match console::parse(&line) {
            Ok(Some(command)) => {
                let stop = command == Command::Stop;
                if cmd_tx.send(command).is_err() || stop {
                    break;
                }
            }
            Ok(None) => {
                if engine_handle.is_finished() {
                    break;
                }
            }
            Err(e) => println!("{}", e),
        }
    }

    // Console has exited - send stop command to engine
    let _ = cmd_tx.send(Command::Stop);

    let result = engine_handle
        .join()
        .map_err(|_| anyhow::anyhow!("Engine thread panicked"))?;
    let _ = printer.join();

    match result {
        Ok(config) => {
            info!("Engine finished");
            store::save(&store_path, &config)
        }
        Err(e) => {
            error!("Engine failed: {:#}", e);
            Err(e)
        }
    }
}
