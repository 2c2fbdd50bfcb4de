use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::Context;
use tutor_core::{update, AppState, Msg};
use tutor_engine::{EngineHandle, ReqwestTutorClient};
use tutor_logging::{tutor_info, tutor_warn, LevelFilter, LogDestination, DEFAULT_LOG_FILE};

use crate::config::{AppConfig, DEFAULT_CONFIG_FILE};
use crate::effects::EffectRunner;
use crate::ui::input::{parse_line, Command, HELP};
use crate::ui::render::Renderer;

pub fn run_app() -> anyhow::Result<()> {
    let config = AppConfig::load(Path::new(DEFAULT_CONFIG_FILE))?;

    let log_file = PathBuf::from(DEFAULT_LOG_FILE);
    let destination = if config.log_to_terminal {
        LogDestination::Both(log_file)
    } else {
        LogDestination::File(log_file)
    };
    tutor_logging::initialize(destination, LevelFilter::Info);
    tutor_info!("Starting tutor against {}", config.api_base);

    let client = Arc::new(
        ReqwestTutorClient::new(config.service_settings()).context("building service client")?,
    );
    probe_service(&config);

    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let engine = EngineHandle::with_settings(client, config.engine_settings());
    let runner = EffectRunner::new(engine.clone(), msg_tx.clone());
    engine.start_poll_timer(config.poll_period());
    spawn_input_reader(msg_tx);

    let state =
        AppState::with_greeting(config.greeting.clone()).with_policy(config.poll_policy());
    let (mut state, _) = update(state, Msg::QualitySelected(config.quality()));

    let mut renderer = Renderer::new();
    let mut stdout = io::stdout();
    println!("{HELP}\n");
    renderer.render(&mut stdout, &state.view())?;
    state.consume_dirty();

    while let Ok(msg) = msg_rx.recv() {
        let (next, effects) = update(state, msg);
        state = next;
        runner.enqueue(effects);
        if state.consume_dirty() {
            renderer.render(&mut stdout, &state.view())?;
        }
        if state.is_closed() {
            break;
        }
    }

    tutor_info!("Conversation closed");
    Ok(())
}

/// Probe the service root on a throwaway client so no pooled connection
/// outlives this short-lived runtime.
fn probe_service(config: &AppConfig) {
    let Ok(client) = ReqwestTutorClient::new(config.service_settings()) else {
        return;
    };
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tutor_warn!("Skipping health check: {}", err);
            return;
        }
    };
    match runtime.block_on(client.health_check()) {
        Ok(banner) => tutor_info!("Service at {} is up: {}", client.base_url(), banner),
        Err(err) => {
            tutor_warn!("Service at {} is unreachable: {}", client.base_url(), err);
            eprintln!(
                "warning: tutor service at {} is unreachable ({err})",
                client.base_url()
            );
        }
    }
}

fn spawn_input_reader(msg_tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let command = parse_line(&line);
            match &command {
                Command::Help => println!("{HELP}"),
                Command::Unknown(text) => println!("unknown command: {text} (try /help)"),
                _ => {}
            }
            let quit = command == Command::Quit;
            for msg in command.into_msgs() {
                if msg_tx.send(msg).is_err() {
                    return;
                }
            }
            if quit {
                return;
            }
        }
        // End of input closes the conversation.
        let _ = msg_tx.send(Msg::ViewClosed);
    });
}
