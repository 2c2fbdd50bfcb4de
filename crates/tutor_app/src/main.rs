mod app;
mod config;
mod effects;
mod ui;

fn main() -> anyhow::Result<()> {
    app::run_app()
}
