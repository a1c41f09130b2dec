fn main() -> anyhow::Result<()> {
    jobwatch_app::run_app()
}
