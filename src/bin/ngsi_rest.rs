fn main() -> anyhow::Result<()> {
    ngsi_rest::cli::run_cli()
}
