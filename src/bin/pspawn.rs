use anyhow::Result;

fn main() -> Result<()> {
    pspawn::cli::run()
}
