use anyhow::Result;

fn main() -> Result<()> {
    if let Err(e) = lexisync::run() {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
