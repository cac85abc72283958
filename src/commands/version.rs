pub fn run() -> anyhow::Result<()> {
    println!("policy-daemond {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
