//! Config command - prints the configuration after all sources are merged

/// Print the effective configuration
pub fn run() -> anyhow::Result<()> {
    let config = super::load_config()?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
