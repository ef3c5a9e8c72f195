use secure_json::{find_override_config, Config, KeyVault};

fn main() -> Result<(), secure_json::Error> {
    // Key is provisioned on first run and reused afterwards, so values
    // encrypted by an earlier run stay readable.
    let vault = match KeyVault::from_key_file("demos/demo.key") {
        Ok(vault) => vault,
        Err(_) => KeyVault::generate_key_file("demos/demo.key")?,
    };

    let mut config = Config::builder()
        .with_file("demos/appsettings.json", true)
        .with_cipher(vault);

    if let Some(override_path) = find_override_config(".", "SecureConfig.json") {
        println!("Found configuration file {}", override_path.display());
        config = config.with_file(override_path, true);
    }

    let settings = config.build()?;

    // First run encrypts "$Secret" in place; check demos/appsettings.json
    // afterwards to see the envelope.
    println!("My secret is: {}", settings.get_or("Secret", "<unset>"));
    println!(
        "Database: {}:{}",
        settings.get_or("Database:Host", "?"),
        settings.get_or("Database:Port", "?"),
    );

    Ok(())
}
