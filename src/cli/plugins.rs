use crate::errors::IastError;
use crate::plugins::SCAN_PLUGINS;

pub async fn handle_plugins() -> Result<(), IastError> {
    println!("{:<18} {:<24} DESCRIPTION", "NAME", "SHOW NAME");
    for info in SCAN_PLUGINS.infos() {
        println!("{:<18} {:<24} {}", info.name, info.show_name, info.description);
    }
    Ok(())
}
