use std::io::IsTerminal;
use std::path::PathBuf;

use spendwise::db::{get_connection, init_db};
use spendwise::error::Result;
use spendwise::settings::{load_settings, save_settings, settings_file_exists, shellexpand_path};
use spendwise::validate::validate_email;

pub fn run(data_dir: Option<String>, email: Option<String>, user: Option<String>) -> Result<()> {
    let first_run = !settings_file_exists();
    let mut settings = load_settings();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    } else if first_run && std::io::stdin().is_terminal() {
        println!("Data directory [{}]: ", settings.data_dir);
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        let chosen = input.trim();
        if !chosen.is_empty() {
            settings.data_dir = shellexpand_path(chosen);
        }
    }
    if let Some(email) = email {
        settings.report_recipient = Some(validate_email(&email)?);
    }
    if let Some(user) = user {
        settings.user_id = user;
    }

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(resolved.join("receipts"))?;
    std::fs::create_dir_all(resolved.join("exports"))?;
    std::fs::create_dir_all(resolved.join("outbox"))?;

    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;
    save_settings(&settings)?;

    println!("Initialized spendwise at {}", resolved.display());
    Ok(())
}
