use std::{env, env::VarError};

/// The server has no real CLI. Any argument prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Only variables that never hold secrets
    const DISPLAY_ENVS: [&str; 22] = [
        "RUST_LOG",
        "SB_HOST",
        "SB_PORT",
        "SB_DATABASE_URL",
        "SB_SHOPEE_WEBHOOK_URL",
        "SB_WEBHOOK_SIGNATURE_CHECKS",
        "SB_BOT_URL",
        "SB_DISABLE_SCHEDULER",
        "SB_POLL_INTERVAL_SECS",
        "SB_STATUS_REFRESH_INTERVAL_SECS",
        "SB_FAILED_PUSH_POLICY",
        "SB_DEDUCTION_BATCH_SIZE",
        "SB_RESTOCK_BATCH_SIZE",
        "SB_SETTLEMENT_BATCH_SIZE",
        "SB_STATUS_BATCH_SIZE",
        "SB_NOTIFICATION_BATCH_SIZE",
        "SB_POLL_WINDOW_DAYS",
        "SB_DEDUP_TTL_HOURS",
        "SB_MARKETPLACE_TIMEOUT_SECS",
        "SB_SHOPEE_HOST",
        "SB_LAZADA_HOST",
        "SB_TIKTOK_HOST",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
