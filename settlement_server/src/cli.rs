use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 19] = [
        "RUST_LOG",
        "SSE_HOST",
        "SSE_PORT",
        "SSE_DATABASE_URL",
        "SSE_DB_MAX_CONNECTIONS",
        "SSE_GATEWAY_STORE_ID",
        "SSE_GATEWAY_SANDBOX",
        "SSE_GATEWAY_TIMEOUT_MS",
        "SSE_POS_HMAC_CHECKS",
        "SSE_NOTIFICATION_URL",
        "SSE_MAX_ATTEMPTS",
        "SSE_BASE_BACKOFF_MS",
        "SSE_MAX_BACKOFF_MS",
        "SSE_TRANSACTION_TIMEOUT_MS",
        "SSE_GOLD_THRESHOLD",
        "SSE_PLATINUM_THRESHOLD",
        "SSE_POINTS_RATE_SILVER",
        "SSE_POINTS_RATE_GOLD",
        "SSE_POINTS_RATE_PLATINUM",
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
