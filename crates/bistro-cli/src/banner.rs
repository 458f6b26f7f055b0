use bistro_config::{AppConfig, mask_url};

/// Print the startup banner with a config summary.
pub fn print_banner(config: &AppConfig) {
    let version = env!("CARGO_PKG_VERSION");
    let server = &config.server;

    let url = format!("http://{}:{}", server.host, server.port);
    let store = mask_url(&config.database.url);
    let migrations = if server.migrate_on_start {
        "applied on start"
    } else {
        "manual"
    };
    let origins = match server.cors_origins.len() {
        0 => "none".to_string(),
        1 => "1 origin".to_string(),
        n => format!("{n} origins"),
    };

    // Layout
    let width = 70;
    let left_w = 27;
    let right_w = width - left_w - 3; // 3 for "│ " + "│"

    let title = format!("Bistro v{version}");
    let title_dashes = width - 2 - title.len() - 5; // 2 for ╭╮, 5 for "─── " + " "
    let top = format!("╭─── {title} {}╮", "─".repeat(title_dashes));
    let bottom = format!("╰{}╯", "─".repeat(width - 2));

    let row = |l: &str, r: &str| format!("│ {:<left_w$}│  {:<right_w$}│", l, r);
    let fit = |s: &str| {
        if s.chars().count() > right_w - 14 {
            let kept: String = s.chars().take(right_w - 17).collect();
            format!("{kept}...")
        } else {
            s.to_string()
        }
    };

    println!("{top}");
    println!("{}", row("", ""));
    println!("{}", row("  Welcome to Bistro!", "API"));
    println!("{}", row("", &url));
    println!("{}", row("     (  )   (   )", &"─".repeat(right_w - 2)));
    println!("{}", row("    .-------------.", &format!("Store       {}", fit(&store))));
    println!("{}", row("    \\             /", &format!("Migrations  {migrations}")));
    println!("{}", row("     '-----------'", &format!("CORS        {origins}")));
    println!("{}", row("", ""));
    println!("{}", row("  Orders · Menu · Carts", "Press Ctrl+C to stop"));
    println!("{}", row("", ""));
    println!("{bottom}");
}
