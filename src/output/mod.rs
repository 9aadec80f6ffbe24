//! Styled terminal printers for tfgen.
//!
//! Diagnostics (errors) go to stderr, everything else to stdout.

use owo_colors::OwoColorize;

// Palette
const MINT: (u8, u8, u8) = (152, 225, 152);
const CORAL: (u8, u8, u8) = (255, 160, 160);
const CREAM: (u8, u8, u8) = (255, 230, 160);
const SKY: (u8, u8, u8) = (160, 200, 255);
const LAVENDER: (u8, u8, u8) = (181, 174, 254);
const TEAL: (u8, u8, u8) = (120, 180, 195);
const GREY: (u8, u8, u8) = (160, 160, 160);

fn symbol(symbol: &str, (r, g, b): (u8, u8, u8)) -> String {
    symbol.truecolor(r, g, b).bold().to_string()
}

fn grey(text: &str) -> String {
    text.truecolor(GREY.0, GREY.1, GREY.2).to_string()
}

pub fn success(message: &str) {
    println!("{} {}", symbol("✓", MINT), message.bright_white());
}

pub fn error(message: &str) {
    eprintln!("{} {}", symbol("✗", CORAL), message.bright_white());
}

pub fn warning(message: &str) {
    println!("{} {}", symbol("⚠", CREAM), message.bright_white());
}

pub fn info(message: &str) {
    println!("{} {}", symbol("ℹ", SKY), message.bright_white());
}

/// Section header with a separator line
pub fn section(title: &str) {
    println!(
        "\n{}",
        title.truecolor(LAVENDER.0, LAVENDER.1, LAVENDER.2).bold()
    );
    println!("{}", grey(&"─".repeat(50)));
}

/// Smaller header with a dotted separator
pub fn subsection(title: &str) {
    println!("\n{}", title.truecolor(TEAL.0, TEAL.1, TEAL.2));
    println!("{}", grey(&"·".repeat(30)));
}

pub fn key_value(key: &str, value: &str) {
    println!("  {} {}", grey(&format!("{}:", key)), value.bright_white());
}

pub fn dimmed(message: &str) {
    println!("{}", grey(message));
}

pub fn blank() {
    println!();
}
