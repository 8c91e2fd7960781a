use crate::output::is_quiet;
use crate::ui::{Icons, theme};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    if is_quiet() {
        return;
    }
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

/// One line of a transfer: `name -> text` for Pull, `name <- text` for Push
pub fn transfer(name: &str, text: &str, pull: bool) {
    let icon = if pull { Icons::RIGHT } else { Icons::LEFT };
    println!(
        "{} {} {}",
        icon.style(theme().info.clone()),
        name.style(theme().header.clone()),
        text.style(theme().value.clone())
    );
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}
