use colorful::{Color, Colorful};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    Info,
    Success,
    Warning,
    Error,
}

/// User-facing progress surface.
pub trait Notifier {
    fn notify(&self, variant: Variant, message: &str);
}

/// Prints notifications to stdout, coloured by variant.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, variant: Variant, message: &str) {
        let line = match variant {
            Variant::Info => message.color(Color::Blue),
            Variant::Success => message.color(Color::Green),
            Variant::Warning => message.color(Color::Yellow),
            Variant::Error => message.color(Color::Red),
        };
        println!("{}", line);
    }
}
