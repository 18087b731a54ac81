//! Styled console output for the migration runner.
//!
//! Mirrors the CLI's status/warning/error conventions: a short icon, a
//! colored label, and the message, falling back to plain text when colors
//! aren't supported or `NO_COLOR` is set.

use std::{
   io::Write,
   sync::atomic::{AtomicBool, Ordering},
   time::Duration,
};

use owo_colors::OwoColorize;

static COLOR_ENABLED: AtomicBool = AtomicBool::new(true);

/// Detect whether colored output should be used, honoring `NO_COLOR` and
/// terminal capability detection. Call once at startup; `--no-color`
/// overrides it explicitly.
pub fn init(force_no_color: bool) {
   let enabled = !force_no_color
      && std::env::var_os("NO_COLOR").is_none()
      && supports_color::on(supports_color::Stream::Stdout).is_some();
   COLOR_ENABLED.store(enabled, Ordering::Relaxed);
}

fn colors_enabled() -> bool {
   COLOR_ENABLED.load(Ordering::Relaxed)
}

fn terminal_width() -> usize {
   terminal_size::terminal_size().map_or(80, |(w, _)| w.0 as usize)
}

/// Print an informational status line (`→ message`).
pub fn status(message: &str) {
   if colors_enabled() {
      println!("{} {message}", "→".cyan());
   } else {
      println!("-> {message}");
   }
}

/// Print a success line (`✓ message`).
pub fn success(message: &str) {
   if colors_enabled() {
      println!("{} {message}", "✓".green().bold());
   } else {
      println!("[ok] {message}");
   }
}

/// Print a warning line (`⚠ message`) to stderr.
pub fn warning(message: &str) {
   if colors_enabled() {
      eprintln!("{} {message}", "⚠".yellow().bold());
   } else {
      eprintln!("[warn] {message}");
   }
}

/// Print an error line (`✗ message`) to stderr.
pub fn error(message: &str) {
   if colors_enabled() {
      eprintln!("{} {message}", "✗".red().bold());
   } else {
      eprintln!("[error] {message}");
   }
}

/// Draw a box around a block of text, wrapping to the terminal width.
pub fn boxed(title: &str, lines: &[String]) {
   let width = terminal_width().clamp(20, 120);
   let inner = width.saturating_sub(4);
   let top = format!("┌─ {title} {}", "─".repeat(inner.saturating_sub(title.len() + 3)));
   println!("{}", if colors_enabled() { top.blue().to_string() } else { top });
   for line in lines {
      println!("│ {line}");
   }
   let bottom = "└".to_string() + &"─".repeat(width.saturating_sub(1));
   println!("{}", if colors_enabled() { bottom.blue().to_string() } else { bottom });
}

/// A simple spinner for long-running operations (fetches, pushes). Runs on
/// a background thread; dropping the handle stops it and clears the line.
pub struct Spinner {
   stop:   std::sync::Arc<AtomicBool>,
   handle: Option<std::thread::JoinHandle<()>>,
}

impl Spinner {
   pub fn start(message: impl Into<String>) -> Self {
      let message = message.into();
      let stop = std::sync::Arc::new(AtomicBool::new(false));
      let stop_clone = stop.clone();
      let enabled = colors_enabled();

      let handle = std::thread::spawn(move || {
         const FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
         let mut i = 0;
         let mut stdout = std::io::stdout();
         while !stop_clone.load(Ordering::Relaxed) {
            if enabled {
               let _ = write!(stdout, "\r{} {message}", FRAMES[i % FRAMES.len()].cyan());
            } else {
               let _ = write!(stdout, "\r{message}");
            }
            let _ = stdout.flush();
            i += 1;
            std::thread::sleep(Duration::from_millis(80));
         }
         let _ = write!(stdout, "\r{}\r", " ".repeat(message.len() + 2));
         let _ = stdout.flush();
      });

      Self { stop, handle: Some(handle) }
   }
}

impl Drop for Spinner {
   fn drop(&mut self) {
      self.stop.store(true, Ordering::Relaxed);
      if let Some(handle) = self.handle.take() {
         let _ = handle.join();
      }
   }
}
