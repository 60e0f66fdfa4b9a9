use std::io::{
  self,
  Write
};

use tracing::{
  debug,
  info
};

/// Where `copy` puts text.
pub trait Clipboard {
  fn write_text(
    &mut self,
    text: &str
  ) -> anyhow::Result<()>;
}

/// Page history the create form returns
/// through on cancel.
pub trait Navigator {
  fn back(&mut self);
}

#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
  pub contents: Option<String>
}

impl Clipboard for MemoryClipboard {
  fn write_text(
    &mut self,
    text: &str
  ) -> anyhow::Result<()> {
    self.contents = Some(text.to_string());
    Ok(())
  }
}

/// Prints copied text so a terminal user
/// can grab it.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutClipboard;

impl Clipboard for StdoutClipboard {
  fn write_text(
    &mut self,
    text: &str
  ) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{text}")?;
    out.flush()?;
    Ok(())
  }
}

#[derive(Debug, Default, Clone)]
pub struct HistoryNavigator {
  pages: Vec<String>
}

impl HistoryNavigator {
  pub fn new<I, S>(pages: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>
  {
    Self {
      pages: pages
        .into_iter()
        .map(Into::into)
        .collect()
    }
  }

  pub fn current(&self) -> Option<&str> {
    self.pages.last().map(String::as_str)
  }
}

impl Navigator for HistoryNavigator {
  fn back(&mut self) {
    if self.pages.len() < 2 {
      debug!(
        "no previous page; staying put"
      );
      return;
    }
    let left = self.pages.pop();
    info!(
      from = ?left,
      to = ?self.current(),
      "navigated back"
    );
  }
}

#[cfg(test)]
mod tests {
  use super::{
    Clipboard,
    HistoryNavigator,
    MemoryClipboard,
    Navigator
  };

  #[test]
  fn back_pops_to_previous_page() {
    let mut nav = HistoryNavigator::new([
      "/task/dashboard",
      "/task/create",
    ]);
    nav.back();
    assert_eq!(
      nav.current(),
      Some("/task/dashboard")
    );
    nav.back();
    assert_eq!(
      nav.current(),
      Some("/task/dashboard")
    );
  }

  #[test]
  fn memory_clipboard_keeps_last_text() {
    let mut clipboard =
      MemoryClipboard::default();
    clipboard
      .write_text("first")
      .expect("write");
    clipboard
      .write_text("second")
      .expect("write");
    assert_eq!(
      clipboard.contents.as_deref(),
      Some("second")
    );
  }
}
