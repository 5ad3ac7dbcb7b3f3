use std::fmt;

/// A titled block of the debug report
#[derive(Debug, Clone)]
pub struct DebugSection {
    pub title: String,
    pub content: String,
    /// Lower values render first
    pub priority: u32,
}

impl DebugSection {
    pub fn new(title: impl Into<String>, content: impl Into<String>, priority: u32) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            priority,
        }
    }

    /// Section whose content starts with a banner line
    pub fn with_header(
        title: impl Into<String>,
        content: impl Into<String>,
        priority: u32,
    ) -> Self {
        let title = title.into();
        let content = format!("\n========== {} ==========\n{}", title, content.into());
        Self {
            title,
            content,
            priority,
        }
    }
}

impl fmt::Display for DebugSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.content)
    }
}

/// Trait for components that can describe their state for the debug report
pub trait DebugTrace {
    fn name(&self) -> &str;

    fn debug_sections(&self) -> Vec<DebugSection>;

    /// One-line summary, if the provider has one
    fn debug_summary(&self) -> Option<String> {
        None
    }
}

/// Section ordering
pub mod priority {
    pub const PIPELINE: u32 = 100;
    pub const VIEW: u32 = 200;
    pub const SELECTION: u32 = 300;
    pub const VIEWPORT: u32 = 400;
    pub const EVENTS: u32 = 500;
    pub const LOGS: u32 = 600;
}

/// Builds sections field by field; fields and lines go into the last section
pub struct DebugSectionBuilder {
    sections: Vec<DebugSection>,
}

impl DebugSectionBuilder {
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, title: impl Into<String>, priority: u32) -> &mut Self {
        self.sections
            .push(DebugSection::with_header(title, "", priority));
        self
    }

    pub fn add_field(&mut self, name: &str, value: impl fmt::Display) -> &mut Self {
        if let Some(last) = self.sections.last_mut() {
            last.content.push_str(&format!("{}: {}\n", name, value));
        }
        self
    }

    pub fn add_line(&mut self, line: impl Into<String>) -> &mut Self {
        if let Some(last) = self.sections.last_mut() {
            last.content.push_str(&line.into());
            last.content.push('\n');
        }
        self
    }

    pub fn build(self) -> Vec<DebugSection> {
        self.sections
    }
}

impl Default for DebugSectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Join sections from several providers in priority order
pub fn render_report(providers: &[&dyn DebugTrace]) -> String {
    let mut sections: Vec<DebugSection> = providers
        .iter()
        .flat_map(|p| p.debug_sections())
        .collect();
    sections.sort_by_key(|s| s.priority);

    let mut report = String::new();
    for provider in providers {
        if let Some(summary) = provider.debug_summary() {
            report.push_str(&format!("[{}] {}\n", provider.name(), summary));
        }
    }
    for section in &sections {
        report.push_str(&section.content);
    }
    report
}
