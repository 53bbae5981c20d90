//! View-model for the selectable radio-style list row.

/// Leading whitespace unit used to express nesting in row titles.
pub const INDENT_UNIT: &str = "    ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowItem {
    pub text: String,
    pub alternate_text: Option<String>,
    pub is_selected: bool,
    pub is_disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionRow {
    pub title: String,
    pub indent_level: usize,
    pub max_title_lines: usize,
    pub alternate_text: Option<String>,
    pub is_selected: bool,
    pub is_disabled: bool,
}

impl OptionRow {
    /// In multiline mode the leading indent moves out of the title and into
    /// an explicit indent level; single-line mode keeps the raw text and caps
    /// the title at one line.
    pub fn derive(item: &RowItem, multiline_supported: bool) -> Self {
        let title = if multiline_supported {
            item.text.trim_start().to_string()
        } else {
            item.text.clone()
        };
        let removed = item.text.len() - title.len();
        Self {
            indent_level: removed / INDENT_UNIT.len(),
            max_title_lines: if multiline_supported { 2 } else { 1 },
            title,
            alternate_text: item.alternate_text.clone(),
            is_selected: item.is_selected,
            is_disabled: item.is_disabled,
        }
    }
}
