/// User-facing signal severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeTone {
    Error,
    Info,
}

/// An ephemeral user-facing message. At most one is live at a time; every
/// new signal replaces the previous one. Never persisted.
#[derive(Debug, Clone)]
pub struct Notice {
    pub tone: NoticeTone,
    pub title: String,
    pub description: Option<String>,
}

impl Notice {
    pub fn error_with(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            tone: NoticeTone::Error,
            title: title.into(),
            description: Some(description.into()),
        }
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self {
            tone: NoticeTone::Info,
            title: title.into(),
            description: None,
        }
    }
}
