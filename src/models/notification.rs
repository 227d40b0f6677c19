use chrono::{DateTime, Utc};

/// Embed colour as a 24-bit RGB value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u32);

impl Color {
    pub const BALANCE_UP: Color = Color(0x03F8C4);
    pub const BALANCE_UNCHANGED: Color = Color(0xE67E22);
    pub const BALANCE_DOWN: Color = Color(0xFF0000);
    pub const REDEEM: Color = Color(0x07FF70);
    pub const FAILURE: Color = Color(0xFFFFFF);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
}

/// Transport-neutral message. Field order is display order.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub description: Option<String>,
    pub color: Color,
    pub fields: Vec<Field>,
    pub footer: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(title: impl Into<String>, color: Color) -> Self {
        Self {
            title: title.into(),
            description: None,
            color,
            fields: Vec::new(),
            footer: None,
            timestamp: None,
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(text.into());
        self
    }

    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}
