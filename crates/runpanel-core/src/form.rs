//! Input form model for the run trigger.
//!
//! Fields come from the app's `user_input_form` parameter list. The form only
//! collects values; required and length rules are left to the server. File
//! fields hold local paths, one per line, which are uploaded when a run
//! starts.

use std::path::PathBuf;

use serde_json::Map;
use serde_json::Number;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Paragraph,
    Number,
    Select,
    File,
    FileList,
}

impl FieldKind {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "text-input" => Some(Self::Text),
            "paragraph" => Some(Self::Paragraph),
            "number" => Some(Self::Number),
            "select" => Some(Self::Select),
            "file" => Some(Self::File),
            "file-list" => Some(Self::FileList),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Paragraph => "paragraph",
            Self::Number => "number",
            Self::Select => "select",
            Self::File => "file",
            Self::FileList => "files",
        }
    }

    pub fn is_file(self) -> bool {
        matches!(self, Self::File | Self::FileList)
    }
}

/// Local files to upload for one file field before the run is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInput {
    pub variable: String,
    pub paths: Vec<PathBuf>,
    /// `file-list` fields send an array even for a single file.
    pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub variable: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub max_length: Option<u32>,
    pub options: Vec<String>,
    pub default: Option<String>,
}

impl FormField {
    pub fn text(variable: impl Into<String>) -> Self {
        let variable = variable.into();
        Self {
            label: variable.clone(),
            variable,
            kind: FieldKind::Text,
            required: false,
            max_length: None,
            options: Vec::new(),
            default: None,
        }
    }

    /// Parse one `{"<kind>": {...}}` entry of `user_input_form`.
    pub fn from_parameter(entry: &Value) -> Option<Self> {
        let (key, body) = entry.as_object()?.iter().next()?;
        let kind = FieldKind::from_key(key)?;
        let body = body.as_object()?;
        let variable = body.get("variable")?.as_str()?.to_string();
        let label = body
            .get("label")
            .and_then(Value::as_str)
            .filter(|label| !label.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| variable.clone());
        let options = body
            .get("options")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let default = match body.get("default") {
            Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        };
        Some(Self {
            variable,
            label,
            kind,
            required: body
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            max_length: body
                .get("max_length")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok()),
            options,
            default,
        })
    }
}

/// Parse the `user_input_form` array, skipping entries of unknown kinds.
pub fn parse_user_input_form(value: &Value) -> Vec<FormField> {
    value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(FormField::from_parameter)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputForm {
    fields: Vec<FormField>,
    values: Vec<String>,
    focused: usize,
}

impl InputForm {
    pub fn new(fields: Vec<FormField>) -> Self {
        let values = fields
            .iter()
            .map(|field| field.default.clone().unwrap_or_default())
            .collect();
        Self {
            fields,
            values,
            focused: 0,
        }
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn focused(&self) -> usize {
        self.focused
    }

    pub fn value(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    pub fn value_of(&self, variable: &str) -> Option<&str> {
        let index = self.index_of(variable)?;
        self.value(index)
    }

    fn index_of(&self, variable: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.variable == variable)
    }

    fn focused_editable(&mut self) -> Option<(&FormField, &mut String)> {
        let field = self.fields.get(self.focused)?;
        let value = self.values.get_mut(self.focused)?;
        Some((field, value))
    }

    pub fn focus_next(&mut self) {
        let len = self.fields.len();
        if len > 0 {
            self.focused = (self.focused + 1) % len;
        }
    }

    pub fn focus_prev(&mut self) {
        let len = self.fields.len();
        if len > 0 {
            self.focused = (self.focused + len - 1) % len;
        }
    }

    pub fn input_char(&mut self, ch: char) {
        if let Some((field, value)) = self.focused_editable() {
            match field.kind {
                FieldKind::Select => {}
                FieldKind::Number => {
                    if ch.is_ascii_digit() || matches!(ch, '.' | '-' | 'e' | 'E') {
                        value.push(ch);
                    }
                }
                FieldKind::Text | FieldKind::File if ch == '\n' => {}
                _ => value.push(ch),
            }
        }
    }

    pub fn paste(&mut self, text: &str) {
        for ch in text.chars() {
            self.input_char(ch);
        }
    }

    pub fn backspace(&mut self) {
        if let Some((field, value)) = self.focused_editable() {
            if field.kind != FieldKind::Select {
                value.pop();
            }
        }
    }

    /// Cycle the focused select field through its options.
    pub fn cycle_option(&mut self, forward: bool) {
        let Some((field, value)) = self.focused_editable() else {
            return;
        };
        if field.kind != FieldKind::Select || field.options.is_empty() {
            return;
        }
        let len = field.options.len();
        let next = match field.options.iter().position(|o| o == value) {
            Some(idx) if forward => (idx + 1) % len,
            Some(idx) => (idx + len - 1) % len,
            None if forward => 0,
            None => len - 1,
        };
        *value = field.options[next].clone();
    }

    /// Set a value by variable name. Unknown variables are added as text
    /// fields so inputs can be supplied before the parameter list is known.
    pub fn set_value(&mut self, variable: &str, value: impl Into<String>) {
        let value = value.into();
        match self.index_of(variable) {
            Some(index) => self.values[index] = value,
            None => {
                self.fields.push(FormField::text(variable));
                self.values.push(value);
            }
        }
    }

    /// Attach a local file to `variable`. A `file-list` field collects every
    /// path; other fields keep the last one. Unknown variables are added as
    /// single file fields.
    pub fn add_file(&mut self, variable: &str, path: impl Into<String>) {
        let path = path.into();
        let Some(index) = self.index_of(variable) else {
            let mut field = FormField::text(variable);
            field.kind = FieldKind::File;
            self.fields.push(field);
            self.values.push(path);
            return;
        };
        let field = &mut self.fields[index];
        let value = &mut self.values[index];
        match field.kind {
            FieldKind::FileList if !value.is_empty() => {
                value.push('\n');
                value.push_str(&path);
            }
            FieldKind::FileList | FieldKind::File => *value = path,
            _ => {
                field.kind = FieldKind::File;
                *value = path;
            }
        }
    }

    /// File fields that name at least one path.
    pub fn file_inputs(&self) -> Vec<FileInput> {
        self.fields
            .iter()
            .zip(self.values.iter())
            .filter(|(field, _)| field.kind.is_file())
            .filter_map(|(field, value)| {
                let mut paths: Vec<PathBuf> = value
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(PathBuf::from)
                    .collect();
                if field.kind == FieldKind::File {
                    paths.truncate(1);
                }
                (!paths.is_empty()).then(|| FileInput {
                    variable: field.variable.clone(),
                    paths,
                    multiple: field.kind == FieldKind::FileList,
                })
            })
            .collect()
    }

    pub fn clear_values(&mut self) {
        for (field, value) in self.fields.iter().zip(self.values.iter_mut()) {
            *value = field.default.clone().unwrap_or_default();
        }
    }

    /// Form values as the run request `inputs` object. Empty values and file
    /// fields are omitted; number fields are sent as JSON numbers when they
    /// parse.
    pub fn values(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for (field, value) in self.fields.iter().zip(self.values.iter()) {
            if field.kind.is_file() || value.is_empty() {
                continue;
            }
            let json = match field.kind {
                FieldKind::Number => number_value(value)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(value.clone())),
                _ => Value::String(value.clone()),
            };
            out.insert(field.variable.clone(), json);
        }
        out
    }
}

fn number_value(raw: &str) -> Option<Number> {
    let trimmed = raw.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Number::from(int));
    }
    trimmed.parse::<f64>().ok().and_then(Number::from_f64)
}
