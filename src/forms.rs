// 🧾 Form Engine - field declarations, form state, masks
// Fields are declared once per form and bound to a state object keyed by
// typed field paths. Masks run on every change, so form state never holds
// an unmasked value. `normalized()` is the submit payload the validators
// consume.

use crate::schema;
use serde_json::{json, Value};
use std::collections::BTreeMap;

// ============================================================================
// FIELD PATHS
// ============================================================================

/// One step into the payload: a key, or an explicit array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Typed path into the form payload. `emails.0.email` is
/// `[Key("emails"), Index(0), Key("email")]`; the dotted form only exists
/// at the edges (error display, parsing).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn key(name: &str) -> Self {
        FieldPath {
            segments: vec![PathSegment::Key(name.to_string())],
        }
    }

    /// Parse a dotted path; purely numeric segments become indexes.
    pub fn parse(text: &str) -> Self {
        let segments = text
            .split('.')
            .filter(|part| !part.is_empty())
            .map(|part| {
                if part.bytes().all(|b| b.is_ascii_digit()) {
                    match part.parse::<usize>() {
                        Ok(i) => PathSegment::Index(i),
                        Err(_) => PathSegment::Key(part.to_string()),
                    }
                } else {
                    PathSegment::Key(part.to_string())
                }
            })
            .collect();

        FieldPath { segments }
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(name.to_string()));
        FieldPath { segments }
    }

    pub fn index(&self, i: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(i));
        FieldPath { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.len() > prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match segment {
                PathSegment::Key(k) => write!(f, "{}", k)?,
                PathSegment::Index(n) => write!(f, "{}", n)?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// MASKS
// ============================================================================

/// Masks run on every change event, before the value reaches form state.
/// The digit-strip mask is lossy and irreversible; applying it twice gives
/// the same result as applying it once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMask {
    #[default]
    None,
    Digits,
}

impl InputMask {
    pub fn apply(&self, raw: &str) -> String {
        match self {
            InputMask::None => raw.to_string(),
            InputMask::Digits => raw.chars().filter(|c| c.is_ascii_digit()).collect(),
        }
    }
}

// ============================================================================
// FIELD DECLARATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Date,
    DateTime,
    Email,
    Tel,
    Password,
    Select,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: &str, label: &str) -> Self {
        SelectOption {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

/// Declarative description of one input. `required` is the visual marker
/// only; enforcement happens in the validators at submit.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub path: FieldPath,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub max_len: Option<usize>,
    pub mask: InputMask,
    pub options: Vec<SelectOption>,
    pub loading: bool,
    pub allow_clear: bool,
}

impl FieldSpec {
    pub fn new(path: &str, label: &str, kind: FieldKind) -> Self {
        FieldSpec {
            path: FieldPath::parse(path),
            label: label.to_string(),
            kind,
            required: false,
            max_len: None,
            mask: InputMask::None,
            options: Vec::new(),
            loading: false,
            allow_clear: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    pub fn with_mask(mut self, mask: InputMask) -> Self {
        self.mask = mask;
        self
    }

    /// Fixed options, or the current page of an asynchronous search.
    pub fn with_options(mut self, options: Vec<SelectOption>) -> Self {
        self.options = options;
        self
    }

    /// Marks an asynchronous option search still in flight.
    pub fn loading(mut self) -> Self {
        self.loading = true;
        self
    }

    /// Adds the affordance that resets the select back to empty.
    pub fn with_clear(mut self) -> Self {
        self.allow_clear = true;
        self
    }
}

/// Repeating group of inputs. Entries are appended with a caller-supplied
/// default; entry labels count from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayField {
    pub path: FieldPath,
    pub entry_label: String,
    pub default_entry: Value,
}

impl ArrayField {
    pub fn new(path: &str, entry_label: &str, default_entry: Value) -> Self {
        ArrayField {
            path: FieldPath::parse(path),
            entry_label: entry_label.to_string(),
            default_entry,
        }
    }

    pub fn label_for(&self, index: usize) -> String {
        format!("{} {}", self.entry_label, index + 1)
    }
}

// ============================================================================
// SELECT OPTION SETS
// ============================================================================

pub fn uf_options() -> Vec<SelectOption> {
    schema::UFS.iter().map(|uf| SelectOption::new(uf, uf)).collect()
}

pub fn cargo_options() -> Vec<SelectOption> {
    schema::CARGOS
        .iter()
        .map(|c| SelectOption::new(c, c))
        .collect()
}

pub fn tipo_conta_options() -> Vec<SelectOption> {
    schema::TIPOS_CONTA
        .iter()
        .map(|t| SelectOption::new(t, t))
        .collect()
}

pub fn tipo_transacao_options() -> Vec<SelectOption> {
    schema::TIPOS_TRANSACAO
        .iter()
        .map(|t| SelectOption::new(t, t))
        .collect()
}

// ============================================================================
// FORM STATE
// ============================================================================

/// Current value of every field, keyed by path. Leaves are JSON scalars;
/// the nested payload shape only exists in `normalized()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    values: BTreeMap<FieldPath, Value>,
}

impl FormState {
    pub fn new() -> Self {
        FormState {
            values: BTreeMap::new(),
        }
    }

    /// Build state from a defaults payload (the prune output for edit
    /// forms). Nested objects and arrays flatten into paths.
    pub fn seed(defaults: &Value) -> Self {
        let mut state = FormState::new();
        flatten(defaults, &FieldPath::default(), &mut state.values);
        state
    }

    /// Change event: the field's mask runs before the value is stored.
    pub fn set(&mut self, spec: &FieldSpec, raw: &str) {
        let masked = spec.mask.apply(raw);
        self.values
            .insert(spec.path.clone(), Value::String(masked));
    }

    /// Direct write for non-text values (flags, numbers picked from UI).
    pub fn set_value(&mut self, path: FieldPath, value: Value) {
        self.values.insert(path, value);
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        self.values.get(path)
    }

    pub fn get_str(&self, path: &FieldPath) -> String {
        match self.values.get(path) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// The select clear affordance: back to empty, not removed.
    pub fn clear(&mut self, path: &FieldPath) {
        self.values.insert(path.clone(), Value::String(String::new()));
    }

    /// Number of entries currently present under an array path.
    pub fn entry_count(&self, array: &FieldPath) -> usize {
        let mut max: Option<usize> = None;

        for path in self.values.keys() {
            if path.starts_with(array) {
                if let Some(PathSegment::Index(i)) = path.segments().get(array.segments().len()) {
                    max = Some(max.map_or(*i, |m: usize| m.max(*i)));
                }
            }
        }

        max.map_or(0, |m| m + 1)
    }

    /// Append one entry built from the array's default; returns its index.
    pub fn push_entry(&mut self, array: &ArrayField) -> usize {
        let index = self.entry_count(&array.path);
        let entry_path = array.path.index(index);
        flatten(&array.default_entry, &entry_path, &mut self.values);
        index
    }

    /// Rebuild the nested submit payload from the flat path map.
    pub fn normalized(&self) -> Value {
        let mut root = Value::Object(serde_json::Map::new());

        for (path, value) in &self.values {
            insert_at(&mut root, path.segments(), value.clone());
        }

        root
    }
}

fn flatten(value: &Value, at: &FieldPath, out: &mut BTreeMap<FieldPath, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(child, &at.child(key), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten(child, &at.index(i), out);
            }
        }
        leaf => {
            if !at.segments().is_empty() {
                out.insert(at.clone(), leaf.clone());
            }
        }
    }
}

fn insert_at(root: &mut Value, segments: &[PathSegment], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *root = value;
        return;
    };

    match head {
        PathSegment::Key(key) => {
            if !root.is_object() {
                *root = Value::Object(serde_json::Map::new());
            }
            if let Value::Object(map) = root {
                let slot = map.entry(key.clone()).or_insert(Value::Null);
                insert_at(slot, rest, value);
            }
        }
        PathSegment::Index(i) => {
            if !root.is_array() {
                *root = Value::Array(Vec::new());
            }
            if let Value::Array(arr) = root {
                while arr.len() <= *i {
                    arr.push(Value::Null);
                }
                insert_at(&mut arr[*i], rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parse_and_display_round_trip() {
        let path = FieldPath::parse("emails.0.email");
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("emails".to_string()),
                PathSegment::Index(0),
                PathSegment::Key("email".to_string()),
            ]
        );
        assert_eq!(path.to_string(), "emails.0.email");
    }

    #[test]
    fn test_digit_mask_strips_and_is_idempotent() {
        let mask = InputMask::Digits;

        let once = mask.apply("123.456.789-01");
        assert_eq!(once, "12345678901");

        let twice = mask.apply(&once);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_set_applies_mask_on_every_change() {
        let spec = FieldSpec::new("cpf", "CPF", FieldKind::Text)
            .required()
            .with_max_len(11)
            .with_mask(InputMask::Digits);
        let mut state = FormState::new();

        state.set(&spec, "123.4");
        assert_eq!(state.get_str(&spec.path), "1234");

        state.set(&spec, "123.456.789-01");
        assert_eq!(state.get_str(&spec.path), "12345678901");
    }

    #[test]
    fn test_push_entry_appends_default_and_labels_from_one() {
        let emails = ArrayField::new("emails", "Email", json!({ "email": "", "tipo": "" }));
        let mut state = FormState::new();

        assert_eq!(state.entry_count(&emails.path), 0);

        let first = state.push_entry(&emails);
        let second = state.push_entry(&emails);

        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(state.entry_count(&emails.path), 2);
        assert_eq!(emails.label_for(first), "Email 1");
        assert_eq!(emails.label_for(second), "Email 2");
    }

    #[test]
    fn test_seed_then_normalized_round_trips() {
        let defaults = json!({
            "cpf": "12345678901",
            "nome": "Maria",
            "end_numero": 120,
            "emails": [
                { "email": "a@b.com", "tipo": "pessoal" },
                { "email": "c@d.com", "tipo": "trabalho" },
            ],
        });

        let state = FormState::seed(&defaults);
        assert_eq!(state.normalized(), defaults);
    }

    #[test]
    fn test_normalized_builds_nested_payload() {
        let mut state = FormState::new();
        let email = FieldSpec::new("emails.0.email", "Email", FieldKind::Email);
        let tipo = FieldSpec::new("emails.0.tipo", "Tipo", FieldKind::Text);

        state.set(&email, "a@b.com");
        state.set(&tipo, "pessoal");
        state.set_value(FieldPath::key("create"), json!(true));

        let payload = state.normalized();
        assert_eq!(payload["create"], true);
        assert_eq!(payload["emails"][0]["email"], "a@b.com");
        assert_eq!(payload["emails"][0]["tipo"], "pessoal");
    }

    #[test]
    fn test_clear_resets_select_to_empty() {
        let uf = FieldSpec::new("rg_uf", "UF", FieldKind::Select)
            .with_options(uf_options())
            .with_clear();
        let mut state = FormState::new();

        state.set(&uf, "PR");
        assert_eq!(state.get_str(&uf.path), "PR");

        state.clear(&uf.path);
        assert_eq!(state.get_str(&uf.path), "");
    }

    #[test]
    fn test_option_sets_cover_fixed_domains() {
        assert_eq!(uf_options().len(), 27);
        assert_eq!(cargo_options().len(), 3);
        assert_eq!(tipo_conta_options().len(), 3);
        assert_eq!(tipo_transacao_options().len(), 4);
    }
}
