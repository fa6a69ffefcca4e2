use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::{Error, Result};

static SPECIAL_FIELD: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^#([^:]+)(:([^:]+):([^:]+))?#$").expect("Special field pattern must compile.")
});

const ATTR_VALUE: &str = "attr_value";

/// A configured output field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
	/// Plain document path, e.g. `taxon.accepted_name`.
	Path(String),
	/// `#attr_value:<entity>:<id>#`: a custom attribute looked up by id at query time.
	AttrValue { entity: String, attr_id: String },
	/// Any other `#...#` token. These are rendered client side and have no backend field.
	Special(String),
}
impl FieldSpec {
	pub fn parse(raw: &str) -> Self {
		let Some(captures) = SPECIAL_FIELD.captures(raw) else {
			return Self::Path(raw.to_string());
		};

		match (captures.get(1), captures.get(3), captures.get(4)) {
			(Some(kind), Some(entity), Some(attr_id)) if kind.as_str() == ATTR_VALUE => {
				Self::AttrValue {
					entity: canonical_entity(entity.as_str()).to_string(),
					attr_id: attr_id.as_str().to_string(),
				}
			},
			_ => Self::Special(raw.to_string()),
		}
	}

	/// The path that must be present in `_source` to render this field.
	pub fn source_path(&self) -> Option<String> {
		match self {
			Self::Path(path) => Some(path.clone()),
			Self::AttrValue { entity, .. } => Some(format!("{entity}.attributes")),
			Self::Special(_) => None,
		}
	}

	pub(crate) fn check(&self, raw: &str) -> Result<()> {
		if let Self::AttrValue { attr_id, .. } = self
			&& !attr_id.chars().all(|c| c.is_ascii_alphanumeric())
		{
			return Err(Error::configuration(format!(
				"Attribute id in field {raw:?} must be alphanumeric."
			)));
		}

		Ok(())
	}
}

/// Samples are stored under `event` in the index.
pub fn canonical_entity(entity: &str) -> &str {
	if entity == "sample" { "event" } else { entity }
}

/// Derives an aggregation key from a field specifier. Composite source keys only allow a narrow
/// character set, so the surrounding `#` markers are dropped and anything outside
/// `[A-Za-z0-9_]` becomes `-`.
pub fn composite_key_name(field: &str) -> String {
	field
		.trim_matches('#')
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
		.collect()
}

/// Painless script returning the value of custom attribute `attr_id`, or an empty string.
pub fn attr_value_script(entity: &str, attr_id: &str) -> Value {
	let source = format!(
		"String r = ''; if (params._source.{entity}.attributes != null) {{ \
		 for ( item in params._source.{entity}.attributes ) {{ \
		 if (item.id == '{attr_id}') {{ r = item.value; }} }} }} return r;"
	);

	serde_json::json!({ "source": source, "lang": "painless" })
}

/// Maps a field to the name used by terms and cardinality aggregations.
#[derive(Debug, Clone, Default)]
pub struct KeywordFields {
	text_fields: HashSet<String>,
}
impl KeywordFields {
	pub fn new<I, S>(text_fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { text_fields: text_fields.into_iter().map(Into::into).collect() }
	}

	pub fn resolve(&self, field: &str) -> String {
		if self.text_fields.contains(field) { format!("{field}.keyword") } else { field.to_string() }
	}
}
