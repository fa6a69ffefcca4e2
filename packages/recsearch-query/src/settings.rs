use std::{collections::BTreeMap, fmt};

use serde_json::{Map, Value};

use recsearch_config::{RESERVED_AGGREGATION_PREFIX, SourceConfig};

use crate::{
	DEFAULT_AGGREGATION_SIZE, DEFAULT_PAGE_SIZE, Error, FIELD_LIST_AGG, Result, SORT_FIELD_AGG,
	field::FieldSpec, filter::Filter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	Documents,
	CompositeAggregation,
	TermAggregation,
}
impl Mode {
	pub fn parse(raw: &str) -> Result<Self> {
		match raw {
			"docs" => Ok(Self::Documents),
			"compositeAggregation" => Ok(Self::CompositeAggregation),
			"termAggregation" => Ok(Self::TermAggregation),
			other => Err(Error::configuration(format!("Unknown source mode {other:?}."))),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Documents => "docs",
			Self::CompositeAggregation => "compositeAggregation",
			Self::TermAggregation => "termAggregation",
		}
	}

	pub fn is_aggregation(self) -> bool {
		!matches!(self, Self::Documents)
	}
}
impl fmt::Display for Mode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	Asc,
	Desc,
}
impl Direction {
	pub fn parse(raw: &str) -> Result<Self> {
		match raw {
			"asc" => Ok(Self::Asc),
			"desc" => Ok(Self::Desc),
			other => Err(Error::configuration(format!("Unknown sort direction {other:?}."))),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Asc => "asc",
			Self::Desc => "desc",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
	pub field: String,
	pub direction: Direction,
}
impl SortField {
	pub fn new(field: impl Into<String>, direction: Direction) -> Self {
		Self { field: field.into(), direction }
	}
}

/// Query configuration for one data source. Mutated in place as the user sorts, filters and
/// pages.
#[derive(Debug, Clone)]
pub struct QuerySettings {
	pub id: String,
	pub mode: Mode,
	/// Field specifiers in output order. Always contains `unique_field`.
	pub fields: Vec<String>,
	pub unique_field: String,
	/// Earlier entries take priority.
	pub sort: Vec<SortField>,
	pub supplied_aggregation: Map<String, Value>,
	/// Term mode only: cheaper aggregations to order by in place of a supplied one.
	pub sort_aggregation: Map<String, Value>,
	pub aggregation_size: Option<u32>,
	pub size: Option<u32>,
	pub from: u32,
	/// Composite mode cursor for the page being requested.
	pub after_key: Option<Value>,
	pub needs_recount: bool,
	pub filter: Filter,
	/// Sent as the `filter_path` query parameter to trim the response.
	pub filter_path: Option<String>,
	/// Composite mode page counter, zero based.
	pub page: u32,
	/// After-keys captured from responses, keyed by the page they open.
	pub page_after_keys: BTreeMap<u32, Value>,
}
impl QuerySettings {
	pub fn new(id: impl Into<String>, mode: Mode, unique_field: impl Into<String>) -> Self {
		let unique_field = unique_field.into();

		Self {
			id: id.into(),
			mode,
			fields: vec![unique_field.clone()],
			unique_field,
			sort: Vec::new(),
			supplied_aggregation: Map::new(),
			sort_aggregation: Map::new(),
			aggregation_size: None,
			size: None,
			from: 0,
			after_key: None,
			needs_recount: false,
			filter: Filter::default(),
			filter_path: None,
			page: 0,
			page_after_keys: BTreeMap::new(),
		}
	}

	pub fn with_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.fields = Vec::new();

		for field in fields {
			let field = field.into();

			if !self.fields.contains(&field) {
				self.fields.push(field);
			}
		}

		self.ensure_unique_field();

		self
	}

	pub fn with_sort(mut self, sort: Vec<SortField>) -> Self {
		self.sort = sort;

		self
	}

	pub fn with_size(mut self, size: u32) -> Self {
		self.size = Some(size);

		self
	}

	pub fn from_config(cfg: &SourceConfig) -> Result<Self> {
		if cfg.unique_field.trim().is_empty() {
			return Err(Error::configuration(format!(
				"Source {:?} has no unique_field configured.",
				cfg.id
			)));
		}

		let sort = cfg
			.sort
			.iter()
			.map(|sort| Ok(SortField::new(sort.field.clone(), Direction::parse(&sort.direction)?)))
			.collect::<Result<Vec<_>>>()?;
		let filter = match cfg.filter.as_ref() {
			Some(raw) => serde_json::from_value(raw.clone()).map_err(|err| {
				Error::configuration(format!("Source {:?} has an invalid filter: {err}", cfg.id))
			})?,
			None => Filter::default(),
		};
		let mut settings = Self::new(cfg.id.clone(), Mode::parse(&cfg.mode)?, cfg.unique_field.clone())
			.with_fields(cfg.fields.iter().cloned())
			.with_sort(sort);

		settings.size = cfg.size;
		settings.aggregation_size = cfg.aggregation_size;
		settings.filter_path = cfg.filter_path.clone();
		settings.supplied_aggregation = cfg.aggregation.clone();
		settings.sort_aggregation = cfg.sort_aggregation.clone();
		settings.filter = filter;

		settings.validate()?;

		Ok(settings)
	}

	/// Keeps `unique_field` in the field list, adding it at the front when missing.
	pub fn ensure_unique_field(&mut self) {
		if !self.fields.contains(&self.unique_field) {
			self.fields.insert(0, self.unique_field.clone());
		}
	}

	pub fn page_size(&self) -> u32 {
		self.size.unwrap_or(DEFAULT_PAGE_SIZE)
	}

	pub fn effective_aggregation_size(&self) -> u32 {
		self.aggregation_size
			.or(self.size.filter(|size| *size > 0))
			.unwrap_or(DEFAULT_AGGREGATION_SIZE)
	}

	pub fn field_specs(&self) -> impl Iterator<Item = (&str, FieldSpec)> {
		self.fields.iter().map(|raw| (raw.as_str(), FieldSpec::parse(raw)))
	}

	/// Rejects configurations the builder cannot turn into a safe request.
	pub fn validate(&self) -> Result<()> {
		if self.unique_field.trim().is_empty() {
			return Err(Error::configuration(format!(
				"Source {:?} has no unique_field configured.",
				self.id
			)));
		}
		if !matches!(FieldSpec::parse(&self.unique_field), FieldSpec::Path(_)) {
			return Err(Error::configuration(format!(
				"Source {:?} unique_field must be a plain field path.",
				self.id
			)));
		}

		for name in self.supplied_aggregation.keys() {
			if name.starts_with(RESERVED_AGGREGATION_PREFIX) {
				return Err(Error::configuration(format!(
					"Aggregation names starting with underscore are reserved: {name}."
				)));
			}
			if name == FIELD_LIST_AGG || name == SORT_FIELD_AGG {
				return Err(Error::configuration(format!(
					"Aggregation name {name} is used internally."
				)));
			}
		}
		for (raw, spec) in self.field_specs() {
			spec.check(raw)?;
		}

		Ok(())
	}
}
