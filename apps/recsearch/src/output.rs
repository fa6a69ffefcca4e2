use std::{
	io::{self, Write},
	sync::Mutex,
};

use serde_json::Value;

use recsearch_query::QuerySettings;
use recsearch_service::OutputConsumer;

/// Writes one JSON object per populated page.
pub struct JsonLinesOutput<W> {
	writer: Mutex<W>,
}
impl JsonLinesOutput<io::Stdout> {
	pub fn stdout() -> Self {
		Self::new(io::stdout())
	}
}
impl<W> JsonLinesOutput<W>
where
	W: Write + Send,
{
	pub fn new(writer: W) -> Self {
		Self { writer: Mutex::new(writer) }
	}

	pub fn into_inner(self) -> W {
		self.writer.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	fn write_line(&self, line: &Value) -> io::Result<()> {
		let mut writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

		serde_json::to_writer(&mut *writer, line)?;
		writer.write_all(b"\n")?;
		writer.flush()
	}
}

impl<W> OutputConsumer for JsonLinesOutput<W>
where
	W: Write + Send,
{
	fn populate(&self, settings: &QuerySettings, response: &Value, request: &Value) {
		let line = serde_json::json!({
			"source": settings.id,
			"mode": settings.mode.as_str(),
			"from": settings.from,
			"page": settings.page,
			"request": request,
			"response": response,
		});

		if let Err(err) = self.write_line(&line) {
			tracing::warn!(source_id = %settings.id, error = %err, "Failed to write output line.");
		}
	}
}

#[cfg(test)]
mod tests {
	use recsearch_query::Mode;

	use super::*;

	#[test]
	fn writes_one_line_per_page() {
		let output = JsonLinesOutput::new(Vec::new());
		let settings = QuerySettings::new("records", Mode::Documents, "id");

		output.populate(&settings, &serde_json::json!({ "hits": { "hits": [] } }), &serde_json::json!({}));
		output.populate(&settings, &serde_json::json!({ "hits": { "hits": [] } }), &serde_json::json!({}));

		let written = String::from_utf8(output.into_inner()).expect("Output must be UTF-8.");
		let lines: Vec<Value> = written
			.lines()
			.map(|line| serde_json::from_str(line).expect("Line must be JSON."))
			.collect();

		assert_eq!(lines.len(), 2);
		assert_eq!(lines[0]["source"], "records");
		assert_eq!(lines[0]["mode"], "docs");
	}
}
