pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Configuration error: {message}")]
	Configuration { message: String },
	#[error("Search backend error: {message}")]
	Backend { message: String },
	#[error("Transport error: {message}")]
	Transport { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
}
impl Error {
	/// Backend and transport failures leave the source usable; the next populate retries.
	pub fn is_recoverable(&self) -> bool {
		matches!(self, Self::Backend { .. } | Self::Transport { .. })
	}
}

impl From<recsearch_query::Error> for Error {
	fn from(err: recsearch_query::Error) -> Self {
		match err {
			recsearch_query::Error::Configuration { message } => Self::Configuration { message },
			recsearch_query::Error::SerdeJson(inner) => {
				Self::Configuration { message: format!("Request could not be serialized: {inner}") }
			},
		}
	}
}

impl From<recsearch_providers::Error> for Error {
	fn from(err: recsearch_providers::Error) -> Self {
		match err {
			recsearch_providers::Error::Backend { message }
			| recsearch_providers::Error::InvalidResponse { message } => Self::Backend { message },
			recsearch_providers::Error::InvalidConfig { message } => Self::Configuration { message },
			err @ (recsearch_providers::Error::InvalidHeaderName(_)
			| recsearch_providers::Error::InvalidHeaderValue(_)) => {
				Self::Configuration { message: format!("Invalid backend header: {err}") }
			},
			other => Self::Transport { message: other.to_string() },
		}
	}
}

impl From<recsearch_config::Error> for Error {
	fn from(err: recsearch_config::Error) -> Self {
		Self::Configuration { message: err.to_string() }
	}
}
