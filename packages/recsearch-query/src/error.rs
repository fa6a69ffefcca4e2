pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Configuration error: {message}")]
	Configuration { message: String },
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
}
impl Error {
	pub(crate) fn configuration(message: impl Into<String>) -> Self {
		Self::Configuration { message: message.into() }
	}
}
