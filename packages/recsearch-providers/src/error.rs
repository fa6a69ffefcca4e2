pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("Search proxy responded with HTTP {status}.")]
	Status { status: u16 },
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("Search backend error: {message}")]
	Backend { message: String },
}
impl Error {
	/// True when the proxy answered but the search itself failed.
	pub fn is_backend(&self) -> bool {
		matches!(self, Self::Backend { .. } | Self::InvalidResponse { .. })
	}
}
