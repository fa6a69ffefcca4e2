use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = recsearch::Args::parse();
	recsearch::run(args).await
}
