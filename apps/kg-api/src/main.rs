use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = kg_api::Args::parse();

	kg_api::run(args).await
}
