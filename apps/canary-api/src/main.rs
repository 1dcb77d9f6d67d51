use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = canary_api::Args::parse();

	canary_api::run(args).await
}
