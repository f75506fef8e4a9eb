use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = mindmate_api::Args::parse();

	mindmate_api::run(args).await
}
